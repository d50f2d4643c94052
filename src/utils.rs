pub mod confirmation;
pub mod token;
