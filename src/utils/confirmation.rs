//! Confirmation codes proving control of a registered email.
//!
//! A code is `<issued-at, base36>-<truncated HMAC-SHA256, hex>`. Nothing is
//! stored: the MAC covers the user's id, email, activation flag and
//! `last_login`, so the code can be re-derived from persisted state only, and
//! any change to that state (a successful token exchange stamps `last_login`)
//! invalidates every code issued before it.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::models::User;

type HmacSha256 = Hmac<Sha256>;

/// Bytes of the MAC kept in the code (hex doubles it)
const MAC_LEN: usize = 10;

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

fn mac_for(user: &User, issued_at: i64, secret: &[u8]) -> Result<HmacSha256, hmac::digest::InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(secret)?;
    let last_login = user
        .last_login
        .map(|t| t.timestamp_micros())
        .unwrap_or_default();
    mac.update(
        format!(
            "{}|{}|{}|{}|{}",
            user.id, user.email, user.is_active, last_login, issued_at
        )
        .as_bytes(),
    );
    Ok(mac)
}

fn make_code_at(
    user: &User,
    issued_at: i64,
    secret: &[u8],
) -> Result<String, hmac::digest::InvalidLength> {
    let digest = mac_for(user, issued_at, secret)?.finalize().into_bytes();
    Ok(format!(
        "{}-{}",
        to_base36(issued_at.max(0) as u64),
        hex::encode(&digest[..MAC_LEN])
    ))
}

fn check_code_at(user: &User, code: &str, secret: &[u8], max_age_secs: i64, now: i64) -> bool {
    let Some((ts_part, mac_part)) = code.split_once('-') else {
        return false;
    };
    let Ok(issued_at) = u64::from_str_radix(ts_part, 36) else {
        return false;
    };
    let Ok(issued_at) = i64::try_from(issued_at) else {
        return false;
    };
    let age = now - issued_at;
    if age < 0 || age > max_age_secs {
        return false;
    }
    let Ok(expected) = hex::decode(mac_part) else {
        return false;
    };
    if expected.len() != MAC_LEN {
        return false;
    }
    match mac_for(user, issued_at, secret) {
        // Constant-time comparison against the leading MAC_LEN bytes
        Ok(mac) => mac.verify_truncated_left(&expected).is_ok(),
        Err(_) => false,
    }
}

/// Mint a code for the user's current state
pub fn make_code(user: &User, secret: &[u8]) -> Result<String, hmac::digest::InvalidLength> {
    make_code_at(user, Utc::now().timestamp(), secret)
}

/// True when `code` was minted for the user's current state with `secret`
/// no more than `max_age_secs` ago
pub fn check_code(user: &User, code: &str, secret: &[u8], max_age_secs: i64) -> bool {
    check_code_at(user, code, secret, max_age_secs, Utc::now().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use uuid::Uuid;

    const SECRET: &[u8] = b"confirmation-test-secret";
    const MAX_AGE: i64 = 3 * 24 * 3600;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "reader".to_string(),
            email: "reader@example.com".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            bio: String::new(),
            role: UserRole::User,
            is_superuser: false,
            is_active: false,
            last_login: None,
            date_joined: Utc::now(),
        }
    }

    #[test]
    fn fresh_code_validates() {
        let user = user();
        let code = make_code(&user, SECRET).unwrap();
        assert!(check_code(&user, &code, SECRET, MAX_AGE));
    }

    #[test]
    fn code_is_bound_to_the_secret() {
        let user = user();
        let code = make_code(&user, SECRET).unwrap();
        assert!(!check_code(&user, &code, b"another-secret", MAX_AGE));
    }

    #[test]
    fn state_change_invalidates_code() {
        let mut user = user();
        let code = make_code(&user, SECRET).unwrap();

        user.last_login = Some(Utc::now());
        assert!(!check_code(&user, &code, SECRET, MAX_AGE));
    }

    #[test]
    fn email_change_invalidates_code() {
        let mut user = user();
        let code = make_code(&user, SECRET).unwrap();

        user.email = "moved@example.com".to_string();
        assert!(!check_code(&user, &code, SECRET, MAX_AGE));
    }

    #[test]
    fn expired_code_is_rejected() {
        let user = user();
        let issued_at = 1_700_000_000;
        let code = make_code_at(&user, issued_at, SECRET).unwrap();

        assert!(check_code_at(&user, &code, SECRET, MAX_AGE, issued_at + MAX_AGE));
        assert!(!check_code_at(&user, &code, SECRET, MAX_AGE, issued_at + MAX_AGE + 1));
    }

    #[test]
    fn malformed_codes_are_rejected() {
        let user = user();
        for code in ["", "abc", "zz-", "-00ff", "1a-nothex", "1a-00ff"] {
            assert!(!check_code(&user, code, SECRET, MAX_AGE), "accepted {code:?}");
        }
    }

    #[test]
    fn base36_encoding() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(u64::from_str_radix(&to_base36(1_700_000_000), 36).unwrap(), 1_700_000_000);
    }
}
