use axum::Router;
use tower_http::trace::TraceLayer;

use crate::{
    AppState,
    handler::{
        auth::auth_handler, comment::comment_handler, review::review_handler,
        taxonomy::taxonomy_handler, title::title_handler, users::users_handler,
    },
    models::Taxonomy,
};

/// Every resource router carries full paths with trailing slashes, so they
/// are merged rather than nested (nesting would drop the slash on the
/// collection routes).
pub fn create_router(app_state: AppState) -> Router {
    let api_route = Router::new()
        .merge(auth_handler())
        .merge(users_handler(app_state.clone()))
        .merge(taxonomy_handler(app_state.clone(), Taxonomy::Category))
        .merge(taxonomy_handler(app_state.clone(), Taxonomy::Genre))
        .merge(title_handler(app_state.clone()))
        .merge(review_handler(app_state.clone()))
        .merge(comment_handler(app_state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    Router::new().nest("/api/v1", api_route)
}
