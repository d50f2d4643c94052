use crate::AppState;
use crate::dtos::{InputTaxonDto, ListQueryDto, ListResponseDto, SingleResponseDto, TaxonDto};
use crate::error::HttpError;
use crate::extractors::{ValidatedJson, ValidatedQuery};
use crate::middleware::{JWTAuthMiddleware, auth};
use crate::models::Taxonomy;
use crate::service;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{delete, get, post};
use axum::{Extension, Router, middleware};
use tracing::instrument;

/// Router for `/categories/` or `/genres/`
///
/// Both taxonomies share these handlers; the `Taxonomy` extension tells
/// them which table they serve. There is no update endpoint.
pub fn taxonomy_handler(app_state: AppState, kind: Taxonomy) -> Router<AppState> {
    let collection = format!("/{}/", kind.table());
    let item = format!("/{}/{{slug}}/", kind.table());

    Router::new()
        // GET - List, ?search= matches names (public)
        .route(&collection, get(get_taxa))
        // POST - Create (admin)
        .route(
            &collection,
            post(create_taxon)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        // DELETE /{slug}/ - Delete (admin)
        .route(
            &item,
            delete(delete_taxon).route_layer(middleware::from_fn_with_state(app_state, auth)),
        )
        .layer(Extension(kind))
}

#[instrument(skip(app_state))]
pub async fn get_taxa(
    ValidatedQuery(params): ValidatedQuery<ListQueryDto>,
    State(app_state): State<AppState>,
    Extension(kind): Extension<Taxonomy>,
) -> Result<impl IntoResponse, HttpError> {
    let page = service::catalog::list_taxa(
        &app_state.db_client,
        kind,
        params.page_params(),
        params.search.as_deref(),
    )
    .await?;

    tracing::info!("get_taxa successful");
    Ok(Json(ListResponseDto::from_page(page, TaxonDto::from)))
}

#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn create_taxon(
    State(app_state): State<AppState>,
    Extension(kind): Extension<Taxonomy>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    ValidatedJson(body): ValidatedJson<InputTaxonDto>,
) -> Result<impl IntoResponse, HttpError> {
    let taxon = service::catalog::create_taxon(
        &app_state.db_client,
        &jwt.user,
        kind,
        &body.name,
        &body.slug,
    )
    .await?;

    tracing::info!("create_taxon successful");
    Ok((
        StatusCode::CREATED,
        Json(SingleResponseDto::new(TaxonDto::from(taxon))),
    ))
}

#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn delete_taxon(
    Path(slug): Path<String>,
    State(app_state): State<AppState>,
    Extension(kind): Extension<Taxonomy>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    service::catalog::delete_taxon(&app_state.db_client, &jwt.user, kind, &slug).await?;

    tracing::info!("delete_taxon successful");
    Ok(StatusCode::NO_CONTENT)
}
