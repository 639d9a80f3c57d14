//! HTTP surface of the recipe store.

use crate::model::{
    DeleteResponse, FavoriteRequest, FavoritesResponse, FieldErrors, Recipe, RecipeInput, RecipeUpdate,
};
use crate::store::RecipeStore;
use crate::StoreError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.body())).into_response()
    }
}

/// Field key used when a rejected body cannot be pinned to one field.
pub const BODY_FIELD: &str = "body";

const BODY_FIELDS: [&str; 5] = ["title", "ingredients", "instructions", "updatedAt", "id"];

/// Report an unreadable JSON body the same way as a failed validation.
fn invalid_body(rejection: JsonRejection) -> StoreError {
    let detail = rejection.body_text();
    tracing::debug!(status = %rejection.status(), %detail, "rejected request body");

    let located = match rejection {
        JsonRejection::JsonDataError(_) => locate_field(&detail),
        _ => None,
    };
    let mut errors = FieldErrors::default();
    match located {
        Some((field, reason)) => errors.push(field, reason),
        None => errors.push(BODY_FIELD, detail.as_str()),
    }
    StoreError::Validation(errors)
}

/// Split `"...target type: ingredients[0]: invalid type..."` into the field and the reason.
fn locate_field(detail: &str) -> Option<(&'static str, &str)> {
    let (_, rest) = detail.split_once("target type: ")?;
    let (path, reason) = rest.split_once(": ")?;
    let head = path.split(['[', '.']).next()?;
    BODY_FIELDS.iter().copied().find(|field| *field == head).map(|field| (field, reason))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
}

/// Build the router with CORS and per-request tracing.
pub fn router(store: RecipeStore) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route("/recipes/{id}", get(get_recipe).put(update_recipe).delete(delete_recipe))
        .route("/favorites", get(list_favorites).post(add_favorite))
        .route("/favorites/{id}", delete(remove_favorite))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
        .with_state(store)
}

/// Serve `store` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, store: RecipeStore, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "recipe store listening");
    }
    axum::serve(listener, router(store)).with_graceful_shutdown(shutdown).await
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn list_recipes(
    State(store): State<RecipeStore>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Recipe>>, StoreError> {
    store.list(query.search.as_deref()).await.map(Json)
}

async fn get_recipe(
    State(store): State<RecipeStore>,
    Path(id): Path<String>,
) -> Result<Json<Recipe>, StoreError> {
    store.get(&id).await.map(Json)
}

async fn create_recipe(
    State(store): State<RecipeStore>,
    input: Result<Json<RecipeInput>, JsonRejection>,
) -> Result<Json<Recipe>, StoreError> {
    let Json(input) = input.map_err(invalid_body)?;
    store.create(input).await.map(Json)
}

async fn update_recipe(
    State(store): State<RecipeStore>,
    Path(id): Path<String>,
    update: Result<Json<RecipeUpdate>, JsonRejection>,
) -> Result<Json<Recipe>, StoreError> {
    let Json(update) = update.map_err(invalid_body)?;
    store.update(&id, update).await.map(Json)
}

async fn delete_recipe(
    State(store): State<RecipeStore>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, StoreError> {
    store.delete(&id).await?;
    Ok(Json(DeleteResponse { success: true }))
}

async fn list_favorites(State(store): State<RecipeStore>) -> Result<Json<Vec<String>>, StoreError> {
    store.list_favorites().await.map(Json)
}

async fn add_favorite(
    State(store): State<RecipeStore>,
    request: Result<Json<FavoriteRequest>, JsonRejection>,
) -> Result<Json<FavoritesResponse>, StoreError> {
    let Json(request) = request.map_err(invalid_body)?;
    let favorites = store.add_favorite(&request.id).await?;
    Ok(Json(FavoritesResponse { success: true, favorites }))
}

async fn remove_favorite(
    State(store): State<RecipeStore>,
    Path(id): Path<String>,
) -> Result<Json<FavoritesResponse>, StoreError> {
    let favorites = store.remove_favorite(&id).await?;
    Ok(Json(FavoritesResponse { success: true, favorites }))
}
