//! Category route handlers.
//!
//! Reads are public and cached; writes need a service token and drop the
//! cached category listings.

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use tracing::{info, instrument};

use shopbot_core::{ApiResponse, Category, CategoryId, DiscordId};

use crate::db::CategoryRepository;
use crate::error::{AppError, Result};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::RequireService;
use crate::models::{CategoryQuery, CreateCategoryRequest, UpdateCategoryRequest};
use crate::state::AppState;

/// Cache prefix covering every category read.
pub const CACHE_PREFIX: &str = "/api/categories";

/// Category routes, nested under `/api/categories`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show).put(update).delete(remove))
}

/// Load a category and check it belongs to `guild_id`.
///
/// Categories of other guilds are reported as missing.
async fn owned_category(
    state: &AppState,
    id: CategoryId,
    guild_id: &DiscordId,
) -> Result<Category> {
    CategoryRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .filter(|c| &c.guild_id == guild_id)
        .ok_or_else(|| AppError::NotFound(format!("category {id}")))
}

/// `GET /api/categories?guild_id=`
#[instrument(skip(state))]
async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CategoryQuery>,
) -> Result<Json<ApiResponse<Vec<Category>>>> {
    let categories = CategoryRepository::new(state.pool())
        .list_by_guild(&query.guild_id)
        .await?;
    Ok(Json(ApiResponse::ok(categories)))
}

/// `GET /api/categories/{id}`
#[instrument(skip(state))]
async fn show(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<CategoryId>,
) -> Result<Json<ApiResponse<Category>>> {
    let category = CategoryRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("category {id}")))?;
    Ok(Json(ApiResponse::ok(category)))
}

/// `POST /api/categories`
#[instrument(skip(state, caller, request), fields(service = %caller.0.sub))]
async fn create(
    caller: RequireService,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Category>>)> {
    let (guild_id, fields) = request.into_fields()?;
    let category = CategoryRepository::new(state.pool())
        .create(&guild_id, &fields)
        .await?;

    state.cache().invalidate_prefix(CACHE_PREFIX).await;
    info!(category_id = %category.id, guild_id = %guild_id, "Category created");

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(category))))
}

/// `PUT /api/categories/{id}`
#[instrument(skip(state, caller, request), fields(service = %caller.0.sub))]
async fn update(
    caller: RequireService,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<CategoryId>,
    ApiJson(request): ApiJson<UpdateCategoryRequest>,
) -> Result<Json<ApiResponse<Category>>> {
    let current = owned_category(&state, id, &request.guild_id).await?;
    let fields = request.merge(&current)?;
    let category = CategoryRepository::new(state.pool())
        .update(id, &fields)
        .await?;

    state.cache().invalidate_prefix(CACHE_PREFIX).await;
    info!(category_id = %id, "Category updated");

    Ok(Json(ApiResponse::ok(category)))
}

/// `DELETE /api/categories/{id}?guild_id=`
///
/// Refused with 409 while any product still references the category.
#[instrument(skip(state, caller), fields(service = %caller.0.sub))]
async fn remove(
    caller: RequireService,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<CategoryId>,
    ApiQuery(query): ApiQuery<CategoryQuery>,
) -> Result<Json<ApiResponse<serde_json::Value>>> {
    owned_category(&state, id, &query.guild_id).await?;
    CategoryRepository::new(state.pool()).delete(id).await?;

    state.cache().invalidate_prefix(CACHE_PREFIX).await;
    info!(category_id = %id, "Category deleted");

    Ok(Json(ApiResponse::ok(serde_json::json!({ "deleted": id }))))
}
