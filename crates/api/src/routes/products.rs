//! Product route handlers.

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use tracing::{info, instrument};

use shopbot_core::{ApiResponse, CategoryId, DiscordId, Paginated, Product, ProductId, ValidationErrors};

use crate::db::products::ProductFilter;
use crate::db::{CategoryRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::RequireService;
use crate::models::{CategoryQuery, CreateProductRequest, ProductQuery, UpdateProductRequest};
use crate::state::AppState;

/// Cache prefix covering every product read.
pub const CACHE_PREFIX: &str = "/api/products";

/// Product routes, nested under `/api/products`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show).put(update).delete(remove))
}

/// Reject a category that does not exist in `guild_id`.
async fn check_category(
    state: &AppState,
    category_id: Option<CategoryId>,
    guild_id: &DiscordId,
) -> Result<()> {
    let Some(id) = category_id else {
        return Ok(());
    };
    let found = CategoryRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .is_some_and(|c| &c.guild_id == guild_id);
    if found {
        return Ok(());
    }

    let mut errors = ValidationErrors::new();
    errors.add("category_id", "does not exist in this guild");
    Err(errors.into())
}

async fn owned_product(state: &AppState, id: ProductId, guild_id: &DiscordId) -> Result<Product> {
    ProductRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .filter(|p| &p.guild_id == guild_id)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

/// `GET /api/products?guild_id=&category_id=&active=&page=&limit=`
///
/// Only active products are listed unless `active` says otherwise.
#[instrument(skip(state))]
async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> Result<Json<ApiResponse<Paginated<Product>>>> {
    query.validate()?;
    let filter = ProductFilter {
        guild_id: query.guild_id,
        category_id: query.category_id,
        active: Some(query.active.unwrap_or(true)),
        page: query.page,
        limit: query.limit,
    };
    let page = ProductRepository::new(state.pool()).list(&filter).await?;
    Ok(Json(ApiResponse::ok(page)))
}

/// `GET /api/products/{id}`
#[instrument(skip(state))]
async fn show(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<ApiResponse<Product>>> {
    let product = ProductRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;
    Ok(Json(ApiResponse::ok(product)))
}

/// `POST /api/products`
///
/// Payload validation runs before any database access.
#[instrument(skip(state, caller, request), fields(service = %caller.0.sub))]
async fn create(
    caller: RequireService,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Product>>)> {
    let (guild_id, fields) = request.into_fields()?;
    check_category(&state, fields.category_id, &guild_id).await?;

    let product = ProductRepository::new(state.pool())
        .create(&guild_id, &fields)
        .await?;

    state.cache().invalidate_prefix(CACHE_PREFIX).await;
    info!(product_id = %product.id, price = %product.price(), "Product created");

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(product))))
}

/// `PUT /api/products/{id}`
#[instrument(skip(state, caller, request), fields(service = %caller.0.sub))]
async fn update(
    caller: RequireService,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(request): ApiJson<UpdateProductRequest>,
) -> Result<Json<ApiResponse<Product>>> {
    let guild_id = request.guild_id.clone();
    let current = owned_product(&state, id, &guild_id).await?;
    let fields = request.merge(&current)?;
    if fields.category_id != current.category_id {
        check_category(&state, fields.category_id, &guild_id).await?;
    }

    let product = ProductRepository::new(state.pool())
        .update(id, &fields)
        .await?;

    state.cache().invalidate_prefix(CACHE_PREFIX).await;
    info!(product_id = %id, "Product updated");

    Ok(Json(ApiResponse::ok(product)))
}

/// `DELETE /api/products/{id}?guild_id=`
///
/// Soft delete: the product is deactivated so past orders keep resolving.
#[instrument(skip(state, caller), fields(service = %caller.0.sub))]
async fn remove(
    caller: RequireService,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
    ApiQuery(query): ApiQuery<CategoryQuery>,
) -> Result<Json<ApiResponse<Product>>> {
    owned_product(&state, id, &query.guild_id).await?;
    let product = ProductRepository::new(state.pool()).deactivate(id).await?;

    state.cache().invalidate_prefix(CACHE_PREFIX).await;
    info!(product_id = %id, "Product deactivated");

    Ok(Json(ApiResponse::ok(product)))
}
