//! Item handlers
//!
//! All routes here are gated; the owner is the authenticated user.
//!
//! Author: hephaex@gmail.com

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use payhere_core::{Item, ItemPage, ItemSize, ItemUpdate, NewItem};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Create item request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    #[validate(length(min = 1, max = 100))]
    #[schema(example = "사과")]
    pub name: String,

    #[validate(length(min = 1))]
    pub description: String,

    #[validate(range(min = 1))]
    pub price: i64,

    #[validate(range(min = 1))]
    pub cost: i64,

    #[validate(length(min = 1, max = 100))]
    pub category: String,

    #[validate(length(min = 1, max = 100))]
    #[schema(example = "8801234567890")]
    pub barcode: String,

    pub expiry_at: DateTime<Utc>,

    /// `small` or `large`
    #[schema(example = "small")]
    pub size: String,
}

impl CreateItemRequest {
    fn into_new_item(self) -> Result<NewItem, AppError> {
        Ok(NewItem {
            size: self.size.parse()?,
            name: self.name,
            description: self.description,
            price: self.price,
            cost: self.cost,
            category: self.category,
            barcode: self.barcode,
            expiry_at: self.expiry_at,
        })
    }
}

/// Partial item update; omitted fields are left unchanged
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub cost: Option<i64>,
    pub category: Option<String>,
    pub barcode: Option<String>,
    pub expiry_at: Option<DateTime<Utc>>,
    /// `small` or `large`
    pub size: Option<String>,
}

impl UpdateItemRequest {
    fn into_update(self) -> Result<ItemUpdate, AppError> {
        let size = self.size.as_deref().map(str::parse::<ItemSize>).transpose()?;

        Ok(ItemUpdate {
            name: self.name,
            description: self.description,
            price: self.price,
            cost: self.cost,
            category: self.category,
            barcode: self.barcode,
            expiry_at: self.expiry_at,
            size,
        })
    }
}

/// Item search parameters
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct ListItemsQuery {
    /// Name substring, or Hangul initial consonants of the name
    pub keyword: Option<String>,
    /// Cursor: the `searchAfter` of the previous page
    pub search_after: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemResponse {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub cost: i64,
    pub category: String,
    pub barcode: String,
    pub expiry_at: DateTime<Utc>,
    #[schema(value_type = String, example = "small")]
    pub size: ItemSize,
    pub created_at: DateTime<Utc>,
}

impl From<Item> for ItemResponse {
    fn from(item: Item) -> Self {
        Self {
            id: item.id,
            name: item.name,
            description: item.description,
            price: item.price,
            cost: item.cost,
            category: item.category,
            barcode: item.barcode,
            expiry_at: item.expiry_at,
            size: item.size,
            created_at: item.created_at,
        }
    }
}

/// One page of search results
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemListResponse {
    /// Matching items, regardless of the cursor
    pub total_count: i64,
    pub items: Vec<ItemResponse>,
    pub has_next: bool,
    /// Cursor for the next page
    pub search_after: i64,
}

impl From<ItemPage> for ItemListResponse {
    fn from(page: ItemPage) -> Self {
        Self {
            total_count: page.total_count,
            items: page.items.into_iter().map(ItemResponse::from).collect(),
            has_next: page.has_next,
            search_after: page.search_after,
        }
    }
}

/// Item identifiers are positive integers; anything else cannot name an item
fn parse_item_id(raw: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or(AppError::ItemNotFound)
}

#[utoipa::path(
    post,
    path = "/v1/items",
    tag = "items",
    security(("bearer" = [])),
    request_body = CreateItemRequest,
    responses(
        (status = 200, description = "Item created", body = ItemResponse),
        (status = 400, description = "Invalid item", body = crate::error::ApiError),
        (status = 409, description = "Barcode already registered", body = crate::error::ApiError),
    )
)]
pub async fn create_item(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    payload: Result<Json<CreateItemRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    request.validate()?;

    let item = state.items.create(user.id, request.into_new_item()?).await?;

    Ok(Json(ItemResponse::from(item)))
}

/// Search the user's items
#[utoipa::path(
    get,
    path = "/v1/items",
    tag = "items",
    security(("bearer" = [])),
    params(ListItemsQuery),
    responses(
        (status = 200, description = "One page of items", body = ItemListResponse),
    )
)]
pub async fn list_items(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    query: Result<Query<ListItemsQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(params) = query?;

    let page = state
        .items
        .find(user.id, params.keyword, params.search_after)
        .await?;

    Ok(Json(ItemListResponse::from(page)))
}

#[utoipa::path(
    get,
    path = "/v1/items/{itemId}",
    tag = "items",
    security(("bearer" = [])),
    params(("itemId" = i64, Path, description = "Item identifier")),
    responses(
        (status = 200, description = "Item", body = ItemResponse),
        (status = 404, description = "Item not found", body = crate::error::ApiError),
    )
)]
pub async fn get_item(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(item_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let item = state.items.get(user.id, parse_item_id(&item_id)?).await?;

    Ok(Json(ItemResponse::from(item)))
}

#[utoipa::path(
    patch,
    path = "/v1/items/{itemId}",
    tag = "items",
    security(("bearer" = [])),
    params(("itemId" = i64, Path, description = "Item identifier")),
    request_body = UpdateItemRequest,
    responses(
        (status = 204, description = "Item updated"),
        (status = 400, description = "Empty or invalid update", body = crate::error::ApiError),
        (status = 404, description = "Item not found", body = crate::error::ApiError),
        (status = 409, description = "Barcode already registered", body = crate::error::ApiError),
    )
)]
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(item_id): Path<String>,
    payload: Result<Json<UpdateItemRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let item_id = parse_item_id(&item_id)?;
    let Json(request) = payload?;

    state
        .items
        .update(user.id, item_id, request.into_update()?)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/v1/items/{itemId}",
    tag = "items",
    security(("bearer" = [])),
    params(("itemId" = i64, Path, description = "Item identifier")),
    responses(
        (status = 204, description = "Item deleted"),
        (status = 404, description = "Item not found", body = crate::error::ApiError),
    )
)]
pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(item_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.items.delete(user.id, parse_item_id(&item_id)?).await?;

    Ok(StatusCode::NO_CONTENT)
}
