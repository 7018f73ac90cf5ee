//! # Product Handlers
//!
//! ```text
//! GET    /products                     list_products
//! POST   /products                     create_product      → 201
//! GET    /products/low-stock           low_stock
//! GET    /products/on-sale             on_sale
//! GET    /products/search?q=           search
//! GET    /products/department/{id}     by_department
//! GET    /products/category/{id}       by_category
//! GET    /products/brand/{brand}       by_brand
//! GET    /products/{id}                get_product
//! PUT    /products/{id}                update_product
//! DELETE /products/{id}                delete_product      → 204
//! POST   /products/{id}/stock          adjust_stock
//! ```
//!
//! ## Query Parameters
//! Every listing parameter is read as text first. A value that does not
//! parse (`limit=ten`, `in_stock=maybe`) is dropped, not rejected. A query
//! string that cannot be decoded at all (a repeated key) is a 400.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use catalog_core::{
    CreateProductRequest, Money, Product, ProductFilter, ProductListResponse, UpdateProductRequest,
};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::AppState;

/// Raw listing query string.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProductQuery {
    pub category_id: Option<String>,
    pub department_id: Option<String>,
    pub brand: Option<String>,
    pub search: Option<String>,
    pub q: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub in_stock: Option<String>,
    pub is_on_sale: Option<String>,
    pub min_rating: Option<String>,
    pub tags: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

fn parsed<T: std::str::FromStr>(value: &Option<String>) -> Option<T> {
    value.as_deref().and_then(|v| v.trim().parse().ok())
}

impl ProductQuery {
    pub fn to_filter(&self) -> ProductFilter {
        ProductFilter {
            category_id: self.category_id.clone(),
            department_id: self.department_id.clone(),
            brand: self.brand.clone(),
            min_price: parsed::<i64>(&self.min_price).map(Money::from_cents),
            max_price: parsed::<i64>(&self.max_price).map(Money::from_cents),
            in_stock: parsed(&self.in_stock),
            is_on_sale: parsed(&self.is_on_sale),
            min_rating: parsed(&self.min_rating),
            search: self.search.clone(),
            tags: self
                .tags
                .as_deref()
                .map(|tags| {
                    tags.split(',')
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            limit: parsed(&self.limit),
            offset: parsed(&self.offset),
        }
    }
}

/// Body of `POST /products/{id}/stock`.
#[derive(Debug, Deserialize)]
pub struct StockAdjustment {
    pub quantity: i64,
}

pub async fn list_products(
    State(state): State<AppState>,
    query: Result<Query<ProductQuery>, QueryRejection>,
) -> ApiResult<Json<ProductListResponse>> {
    let Query(query) = query?;
    Ok(Json(state.catalog.list_products(&query.to_filter()).await?))
}

pub async fn create_product(
    State(state): State<AppState>,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    let Json(request) = payload?;
    let product = state.catalog.create_product(request).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.catalog.get_product(&id).await?))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateProductRequest>, JsonRejection>,
) -> ApiResult<Json<Product>> {
    let Json(request) = payload?;
    Ok(Json(state.catalog.update_product(&id, request).await?))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.catalog.delete_product(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn adjust_stock(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<StockAdjustment>, JsonRejection>,
) -> ApiResult<Json<Product>> {
    let Json(adjustment) = payload?;
    Ok(Json(state.catalog.adjust_stock(&id, adjustment.quantity).await?))
}

pub async fn low_stock(State(state): State<AppState>) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(state.catalog.low_stock_products().await?))
}

pub async fn on_sale(
    State(state): State<AppState>,
    query: Result<Query<ProductQuery>, QueryRejection>,
) -> ApiResult<Json<ProductListResponse>> {
    let Query(query) = query?;
    Ok(Json(state.catalog.products_on_sale(query.to_filter()).await?))
}

pub async fn search(
    State(state): State<AppState>,
    query: Result<Query<ProductQuery>, QueryRejection>,
) -> ApiResult<Json<ProductListResponse>> {
    let Query(query) = query?;
    let text = query.q.clone().or_else(|| query.search.clone()).unwrap_or_default();
    Ok(Json(state.catalog.search_products(&text, query.to_filter()).await?))
}

pub async fn by_department(
    State(state): State<AppState>,
    Path(id): Path<String>,
    query: Result<Query<ProductQuery>, QueryRejection>,
) -> ApiResult<Json<ProductListResponse>> {
    let Query(query) = query?;
    Ok(Json(
        state
            .catalog
            .products_by_department(&id, query.to_filter())
            .await?,
    ))
}

pub async fn by_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
    query: Result<Query<ProductQuery>, QueryRejection>,
) -> ApiResult<Json<ProductListResponse>> {
    let Query(query) = query?;
    Ok(Json(
        state
            .catalog
            .products_by_category(&id, query.to_filter())
            .await?,
    ))
}

pub async fn by_brand(
    State(state): State<AppState>,
    Path(brand): Path<String>,
    query: Result<Query<ProductQuery>, QueryRejection>,
) -> ApiResult<Json<ProductListResponse>> {
    let Query(query) = query?;
    Ok(Json(state.catalog.products_by_brand(&brand, query.to_filter()).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_values_are_dropped() {
        let query = ProductQuery {
            brand: Some("Farm".into()),
            min_price: Some("abc".into()),
            max_price: Some("500".into()),
            in_stock: Some("maybe".into()),
            is_on_sale: Some("true".into()),
            limit: Some("ten".into()),
            offset: Some(" 20 ".into()),
            tags: Some("organic, ,local".into()),
            ..Default::default()
        };

        let filter = query.to_filter();
        assert_eq!(filter.brand.as_deref(), Some("Farm"));
        assert_eq!(filter.min_price, None);
        assert_eq!(filter.max_price, Some(Money::from_cents(500)));
        assert_eq!(filter.in_stock, None);
        assert_eq!(filter.is_on_sale, Some(true));
        assert_eq!(filter.limit, None);
        assert_eq!(filter.offset, Some(20));
        assert_eq!(filter.tags, vec!["organic", "local"]);
    }
}
