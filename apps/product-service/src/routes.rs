//! # Router
//!
//! Every route lives under `/product-service`.
//!
//! ```text
//! Request ──► TraceLayer ──► CorsLayer ──► /product-service/...
//!                                              │
//!                      ┌───────────────┬───────┴───────┬──────────────┐
//!                      ▼               ▼               ▼              ▼
//!                 /products       /departments    /categories      /health
//! ```

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{categories, departments, health, products};
use crate::state::AppState;

/// Path prefix shared by every route.
pub const BASE_PATH: &str = "/product-service";

/// CORS policy: the listed origins, or any origin when the list is empty.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
}

fn api() -> Router<AppState> {
    Router::new()
        .route(
            "/products",
            get(products::list_products).post(products::create_product),
        )
        .route("/products/low-stock", get(products::low_stock))
        .route("/products/on-sale", get(products::on_sale))
        .route("/products/search", get(products::search))
        .route("/products/department/{id}", get(products::by_department))
        .route("/products/category/{id}", get(products::by_category))
        .route("/products/brand/{brand}", get(products::by_brand))
        .route(
            "/products/{id}",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        .route("/products/{id}/stock", post(products::adjust_stock))
        .route(
            "/departments",
            get(departments::list_departments).post(departments::create_department),
        )
        .route(
            "/departments/{id}",
            get(departments::get_department)
                .put(departments::update_department)
                .delete(departments::delete_department),
        )
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/{id}",
            get(categories::get_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        .route("/health", get(health::health))
}

/// Builds the full application router.
pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .nest(BASE_PATH, api())
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Router Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use catalog_db::{CatalogService, KeyValueCatalog, KvConfig};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        let repo = Arc::new(KeyValueCatalog::in_memory(&KvConfig::default()));
        build_router(AppState::new(CatalogService::new(repo), "kv"), &[])
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(format!("{BASE_PATH}{uri}"));
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Creates a department, a category and one product; returns the product id.
    async fn seed(app: &Router, stock: i64) -> String {
        let (status, department) = send(
            app,
            Method::POST,
            "/departments",
            Some(json!({ "name": "Grocery", "slug": "grocery" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, category) = send(
            app,
            Method::POST,
            "/categories",
            Some(json!({ "name": "Dairy", "slug": "dairy" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, product) = send(
            app,
            Method::POST,
            "/products",
            Some(json!({
                "name": "Whole Milk",
                "sku": "MILK-1",
                "slug": "whole-milk",
                "price": 189,
                "department_id": department["id"],
                "category_id": category["id"],
                "brand": "Farm",
                "stock": stock,
                "min_stock": 5
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{product}");
        product["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["backend"], "kv");
    }

    #[tokio::test]
    async fn test_product_lifecycle() {
        let app = app();
        let id = seed(&app, 10).await;

        let (status, body) = send(&app, Method::GET, &format!("/products/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sku"], "MILK-1");

        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/products/{id}"),
            Some(json!({ "price": 199 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["price"], 199);
        assert_eq!(body["name"], "Whole Milk");

        let (status, _) = send(&app, Method::DELETE, &format!("/products/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&app, Method::GET, &format!("/products/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains(&id));

        let (status, body) = send(&app, Method::GET, "/products", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_count"], 0);
    }

    #[tokio::test]
    async fn test_stock_adjustment_statuses() {
        let app = app();
        let id = seed(&app, 10).await;
        let path = format!("/products/{id}/stock");

        let (status, body) = send(&app, Method::POST, &path, Some(json!({ "quantity": -7 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stock"], 3);

        let (status, body) = send(&app, Method::GET, "/products/low-stock", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, _) = send(&app, Method::POST, &path, Some(json!({ "quantity": -4 }))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(
            &app,
            Method::POST,
            "/products/missing/stock",
            Some(json!({ "quantity": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_validation_envelope() {
        let app = app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/products",
            Some(json!({ "price": -1, "stock": -1 })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
        let fields: Vec<&str> = body["details"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["field"].as_str().unwrap())
            .collect();
        assert!(fields.contains(&"name"));
        assert!(fields.contains(&"price"));
        assert!(fields.contains(&"stock"));
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let app = app();
        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("{BASE_PATH}/departments"))
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{\"name\": "))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_duplicate_sku_conflict() {
        let app = app();
        seed(&app, 1).await;

        let (status, body) = send(&app, Method::GET, "/departments", None).await;
        assert_eq!(status, StatusCode::OK);
        let department_id = body[0]["id"].clone();
        let (_, body) = send(&app, Method::GET, "/categories", None).await;
        let category_id = body[0]["id"].clone();

        let (status, _) = send(
            &app,
            Method::POST,
            "/products",
            Some(json!({
                "name": "Other Milk",
                "sku": "MILK-1",
                "slug": "other-milk",
                "price": 100,
                "department_id": department_id,
                "category_id": category_id,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_search_and_malformed_query() {
        let app = app();
        seed(&app, 10).await;

        let (status, body) = send(&app, Method::GET, "/products/search?q=milk", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_count"], 1);

        let (status, body) = send(
            &app,
            Method::GET,
            "/products?limit=ten&in_stock=maybe&brand=Farm",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_count"], 1);

        let (status, body) = send(&app, Method::GET, "/products/brand/Nobody", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_count"], 0);
    }

    #[tokio::test]
    async fn test_undecodable_query_uses_error_envelope() {
        let app = app();
        seed(&app, 10).await;

        for uri in [
            "/products?limit=1&limit=2",
            "/products/search?q=milk&q=bread",
            "/categories?parent_id=a&parent_id=b",
        ] {
            let (status, body) = send(&app, Method::GET, uri, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(body["error"].as_str().unwrap().contains("duplicate"), "{body}");
        }
    }

    #[tokio::test]
    async fn test_category_children_and_cycle() {
        let app = app();
        let (_, root) = send(
            &app,
            Method::POST,
            "/categories",
            Some(json!({ "name": "Food", "slug": "food" })),
        )
        .await;
        let (status, child) = send(
            &app,
            Method::POST,
            "/categories",
            Some(json!({ "name": "Dairy", "slug": "dairy", "parent_id": root["id"] })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(child["level"], 1);

        let uri = format!("/categories?parent_id={}", root["id"].as_str().unwrap());
        let (status, body) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, _) = send(
            &app,
            Method::PUT,
            &format!("/categories/{}", root["id"].as_str().unwrap()),
            Some(json!({ "parent_id": child["id"] })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri(format!("{BASE_PATH}/products"))
            .header("origin", "http://shop.test")
            .header("access-control-request-method", "PUT")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }
}
