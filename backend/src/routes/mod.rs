//! Route definitions for the Stock Ledger Platform

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes. Everything under `/api/v1` except `/health` needs a bearer token.
pub fn api_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .nest("/items", item_routes())
        .nest("/locations", location_routes())
        .nest("/ledger", ledger_routes())
        .nest("/repacking", repacking_routes())
        .nest("/bundles", bundle_routes())
        .nest("/production-batches", production_routes())
        .nest("/trolleys", trolley_routes())
        .nest("/trolley-movements", trolley_movement_routes())
        .nest("/opening-stock", opening_stock_routes())
        .nest("/bom", bom_routes())
        .nest("/price-lists", price_list_routes())
        .nest("/quotations", quotation_routes())
        .nest("/customers", customer_routes())
        .nest("/sales-invoices", sales_invoice_routes())
        .nest("/payments", payment_routes())
        .nest("/suppliers", supplier_routes())
        .nest("/grn", grn_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        .merge(protected)
}

/// Item master routes
fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_items).post(handlers::create_item))
        .route("/:item_id", get(handlers::get_item).put(handlers::update_item))
        .route("/:item_id/balances", get(handlers::get_item_balances))
        .route("/:item_id/last-purchase", get(handlers::get_last_purchase))
}

/// Location routes
fn location_routes() -> Router<AppState> {
    Router::new().route("/", get(handlers::list_locations).post(handlers::create_location))
}

/// Stock ledger routes
fn ledger_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_ledger_entries))
        .route("/balance/:item_id/:location_id", get(handlers::get_stock_balance))
        .route("/stock-counts", post(handlers::record_stock_count))
        .route("/cache-drift", get(handlers::get_cache_drift))
        .route("/cache-drift/refresh", post(handlers::refresh_stock_cache))
}

/// Repacking routes
fn repacking_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_repacking).post(handlers::create_repacking))
        .route("/availability", get(handlers::get_repacking_availability))
        .route("/allocation-preview", get(handlers::preview_repacking_allocation))
        .route(
            "/:repacking_id",
            get(handlers::get_repacking).delete(handlers::delete_repacking),
        )
}

/// Bundle routes
fn bundle_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_bundles).post(handlers::create_bundle))
        .route(
            "/:bundle_id",
            get(handlers::get_bundle).delete(handlers::delete_bundle),
        )
}

/// Production batch routes
fn production_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_production_batches).post(handlers::create_production_batch),
        )
        .route("/:batch_id", get(handlers::get_production_batch))
        .route("/:batch_id/complete", post(handlers::complete_production_batch))
}

/// Trolley routes
fn trolley_routes() -> Router<AppState> {
    Router::new().route("/", get(handlers::list_trolleys).post(handlers::create_trolley))
}

/// Trolley movement routes
fn trolley_movement_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_trolley_movements).post(handlers::create_trolley_movement),
        )
        .route("/:movement_id", get(handlers::get_trolley_movement))
        .route("/:movement_id/verify", post(handlers::verify_trolley_movement))
        .route("/:movement_id/reset", post(handlers::reset_trolley_movement))
}

/// Opening stock routes
fn opening_stock_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_opening_stock).post(handlers::create_opening_stock),
        )
        .route("/:opening_stock_id", delete(handlers::delete_opening_stock))
}

/// Bill of materials routes
fn bom_routes() -> Router<AppState> {
    Router::new()
        .route("/:item_id", get(handlers::get_bom).put(handlers::set_bom))
        .route("/:item_id/requirements", get(handlers::get_bom_requirements))
        .route(
            "/:item_id/components/:component_item_id",
            delete(handlers::remove_bom_component),
        )
}

/// Price list routes
fn price_list_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_price_lists).post(handlers::create_price_list))
        .route("/lookup", get(handlers::lookup_price))
        .route("/:price_list_id", get(handlers::get_price_list))
        .route("/:price_list_id/items", post(handlers::set_item_price))
        .route(
            "/:price_list_id/items/:item_id",
            delete(handlers::remove_item_price),
        )
}

/// Quotation routes
fn quotation_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_quotations).post(handlers::create_quotation))
        .route("/:quotation_id", get(handlers::get_quotation))
        .route("/:quotation_id/status", post(handlers::update_quotation_status))
}

/// Customer routes
fn customer_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_customers).post(handlers::create_customer))
        .route(
            "/:customer_id",
            get(handlers::get_customer).put(handlers::update_customer),
        )
        .route("/:customer_id/deactivate", post(handlers::deactivate_customer))
        .route("/:customer_id/balance", get(handlers::get_customer_balance))
}

/// Sales invoice routes
fn sales_invoice_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_sales_invoices).post(handlers::create_sales_invoice),
        )
        .route("/:invoice_id", get(handlers::get_sales_invoice))
        .route("/:invoice_id/cancel", post(handlers::cancel_sales_invoice))
        .route("/:invoice_id/payments", post(handlers::record_payment))
}

/// Payment routes
fn payment_routes() -> Router<AppState> {
    Router::new().route("/", get(handlers::list_payments))
}

/// Supplier routes
fn supplier_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_suppliers).post(handlers::create_supplier))
        .route(
            "/:supplier_id",
            get(handlers::get_supplier).put(handlers::update_supplier),
        )
        .route("/:supplier_id/deactivate", post(handlers::deactivate_supplier))
}

/// Goods received note routes
fn grn_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_grns).post(handlers::create_grn))
        .route("/:grn_id", get(handlers::get_grn))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::config::{Config, DatabaseConfig, JwtConfig, ServerConfig};
    use crate::test_support::settings;
    use crate::AppState;

    const SECRET: &str = "route-test-secret";

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        permissions: Vec<String>,
        exp: i64,
    }

    fn app() -> Router {
        // never connects; every request below is refused before a service runs
        let db = PgPoolOptions::new()
            .connect_lazy("postgres://unused@localhost/unused")
            .expect("lazy pool");
        let state = AppState {
            db,
            config: Arc::new(Config {
                environment: "test".to_string(),
                server: ServerConfig {
                    port: 0,
                    host: "127.0.0.1".to_string(),
                },
                database: DatabaseConfig {
                    url: String::new(),
                    max_connections: 1,
                    min_connections: 0,
                },
                jwt: JwtConfig {
                    secret: SECRET.to_string(),
                },
                inventory: settings(),
            }),
        };
        Router::new()
            .nest("/api/v1", super::api_routes(state.clone()))
            .with_state(state)
    }

    fn token(permissions: &[&str]) -> String {
        let claims = TestClaims {
            sub: Uuid::new_v4().to_string(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            exp: chrono::Utc::now().timestamp() + 3600,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .expect("encode token")
    }

    async fn status_of(method: Method, uri: &str, body: &str, permissions: &[&str]) -> StatusCode {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token(permissions)))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request");
        app().oneshot(request).await.expect("response").status()
    }

    fn write_requests() -> Vec<(Method, String, String)> {
        let id = Uuid::new_v4();
        vec![
            (
                Method::POST,
                "/api/v1/bundles".to_string(),
                format!(
                    r#"{{"source_item_id":"{id}","bundle_item_id":"{id}","location_id":"{id}",
                        "bundle_quantity":"1","packs_per_bundle":2,"bundle_date":"2024-03-01"}}"#
                ),
            ),
            (Method::DELETE, format!("/api/v1/bundles/{id}"), String::new()),
            (
                Method::POST,
                "/api/v1/production-batches".to_string(),
                format!(
                    r#"{{"item_id":"{id}","location_id":"{id}","planned_quantity":"10",
                        "production_date":"2024-03-01"}}"#
                ),
            ),
            (
                Method::POST,
                format!("/api/v1/production-batches/{id}/complete"),
                r#"{"produced_quantity":"10"}"#.to_string(),
            ),
            (
                Method::POST,
                "/api/v1/quotations".to_string(),
                r#"{"customer_name":"Walk-in","quotation_date":"2024-03-01","items":[]}"#.to_string(),
            ),
            (
                Method::POST,
                format!("/api/v1/quotations/{id}/status"),
                r#"{"status":"sent"}"#.to_string(),
            ),
            (
                Method::POST,
                "/api/v1/repacking".to_string(),
                format!(
                    r#"{{"item_id":"{id}","location_id":"{id}","repack_date":"2024-03-01",
                        "repack_quantity":"5"}}"#
                ),
            ),
            (
                Method::POST,
                "/api/v1/trolley-movements".to_string(),
                format!(
                    r#"{{"trolley_id":"{id}","production_batch_id":"{id}","to_location_id":"{id}",
                        "expected_units":10}}"#
                ),
            ),
            (
                Method::POST,
                "/api/v1/sales-invoices".to_string(),
                format!(
                    r#"{{"customer_id":"{id}","location_id":"{id}","invoice_date":"2024-03-01",
                        "items":[]}}"#
                ),
            ),
            (
                Method::POST,
                format!("/api/v1/sales-invoices/{id}/payments"),
                r#"{"amount":"5","payment_date":"2024-03-01","method":"cash"}"#.to_string(),
            ),
            (Method::POST, format!("/api/v1/suppliers/{id}/deactivate"), String::new()),
            (Method::POST, format!("/api/v1/customers/{id}/deactivate"), String::new()),
        ]
    }

    #[tokio::test]
    async fn test_writes_need_a_permission() {
        for (method, uri, body) in write_requests() {
            let status = status_of(method.clone(), &uri, &body, &["items:read"]).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/repacking")
            .body(Body::empty())
            .expect("request");
        let response = app().oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_deleting_a_supplier_is_not_routed() {
        let uri = format!("/api/v1/suppliers/{}", Uuid::new_v4());
        let status = status_of(Method::DELETE, &uri, "", &["*"]).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }
}
