//! HTTP surface.

pub mod auth;
pub mod backup;
pub mod catalog;
pub mod documents;
pub mod functions;
pub mod middleware;
pub mod records;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::AppState;

/// Health check endpoint.
///
/// Returns a simple JSON response indicating the server is running.
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "inventory-core",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Database health check endpoint.
async fn db_health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    state.store.ping().await.map_err(|e| {
        error!("Database health check failed: {}", e);
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    Ok(Json(serde_json::json!({
        "status": "ok",
        "database": "connected"
    })))
}

/// Creates the main application router.
///
/// # Arguments
///
/// * `state` - Shared services, store and auth provider
///
/// # Returns
///
/// Router with public routes (health, auth, functions) and the bearer-protected
/// `/api` routes.
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/api/categories",
            get(catalog::list_categories).post(catalog::create_category),
        )
        .route(
            "/api/categories/:id",
            put(catalog::update_category).delete(catalog::delete_category),
        )
        .route("/api/units", get(catalog::list_units).post(catalog::create_unit))
        .route(
            "/api/units/:id",
            put(catalog::update_unit).delete(catalog::delete_unit),
        )
        .route(
            "/api/products",
            get(records::list_products).post(records::create_product),
        )
        .route(
            "/api/products/:id",
            get(records::get_product)
                .put(records::update_product)
                .delete(records::delete_product),
        )
        .route("/api/sales", get(records::list_sales).post(records::create_sale))
        .route(
            "/api/sales/:id",
            get(records::get_sale)
                .put(records::update_sale)
                .delete(records::delete_sale),
        )
        .route("/api/sales/:id/invoice.pdf", get(documents::sales_invoice))
        .route(
            "/api/purchases",
            get(records::list_purchases).post(records::create_purchase),
        )
        .route(
            "/api/purchases/:id",
            get(records::get_purchase)
                .put(records::update_purchase)
                .delete(records::delete_purchase),
        )
        .route("/api/purchases/:id/order.pdf", get(documents::purchase_order))
        .route(
            "/api/purchase-returns",
            get(records::list_purchase_returns).post(records::create_purchase_return),
        )
        .route(
            "/api/purchase-returns/:id",
            get(records::get_purchase_return).delete(records::delete_purchase_return),
        )
        .route(
            "/api/purchase-returns/:id/status",
            put(records::update_purchase_return_status),
        )
        .route("/api/backup", get(backup::download_backup))
        // Restore accepts any backup the download route can produce.
        .route(
            "/api/restore",
            post(backup::restore_backup).layer(DefaultBodyLimit::disable()),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        // Public routes
        .route("/health", get(health_check))
        .route("/health/db", get(db_health_check))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/functions/create-user", post(functions::create_user))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthProvider, JwtManager, MemoryAuthProvider};
    use crate::models::Role;
    use crate::store::{MemoryStore, Store, Table};
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        auth: Arc<MemoryAuthProvider>,
        store: Arc<MemoryStore>,
    }

    impl TestApp {
        fn new() -> Self {
            let auth = Arc::new(MemoryAuthProvider::new(JwtManager::new(
                "router-test-secret-value".to_string(),
                300,
                600,
            )));
            let store = Arc::new(MemoryStore::new());
            let state = AppState::new(store.clone(), auth.clone());
            Self {
                router: create_router(state),
                auth,
                store,
            }
        }

        /// Identity plus profile with `role`; returns an access token.
        async fn user(&self, email: &str, role: Role) -> String {
            let user = self.auth.create_identity(email, "password1").await.unwrap();
            self.store
                .insert(
                    Table::UserProfiles,
                    vec![json!({ "user_id": user.id, "username": email, "role": role })],
                )
                .await
                .unwrap();
            self.auth.sign_in(email, "password1").await.unwrap().access_token
        }

        async fn send(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Vec<u8>) {
            self.send_bytes(method, uri, token, body.map(|b| b.to_string().into_bytes()))
                .await
        }

        async fn send_bytes(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Vec<u8>>,
        ) -> (StatusCode, Vec<u8>) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
            }
            let request = match body {
                Some(body) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            (status, bytes.to_vec())
        }

        async fn send_json(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let (status, bytes) = self.send(method, uri, token, body).await;
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, value)
        }
    }

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::new();
        let (status, body) = app.send_json(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, _) = app.send_json(Method::GET, "/health/db", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_requires_bearer_token() {
        let app = TestApp::new();
        let (status, body) = app
            .send_json(Method::GET, "/api/categories", None, None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let (status, _) = app
            .send_json(Method::GET, "/api/categories", Some("garbage"), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_returns_session_and_profile() {
        let app = TestApp::new();
        app.user("manager@shop.test", Role::Manager).await;

        let (status, body) = app
            .send_json(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({ "email": "manager@shop.test", "password": "password1" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["profile"]["role"], "manager");
        let token = body["session"]["access_token"].as_str().unwrap().to_string();

        let (status, _) = app
            .send_json(Method::GET, "/api/products", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app
            .send_json(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({ "email": "manager@shop.test", "password": "nope-nope" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_revokes_access_and_refresh_tokens() {
        let app = TestApp::new();
        app.user("owner@shop.test", Role::Admin).await;

        let (_, body) = app
            .send_json(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({ "email": "owner@shop.test", "password": "password1" })),
            )
            .await;
        let access = body["session"]["access_token"].as_str().unwrap().to_string();
        let refresh = body["session"]["refresh_token"].clone();

        let (status, _) = app
            .send_json(Method::POST, "/auth/logout", Some(&access), None)
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app
            .send_json(Method::GET, "/api/products", Some(&access), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = app
            .send_json(
                Method::POST,
                "/auth/refresh",
                None,
                Some(json!({ "refresh_token": refresh })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_category_conflicts_map_to_409() {
        let app = TestApp::new();
        let token = app.user("staff@shop.test", Role::Staff).await;

        let (status, category) = app
            .send_json(
                Method::POST,
                "/api/categories",
                Some(&token),
                Some(json!({ "name": "Tools" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = app
            .send_json(
                Method::POST,
                "/api/categories",
                Some(&token),
                Some(json!({ "name": "Tools" })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("may already exist"));

        let (status, _) = app
            .send_json(
                Method::POST,
                "/api/products",
                Some(&token),
                Some(json!({ "name": "Hammer", "category_id": category["id"] })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let uri = format!("/api/categories/{}", category["id"].as_str().unwrap());
        let (status, body) = app.send_json(Method::DELETE, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("may be in use"));
    }

    #[tokio::test]
    async fn test_backup_and_restore_require_admin() {
        let app = TestApp::new();
        let staff = app.user("staff@shop.test", Role::Staff).await;
        let admin = app.user("admin@shop.test", Role::Admin).await;

        let (status, _) = app.send(Method::GET, "/api/backup", Some(&staff), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, bytes) = app.send(Method::GET, "/api/backup", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        let document: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(document["exported_at"].is_string());

        let (status, _) = app
            .send_json(Method::POST, "/api/restore", Some(&staff), Some(document.clone()))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, summary) = app
            .send_json(Method::POST, "/api/restore", Some(&admin), Some(document))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["tables"].as_array().unwrap().len(), 4);

        let (status, body) = app
            .send_json(Method::POST, "/api/restore", Some(&admin), Some(json!("nope")))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_restore_accepts_backup_larger_than_default_body_limit() {
        let app = TestApp::new();
        let admin = app.user("admin@shop.test", Role::Admin).await;

        let notes = "x".repeat(1024);
        let sales: Vec<Value> = (0..3000)
            .map(|i| {
                json!({
                    "invoice_number": format!("INV-{}", i),
                    "customer": notes,
                    "product_name": "Paint",
                    "quantity": 1,
                    "unit_price": 9.99,
                    "total": 9.99,
                })
            })
            .collect();
        app.store.insert(Table::Sales, sales).await.unwrap();

        let (status, bytes) = app.send(Method::GET, "/api/backup", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(bytes.len() > 2 * 1024 * 1024);

        let (status, summary) = app
            .send_bytes(Method::POST, "/api/restore", Some(&admin), Some(bytes))
            .await;
        assert_eq!(status, StatusCode::OK);
        let summary: Value = serde_json::from_slice(&summary).unwrap();
        assert_eq!(summary["tables"][1]["rows"], 3000);
        assert_eq!(app.store.select_all(Table::Sales).await.unwrap().len(), 3000);
    }

    #[tokio::test]
    async fn test_create_user_function_statuses() {
        let app = TestApp::new();
        let staff = app.user("staff@shop.test", Role::Staff).await;
        let admin = app.user("admin@shop.test", Role::SuperAdmin).await;
        let request = json!({
            "username": "new hire",
            "email": "hire@shop.test",
            "password": "password3",
            "role": "staff",
            "company_id": null,
        });

        let (status, _) = app
            .send_json(Method::POST, "/functions/create-user", None, Some(request.clone()))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app
            .send_json(Method::POST, "/functions/create-user", Some(&staff), Some(request.clone()))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(!app.auth.contains_email("hire@shop.test"));

        let malformed = json!({ "username": 42 });
        let (status, _) = app
            .send_json(Method::POST, "/functions/create-user", Some("garbage"), Some(malformed.clone()))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app
            .send_json(Method::POST, "/functions/create-user", Some(&staff), Some(malformed.clone()))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app
            .send_json(Method::POST, "/functions/create-user", Some(&admin), Some(malformed))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = app
            .send_json(Method::POST, "/functions/create-user", Some(&admin), Some(request))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert_eq!(body["user"]["email"], "hire@shop.test");
        assert_eq!(app.store.select_all(Table::UserProfiles).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_sales_invoice_pdf_download() {
        let app = TestApp::new();
        let token = app.user("clerk@shop.test", Role::Staff).await;

        let (status, sale) = app
            .send_json(
                Method::POST,
                "/api/sales",
                Some(&token),
                Some(json!({
                    "invoice_number": "INV-100",
                    "customer": "Walk-in",
                    "product_name": "Glue",
                    "quantity": 2,
                    "unit_price": 3.25,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(sale["total"], 6.5);

        let uri = format!("/api/sales/{}/invoice.pdf", sale["id"].as_str().unwrap());
        let (status, bytes) = app.send(Method::GET, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(bytes.starts_with(b"%PDF"));

        let missing = format!("/api/sales/{}/invoice.pdf", uuid::Uuid::new_v4());
        let (status, _) = app.send(Method::GET, &missing, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_purchase_return_status_defaults_processor() {
        let app = TestApp::new();
        let token = app.user("buyer@shop.test", Role::Manager).await;

        let (status, created) = app
            .send_json(
                Method::POST,
                "/api/purchase-returns",
                Some(&token),
                Some(json!({
                    "purchase_order_id": uuid::Uuid::new_v4(),
                    "product_id": uuid::Uuid::new_v4(),
                    "product_name": "Nails",
                    "supplier": "Hardware Co",
                    "original_quantity": 100,
                    "return_quantity": 10,
                    "unit_price": 0.5,
                    "reason": "Wrong size",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "Pending");

        let uri = format!(
            "/api/purchase-returns/{}/status",
            created["id"].as_str().unwrap()
        );
        let (status, updated) = app
            .send_json(Method::PUT, &uri, Some(&token), Some(json!({ "status": "Processed" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "Processed");
        assert_eq!(updated["processed_by"], "buyer@shop.test");
    }
}
