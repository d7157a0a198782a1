//! REST API layer: extractors, route handlers, DTOs, and router
//! composition.
//!
//! Resource endpoints are mounted under `/api/v1`; registration, the
//! caller profile, health and the payment webhook live at the root.

pub mod dto;
pub mod extract;
pub mod handlers;
pub mod openapi;

use axum::Router;

use crate::app_state::AppState;

/// Builds the complete API router with all REST endpoints.
///
/// The payment webhook is only mounted when `webhook_enabled` is set,
/// i.e. when a shared secret is configured.
pub fn build_router(webhook_enabled: bool) -> Router<AppState> {
    let mut router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::user::root_routes())
        .merge(handlers::system::routes());
    if webhook_enabled {
        router = router.merge(handlers::webhook::routes());
    }
    #[cfg(feature = "swagger-ui")]
    {
        use utoipa::OpenApi;
        router = router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
        );
    }
    router
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::api::extract::USER_ID_HEADER;
    use crate::api::handlers::webhook::WEBHOOK_SECRET_HEADER;
    use crate::persistence::MemoryStore;

    const SECRET: &str = "whsec_test";

    fn app() -> Router {
        let state = AppState::new(Arc::new(MemoryStore::new()), Some(SECRET.to_string()));
        build_router(true).with_state(state)
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        user: Option<i64>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(id) = user {
            builder = builder.header(USER_ID_HEADER, id.to_string());
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        };
        let Ok(request) = request else {
            panic!("request should build");
        };
        let Ok(response) = app.clone().oneshot(request).await;
        let status = response.status();
        let Ok(bytes) = to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body should be readable");
        };
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    fn field(value: &Value, key: &str) -> i64 {
        let Some(number) = value.get(key).and_then(Value::as_i64) else {
            panic!("missing numeric field {key} in {value}");
        };
        number
    }

    async fn register(app: &Router, name: &str, role: &str) -> i64 {
        let (status, body) = call(
            app,
            Method::POST,
            "/register",
            None,
            Some(json!({ "name": name, "email": format!("{name}@example.com"), "role": role })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        field(&body, "id")
    }

    async fn balance(app: &Router, user: i64) -> i64 {
        let (status, body) = call(app, Method::GET, "/me", Some(user), None).await;
        assert_eq!(status, StatusCode::OK);
        field(&body, "balance")
    }

    async fn webhook(app: &Router, secret: &str, event: &Value) -> StatusCode {
        let Ok(request) = Request::builder()
            .method(Method::POST)
            .uri("/webhook")
            .header("content-type", "application/json")
            .header(WEBHOOK_SECRET_HEADER, secret)
            .body(Body::from(event.to_string()))
        else {
            panic!("request should build");
        };
        let Ok(response) = app.clone().oneshot(request).await;
        response.status()
    }

    #[tokio::test]
    async fn health_is_public() {
        let (status, body) = call(&app(), Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.get("status").and_then(Value::as_str), Some("healthy"));
    }

    #[tokio::test]
    async fn register_then_me() {
        let app = app();
        let id = register(&app, "alice", "PARENT").await;

        let (status, body) = call(&app, Method::GET, "/me", Some(id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.get("role").and_then(Value::as_str), Some("PARENT"));
        assert_eq!(field(&body, "balance"), 0);
    }

    #[tokio::test]
    async fn identity_is_required() {
        let app = app();
        let (status, body) = call(&app, Method::GET, "/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            body.pointer("/error/code").and_then(Value::as_u64),
            Some(2001)
        );

        let (status, _) = call(&app, Method::GET, "/api/v1/stands", Some(999), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn role_gates_return_forbidden() {
        let app = app();
        let parent = register(&app, "bob", "PARENT").await;
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/v1/kermesses",
            Some(parent),
            Some(json!({ "name": "Spring fair" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let app = app();
        let (status, body) = call(
            &app,
            Method::POST,
            "/register",
            None,
            Some(json!({ "name": "carol", "email": "carol@example.com", "role": "WIZARD" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body.pointer("/error/code").and_then(Value::as_u64),
            Some(1001)
        );

        let (status, _) = call(
            &app,
            Method::POST,
            "/register",
            None,
            Some(json!({ "name": "kid", "email": "kid@example.com", "role": "CHILD" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bad_path_and_query_use_the_error_shape() {
        let app = app();
        let parent = register(&app, "gina", "PARENT").await;

        for uri in ["/api/v1/interactions/abc", "/api/v1/stands?is_free=maybe"] {
            let (status, body) = call(&app, Method::GET, uri, Some(parent), None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(
                body.pointer("/error/code").and_then(Value::as_i64),
                Some(1001),
                "{uri}: {body}"
            );
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_conflict() {
        let app = app();
        register(&app, "dave", "ORGANIZER").await;
        let (status, _) = call(
            &app,
            Method::POST,
            "/register",
            None,
            Some(json!({ "name": "dave", "email": "dave@example.com", "role": "PARENT" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn webhook_checks_secret_and_credits_wallet() {
        let app = app();
        let parent = register(&app, "erin", "PARENT").await;
        let event = json!({
            "type": "checkout.session.completed",
            "data": { "object": { "metadata": { "user_id": parent.to_string(), "jetons": "50" } } }
        });

        assert_eq!(webhook(&app, "wrong", &event).await, StatusCode::UNAUTHORIZED);
        assert_eq!(balance(&app, parent).await, 0);

        assert_eq!(webhook(&app, SECRET, &event).await, StatusCode::OK);
        assert_eq!(balance(&app, parent).await, 50);
    }

    #[tokio::test]
    async fn webhook_rejects_secrets_sharing_a_prefix() {
        let app = app();
        let parent = register(&app, "fred", "PARENT").await;
        let event = json!({
            "type": "checkout.session.completed",
            "data": { "object": { "metadata": { "user_id": parent.to_string(), "jetons": "50" } } }
        });

        for presented in ["whsec_tes", "whsec_test_", "whsec_tesT", ""] {
            assert_eq!(
                webhook(&app, presented, &event).await,
                StatusCode::UNAUTHORIZED,
                "secret {presented:?} must be rejected"
            );
        }
        assert_eq!(balance(&app, parent).await, 0);
    }

    #[tokio::test]
    async fn webhook_is_not_mounted_without_secret() {
        let state = AppState::new(Arc::new(MemoryStore::new()), None);
        let app = build_router(false).with_state(state);
        let (status, _) = call(
            &app,
            Method::POST,
            "/webhook",
            None,
            Some(json!({ "type": "checkout.session.completed" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn full_fair_flow() {
        let app = app();
        let organizer = register(&app, "olga", "ORGANIZER").await;
        let holder = register(&app, "hugo", "STAND_HOLDER").await;
        let parent = register(&app, "paula", "PARENT").await;

        let (status, child) = call(
            &app,
            Method::POST,
            "/api/v1/users/invite",
            Some(parent),
            Some(json!({ "name": "theo", "email": "theo@example.com" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let child = field(&child, "id");

        // Fund the parent, then the child.
        let event = json!({
            "type": "checkout.session.completed",
            "data": { "object": { "metadata": { "user_id": parent.to_string(), "jetons": "100" } } }
        });
        assert_eq!(webhook(&app, SECRET, &event).await, StatusCode::OK);

        let (status, _) = call(
            &app,
            Method::PATCH,
            "/api/v1/users/distribute",
            Some(parent),
            Some(json!({ "child_id": child, "amount": 40 })),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(balance(&app, parent).await, 60);
        assert_eq!(balance(&app, child).await, 40);

        let (status, stand) = call(
            &app,
            Method::POST,
            "/api/v1/stands",
            Some(holder),
            Some(json!({ "name": "Crepes", "type": "SALE", "price": 5, "stock": 10 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let stand = field(&stand, "id");

        let (status, kermesse) = call(
            &app,
            Method::POST,
            "/api/v1/kermesses",
            Some(organizer),
            Some(json!({ "name": "Spring fair", "description": "School yard" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let kermesse = field(&kermesse, "id");

        let (status, _) = call(
            &app,
            Method::POST,
            &format!("/api/v1/kermesses/{kermesse}/stand"),
            Some(organizer),
            Some(json!({ "stand_id": stand })),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let (status, _) = call(
            &app,
            Method::POST,
            &format!("/api/v1/kermesses/{kermesse}/participant"),
            Some(organizer),
            Some(json!({ "user_id": child })),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let (status, interaction) = call(
            &app,
            Method::POST,
            "/api/v1/interactions",
            Some(child),
            Some(json!({ "stand_id": stand, "quantity": 3 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{interaction}");
        assert_eq!(field(&interaction, "tokens"), 15);
        assert_eq!(balance(&app, child).await, 25);
        assert_eq!(balance(&app, holder).await, 15);

        let (status, refused) = call(
            &app,
            Method::POST,
            "/api/v1/interactions",
            Some(child),
            Some(json!({ "stand_id": stand, "quantity": 8 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{refused}");
        assert_eq!(balance(&app, child).await, 25);

        let (status, tombola) = call(
            &app,
            Method::POST,
            "/api/v1/tombolas",
            Some(organizer),
            Some(json!({ "kermesse_id": kermesse, "name": "Big draw", "price": 5, "prize": "Bike" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let tombola = field(&tombola, "id");

        let (status, ticket) = call(
            &app,
            Method::POST,
            "/api/v1/tickets",
            Some(child),
            Some(json!({ "tombola_id": tombola })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let ticket = field(&ticket, "id");
        assert_eq!(balance(&app, child).await, 20);

        // The kermesse cannot end while its tombola is open.
        let (status, _) = call(
            &app,
            Method::PATCH,
            &format!("/api/v1/kermesses/{kermesse}/end"),
            Some(organizer),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, draw) = call(
            &app,
            Method::PATCH,
            &format!("/api/v1/tombolas/{tombola}/end"),
            Some(organizer),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(
            draw.pointer("/winner/id").and_then(Value::as_i64),
            Some(ticket)
        );
        assert_eq!(
            draw.pointer("/tombola/status").and_then(Value::as_str),
            Some("ENDED")
        );

        let (status, tickets) =
            call(&app, Method::GET, "/api/v1/tickets", Some(parent), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(tickets.as_array().map(Vec::len), Some(1));

        let (status, kermesse_body) = call(
            &app,
            Method::PATCH,
            &format!("/api/v1/kermesses/{kermesse}/end"),
            Some(organizer),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(
            kermesse_body.get("status").and_then(Value::as_str),
            Some("ENDED")
        );
    }
}
