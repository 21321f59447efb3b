//src/main.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, patch, post, put},
    Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

#[cfg(test)]
mod test_support;

use crate::config::{AppConfig, AppState};
use crate::docs::ApiDoc;
use crate::middleware::auth::auth_guard;

// Mensagens pendentes por rodada do despachante do outbox
const OUTBOX_BATCH_SIZE: i64 = 50;

fn app(app_state: AppState) -> Router {
    let ledger_routes = Router::new()
        .route("/events", post(handlers::ledger::record_event))
        .route("/events/{id}", get(handlers::ledger::get_event))
        .route(
            "/titles",
            post(handlers::ledger::create_title).get(handlers::ledger::list_titles),
        )
        .route("/titles/{id}", axum::routing::delete(handlers::ledger::delete_title))
        .route("/titles/{id}/status", patch(handlers::ledger::set_title_status))
        .route("/titles/{id}/voucher", get(handlers::documents::repasse_voucher));

    let staff_routes = Router::new()
        .route("/{id}/repasses", post(handlers::credits::settle_repasse))
        .route(
            "/{id}/credits",
            post(handlers::credits::add_credit).get(handlers::credits::staff_statement),
        )
        .route("/{id}/credits/forecast", put(handlers::credits::set_credit_forecast))
        .route(
            "/{id}/credits/{credit_id}",
            patch(handlers::credits::update_credit).delete(handlers::credits::delete_credit),
        )
        .route(
            "/{id}/credits/{credit_id}/unlock-request",
            post(handlers::credits::request_unlock),
        );

    let payroll_routes = Router::new().route("/run", post(handlers::credits::run_payroll));

    // Tudo sob /api exige o bearer token, menos o health check
    let protected = Router::new()
        .merge(ledger_routes)
        .nest("/staff", staff_routes)
        .nest("/payroll", payroll_routes)
        .route_layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api", protected)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state)
}

fn spawn_outbox_dispatcher(app_state: &AppState, config: &AppConfig) {
    let notifications = app_state.notification_service.clone();
    let mut ticker = tokio::time::interval(config.outbox_interval);

    tokio::spawn(async move {
        loop {
            ticker.tick().await;
            if let Err(e) = notifications.dispatch_pending(OUTBOX_BATCH_SIZE).await {
                tracing::warn!("Falha ao reprocessar o outbox: {}", e);
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = AppConfig::from_env()?;
    let app_state = AppState::new(&config).await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    if let Some(pool) = &app_state.db_pool {
        sqlx::migrate!().run(pool).await?;
        tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");
    }

    spawn_outbox_dispatcher(&app_state, &config);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app(app_state)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, sync::Arc};

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::{
        models::auth::UserRole,
        services::notification_service::LogNotificationSender,
        test_support::{fixture_with_lead, sucumbencia, Fixture},
    };
    use rust_decimal_macros::dec;

    const SECRET: &str = "segredo-de-teste";

    async fn setup() -> (Router, AppState, Fixture) {
        let fx = fixture_with_lead(sucumbencia(dec!(30))).await;
        let state = AppState::from_parts(
            fx.store.clone(),
            fx.store.clone(),
            Arc::new(LogNotificationSender),
            SECRET.to_string(),
            PathBuf::from("./fonts"),
        );
        (app(state.clone()), state, fx)
    }

    fn token(state: &AppState, role: UserRole, staff_id: Option<Uuid>) -> String {
        state.auth_service.create_token(Uuid::new_v4(), role, staff_id).unwrap()
    }

    fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn event_payload(process_id: Uuid) -> Value {
        json!({
            "processId": process_id,
            "type": "ACORDO",
            "eventDate": "2026-10-01",
            "description": "Acordo homologado",
            "totalValue": 10000,
            "installments": 2,
            "firstDueDate": "2026-10-10"
        })
    }

    #[tokio::test]
    async fn health_is_public() {
        let (router, _, _) = setup().await;
        let response = router
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_or_bad_token_is_unauthorized() {
        let (router, _, _) = setup().await;

        let response = router
            .clone()
            .oneshot(Request::builder().uri("/api/titles").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/api/titles")
                    .header(header::AUTHORIZATION, "Bearer nao-e-um-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn staff_role_cannot_record_events() {
        let (router, state, fx) = setup().await;
        let staff_token = token(&state, UserRole::Staff, Some(fx.lead.id));

        let response = router
            .oneshot(json_request("POST", "/api/events", Some(&staff_token), event_payload(fx.process.id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(fx.store.all_events().await.is_empty());
    }

    #[tokio::test]
    async fn admin_records_event_with_installments_and_commission() {
        let (router, state, fx) = setup().await;
        let admin_token = token(&state, UserRole::Admin, None);

        let response = router
            .oneshot(json_request("POST", "/api/events", Some(&admin_token), event_payload(fx.process.id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = body_json(response).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["data"]["titles"].as_array().unwrap().len(), 2);
        assert_eq!(body["data"]["credit"]["status"], json!("RETIDO"));
        assert_eq!(fx.store.all_titles().await.len(), 2);
    }

    #[tokio::test]
    async fn invalid_payload_reports_field_details() {
        let (router, state, fx) = setup().await;
        let admin_token = token(&state, UserRole::Admin, None);

        let uri = format!("/api/staff/{}/credits", fx.lead.id);
        let payload = json!({ "description": "Reembolso", "value": 0, "type": "REEMBOLSO" });
        let response = router
            .oneshot(json_request("POST", &uri, Some(&admin_token), payload))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert!(body["details"]["value"].is_array());
        assert!(fx.store.all_credits().await.is_empty());
    }

    #[tokio::test]
    async fn installment_limit_is_reported_with_its_range() {
        let (router, state, fx) = setup().await;
        let admin_token = token(&state, UserRole::Admin, None);

        let mut payload = event_payload(fx.process.id);
        payload["installments"] = json!(361);
        let response = router
            .oneshot(json_request("POST", "/api/events", Some(&admin_token), payload))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        let message = body["details"]["installments"][0].as_str().unwrap();
        assert!(message.contains("360"), "mensagem: {}", message);
        assert!(fx.store.all_events().await.is_empty());
    }

    #[tokio::test]
    async fn amounts_with_fractions_of_a_cent_are_rejected() {
        let (router, state, fx) = setup().await;
        let admin_token = token(&state, UserRole::Admin, None);

        let mut payload = event_payload(fx.process.id);
        payload["totalValue"] = json!(10000.005);
        let response = router
            .clone()
            .oneshot(json_request("POST", "/api/events", Some(&admin_token), payload))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["details"]["totalValue"].is_array());

        let uri = format!("/api/staff/{}/credits", fx.lead.id);
        let credit = json!({ "description": "Reembolso", "value": 12.345, "type": "REEMBOLSO" });
        let response = router
            .oneshot(json_request("POST", &uri, Some(&admin_token), credit))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        assert!(fx.store.all_events().await.is_empty());
        assert!(fx.store.all_credits().await.is_empty());
    }

    #[tokio::test]
    async fn staff_reads_only_their_own_statement() {
        let (router, state, fx) = setup().await;
        let own = token(&state, UserRole::Staff, Some(fx.lead.id));
        let other = token(&state, UserRole::Staff, Some(Uuid::new_v4()));
        let uri = format!("/api/staff/{}/credits", fx.lead.id);

        let request = |t: &str| {
            Request::builder()
                .uri(uri.as_str())
                .header(header::AUTHORIZATION, format!("Bearer {}", t))
                .body(Body::empty())
                .unwrap()
        };

        let response = router.clone().oneshot(request(&own)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["staffId"], json!(fx.lead.id));

        let response = router.oneshot(request(&other)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
