// src/handlers/ledger.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{error::AppError, validation::validate_amount},
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::finance::{EventType, FinancialTitle, TitleDirection, TitleFilter, TitleOrigin, TitleStatus},
    services::{
        event_ledger_service::{EventDetail, RecordEventCommand, RecordedEvent},
        title_service::ManualTitleCommand,
    },
};

// =============================================================================
//  1. EVENTOS FINANCEIROS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordEventPayload {
    pub process_id: Uuid,

    #[serde(rename = "type")]
    #[schema(example = "ACORDO")]
    pub event_type: EventType,

    #[schema(value_type = String, format = Date, example = "2026-03-10")]
    pub event_date: NaiveDate,

    #[validate(length(min = 1, message = "A descrição é obrigatória."))]
    #[schema(example = "Acordo homologado em audiência")]
    pub description: String,

    #[validate(custom(function = "validate_amount"))]
    #[schema(example = "10000.00")]
    pub total_value: Decimal,

    #[validate(range(min = 1, max = 360, message = "O número de parcelas deve estar entre 1 e 360."))]
    #[schema(example = 2)]
    pub installments: u32,

    // Sem vencimento informado, a primeira parcela vence na data do evento
    #[schema(value_type = Option<String>, format = Date, example = "2026-04-10")]
    pub first_due_date: Option<NaiveDate>,
}

// POST /api/events
#[utoipa::path(
    post,
    path = "/api/events",
    tag = "Eventos",
    request_body = RecordEventPayload,
    responses(
        (status = 201, description = "Evento, parcelas e comissão gravados", body = RecordedEvent),
        (status = 400, description = "Payload inválido"),
        (status = 404, description = "Processo não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn record_event(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<RecordEventPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let recorded = app_state
        .event_ledger_service
        .record_event(
            &user,
            RecordEventCommand {
                process_id: payload.process_id,
                event_type: payload.event_type,
                event_date: payload.event_date,
                description: payload.description,
                total_value: payload.total_value,
                installments: payload.installments,
                first_due_date: payload.first_due_date.unwrap_or(payload.event_date),
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "data": recorded }))))
}

// GET /api/events/{id}
#[utoipa::path(
    get,
    path = "/api/events/{id}",
    tag = "Eventos",
    responses(
        (status = 200, description = "Evento com suas parcelas", body = EventDetail),
        (status = 404, description = "Evento não encontrado")
    ),
    params(("id" = Uuid, Path, description = "ID do evento")),
    security(("api_jwt" = []))
)]
pub async fn get_event(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(event_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let detail = app_state.event_ledger_service.get_event(&user, event_id).await?;
    Ok(Json(detail))
}

// =============================================================================
//  2. TÍTULOS
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetTitleStatusPayload {
    #[schema(example = "PAGO")]
    pub status: TitleStatus,
}

// PATCH /api/titles/{id}/status
#[utoipa::path(
    patch,
    path = "/api/titles/{id}/status",
    tag = "Títulos",
    request_body = SetTitleStatusPayload,
    responses(
        (status = 200, description = "Status alterado e créditos do evento atualizados", body = FinancialTitle),
        (status = 404, description = "Título não encontrado")
    ),
    params(("id" = Uuid, Path, description = "ID do título")),
    security(("api_jwt" = []))
)]
pub async fn set_title_status(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(title_id): Path<Uuid>,
    Json(payload): Json<SetTitleStatusPayload>,
) -> Result<impl IntoResponse, AppError> {
    let title = app_state
        .title_service
        .set_title_status(&user, title_id, payload.status)
        .await?;

    Ok(Json(json!({ "success": true, "data": title })))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTitlePayload {
    pub process_id: Option<Uuid>,
    pub client_id: Option<Uuid>,

    #[validate(length(min = 1, message = "A descrição é obrigatória."))]
    #[schema(example = "Custas de distribuição")]
    pub description: String,

    #[schema(example = "DESPESA")]
    pub direction: TitleDirection,

    #[schema(example = "CUSTAS_PROCESSUAIS")]
    pub origin: TitleOrigin,

    #[validate(custom(function = "validate_amount"))]
    #[schema(example = "350.00")]
    pub value: Decimal,

    #[schema(value_type = String, format = Date, example = "2026-04-10")]
    pub due_date: NaiveDate,

    pub status: Option<TitleStatus>,
}

// POST /api/titles
#[utoipa::path(
    post,
    path = "/api/titles",
    tag = "Títulos",
    request_body = CreateTitlePayload,
    responses(
        (status = 201, description = "Título avulso criado", body = FinancialTitle),
        (status = 400, description = "Payload inválido")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_title(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<CreateTitlePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let title = app_state
        .title_service
        .create_manual_title(
            &user,
            ManualTitleCommand {
                process_id: payload.process_id,
                client_id: payload.client_id,
                description: payload.description,
                direction: payload.direction,
                origin: payload.origin,
                value: payload.value,
                due_date: payload.due_date,
                status: payload.status,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "data": title }))))
}

// GET /api/titles
#[utoipa::path(
    get,
    path = "/api/titles",
    tag = "Títulos",
    params(TitleFilter),
    responses(
        (status = 200, description = "Títulos com o status efetivo", body = Vec<FinancialTitle>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_titles(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(filter): Query<TitleFilter>,
) -> Result<impl IntoResponse, AppError> {
    let titles = app_state.title_service.list_titles(&user, &filter).await?;
    Ok(Json(titles))
}

// DELETE /api/titles/{id}
#[utoipa::path(
    delete,
    path = "/api/titles/{id}",
    tag = "Títulos",
    responses(
        (status = 200, description = "Título excluído"),
        (status = 404, description = "Título não encontrado")
    ),
    params(("id" = Uuid, Path, description = "ID do título")),
    security(("api_jwt" = []))
)]
pub async fn delete_title(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(title_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    app_state.title_service.delete_title(&user, title_id).await?;
    Ok(Json(json!({ "success": true })))
}
