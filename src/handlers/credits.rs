// src/handlers/credits.rs

use axum::{
    extract::{Path, State},
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
    models::credit::{CreditStatus, CreditType, StaffCredit, StaffStatement},
    services::{
        credit_service::{ManualCreditCommand, UpdateCreditCommand},
        payout_service::{RepasseReceipt, SettleRepasseCommand},
        payroll_service::PayrollReport,
    },
};

// =============================================================================
//  1. REPASSE
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SettleRepassePayload {
    #[validate(length(min = 1, message = "Selecione ao menos um crédito."))]
    pub credit_ids: Vec<Uuid>,

    // Conferido com a soma dos créditos gravados
    #[validate(custom(function = "validate_amount"))]
    #[schema(example = "900.00")]
    pub total_value: Decimal,
}

// POST /api/staff/{id}/repasses
#[utoipa::path(
    post,
    path = "/api/staff/{id}/repasses",
    tag = "Repasses",
    request_body = SettleRepassePayload,
    responses(
        (status = 201, description = "Créditos pagos e despesa lançada", body = RepasseReceipt),
        (status = 400, description = "Lista vazia, duplicada ou total divergente"),
        (status = 409, description = "Algum crédito não está disponível")
    ),
    params(("id" = Uuid, Path, description = "ID do profissional")),
    security(("api_jwt" = []))
)]
pub async fn settle_repasse(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(staff_id): Path<Uuid>,
    Json(payload): Json<SettleRepassePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let receipt = app_state
        .payout_service
        .settle(
            &user,
            SettleRepasseCommand {
                staff_id,
                credit_ids: payload.credit_ids,
                total_value: payload.total_value,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "data": receipt }))))
}

// =============================================================================
//  2. CRÉDITOS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManualCreditPayload {
    #[validate(length(min = 1, message = "A descrição é obrigatória."))]
    #[schema(example = "Audiência em 12/03")]
    pub description: String,

    #[validate(custom(function = "validate_amount"))]
    #[schema(example = "250.00")]
    pub value: Decimal,

    #[serde(rename = "type")]
    #[schema(example = "PRODUCAO")]
    pub credit_type: CreditType,

    pub status: Option<CreditStatus>,

    #[schema(value_type = Option<String>, format = Date)]
    pub date: Option<NaiveDate>,

    #[schema(value_type = Option<String>, format = Date)]
    pub payment_forecast: Option<NaiveDate>,
}

// POST /api/staff/{id}/credits
#[utoipa::path(
    post,
    path = "/api/staff/{id}/credits",
    tag = "Créditos",
    request_body = ManualCreditPayload,
    responses(
        (status = 201, description = "Crédito lançado", body = StaffCredit),
        (status = 400, description = "Valor não positivo ou status PAGO"),
        (status = 404, description = "Profissional não encontrado")
    ),
    params(("id" = Uuid, Path, description = "ID do profissional")),
    security(("api_jwt" = []))
)]
pub async fn add_credit(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(staff_id): Path<Uuid>,
    Json(payload): Json<ManualCreditPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let credit = app_state
        .credit_service
        .add_manual_credit(
            &user,
            staff_id,
            ManualCreditCommand {
                description: payload.description,
                value: payload.value,
                credit_type: payload.credit_type,
                status: payload.status,
                date: payload.date,
                payment_forecast: payload.payment_forecast,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "data": credit }))))
}

// GET /api/staff/{id}/credits
#[utoipa::path(
    get,
    path = "/api/staff/{id}/credits",
    tag = "Créditos",
    responses(
        (status = 200, description = "Extrato do profissional", body = StaffStatement)
    ),
    params(("id" = Uuid, Path, description = "ID do profissional")),
    security(("api_jwt" = []))
)]
pub async fn staff_statement(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(staff_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let statement = app_state.credit_service.staff_statement(&user, staff_id).await?;
    Ok(Json(statement))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCreditPayload {
    #[validate(length(min = 1, message = "A descrição não pode ficar vazia."))]
    pub description: Option<String>,

    #[validate(custom(function = "validate_amount"))]
    pub value: Option<Decimal>,
}

// PATCH /api/staff/{id}/credits/{credit_id}
#[utoipa::path(
    patch,
    path = "/api/staff/{id}/credits/{credit_id}",
    tag = "Créditos",
    request_body = UpdateCreditPayload,
    responses(
        (status = 200, description = "Crédito atualizado", body = StaffCredit),
        (status = 404, description = "Crédito não encontrado")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do profissional"),
        ("credit_id" = Uuid, Path, description = "ID do crédito")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_credit(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((staff_id, credit_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateCreditPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let credit = app_state
        .credit_service
        .update_credit(
            &user,
            staff_id,
            credit_id,
            UpdateCreditCommand { description: payload.description, value: payload.value },
        )
        .await?;

    Ok(Json(json!({ "success": true, "data": credit })))
}

// DELETE /api/staff/{id}/credits/{credit_id}
#[utoipa::path(
    delete,
    path = "/api/staff/{id}/credits/{credit_id}",
    tag = "Créditos",
    responses(
        (status = 200, description = "Crédito excluído"),
        (status = 404, description = "Crédito não encontrado")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do profissional"),
        ("credit_id" = Uuid, Path, description = "ID do crédito")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_credit(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((staff_id, credit_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    app_state.credit_service.delete_credit(&user, staff_id, credit_id).await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnlockRequestPayload {
    #[validate(length(min = 1, message = "Informe o motivo."))]
    #[schema(example = "Cliente já quitou a parcela diretamente")]
    pub reason: String,
}

// POST /api/staff/{id}/credits/{credit_id}/unlock-request
#[utoipa::path(
    post,
    path = "/api/staff/{id}/credits/{credit_id}/unlock-request",
    tag = "Créditos",
    request_body = UnlockRequestPayload,
    responses(
        (status = 200, description = "Solicitação registrada", body = StaffCredit),
        (status = 409, description = "Crédito não está retido")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do profissional"),
        ("credit_id" = Uuid, Path, description = "ID do crédito")
    ),
    security(("api_jwt" = []))
)]
pub async fn request_unlock(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((staff_id, credit_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UnlockRequestPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let credit = app_state
        .credit_service
        .request_unlock(&user, staff_id, credit_id, payload.reason)
        .await?;

    Ok(Json(json!({ "success": true, "data": credit })))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreditForecastPayload {
    #[validate(length(min = 1, message = "Selecione ao menos um crédito."))]
    pub credit_ids: Vec<Uuid>,

    #[schema(value_type = String, format = Date, example = "2026-11-05")]
    pub payment_forecast: NaiveDate,
}

// PUT /api/staff/{id}/credits/forecast
#[utoipa::path(
    put,
    path = "/api/staff/{id}/credits/forecast",
    tag = "Créditos",
    request_body = CreditForecastPayload,
    responses(
        (status = 200, description = "Previsão de pagamento definida"),
        (status = 404, description = "Algum crédito não pertence ao profissional")
    ),
    params(("id" = Uuid, Path, description = "ID do profissional")),
    security(("api_jwt" = []))
)]
pub async fn set_credit_forecast(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(staff_id): Path<Uuid>,
    Json(payload): Json<CreditForecastPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let count = app_state
        .credit_service
        .set_credit_forecast(&user, staff_id, payload.credit_ids, payload.payment_forecast)
        .await?;

    Ok(Json(json!({ "success": true, "count": count })))
}

// =============================================================================
//  3. FOLHA
// =============================================================================

// POST /api/payroll/run
#[utoipa::path(
    post,
    path = "/api/payroll/run",
    tag = "Folha",
    responses(
        (status = 200, description = "Resultado da folha do mês corrente", body = PayrollReport)
    ),
    security(("api_jwt" = []))
)]
pub async fn run_payroll(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let report = app_state.payroll_service.run_monthly_payroll(&user).await?;
    Ok(Json(report))
}
