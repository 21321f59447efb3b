// src/handlers/documents.rs

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::{common::error::AppError, config::AppState, middleware::auth::AuthenticatedUser};

// GET /api/titles/{id}/voucher
#[utoipa::path(
    get,
    path = "/api/titles/{id}/voucher",
    tag = "Repasses",
    responses(
        (status = 200, description = "Comprovante do repasse em PDF", content_type = "application/pdf"),
        (status = 404, description = "Título não é um repasse")
    ),
    params(("id" = Uuid, Path, description = "ID do título de despesa do repasse")),
    security(("api_jwt" = []))
)]
pub async fn repasse_voucher(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(title_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let pdf_bytes = app_state
        .document_service
        .generate_voucher_pdf(&user, title_id)
        .await?;

    // Configura os Headers para o navegador baixar ou mostrar o PDF
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"repasse_{}.pdf\"", title_id),
        ),
    ];

    Ok((headers, pdf_bytes).into_response())
}
