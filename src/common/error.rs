// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("{0} não encontrado(a)")]
    NotFound(String),

    #[error("Token inválido")]
    InvalidToken,

    #[error("Permissão insuficiente: {0}")]
    Forbidden(String),

    // Estado do registro não permite a operação (ex.: crédito já pago)
    #[error("Conflito: {0}")]
    Conflict(String),

    // O store rejeitou a unidade de trabalho inteira; nada foi gravado
    #[error("Falha de persistência: {0}")]
    PersistenceFailure(String),

    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Falha ao entregar notificação: {0}")]
    NotificationDeliveryFailure(String),

    #[error("Fonte não encontrada: {0}")]
    FontNotFound(String),

    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    pub fn not_found(entity: &str) -> Self {
        AppError::NotFound(entity.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            // Retorna todos os detalhes da validação, campo a campo.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors.iter()
                        .map(|e| e.message.as_ref().map(|m| m.to_string()).unwrap_or_else(|| e.code.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::NotFound(entity) => (StatusCode::NOT_FOUND, format!("{} não encontrado(a).", entity)),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "Token de autenticação inválido ou ausente.".to_string()),
            AppError::Forbidden(action) => (
                StatusCode::FORBIDDEN,
                format!("Você não tem permissão para: {}.", action),
            ),
            AppError::Conflict(reason) => (StatusCode::CONFLICT, reason),
            AppError::PersistenceFailure(ref reason) => {
                tracing::error!("Unidade de trabalho rejeitada: {}", reason);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "A operação não foi gravada. Tente novamente.".to_string(),
                )
            }
            AppError::DatabaseError(ref e) => {
                tracing::error!("Erro de banco de dados: {}", e);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "A operação não foi gravada. Tente novamente.".to_string(),
                )
            }
            // DatabaseError já foi tratado; o restante vira 500.
            ref e => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Ocorreu um erro inesperado.".to_string())
            }
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
