// src/models/finance.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use sqlx::FromRow;
use chrono::{DateTime, Utc, NaiveDate};
use rust_decimal::Decimal;
use utoipa::{IntoParams, ToSchema};

// --- Enums (Mapeando o Postgres) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "event_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Acordo,
    Sentenca,
    Execucao,
    Contrato,
    Custas,
    Pericia,
    Deslocamento,
    Adicional,
}

impl EventType {
    /// Categoria dos títulos gerados pelo evento.
    pub fn title_origin(self) -> TitleOrigin {
        match self {
            EventType::Acordo => TitleOrigin::Acordo,
            EventType::Sentenca | EventType::Execucao => TitleOrigin::Sentenca,
            EventType::Contrato => TitleOrigin::HonorariosContratuais,
            EventType::Custas => TitleOrigin::CustasProcessuais,
            EventType::Pericia => TitleOrigin::Pericia,
            EventType::Deslocamento => TitleOrigin::Deslocamento,
            EventType::Adicional => TitleOrigin::Adicional,
        }
    }

    /// Só estes tipos geram honorários para o advogado responsável.
    pub fn generates_commission(self) -> bool {
        matches!(
            self,
            EventType::Acordo | EventType::Sentenca | EventType::Execucao | EventType::Contrato
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "title_direction", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TitleDirection {
    Receita, // A Receber
    Despesa, // A Pagar
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "title_origin", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TitleOrigin {
    Acordo,
    Sentenca,
    HonorariosContratuais,
    CustasProcessuais,
    Pericia,
    Deslocamento,
    Adicional,
    HonorariosPagos,
    Outros,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "title_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TitleStatus {
    Pendente,
    Pago,
    Atrasado, // Normalmente derivado na leitura (PENDENTE vencido)
}

// --- Structs ---

/// O fato de origem (acordo, sentença, contrato...). Nunca é alterado depois de criado.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinancialEvent {
    pub id: Uuid,
    pub process_id: Uuid,

    #[serde(rename = "type")]
    pub event_type: EventType,

    #[schema(example = "10000.00")]
    pub total_value: Decimal,

    #[schema(value_type = String, format = Date, example = "2026-03-10")]
    pub event_date: NaiveDate,

    #[schema(example = "Acordo homologado em audiência")]
    pub description: String,

    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinancialTitle {
    pub id: Uuid,

    // Vínculos
    pub process_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub staff_id: Option<Uuid>,
    pub financial_event_id: Option<Uuid>,

    #[schema(example = "Acordo homologado (1/2)")]
    pub description: String,

    pub direction: TitleDirection,
    pub origin: TitleOrigin,

    #[schema(example = "5000.00")]
    pub value: Decimal,

    #[schema(value_type = String, format = Date, example = "2026-04-10")]
    pub due_date: NaiveDate,

    pub status: TitleStatus,
    pub payment_date: Option<DateTime<Utc>>,

    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl FinancialTitle {
    /// Status apresentado ao usuário: um título PENDENTE vencido aparece como ATRASADO.
    pub fn effective_status(&self, today: NaiveDate) -> TitleStatus {
        match self.status {
            TitleStatus::Pendente if self.due_date < today => TitleStatus::Atrasado,
            status => status,
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TitleFilter {
    pub process_id: Option<Uuid>,
    pub direction: Option<TitleDirection>,
    pub status: Option<TitleStatus>,
}

impl TitleFilter {
    /// O filtro de status compara com o status efetivo (ATRASADO incluso).
    pub fn matches(&self, title: &FinancialTitle, today: NaiveDate) -> bool {
        self.process_id.is_none_or(|id| title.process_id == Some(id))
            && self.direction.is_none_or(|d| title.direction == d)
            && self.status.is_none_or(|s| title.effective_status(today) == s)
    }
}
