// src/models/credit.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "credit_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreditType {
    Honorarios,
    Salario,
    Reembolso,
    Producao,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "credit_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreditStatus {
    Retido,     // Aguardando o pagamento do título de origem
    Disponivel, // Liberado para repasse
    Pago,       // Repassado (terminal)
}

/// Um valor devido a um profissional. Pertence sempre a um único `staff_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StaffCredit {
    pub id: Uuid,
    pub staff_id: Uuid,

    #[serde(rename = "type")]
    pub credit_type: CreditType,

    pub financial_event_id: Option<Uuid>,

    #[schema(example = "Honorários - Acordo homologado")]
    pub description: String,

    #[schema(example = "900.00")]
    pub value: Decimal,

    pub status: CreditStatus,

    #[schema(value_type = String, format = Date)]
    pub date: NaiveDate,

    #[schema(value_type = Option<String>, format = Date)]
    pub payment_forecast: Option<NaiveDate>,

    pub unlock_requested: bool,
    pub unlock_reason: Option<String>,

    // Competência da folha ("AAAA-MM"); só existe em créditos de pró-labore
    #[schema(example = "2026-10")]
    pub payroll_reference: Option<String>,

    pub payment_date: Option<DateTime<Utc>>,
    pub paid_by: Option<Uuid>,

    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl StaffCredit {
    pub fn is_paid(&self) -> bool {
        self.status == CreditStatus::Pago
    }
}

/// Extrato do profissional. Leitura pontual, serve apenas para exibição.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StaffStatement {
    pub staff_id: Uuid,
    pub total_retido: Decimal,
    pub total_disponivel: Decimal,
    pub total_pago: Decimal,
    pub credits: Vec<StaffCredit>,
}

impl StaffStatement {
    pub fn from_credits(staff_id: Uuid, credits: Vec<StaffCredit>) -> Self {
        let sum_of = |status: CreditStatus| -> Decimal {
            credits
                .iter()
                .filter(|c| c.status == status)
                .map(|c| c.value)
                .sum()
        };

        Self {
            staff_id,
            total_retido: sum_of(CreditStatus::Retido),
            total_disponivel: sum_of(CreditStatus::Disponivel),
            total_pago: sum_of(CreditStatus::Pago),
            credits,
        }
    }
}
