// src/services/payroll_service.rs

use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{DirectoryRepositoryRef, LedgerRepositoryRef, StagedWrite, UnitOfWork},
    models::{
        auth::ActingUser,
        credit::{CreditStatus, CreditType, StaffCredit},
        directory::{RemunerationRule, Staff},
    },
};

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PayrollFailure {
    pub staff_id: Uuid,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PayrollReport {
    pub reference: String,
    pub count: usize,
    pub created: Vec<Uuid>,
    pub skipped: Vec<Uuid>,
    pub failed: Vec<PayrollFailure>,
}

/// Referência de competência gravada no crédito (`AAAA-MM`).
pub fn payroll_reference(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

fn payroll_label(date: NaiveDate) -> String {
    format!("Pró-labore {:02}/{:04}", date.month(), date.year())
}

#[derive(Clone)]
pub struct PayrollService {
    ledger: LedgerRepositoryRef,
    directory: DirectoryRepositoryRef,
}

impl PayrollService {
    pub fn new(ledger: LedgerRepositoryRef, directory: DirectoryRepositoryRef) -> Self {
        Self { ledger, directory }
    }

    pub async fn run_monthly_payroll(&self, actor: &ActingUser) -> Result<PayrollReport, AppError> {
        self.run_payroll_for(actor, Utc::now().date_naive()).await
    }

    /// Credita o pró-labore de cada profissional FIXO_MENSAL, um commit por
    /// profissional. Quem já tem crédito na competência é pulado.
    pub async fn run_payroll_for(
        &self,
        actor: &ActingUser,
        reference_date: NaiveDate,
    ) -> Result<PayrollReport, AppError> {
        actor.ensure_admin("rodar a folha mensal")?;

        let reference = payroll_reference(reference_date);
        let mut report = PayrollReport { reference: reference.clone(), ..Default::default() };

        for staff in self.directory.list_staff().await? {
            let RemunerationRule::FixoMensal { fixed_monthly_value } = staff.remuneration else {
                continue;
            };

            match self.credit_staff(&staff, fixed_monthly_value, reference_date, &reference, actor).await {
                Ok(true) => report.created.push(staff.id),
                Ok(false) => report.skipped.push(staff.id),
                // Outra execução gravou a mesma competência entre a checagem e o commit.
                Err(AppError::Conflict(_)) => report.skipped.push(staff.id),
                Err(e) => {
                    tracing::error!("Falha ao creditar pró-labore de {}: {}", staff.id, e);
                    report.failed.push(PayrollFailure { staff_id: staff.id, error: e.to_string() });
                }
            }
        }

        report.count = report.created.len();
        tracing::info!(
            "Folha {}: {} criado(s), {} pulado(s), {} falha(s)",
            reference,
            report.count,
            report.skipped.len(),
            report.failed.len()
        );
        Ok(report)
    }

    async fn credit_staff(
        &self,
        staff: &Staff,
        value: rust_decimal::Decimal,
        reference_date: NaiveDate,
        reference: &str,
        actor: &ActingUser,
    ) -> Result<bool, AppError> {
        if self.ledger.has_payroll_credit(staff.id, reference).await? {
            return Ok(false);
        }
        if value <= rust_decimal::Decimal::ZERO {
            tracing::warn!("Profissional {} com pró-labore não positivo; ignorado", staff.id);
            return Ok(false);
        }

        let credit = StaffCredit {
            id: Uuid::new_v4(),
            staff_id: staff.id,
            credit_type: CreditType::Salario,
            financial_event_id: None,
            description: payroll_label(reference_date),
            value,
            status: CreditStatus::Disponivel,
            date: reference_date,
            payment_forecast: None,
            unlock_requested: false,
            unlock_reason: None,
            payroll_reference: Some(reference.to_string()),
            payment_date: None,
            paid_by: None,
            created_by: Some(actor.id),
            created_at: Utc::now(),
        };

        let mut uow = UnitOfWork::new();
        uow.stage(StagedWrite::InsertCredit(credit));
        self.ledger.commit(uow).await?;
        Ok(true)
    }
}
