// src/services/event_ledger_service.rs

use chrono::{Months, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::{error::AppError, validation},
    db::{DirectoryRepositoryRef, LedgerRepositoryRef, StagedWrite, UnitOfWork},
    models::{
        auth::ActingUser,
        credit::{CreditStatus, CreditType, StaffCredit},
        finance::{EventType, FinancialEvent, FinancialTitle, TitleDirection, TitleStatus},
    },
    services::compensation,
};

#[derive(Debug, Clone)]
pub struct RecordEventCommand {
    pub process_id: Uuid,
    pub event_type: EventType,
    pub event_date: NaiveDate,
    pub description: String,
    pub total_value: Decimal,
    pub installments: u32,
    pub first_due_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordedEvent {
    pub event: FinancialEvent,
    pub titles: Vec<FinancialTitle>,
    pub credit: Option<StaffCredit>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventDetail {
    pub event: FinancialEvent,
    pub titles: Vec<FinancialTitle>,
}

pub const MAX_INSTALLMENTS: u32 = 360;

/// Divide `total` em `installments` parcelas iguais truncadas no centavo.
/// A diferença vai para a última parcela, então a soma é sempre exata.
pub fn split_installments(total: Decimal, installments: u32) -> Vec<Decimal> {
    if installments == 0 {
        return Vec::new();
    }
    let n = Decimal::from(installments);
    let base = (total / n).round_dp_with_strategy(2, RoundingStrategy::ToZero);
    let last = total - base * (n - Decimal::ONE);

    let mut values = vec![base; installments as usize - 1];
    values.push(last);
    values
}

#[derive(Clone)]
pub struct EventLedgerService {
    ledger: LedgerRepositoryRef,
    directory: DirectoryRepositoryRef,
}

impl EventLedgerService {
    pub fn new(ledger: LedgerRepositoryRef, directory: DirectoryRepositoryRef) -> Self {
        Self { ledger, directory }
    }

    /// Registra o evento, gera as parcelas a receber e, se couber, o crédito
    /// RETIDO do advogado responsável. Tudo em uma única unidade de trabalho.
    pub async fn record_event(
        &self,
        actor: &ActingUser,
        cmd: RecordEventCommand,
    ) -> Result<RecordedEvent, AppError> {
        actor.ensure_admin("registrar eventos financeiros")?;
        validation::ensure_amount("totalValue", cmd.total_value)?;
        if !(1..=MAX_INSTALLMENTS).contains(&cmd.installments) {
            return Err(validation::field_error(
                "installments",
                "range",
                "O número de parcelas deve estar entre 1 e 360.",
            ));
        }
        // Toda parcela precisa de pelo menos um centavo.
        if cmd.total_value < Decimal::new(i64::from(cmd.installments), 2) {
            return Err(validation::field_error(
                "installments",
                "range",
                "Parcelas demais para o valor total: cada parcela precisa de ao menos R$ 0,01.",
            ));
        }

        let process = self
            .directory
            .find_process(cmd.process_id)
            .await?
            .ok_or_else(|| AppError::not_found("Processo"))?;

        let now = Utc::now();
        let event = FinancialEvent {
            id: Uuid::new_v4(),
            process_id: process.id,
            event_type: cmd.event_type,
            total_value: cmd.total_value,
            event_date: cmd.event_date,
            description: cmd.description.clone(),
            created_by: actor.id,
            created_at: now,
        };

        // --- Parcelas ---
        let values = split_installments(cmd.total_value, cmd.installments);
        let mut titles = Vec::with_capacity(values.len());
        for (i, value) in values.into_iter().enumerate() {
            let due_date = cmd
                .first_due_date
                .checked_add_months(Months::new(i as u32))
                .ok_or_else(|| {
                    validation::field_error("firstDueDate", "range", "Data de vencimento fora do intervalo suportado.")
                })?;

            let description = if cmd.installments > 1 {
                format!("{} ({}/{})", cmd.description, i + 1, cmd.installments)
            } else {
                cmd.description.clone()
            };

            titles.push(FinancialTitle {
                id: Uuid::new_v4(),
                process_id: Some(process.id),
                client_id: Some(process.client_id),
                staff_id: None,
                financial_event_id: Some(event.id),
                description,
                direction: TitleDirection::Receita,
                origin: cmd.event_type.title_origin(),
                value,
                due_date,
                status: TitleStatus::Pendente,
                payment_date: None,
                created_by: actor.id,
                created_at: now,
            });
        }

        // --- Honorários do responsável ---
        let credit = match process.lead_staff_id {
            Some(lead_id) if cmd.event_type.generates_commission() => {
                match self.directory.find_staff(lead_id).await? {
                    Some(lead) => {
                        let amount = compensation::commission_for(cmd.total_value, &lead.remuneration);
                        (amount > Decimal::ZERO).then(|| StaffCredit {
                            id: Uuid::new_v4(),
                            staff_id: lead.id,
                            credit_type: CreditType::Honorarios,
                            financial_event_id: Some(event.id),
                            description: format!("Honorários - {}", cmd.description),
                            value: amount,
                            status: CreditStatus::Retido,
                            date: cmd.event_date,
                            payment_forecast: None,
                            unlock_requested: false,
                            unlock_reason: None,
                            payroll_reference: None,
                            payment_date: None,
                            paid_by: None,
                            created_by: Some(actor.id),
                            created_at: now,
                        })
                    }
                    None => {
                        tracing::warn!(
                            "Responsável {} do processo {} não encontrado; evento sem honorários.",
                            lead_id,
                            process.id
                        );
                        None
                    }
                }
            }
            _ => None,
        };

        let mut uow = UnitOfWork::new();
        uow.stage(StagedWrite::InsertEvent(event.clone()));
        for title in &titles {
            uow.stage(StagedWrite::InsertTitle(title.clone()));
        }
        if let Some(credit) = &credit {
            uow.stage(StagedWrite::InsertCredit(credit.clone()));
        }

        self.ledger.commit(uow).await?;

        tracing::info!(
            "📒 Evento {} ({:?}) registrado no processo {}: {} parcela(s), honorários: {}",
            event.id,
            event.event_type,
            process.id,
            titles.len(),
            credit.as_ref().map(|c| c.value.to_string()).unwrap_or_else(|| "nenhum".into())
        );

        Ok(RecordedEvent { event, titles, credit })
    }

    pub async fn get_event(&self, actor: &ActingUser, event_id: Uuid) -> Result<EventDetail, AppError> {
        actor.ensure_admin("consultar eventos financeiros")?;
        let event = self
            .ledger
            .find_event(event_id)
            .await?
            .ok_or_else(|| AppError::not_found("Evento"))?;
        let titles = self.ledger.list_titles_by_event(event_id).await?;
        Ok(EventDetail { event, titles })
    }
}
