// src/services/payout_service.rs

use std::collections::HashSet;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::{error::AppError, validation},
    db::{DirectoryRepositoryRef, LedgerRepositoryRef, StagedWrite, UnitOfWork},
    models::{
        auth::ActingUser,
        credit::{CreditStatus, StaffCredit},
        finance::{FinancialTitle, TitleDirection, TitleOrigin, TitleStatus},
        notification::OutboxMessage,
    },
    services::notification_service::NotificationService,
};

#[derive(Debug, Clone)]
pub struct SettleRepasseCommand {
    pub staff_id: Uuid,
    pub credit_ids: Vec<Uuid>,
    pub total_value: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RepasseReceipt {
    pub expense_title: FinancialTitle,
    pub credits: Vec<StaffCredit>,
    pub notification_delivered: bool,
}

#[derive(Clone)]
pub struct PayoutService {
    ledger: LedgerRepositoryRef,
    directory: DirectoryRepositoryRef,
    notifications: NotificationService,
}

impl PayoutService {
    pub fn new(
        ledger: LedgerRepositoryRef,
        directory: DirectoryRepositoryRef,
        notifications: NotificationService,
    ) -> Self {
        Self { ledger, directory, notifications }
    }

    /// Repasse: paga os créditos DISPONIVEL escolhidos e lança a despesa
    /// correspondente, atomicamente. A notificação sai depois do commit.
    ///
    /// O total informado é conferido com a soma dos créditos gravados.
    pub async fn settle(
        &self,
        actor: &ActingUser,
        cmd: SettleRepasseCommand,
    ) -> Result<RepasseReceipt, AppError> {
        actor.ensure_admin("realizar repasses")?;

        if cmd.credit_ids.is_empty() {
            return Err(validation::field_error(
                "creditIds",
                "length",
                "Selecione ao menos um crédito para o repasse.",
            ));
        }
        let unique: HashSet<_> = cmd.credit_ids.iter().collect();
        if unique.len() != cmd.credit_ids.len() {
            return Err(validation::field_error(
                "creditIds",
                "unique",
                "O mesmo crédito foi selecionado mais de uma vez.",
            ));
        }

        let staff = self
            .directory
            .find_staff(cmd.staff_id)
            .await?
            .ok_or_else(|| AppError::not_found("Profissional"))?;

        let mut credits = Vec::with_capacity(cmd.credit_ids.len());
        for credit_id in &cmd.credit_ids {
            let credit = self
                .ledger
                .find_credit(staff.id, *credit_id)
                .await?
                .ok_or_else(|| AppError::not_found("Crédito"))?;

            if credit.status != CreditStatus::Disponivel {
                return Err(AppError::Conflict(format!(
                    "Crédito {} está {:?} e não pode ser repassado.",
                    credit.id, credit.status
                )));
            }
            credits.push(credit);
        }

        let recomputed: Decimal = credits.iter().map(|c| c.value).sum();
        if recomputed != cmd.total_value {
            return Err(validation::field_error(
                "totalValue",
                "mismatch",
                &format!(
                    "O total informado ({}) difere da soma dos créditos selecionados ({}).",
                    cmd.total_value, recomputed
                ),
            ));
        }

        let now = Utc::now();
        let expense_title = FinancialTitle {
            id: Uuid::new_v4(),
            process_id: None,
            client_id: None,
            staff_id: Some(staff.id),
            financial_event_id: None,
            description: format!("Repasse de honorários - {}", staff.name),
            direction: TitleDirection::Despesa,
            origin: TitleOrigin::HonorariosPagos,
            value: recomputed,
            due_date: now.date_naive(),
            status: TitleStatus::Pago,
            payment_date: Some(now),
            created_by: actor.id,
            created_at: now,
        };

        let message = OutboxMessage::new(
            staff.id,
            staff.user_id,
            "Repasse realizado",
            format!(
                "Você recebeu um repasse de R$ {:.2} referente a {} lançamento(s).",
                recomputed,
                credits.len()
            ),
            Some(format!("/financeiro/repasses/{}", expense_title.id)),
        )
        .claimed(now);

        let mut uow = UnitOfWork::new();
        for credit in &credits {
            uow.stage(StagedWrite::SettleCredit {
                staff_id: staff.id,
                credit_id: credit.id,
                paid_at: now,
                paid_by: actor.id,
            });
        }
        uow.stage(StagedWrite::InsertTitle(expense_title.clone()))
            .stage(StagedWrite::AppendOutbox(message.clone()));

        self.ledger.commit(uow).await?;

        tracing::info!(
            "💸 Repasse de {} para {} ({} crédito(s)) por {}",
            recomputed,
            staff.id,
            credits.len(),
            actor.id
        );

        for credit in &mut credits {
            credit.status = CreditStatus::Pago;
            credit.payment_date = Some(now);
            credit.paid_by = Some(actor.id);
        }

        // Entrega imediata é só uma tentativa; o consumidor do outbox reprocessa.
        let notification_delivered = self.notifications.deliver(&message).await;

        Ok(RepasseReceipt { expense_title, credits, notification_delivered })
    }
}
