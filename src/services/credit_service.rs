// src/services/credit_service.rs

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::{error::AppError, validation},
    db::{DirectoryRepositoryRef, LedgerRepositoryRef, StagedWrite, UnitOfWork},
    models::{
        auth::ActingUser,
        credit::{CreditStatus, CreditType, StaffCredit, StaffStatement},
        directory::Staff,
    },
};

#[derive(Debug, Clone)]
pub struct ManualCreditCommand {
    pub description: String,
    pub value: Decimal,
    pub credit_type: CreditType,
    pub status: Option<CreditStatus>,
    pub date: Option<NaiveDate>,
    pub payment_forecast: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateCreditCommand {
    pub description: Option<String>,
    pub value: Option<Decimal>,
}

/// Administração manual de créditos. Não toca em títulos nem na cascata de eventos.
#[derive(Clone)]
pub struct CreditService {
    ledger: LedgerRepositoryRef,
    directory: DirectoryRepositoryRef,
}

impl CreditService {
    pub fn new(ledger: LedgerRepositoryRef, directory: DirectoryRepositoryRef) -> Self {
        Self { ledger, directory }
    }

    async fn staff(&self, staff_id: Uuid) -> Result<Staff, AppError> {
        self.directory
            .find_staff(staff_id)
            .await?
            .ok_or_else(|| AppError::not_found("Profissional"))
    }

    async fn credit(&self, staff_id: Uuid, credit_id: Uuid) -> Result<StaffCredit, AppError> {
        self.ledger
            .find_credit(staff_id, credit_id)
            .await?
            .ok_or_else(|| AppError::not_found("Crédito"))
    }

    pub async fn add_manual_credit(
        &self,
        actor: &ActingUser,
        staff_id: Uuid,
        cmd: ManualCreditCommand,
    ) -> Result<StaffCredit, AppError> {
        actor.ensure_admin("lançar créditos")?;
        validation::ensure_amount("value", cmd.value)?;

        // PAGO só é alcançado por repasse.
        let status = cmd.status.unwrap_or(CreditStatus::Disponivel);
        if status == CreditStatus::Pago {
            return Err(validation::field_error(
                "status",
                "invalid",
                "Um crédito não pode ser criado como pago; use o repasse.",
            ));
        }

        let staff = self.staff(staff_id).await?;
        let now = Utc::now();
        let credit = StaffCredit {
            id: Uuid::new_v4(),
            staff_id: staff.id,
            credit_type: cmd.credit_type,
            financial_event_id: None,
            description: cmd.description,
            value: cmd.value,
            status,
            date: cmd.date.unwrap_or_else(|| now.date_naive()),
            payment_forecast: cmd.payment_forecast,
            unlock_requested: false,
            unlock_reason: None,
            payroll_reference: None,
            payment_date: None,
            paid_by: None,
            created_by: Some(actor.id),
            created_at: now,
        };

        let mut uow = UnitOfWork::new();
        uow.stage(StagedWrite::InsertCredit(credit.clone()));
        self.ledger.commit(uow).await?;

        tracing::info!("Crédito manual {} ({:?}, {}) lançado para {}", credit.id, credit.credit_type, credit.value, staff.id);
        Ok(credit)
    }

    pub async fn update_credit(
        &self,
        actor: &ActingUser,
        staff_id: Uuid,
        credit_id: Uuid,
        cmd: UpdateCreditCommand,
    ) -> Result<StaffCredit, AppError> {
        actor.ensure_admin("editar créditos")?;
        if let Some(value) = cmd.value {
            validation::ensure_amount("value", value)?;
        }
        if cmd.description.is_none() && cmd.value.is_none() {
            return Err(validation::field_error("description", "required", "Nada para atualizar."));
        }

        let mut credit = self.credit(staff_id, credit_id).await?;
        // O valor de um crédito pago compõe o título do repasse.
        if cmd.value.is_some() && credit.is_paid() {
            return Err(AppError::Conflict(
                "Crédito já repassado; o valor não pode ser alterado.".to_string(),
            ));
        }

        let mut uow = UnitOfWork::new();
        uow.stage(StagedWrite::UpdateCredit {
            staff_id,
            credit_id,
            description: cmd.description.clone(),
            value: cmd.value,
        });
        self.ledger.commit(uow).await?;

        if let Some(description) = cmd.description {
            credit.description = description;
        }
        if let Some(value) = cmd.value {
            credit.value = value;
        }
        tracing::info!("Crédito {} atualizado por {}", credit_id, actor.id);
        Ok(credit)
    }

    pub async fn delete_credit(
        &self,
        actor: &ActingUser,
        staff_id: Uuid,
        credit_id: Uuid,
    ) -> Result<(), AppError> {
        actor.ensure_admin("excluir créditos")?;

        let credit = self.credit(staff_id, credit_id).await?;
        if credit.is_paid() {
            tracing::warn!("Crédito {} já pago está sendo excluído por {}", credit_id, actor.id);
        }

        let mut uow = UnitOfWork::new();
        uow.stage(StagedWrite::DeleteCredit { staff_id, credit_id });
        self.ledger.commit(uow).await?;

        tracing::info!("Crédito {} excluído por {}", credit_id, actor.id);
        Ok(())
    }

    pub async fn set_credit_forecast(
        &self,
        actor: &ActingUser,
        staff_id: Uuid,
        credit_ids: Vec<Uuid>,
        forecast: NaiveDate,
    ) -> Result<usize, AppError> {
        actor.ensure_admin("agendar previsão de pagamento")?;
        if credit_ids.is_empty() {
            return Err(validation::field_error(
                "creditIds",
                "length",
                "Selecione ao menos um crédito.",
            ));
        }

        let mut ids = credit_ids;
        ids.sort();
        ids.dedup();
        let count = ids.len();

        let mut uow = UnitOfWork::new();
        uow.stage(StagedWrite::SetCreditForecast { staff_id, credit_ids: ids, forecast });
        self.ledger.commit(uow).await?;

        tracing::info!("Previsão {} definida para {} crédito(s) de {}", forecast, count, staff_id);
        Ok(count)
    }

    /// O profissional sinaliza um crédito RETIDO que gostaria de ver liberado.
    /// Não altera o status; a liberação continua dependendo do título.
    pub async fn request_unlock(
        &self,
        actor: &ActingUser,
        staff_id: Uuid,
        credit_id: Uuid,
        reason: String,
    ) -> Result<StaffCredit, AppError> {
        actor.ensure_can_access_staff(staff_id, "solicitar liberação de créditos")?;
        if reason.trim().is_empty() {
            return Err(validation::field_error("reason", "required", "Informe o motivo da solicitação."));
        }

        let mut credit = self.credit(staff_id, credit_id).await?;
        if credit.status != CreditStatus::Retido {
            return Err(AppError::Conflict("Só créditos retidos podem ter liberação solicitada.".to_string()));
        }

        let mut uow = UnitOfWork::new();
        uow.stage(StagedWrite::RequestUnlock { staff_id, credit_id, reason: reason.clone() });
        self.ledger.commit(uow).await?;

        credit.unlock_requested = true;
        credit.unlock_reason = Some(reason);
        Ok(credit)
    }

    pub async fn staff_statement(
        &self,
        actor: &ActingUser,
        staff_id: Uuid,
    ) -> Result<StaffStatement, AppError> {
        actor.ensure_can_access_staff(staff_id, "consultar o extrato")?;
        let staff = self.staff(staff_id).await?;
        let credits = self.ledger.list_credits(staff.id).await?;
        Ok(StaffStatement::from_credits(staff.id, credits))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        db::LedgerRepository,
        services::{
            notification_service::{testing::RecordingSender, NotificationService},
            payout_service::{PayoutService, SettleRepasseCommand},
        },
        test_support::{admin, fixture_with_lead, staff_user, sucumbencia, Fixture},
    };
    use rust_decimal_macros::dec;

    fn service(fx: &Fixture) -> CreditService {
        CreditService::new(fx.store.clone(), fx.store.clone())
    }

    fn reimbursement(value: Decimal) -> ManualCreditCommand {
        ManualCreditCommand {
            description: "Reembolso de deslocamento".to_string(),
            value,
            credit_type: CreditType::Reembolso,
            status: None,
            date: None,
            payment_forecast: None,
        }
    }

    #[tokio::test]
    async fn manual_credit_defaults_to_available() {
        let fx = fixture_with_lead(sucumbencia(dec!(30))).await;
        let credit = service(&fx)
            .add_manual_credit(&admin(), fx.lead.id, reimbursement(dec!(180)))
            .await
            .unwrap();

        assert_eq!(credit.status, CreditStatus::Disponivel);
        assert!(credit.financial_event_id.is_none());
        assert_eq!(fx.store.all_credits().await, vec![credit]);
    }

    #[tokio::test]
    async fn non_positive_manual_credit_is_rejected_without_writing() {
        let fx = fixture_with_lead(sucumbencia(dec!(30))).await;
        let svc = service(&fx);

        for value in [dec!(0), dec!(-50)] {
            let err = svc.add_manual_credit(&admin(), fx.lead.id, reimbursement(value)).await.unwrap_err();
            assert!(matches!(err, AppError::ValidationError(_)));
        }
        assert!(fx.store.all_credits().await.is_empty());
        assert!(fx.store.all_titles().await.is_empty());
    }

    #[tokio::test]
    async fn manual_credit_cannot_start_paid() {
        let fx = fixture_with_lead(sucumbencia(dec!(30))).await;
        let mut cmd = reimbursement(dec!(10));
        cmd.status = Some(CreditStatus::Pago);

        let err = service(&fx).add_manual_credit(&admin(), fx.lead.id, cmd).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn unknown_staff_is_not_found() {
        let fx = fixture_with_lead(sucumbencia(dec!(30))).await;
        let err = service(&fx)
            .add_manual_credit(&admin(), Uuid::new_v4(), reimbursement(dec!(10)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_changes_only_description_and_value() {
        let fx = fixture_with_lead(sucumbencia(dec!(30))).await;
        let svc = service(&fx);
        let credit = svc.add_manual_credit(&admin(), fx.lead.id, reimbursement(dec!(180))).await.unwrap();

        let updated = svc
            .update_credit(
                &admin(),
                fx.lead.id,
                credit.id,
                UpdateCreditCommand { description: None, value: Some(dec!(210)) },
            )
            .await
            .unwrap();

        assert_eq!(updated.value, dec!(210));
        assert_eq!(updated.status, CreditStatus::Disponivel);
        assert_eq!(fx.store.all_credits().await[0].value, dec!(210));

        let err = svc
            .update_credit(&admin(), fx.lead.id, credit.id, UpdateCreditCommand { description: None, value: Some(dec!(0)) })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn paid_credit_keeps_its_value() {
        let fx = fixture_with_lead(sucumbencia(dec!(30))).await;
        let svc = service(&fx);
        let credit = svc.add_manual_credit(&admin(), fx.lead.id, reimbursement(dec!(180))).await.unwrap();

        let notifications = NotificationService::new(fx.store.clone(), Arc::new(RecordingSender::default()));
        PayoutService::new(fx.store.clone(), fx.store.clone(), notifications)
            .settle(
                &admin(),
                SettleRepasseCommand { staff_id: fx.lead.id, credit_ids: vec![credit.id], total_value: dec!(180) },
            )
            .await
            .unwrap();

        let err = svc
            .update_credit(
                &admin(),
                fx.lead.id,
                credit.id,
                UpdateCreditCommand { description: None, value: Some(dec!(999)) },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(fx.store.all_credits().await[0].value, dec!(180));

        // A descrição continua editável.
        let renamed = svc
            .update_credit(
                &admin(),
                fx.lead.id,
                credit.id,
                UpdateCreditCommand { description: Some("Deslocamento a Campinas".to_string()), value: None },
            )
            .await
            .unwrap();
        assert_eq!(renamed.status, CreditStatus::Pago);
        assert_eq!(fx.store.all_credits().await[0].description, "Deslocamento a Campinas");
    }

    #[tokio::test]
    async fn store_refuses_value_change_on_paid_credit() {
        let fx = fixture_with_lead(sucumbencia(dec!(30))).await;
        let credit = service(&fx)
            .add_manual_credit(&admin(), fx.lead.id, reimbursement(dec!(50)))
            .await
            .unwrap();

        // Pagamento concorrente entre a leitura do serviço e o commit.
        let mut settle = UnitOfWork::new();
        settle.stage(StagedWrite::SettleCredit {
            staff_id: fx.lead.id,
            credit_id: credit.id,
            paid_at: Utc::now(),
            paid_by: Uuid::new_v4(),
        });
        fx.store.commit(settle).await.unwrap();

        let mut edit = UnitOfWork::new();
        edit.stage(StagedWrite::UpdateCredit {
            staff_id: fx.lead.id,
            credit_id: credit.id,
            description: None,
            value: Some(dec!(75)),
        });
        let err = fx.store.commit(edit).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(fx.store.all_credits().await[0].value, dec!(50));
    }

    #[tokio::test]
    async fn delete_removes_the_row() {
        let fx = fixture_with_lead(sucumbencia(dec!(30))).await;
        let svc = service(&fx);
        let credit = svc.add_manual_credit(&admin(), fx.lead.id, reimbursement(dec!(180))).await.unwrap();

        svc.delete_credit(&admin(), fx.lead.id, credit.id).await.unwrap();
        assert!(fx.store.all_credits().await.is_empty());

        let err = svc.delete_credit(&admin(), fx.lead.id, credit.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn forecast_is_set_on_the_whole_batch_or_not_at_all() {
        let fx = fixture_with_lead(sucumbencia(dec!(30))).await;
        let svc = service(&fx);
        let a = svc.add_manual_credit(&admin(), fx.lead.id, reimbursement(dec!(10))).await.unwrap();
        let b = svc.add_manual_credit(&admin(), fx.lead.id, reimbursement(dec!(20))).await.unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 11, 5).unwrap();

        let err = svc
            .set_credit_forecast(&admin(), fx.lead.id, vec![a.id, Uuid::new_v4()], date)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(fx.store.all_credits().await.iter().all(|c| c.payment_forecast.is_none()));

        let count = svc.set_credit_forecast(&admin(), fx.lead.id, vec![a.id, b.id, a.id], date).await.unwrap();
        assert_eq!(count, 2);
        assert!(fx.store.all_credits().await.iter().all(|c| c.payment_forecast == Some(date)));
    }

    #[tokio::test]
    async fn staff_can_request_unlock_of_their_own_locked_credit() {
        let fx = fixture_with_lead(sucumbencia(dec!(30))).await;
        let svc = service(&fx);
        let mut cmd = reimbursement(dec!(90));
        cmd.status = Some(CreditStatus::Retido);
        let credit = svc.add_manual_credit(&admin(), fx.lead.id, cmd).await.unwrap();

        let flagged = svc
            .request_unlock(&staff_user(fx.lead.id), fx.lead.id, credit.id, "Cliente já pagou em juízo".to_string())
            .await
            .unwrap();
        assert!(flagged.unlock_requested);
        assert_eq!(flagged.status, CreditStatus::Retido);

        let other = staff_user(Uuid::new_v4());
        let err = svc
            .request_unlock(&other, fx.lead.id, credit.id, "x".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn statement_totals_by_status() {
        let fx = fixture_with_lead(sucumbencia(dec!(30))).await;
        let svc = service(&fx);
        svc.add_manual_credit(&admin(), fx.lead.id, reimbursement(dec!(100))).await.unwrap();
        let mut locked = reimbursement(dec!(40));
        locked.status = Some(CreditStatus::Retido);
        svc.add_manual_credit(&admin(), fx.lead.id, locked).await.unwrap();

        let statement = svc.staff_statement(&staff_user(fx.lead.id), fx.lead.id).await.unwrap();
        assert_eq!(statement.total_disponivel, dec!(100));
        assert_eq!(statement.total_retido, dec!(40));
        assert_eq!(statement.total_pago, dec!(0));
        assert_eq!(statement.credits.len(), 2);
    }
}
