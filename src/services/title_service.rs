// src/services/title_service.rs

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::{error::AppError, validation},
    db::{DirectoryRepositoryRef, LedgerRepositoryRef, StagedWrite, UnitOfWork},
    models::{
        auth::ActingUser,
        credit::CreditStatus,
        finance::{FinancialTitle, TitleDirection, TitleFilter, TitleOrigin, TitleStatus},
    },
};

#[derive(Debug, Clone)]
pub struct ManualTitleCommand {
    pub process_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub description: String,
    pub direction: TitleDirection,
    pub origin: TitleOrigin,
    pub value: Decimal,
    pub due_date: NaiveDate,
    pub status: Option<TitleStatus>,
}

#[derive(Clone)]
pub struct TitleService {
    ledger: LedgerRepositoryRef,
    directory: DirectoryRepositoryRef,
}

impl TitleService {
    pub fn new(ledger: LedgerRepositoryRef, directory: DirectoryRepositoryRef) -> Self {
        Self { ledger, directory }
    }

    /// Altera o status do título e trava/destrava todos os créditos do mesmo evento.
    ///
    /// A cascata usa só o `financial_event_id`: pagar qualquer parcela libera
    /// todos os honorários do evento, mesmo com outras parcelas em aberto.
    pub async fn set_title_status(
        &self,
        actor: &ActingUser,
        title_id: Uuid,
        new_status: TitleStatus,
    ) -> Result<FinancialTitle, AppError> {
        actor.ensure_admin("alterar o status de títulos")?;

        let mut title = self
            .ledger
            .find_title(title_id)
            .await?
            .ok_or_else(|| AppError::not_found("Título"))?;

        let payment_date = (new_status == TitleStatus::Pago).then(Utc::now);

        let mut uow = UnitOfWork::new();
        uow.stage(StagedWrite::SetTitleStatus { title_id, status: new_status, payment_date });

        let mut cascaded = 0;
        if let Some(event_id) = title.financial_event_id {
            let credit_status = match new_status {
                TitleStatus::Pago => CreditStatus::Disponivel,
                TitleStatus::Pendente | TitleStatus::Atrasado => CreditStatus::Retido,
            };

            for credit in self.ledger.list_credits_by_event(event_id).await? {
                if credit.is_paid() || credit.status == credit_status {
                    continue;
                }
                uow.stage(StagedWrite::SetCreditLock { credit_id: credit.id, status: credit_status });
                cascaded += 1;
            }
        }

        self.ledger.commit(uow).await?;

        tracing::info!(
            "Título {} -> {:?} ({} crédito(s) atualizados na cascata)",
            title_id,
            new_status,
            cascaded
        );

        title.status = new_status;
        title.payment_date = payment_date;
        Ok(title)
    }

    /// Lançamento avulso, sem evento de origem e sem cascata.
    pub async fn create_manual_title(
        &self,
        actor: &ActingUser,
        cmd: ManualTitleCommand,
    ) -> Result<FinancialTitle, AppError> {
        actor.ensure_admin("lançar títulos")?;
        validation::ensure_amount("value", cmd.value)?;

        let mut client_id = cmd.client_id;
        if let Some(process_id) = cmd.process_id {
            let process = self
                .directory
                .find_process(process_id)
                .await?
                .ok_or_else(|| AppError::not_found("Processo"))?;
            client_id = client_id.or(Some(process.client_id));
        }

        let status = cmd.status.unwrap_or(TitleStatus::Pendente);
        let now = Utc::now();
        let title = FinancialTitle {
            id: Uuid::new_v4(),
            process_id: cmd.process_id,
            client_id,
            staff_id: None,
            financial_event_id: None,
            description: cmd.description,
            direction: cmd.direction,
            origin: cmd.origin,
            value: cmd.value,
            due_date: cmd.due_date,
            status,
            payment_date: (status == TitleStatus::Pago).then_some(now),
            created_by: actor.id,
            created_at: now,
        };

        let mut uow = UnitOfWork::new();
        uow.stage(StagedWrite::InsertTitle(title.clone()));
        self.ledger.commit(uow).await?;

        tracing::info!("Título avulso {} lançado ({:?}, {})", title.id, title.direction, title.value);
        Ok(title)
    }

    pub async fn delete_title(&self, actor: &ActingUser, title_id: Uuid) -> Result<(), AppError> {
        actor.ensure_admin("excluir títulos")?;

        let mut uow = UnitOfWork::new();
        uow.stage(StagedWrite::DeleteTitle { title_id });
        self.ledger.commit(uow).await?;

        tracing::info!("Título {} excluído por {}", title_id, actor.id);
        Ok(())
    }

    /// Listagem com o status efetivo (PENDENTE vencido aparece como ATRASADO).
    pub async fn list_titles(
        &self,
        actor: &ActingUser,
        filter: &TitleFilter,
    ) -> Result<Vec<FinancialTitle>, AppError> {
        actor.ensure_admin("consultar títulos")?;

        let today = Utc::now().date_naive();
        let titles = self
            .ledger
            .list_titles(filter, today)
            .await?
            .into_iter()
            .map(|mut t| {
                t.status = t.effective_status(today);
                t
            })
            .collect();
        Ok(titles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::LedgerRepository,
        models::{credit::StaffCredit, finance::EventType},
        services::event_ledger_service::{EventLedgerService, RecordEventCommand, RecordedEvent},
        test_support::{admin, fixture_with_lead, staff_with, sucumbencia, Fixture},
    };
    use rust_decimal_macros::dec;

    async fn recorded_settlement(fx: &Fixture, installments: u32) -> RecordedEvent {
        EventLedgerService::new(fx.store.clone(), fx.store.clone())
            .record_event(
                &admin(),
                RecordEventCommand {
                    process_id: fx.process.id,
                    event_type: EventType::Acordo,
                    event_date: NaiveDate::from_ymd_opt(2026, 3, 10).unwrap(),
                    description: "Acordo".to_string(),
                    total_value: dec!(10000),
                    installments,
                    first_due_date: NaiveDate::from_ymd_opt(2026, 4, 10).unwrap(),
                },
            )
            .await
            .unwrap()
    }

    fn service(fx: &Fixture) -> TitleService {
        TitleService::new(fx.store.clone(), fx.store.clone())
    }

    async fn credits_of_event(fx: &Fixture, event_id: Uuid) -> Vec<StaffCredit> {
        fx.store
            .all_credits()
            .await
            .into_iter()
            .filter(|c| c.financial_event_id == Some(event_id))
            .collect()
    }

    #[tokio::test]
    async fn paying_one_installment_unlocks_every_credit_of_the_event() {
        let fx = fixture_with_lead(sucumbencia(dec!(30))).await;
        let recorded = recorded_settlement(&fx, 2).await;

        // Um segundo profissional com crédito no mesmo evento (ex.: correspondente).
        let partner = staff_with(sucumbencia(dec!(10)));
        let mut partner_credit = recorded.credit.clone().unwrap();
        partner_credit.id = Uuid::new_v4();
        partner_credit.staff_id = partner.id;
        let mut uow = UnitOfWork::new();
        uow.stage(StagedWrite::InsertCredit(partner_credit));
        fx.store.commit(uow).await.unwrap();

        let title = service(&fx)
            .set_title_status(&admin(), recorded.titles[0].id, TitleStatus::Pago)
            .await
            .unwrap();
        assert_eq!(title.status, TitleStatus::Pago);
        assert!(title.payment_date.is_some());

        let credits = credits_of_event(&fx, recorded.event.id).await;
        assert_eq!(credits.len(), 2);
        assert!(credits.iter().all(|c| c.status == CreditStatus::Disponivel));

        // A segunda parcela continua pendente.
        let titles = fx.store.all_titles().await;
        let second = titles.iter().find(|t| t.id == recorded.titles[1].id).unwrap();
        assert_eq!(second.status, TitleStatus::Pendente);
    }

    #[tokio::test]
    async fn reverting_to_pending_locks_the_credits_again() {
        let fx = fixture_with_lead(sucumbencia(dec!(30))).await;
        let recorded = recorded_settlement(&fx, 1).await;
        let svc = service(&fx);

        svc.set_title_status(&admin(), recorded.titles[0].id, TitleStatus::Pago).await.unwrap();
        let title = svc
            .set_title_status(&admin(), recorded.titles[0].id, TitleStatus::Pendente)
            .await
            .unwrap();

        assert!(title.payment_date.is_none());
        let credits = credits_of_event(&fx, recorded.event.id).await;
        assert!(credits.iter().all(|c| c.status == CreditStatus::Retido));

        let stored = fx.store.all_titles().await;
        assert!(stored[0].payment_date.is_none());
    }

    #[tokio::test]
    async fn explicit_overdue_status_also_locks() {
        let fx = fixture_with_lead(sucumbencia(dec!(30))).await;
        let recorded = recorded_settlement(&fx, 1).await;
        let svc = service(&fx);

        svc.set_title_status(&admin(), recorded.titles[0].id, TitleStatus::Pago).await.unwrap();
        svc.set_title_status(&admin(), recorded.titles[0].id, TitleStatus::Atrasado).await.unwrap();

        let credits = credits_of_event(&fx, recorded.event.id).await;
        assert_eq!(credits[0].status, CreditStatus::Retido);
    }

    #[tokio::test]
    async fn paid_credits_survive_a_reverted_title() {
        let fx = fixture_with_lead(sucumbencia(dec!(30))).await;
        let recorded = recorded_settlement(&fx, 1).await;
        let svc = service(&fx);
        let credit = recorded.credit.unwrap();

        svc.set_title_status(&admin(), recorded.titles[0].id, TitleStatus::Pago).await.unwrap();
        let mut uow = UnitOfWork::new();
        uow.stage(StagedWrite::SettleCredit {
            staff_id: credit.staff_id,
            credit_id: credit.id,
            paid_at: Utc::now(),
            paid_by: Uuid::new_v4(),
        });
        fx.store.commit(uow).await.unwrap();

        svc.set_title_status(&admin(), recorded.titles[0].id, TitleStatus::Pendente).await.unwrap();
        let credits = credits_of_event(&fx, recorded.event.id).await;
        assert_eq!(credits[0].status, CreditStatus::Pago);
    }

    #[tokio::test]
    async fn status_change_and_cascade_fail_together() {
        let fx = fixture_with_lead(sucumbencia(dec!(30))).await;
        let recorded = recorded_settlement(&fx, 1).await;
        fx.store.fail_next_commit();

        let err = service(&fx)
            .set_title_status(&admin(), recorded.titles[0].id, TitleStatus::Pago)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::PersistenceFailure(_)));
        assert_eq!(fx.store.all_titles().await[0].status, TitleStatus::Pendente);
        assert_eq!(credits_of_event(&fx, recorded.event.id).await[0].status, CreditStatus::Retido);
    }

    #[tokio::test]
    async fn unknown_title_is_not_found() {
        let fx = fixture_with_lead(sucumbencia(dec!(30))).await;
        let err = service(&fx)
            .set_title_status(&admin(), Uuid::new_v4(), TitleStatus::Pago)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn manual_title_resolves_client_and_has_no_event() {
        let fx = fixture_with_lead(sucumbencia(dec!(30))).await;
        let title = service(&fx)
            .create_manual_title(
                &admin(),
                ManualTitleCommand {
                    process_id: Some(fx.process.id),
                    client_id: None,
                    description: "Cópias autenticadas".to_string(),
                    direction: TitleDirection::Despesa,
                    origin: TitleOrigin::CustasProcessuais,
                    value: dec!(87.40),
                    due_date: NaiveDate::from_ymd_opt(2026, 5, 2).unwrap(),
                    status: Some(TitleStatus::Pago),
                },
            )
            .await
            .unwrap();

        assert_eq!(title.client_id, Some(fx.process.client_id));
        assert!(title.financial_event_id.is_none());
        assert!(title.payment_date.is_some());
        assert_eq!(fx.store.all_titles().await.len(), 1);
    }

    #[tokio::test]
    async fn manual_title_requires_positive_value() {
        let fx = fixture_with_lead(sucumbencia(dec!(30))).await;
        let err = service(&fx)
            .create_manual_title(
                &admin(),
                ManualTitleCommand {
                    process_id: None,
                    client_id: None,
                    description: "Estorno".to_string(),
                    direction: TitleDirection::Receita,
                    origin: TitleOrigin::Outros,
                    value: dec!(-10),
                    due_date: NaiveDate::from_ymd_opt(2026, 5, 2).unwrap(),
                    status: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert!(fx.store.all_titles().await.is_empty());
    }

    #[tokio::test]
    async fn overdue_pending_titles_are_listed_as_late() {
        let fx = fixture_with_lead(sucumbencia(dec!(30))).await;
        let svc = service(&fx);
        let past = Utc::now().date_naive() - chrono::Duration::days(10);
        svc.create_manual_title(
            &admin(),
            ManualTitleCommand {
                process_id: Some(fx.process.id),
                client_id: None,
                description: "Perícia contábil".to_string(),
                direction: TitleDirection::Receita,
                origin: TitleOrigin::Pericia,
                value: dec!(1200),
                due_date: past,
                status: None,
            },
        )
        .await
        .unwrap();

        let late = svc
            .list_titles(&admin(), &TitleFilter { status: Some(TitleStatus::Atrasado), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(late.len(), 1);
        assert_eq!(late[0].status, TitleStatus::Atrasado);

        let pending = svc
            .list_titles(&admin(), &TitleFilter { status: Some(TitleStatus::Pendente), ..Default::default() })
            .await
            .unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn deleting_a_title_keeps_the_credits() {
        let fx = fixture_with_lead(sucumbencia(dec!(30))).await;
        let recorded = recorded_settlement(&fx, 1).await;

        service(&fx).delete_title(&admin(), recorded.titles[0].id).await.unwrap();
        assert!(fx.store.all_titles().await.is_empty());
        assert_eq!(fx.store.all_credits().await.len(), 1);

        let err = service(&fx).delete_title(&admin(), recorded.titles[0].id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
