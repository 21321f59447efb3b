// src/db/memory_repo.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{
        ledger_repo::{DirectoryRepository, LedgerRepository},
        unit_of_work::{StagedWrite, UnitOfWork},
    },
    models::{
        credit::{CreditStatus, StaffCredit},
        directory::{Process, Staff},
        finance::{FinancialEvent, FinancialTitle, TitleFilter},
        notification::OutboxMessage,
    },
};

/// Cadastro inicial para o modo em memória (arquivo JSON com processos e equipe).
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectorySeed {
    #[serde(default)]
    pub processes: Vec<Process>,
    #[serde(default)]
    pub staff: Vec<Staff>,
}

#[derive(Debug, Default, Clone)]
struct LedgerState {
    processes: HashMap<Uuid, Process>,
    staff: HashMap<Uuid, Staff>,
    events: HashMap<Uuid, FinancialEvent>,
    titles: HashMap<Uuid, FinancialTitle>,
    // Sub-coleção por profissional
    credits: HashMap<Uuid, Vec<StaffCredit>>,
    outbox: Vec<OutboxMessage>,
}

impl LedgerState {
    fn credit_mut(&mut self, staff_id: Uuid, credit_id: Uuid) -> Result<&mut StaffCredit, AppError> {
        self.credits
            .get_mut(&staff_id)
            .and_then(|credits| credits.iter_mut().find(|c| c.id == credit_id))
            .ok_or_else(|| AppError::not_found("Crédito"))
    }

    fn apply(&mut self, write: StagedWrite) -> Result<(), AppError> {
        match write {
            StagedWrite::InsertEvent(event) => {
                self.events.insert(event.id, event);
            }
            StagedWrite::InsertTitle(title) => {
                self.titles.insert(title.id, title);
            }
            StagedWrite::SetTitleStatus { title_id, status, payment_date } => {
                let title = self
                    .titles
                    .get_mut(&title_id)
                    .ok_or_else(|| AppError::not_found("Título"))?;
                title.status = status;
                title.payment_date = payment_date;
            }
            StagedWrite::DeleteTitle { title_id } => {
                self.titles
                    .remove(&title_id)
                    .ok_or_else(|| AppError::not_found("Título"))?;
            }
            StagedWrite::InsertCredit(credit) => {
                let credits = self.credits.entry(credit.staff_id).or_default();
                if let Some(reference) = &credit.payroll_reference {
                    if credits.iter().any(|c| c.payroll_reference.as_ref() == Some(reference)) {
                        return Err(AppError::Conflict("Lançamento duplicado.".to_string()));
                    }
                }
                credits.push(credit);
            }
            StagedWrite::SetCreditLock { credit_id, status } => {
                for credit in self.credits.values_mut().flatten() {
                    if credit.id == credit_id && credit.status != CreditStatus::Pago {
                        credit.status = status;
                    }
                }
            }
            StagedWrite::SettleCredit { staff_id, credit_id, paid_at, paid_by } => {
                let credit = self.credit_mut(staff_id, credit_id)?;
                if credit.status != CreditStatus::Disponivel {
                    return Err(AppError::Conflict(format!(
                        "Crédito {} está {:?} e não pode ser repassado.",
                        credit_id, credit.status
                    )));
                }
                credit.status = CreditStatus::Pago;
                credit.payment_date = Some(paid_at);
                credit.paid_by = Some(paid_by);
            }
            StagedWrite::UpdateCredit { staff_id, credit_id, description, value } => {
                let credit = self.credit_mut(staff_id, credit_id)?;
                if value.is_some() && credit.is_paid() {
                    return Err(AppError::Conflict(format!(
                        "Crédito {} já foi pago; o valor não pode ser alterado.",
                        credit_id
                    )));
                }
                if let Some(description) = description {
                    credit.description = description;
                }
                if let Some(value) = value {
                    credit.value = value;
                }
            }
            StagedWrite::DeleteCredit { staff_id, credit_id } => {
                let credits = self
                    .credits
                    .get_mut(&staff_id)
                    .ok_or_else(|| AppError::not_found("Crédito"))?;
                let before = credits.len();
                credits.retain(|c| c.id != credit_id);
                if credits.len() == before {
                    return Err(AppError::not_found("Crédito"));
                }
            }
            StagedWrite::SetCreditForecast { staff_id, credit_ids, forecast } => {
                for credit_id in credit_ids {
                    self.credit_mut(staff_id, credit_id)?.payment_forecast = Some(forecast);
                }
            }
            StagedWrite::RequestUnlock { staff_id, credit_id, reason } => {
                let credit = self.credit_mut(staff_id, credit_id)?;
                credit.unlock_requested = true;
                credit.unlock_reason = Some(reason);
            }
            StagedWrite::AppendOutbox(message) => {
                self.outbox.push(message);
            }
        }
        Ok(())
    }
}

/// Store em memória com as mesmas garantias do Postgres: cada `commit`
/// é aplicado sobre uma cópia do estado e só substitui o estado vigente se
/// todas as escritas passarem.
#[derive(Default, Clone)]
pub struct InMemoryLedgerRepository {
    state: Arc<RwLock<LedgerState>>,
    fail_next_commit: Arc<AtomicBool>,
}

impl InMemoryLedgerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_directory(seed: DirectorySeed) -> Self {
        let state = LedgerState {
            processes: seed.processes.into_iter().map(|p| (p.id, p)).collect(),
            staff: seed.staff.into_iter().map(|s| (s.id, s)).collect(),
            ..Default::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
            fail_next_commit: Arc::default(),
        }
    }
}

#[cfg(test)]
impl InMemoryLedgerRepository {
    /// Faz o próximo `commit` falhar como se o banco tivesse rejeitado a transação.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    pub async fn insert_process(&self, process: Process) {
        self.state.write().await.processes.insert(process.id, process);
    }

    pub async fn insert_staff(&self, staff: Staff) {
        self.state.write().await.staff.insert(staff.id, staff);
    }

    pub async fn all_events(&self) -> Vec<FinancialEvent> {
        self.state.read().await.events.values().cloned().collect()
    }

    pub async fn all_titles(&self) -> Vec<FinancialTitle> {
        let mut titles: Vec<_> = self.state.read().await.titles.values().cloned().collect();
        titles.sort_by_key(|t| (t.due_date, t.created_at));
        titles
    }

    pub async fn all_credits(&self) -> Vec<StaffCredit> {
        self.state.read().await.credits.values().flatten().cloned().collect()
    }

    pub async fn all_outbox(&self) -> Vec<OutboxMessage> {
        self.state.read().await.outbox.clone()
    }
}

#[async_trait]
impl DirectoryRepository for InMemoryLedgerRepository {
    async fn find_process(&self, process_id: Uuid) -> Result<Option<Process>, AppError> {
        Ok(self.state.read().await.processes.get(&process_id).cloned())
    }

    async fn find_staff(&self, staff_id: Uuid) -> Result<Option<Staff>, AppError> {
        Ok(self.state.read().await.staff.get(&staff_id).cloned())
    }

    async fn list_staff(&self) -> Result<Vec<Staff>, AppError> {
        let mut staff: Vec<_> = self.state.read().await.staff.values().cloned().collect();
        staff.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(staff)
    }
}

#[async_trait]
impl LedgerRepository for InMemoryLedgerRepository {
    async fn find_event(&self, event_id: Uuid) -> Result<Option<FinancialEvent>, AppError> {
        Ok(self.state.read().await.events.get(&event_id).cloned())
    }

    async fn find_title(&self, title_id: Uuid) -> Result<Option<FinancialTitle>, AppError> {
        Ok(self.state.read().await.titles.get(&title_id).cloned())
    }

    async fn list_titles(
        &self,
        filter: &TitleFilter,
        today: NaiveDate,
    ) -> Result<Vec<FinancialTitle>, AppError> {
        let state = self.state.read().await;
        let mut titles: Vec<_> = state
            .titles
            .values()
            .filter(|t| filter.matches(t, today))
            .cloned()
            .collect();
        titles.sort_by_key(|t| (t.due_date, t.created_at));
        Ok(titles)
    }

    async fn list_titles_by_event(&self, event_id: Uuid) -> Result<Vec<FinancialTitle>, AppError> {
        let state = self.state.read().await;
        let mut titles: Vec<_> = state
            .titles
            .values()
            .filter(|t| t.financial_event_id == Some(event_id))
            .cloned()
            .collect();
        titles.sort_by_key(|t| t.due_date);
        Ok(titles)
    }

    async fn find_credit(
        &self,
        staff_id: Uuid,
        credit_id: Uuid,
    ) -> Result<Option<StaffCredit>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .credits
            .get(&staff_id)
            .and_then(|credits| credits.iter().find(|c| c.id == credit_id))
            .cloned())
    }

    async fn list_credits(&self, staff_id: Uuid) -> Result<Vec<StaffCredit>, AppError> {
        let state = self.state.read().await;
        let mut credits = state.credits.get(&staff_id).cloned().unwrap_or_default();
        credits.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
        Ok(credits)
    }

    async fn list_credits_by_event(&self, event_id: Uuid) -> Result<Vec<StaffCredit>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .credits
            .values()
            .flatten()
            .filter(|c| c.financial_event_id == Some(event_id))
            .cloned()
            .collect())
    }

    async fn has_payroll_credit(&self, staff_id: Uuid, reference: &str) -> Result<bool, AppError> {
        let state = self.state.read().await;
        Ok(state.credits.get(&staff_id).is_some_and(|credits| {
            credits.iter().any(|c| c.payroll_reference.as_deref() == Some(reference))
        }))
    }

    async fn commit(&self, uow: UnitOfWork) -> Result<(), AppError> {
        let mut state = self.state.write().await;

        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(AppError::PersistenceFailure(
                "transação rejeitada pelo store".to_string(),
            ));
        }

        let mut staged = state.clone();
        for write in uow.into_writes() {
            staged.apply(write)?;
        }
        *state = staged;
        Ok(())
    }

    async fn claim_pending_outbox(
        &self,
        limit: i64,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<Vec<OutboxMessage>, AppError> {
        let mut state = self.state.write().await;
        let mut pending: Vec<&mut OutboxMessage> =
            state.outbox.iter_mut().filter(|m| m.is_claimable(now)).collect();
        pending.sort_by_key(|m| (m.attempts, m.created_at));

        Ok(pending
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|message| {
                message.claimed_until = Some(lease_until);
                message.clone()
            })
            .collect())
    }

    async fn mark_outbox_delivered(&self, message_id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if let Some(message) = state.outbox.iter_mut().find(|m| m.id == message_id) {
            message.delivered_at = Some(at);
            message.attempts += 1;
        }
        Ok(())
    }

    async fn record_outbox_failure(&self, message_id: Uuid, error: &str) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if let Some(message) = state.outbox.iter_mut().find(|m| m.id == message_id) {
            message.attempts += 1;
            message.last_error = Some(error.to_string());
            message.claimed_until = None;
        }
        Ok(())
    }
}
