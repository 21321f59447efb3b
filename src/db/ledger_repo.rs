// src/db/ledger_repo.rs

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::unit_of_work::UnitOfWork,
    models::{
        credit::StaffCredit,
        directory::{Process, Staff},
        finance::{FinancialEvent, FinancialTitle, TitleFilter},
        notification::OutboxMessage,
    },
};

/// Leitura do cadastro externo de processos e equipe.
#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    async fn find_process(&self, process_id: Uuid) -> Result<Option<Process>, AppError>;
    async fn find_staff(&self, staff_id: Uuid) -> Result<Option<Staff>, AppError>;
    async fn list_staff(&self) -> Result<Vec<Staff>, AppError>;
}

/// Títulos, eventos, créditos e outbox. Toda escrita passa por `commit`.
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    async fn find_event(&self, event_id: Uuid) -> Result<Option<FinancialEvent>, AppError>;

    async fn find_title(&self, title_id: Uuid) -> Result<Option<FinancialTitle>, AppError>;
    async fn list_titles(
        &self,
        filter: &TitleFilter,
        today: NaiveDate,
    ) -> Result<Vec<FinancialTitle>, AppError>;
    async fn list_titles_by_event(&self, event_id: Uuid) -> Result<Vec<FinancialTitle>, AppError>;

    async fn find_credit(
        &self,
        staff_id: Uuid,
        credit_id: Uuid,
    ) -> Result<Option<StaffCredit>, AppError>;
    async fn list_credits(&self, staff_id: Uuid) -> Result<Vec<StaffCredit>, AppError>;
    /// Varre os créditos de todos os profissionais ligados ao evento.
    async fn list_credits_by_event(&self, event_id: Uuid) -> Result<Vec<StaffCredit>, AppError>;
    async fn has_payroll_credit(&self, staff_id: Uuid, reference: &str) -> Result<bool, AppError>;

    /// Grava a unidade de trabalho de forma atômica.
    async fn commit(&self, uow: UnitOfWork) -> Result<(), AppError>;

    /// Reserva até `limit` mensagens pendentes (menos tentativas primeiro) até
    /// `lease_until`. Mensagens reservadas por outro consumidor ficam de fora.
    async fn claim_pending_outbox(
        &self,
        limit: i64,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<Vec<OutboxMessage>, AppError>;
    async fn mark_outbox_delivered(&self, message_id: Uuid, at: DateTime<Utc>) -> Result<(), AppError>;
    /// Conta a tentativa e libera a reserva para a próxima rodada.
    async fn record_outbox_failure(&self, message_id: Uuid, error: &str) -> Result<(), AppError>;
}

pub type LedgerRepositoryRef = Arc<dyn LedgerRepository>;
pub type DirectoryRepositoryRef = Arc<dyn DirectoryRepository>;
