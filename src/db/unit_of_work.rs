// src/db/unit_of_work.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{
    credit::{CreditStatus, StaffCredit},
    finance::{FinancialEvent, FinancialTitle, TitleStatus},
    notification::OutboxMessage,
};

/// Uma escrita preparada. As condições de cada variante são verificadas
/// pelo store dentro da transação; qualquer falha descarta a unidade inteira.
#[derive(Debug, Clone, PartialEq)]
pub enum StagedWrite {
    InsertEvent(FinancialEvent),
    InsertTitle(FinancialTitle),
    /// O título precisa existir.
    SetTitleStatus {
        title_id: Uuid,
        status: TitleStatus,
        payment_date: Option<DateTime<Utc>>,
    },
    DeleteTitle { title_id: Uuid },
    /// `(staff_id, payroll_reference)` é único quando a referência existe.
    InsertCredit(StaffCredit),
    /// Trava/destrava pelo título de origem. Créditos PAGO são ignorados.
    SetCreditLock { credit_id: Uuid, status: CreditStatus },
    /// O crédito precisa pertencer ao profissional e estar DISPONIVEL.
    SettleCredit {
        staff_id: Uuid,
        credit_id: Uuid,
        paid_at: DateTime<Utc>,
        paid_by: Uuid,
    },
    UpdateCredit {
        staff_id: Uuid,
        credit_id: Uuid,
        description: Option<String>,
        value: Option<Decimal>,
    },
    DeleteCredit { staff_id: Uuid, credit_id: Uuid },
    SetCreditForecast {
        staff_id: Uuid,
        credit_ids: Vec<Uuid>,
        forecast: NaiveDate,
    },
    RequestUnlock {
        staff_id: Uuid,
        credit_id: Uuid,
        reason: String,
    },
    AppendOutbox(OutboxMessage),
}

/// Conjunto de escritas de um comando. Ou todas são gravadas, ou nenhuma.
#[derive(Debug, Default, Clone)]
pub struct UnitOfWork {
    writes: Vec<StagedWrite>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&mut self, write: StagedWrite) -> &mut Self {
        self.writes.push(write);
        self
    }

    pub fn writes(&self) -> &[StagedWrite] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<StagedWrite> {
        self.writes
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}
