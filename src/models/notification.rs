// src/models/notification.rs

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const CATEGORY_FINANCEIRO: &str = "FINANCEIRO";

/// Depois de tantas falhas a mensagem deixa de ser reprocessada (fica com `last_error`).
pub const MAX_OUTBOX_ATTEMPTS: i32 = 10;

/// Por quanto tempo quem reservou uma mensagem tem exclusividade para entregá-la.
pub const OUTBOX_CLAIM_LEASE_SECS: i64 = 120;

pub fn outbox_lease_until(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::seconds(OUTBOX_CLAIM_LEASE_SECS)
}

/// Mensagem gravada na mesma transação do lançamento financeiro.
/// A entrega acontece depois, por um consumidor separado.
///
/// Entrega é "pelo menos uma vez": a reserva (`claimed_until`) impede que
/// dois consumidores peguem a mesma mensagem, mas se a entrega demorar mais
/// que a reserva ou a marcação falhar, a mensagem pode ser reenviada.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OutboxMessage {
    pub id: Uuid,
    pub staff_id: Uuid,
    pub recipient_user_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub category: String,
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub claimed_until: Option<DateTime<Utc>>,
}

impl OutboxMessage {
    pub fn new(
        staff_id: Uuid,
        recipient_user_id: Option<Uuid>,
        title: impl Into<String>,
        description: impl Into<String>,
        link: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            staff_id,
            recipient_user_id,
            title: title.into(),
            description: description.into(),
            category: CATEGORY_FINANCEIRO.to_string(),
            link,
            created_at: Utc::now(),
            delivered_at: None,
            attempts: 0,
            last_error: None,
            claimed_until: None,
        }
    }

    /// Já nasce reservada para quem vai tentar a entrega imediata.
    pub fn claimed(mut self, now: DateTime<Utc>) -> Self {
        self.claimed_until = Some(outbox_lease_until(now));
        self
    }

    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        self.delivered_at.is_none()
            && self.attempts < MAX_OUTBOX_ATTEMPTS
            && self.claimed_until.is_none_or(|until| until <= now)
    }
}
