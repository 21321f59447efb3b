// src/services/notification_service.rs

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    common::error::AppError,
    db::LedgerRepositoryRef,
    models::notification::{outbox_lease_until, OutboxMessage, MAX_OUTBOX_ATTEMPTS},
};

/// Canal de entrega das notificações (o despachante externo).
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, message: &OutboxMessage) -> Result<(), AppError>;
}

/// Entrega registrando no log estruturado; usado quando não há despachante configurado.
pub struct LogNotificationSender;

#[async_trait]
impl NotificationSender for LogNotificationSender {
    async fn send(&self, message: &OutboxMessage) -> Result<(), AppError> {
        tracing::info!(
            staff_id = %message.staff_id,
            recipient = ?message.recipient_user_id,
            category = %message.category,
            "🔔 {}: {}",
            message.title,
            message.description
        );
        Ok(())
    }
}

/// Consumidor do outbox. Falhas de entrega são registradas e nunca
/// propagadas: o lançamento financeiro já foi gravado.
#[derive(Clone)]
pub struct NotificationService {
    ledger: LedgerRepositoryRef,
    sender: Arc<dyn NotificationSender>,
}

impl NotificationService {
    pub fn new(ledger: LedgerRepositoryRef, sender: Arc<dyn NotificationSender>) -> Self {
        Self { ledger, sender }
    }

    /// Tenta entregar uma mensagem. Retorna `true` se foi entregue.
    pub async fn deliver(&self, message: &OutboxMessage) -> bool {
        match self.sender.send(message).await {
            Ok(()) => {
                if let Err(e) = self.ledger.mark_outbox_delivered(message.id, Utc::now()).await {
                    tracing::warn!("Notificação {} entregue, mas não foi marcada: {}", message.id, e);
                }
                true
            }
            Err(e) => {
                if message.attempts + 1 >= MAX_OUTBOX_ATTEMPTS {
                    tracing::error!(
                        "Notificação {} abandonada após {} tentativas: {}",
                        message.id,
                        MAX_OUTBOX_ATTEMPTS,
                        e
                    );
                } else {
                    tracing::warn!("Falha ao entregar notificação {}: {}", message.id, e);
                }
                if let Err(err) = self.ledger.record_outbox_failure(message.id, &e.to_string()).await {
                    tracing::warn!("Falha ao registrar tentativa da notificação {}: {}", message.id, err);
                }
                false
            }
        }
    }

    /// Reserva e reprocessa mensagens pendentes. Retorna quantas foram entregues.
    pub async fn dispatch_pending(&self, batch_size: i64) -> Result<usize, AppError> {
        let now = Utc::now();
        let pending = self
            .ledger
            .claim_pending_outbox(batch_size, now, outbox_lease_until(now))
            .await?;
        let mut delivered = 0;
        for message in &pending {
            if self.deliver(message).await {
                delivered += 1;
            }
        }
        if !pending.is_empty() {
            tracing::info!("Outbox: {}/{} notificação(ões) entregue(s)", delivered, pending.len());
        }
        Ok(delivered)
    }
}


#[cfg(test)]
mod tests {
    use super::{testing::RecordingSender, *};
    use crate::db::{InMemoryLedgerRepository, LedgerRepository, StagedWrite, UnitOfWork};
    use chrono::Duration;
    use uuid::Uuid;

    async fn append(store: &InMemoryLedgerRepository, messages: &[OutboxMessage]) {
        let mut uow = UnitOfWork::new();
        for message in messages {
            uow.stage(StagedWrite::AppendOutbox(message.clone()));
        }
        store.commit(uow).await.unwrap();
    }

    async fn store_with_message() -> (Arc<InMemoryLedgerRepository>, OutboxMessage) {
        let store = Arc::new(InMemoryLedgerRepository::new());
        let message = OutboxMessage::new(Uuid::new_v4(), None, "Repasse realizado", "R$ 10,00", None);
        append(&store, &[message.clone()]).await;
        (store, message)
    }

    #[tokio::test]
    async fn failed_delivery_stays_pending_and_is_retried() {
        let (store, message) = store_with_message().await;
        let sender = Arc::new(RecordingSender::failing());
        let service = NotificationService::new(store.clone(), sender.clone());

        assert!(!service.deliver(&message).await);
        let outbox = store.all_outbox().await;
        assert!(outbox[0].delivered_at.is_none());
        assert_eq!(outbox[0].attempts, 1);
        assert!(outbox[0].last_error.is_some());

        sender.recover();
        assert_eq!(service.dispatch_pending(10).await.unwrap(), 1);
        assert!(store.all_outbox().await[0].delivered_at.is_some());
        assert_eq!(sender.sent.lock().await.len(), 1);

        // Nada mais pendente.
        assert_eq!(service.dispatch_pending(10).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn undeliverable_messages_do_not_starve_newer_ones() {
        let store = Arc::new(InMemoryLedgerRepository::new());
        let staff_id = Uuid::new_v4();
        let an_hour_ago = Utc::now() - Duration::hours(1);
        let mut stuck = Vec::new();
        for _ in 0..2 {
            let mut message = OutboxMessage::new(staff_id, None, "Destinatário inválido", "x", None);
            message.created_at = an_hour_ago;
            stuck.push(message);
        }
        let fresh = OutboxMessage::new(staff_id, None, "Repasse realizado", "R$ 80,00", None);
        append(&store, &stuck).await;
        append(&store, &[fresh.clone()]).await;

        let sender = Arc::new(RecordingSender::default());
        sender.reject_title("Destinatário inválido").await;
        let service = NotificationService::new(store.clone(), sender.clone());

        // Primeira rodada: as duas mais antigas falham.
        assert_eq!(service.dispatch_pending(2).await.unwrap(), 0);
        // Na segunda a nova mensagem, com menos tentativas, vem na frente.
        assert_eq!(service.dispatch_pending(2).await.unwrap(), 1);
        let sent = sender.sent.lock().await.clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id, fresh.id);

        for _ in 0..(MAX_OUTBOX_ATTEMPTS * 2) {
            service.dispatch_pending(2).await.unwrap();
        }
        let outbox = store.all_outbox().await;
        for message in outbox.iter().filter(|m| m.id != fresh.id) {
            assert!(message.delivered_at.is_none());
            assert_eq!(message.attempts, MAX_OUTBOX_ATTEMPTS);
        }

        // Esgotadas as tentativas, nada mais é reservado.
        let now = Utc::now();
        assert!(store.claim_pending_outbox(10, now, outbox_lease_until(now)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn claimed_message_is_not_dispatched_twice() {
        let store = Arc::new(InMemoryLedgerRepository::new());
        let now = Utc::now();
        let message = OutboxMessage::new(Uuid::new_v4(), None, "Repasse realizado", "R$ 10,00", None).claimed(now);
        append(&store, &[message.clone()]).await;

        let sender = Arc::new(RecordingSender::default());
        let service = NotificationService::new(store.clone(), sender.clone());

        // Reservada por quem gravou: o despachante não a vê.
        assert_eq!(service.dispatch_pending(10).await.unwrap(), 0);
        assert!(service.deliver(&message).await);
        assert_eq!(service.dispatch_pending(10).await.unwrap(), 0);
        assert_eq!(sender.sent.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_claims_do_not_overlap() {
        let store = Arc::new(InMemoryLedgerRepository::new());
        let staff_id = Uuid::new_v4();
        let messages: Vec<_> = (0..3)
            .map(|i| OutboxMessage::new(staff_id, None, format!("Aviso {}", i), "x", None))
            .collect();
        append(&store, &messages).await;

        let now = Utc::now();
        let lease = outbox_lease_until(now);
        let (a, b) = tokio::join!(
            store.claim_pending_outbox(2, now, lease),
            store.claim_pending_outbox(2, now, lease)
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.len() + b.len(), 3);
        assert!(a.iter().all(|m| b.iter().all(|n| n.id != m.id)));

        // Reserva vencida volta a ser elegível.
        let later = lease + Duration::seconds(1);
        assert_eq!(store.claim_pending_outbox(10, later, outbox_lease_until(later)).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn failed_immediate_delivery_releases_the_claim() {
        let store = Arc::new(InMemoryLedgerRepository::new());
        let message = OutboxMessage::new(Uuid::new_v4(), None, "Repasse realizado", "R$ 10,00", None)
            .claimed(Utc::now());
        append(&store, &[message.clone()]).await;

        let sender = Arc::new(RecordingSender::failing());
        let service = NotificationService::new(store.clone(), sender.clone());
        assert!(!service.deliver(&message).await);
        assert!(store.all_outbox().await[0].claimed_until.is_none());

        sender.recover();
        assert_eq!(service.dispatch_pending(10).await.unwrap(), 1);
    }
}
