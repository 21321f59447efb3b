// src/db/pg_ledger_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};
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
        notification::{OutboxMessage, MAX_OUTBOX_ATTEMPTS},
    },
};

#[derive(Clone)]
pub struct PgLedgerRepository {
    pool: PgPool,
}

impl PgLedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Converte erros de escrita: violação de unicidade é conflito de negócio,
// o resto é falha de persistência (o chamador deve tentar de novo).
fn map_write_error(e: sqlx::Error) -> AppError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            return AppError::Conflict("Lançamento duplicado.".to_string());
        }
    }
    AppError::PersistenceFailure(e.to_string())
}

async fn credit_status_of(
    conn: &mut PgConnection,
    staff_id: Uuid,
    credit_id: Uuid,
) -> Result<Option<CreditStatus>, AppError> {
    let status = sqlx::query_scalar::<_, CreditStatus>(
        "SELECT status FROM staff_credits WHERE id = $1 AND staff_id = $2",
    )
        .bind(credit_id)
        .bind(staff_id)
        .fetch_optional(conn)
        .await
        .map_err(map_write_error)?;

    Ok(status)
}

async fn apply(conn: &mut PgConnection, write: StagedWrite) -> Result<(), AppError> {
    match write {
        StagedWrite::InsertEvent(event) => {
            sqlx::query(
                r#"
                INSERT INTO financial_events
                    (id, process_id, event_type, total_value, event_date, description, created_by, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
                .bind(event.id)
                .bind(event.process_id)
                .bind(event.event_type)
                .bind(event.total_value)
                .bind(event.event_date)
                .bind(&event.description)
                .bind(event.created_by)
                .bind(event.created_at)
                .execute(&mut *conn)
                .await
                .map_err(map_write_error)?;
        }

        StagedWrite::InsertTitle(title) => {
            sqlx::query(
                r#"
                INSERT INTO financial_titles (
                    id, process_id, client_id, staff_id, financial_event_id,
                    description, direction, origin, value, due_date,
                    status, payment_date, created_by, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                "#,
            )
                .bind(title.id)
                .bind(title.process_id)
                .bind(title.client_id)
                .bind(title.staff_id)
                .bind(title.financial_event_id)
                .bind(&title.description)
                .bind(title.direction)
                .bind(title.origin)
                .bind(title.value)
                .bind(title.due_date)
                .bind(title.status)
                .bind(title.payment_date)
                .bind(title.created_by)
                .bind(title.created_at)
                .execute(&mut *conn)
                .await
                .map_err(map_write_error)?;
        }

        StagedWrite::SetTitleStatus { title_id, status, payment_date } => {
            let result = sqlx::query(
                "UPDATE financial_titles SET status = $2, payment_date = $3 WHERE id = $1",
            )
                .bind(title_id)
                .bind(status)
                .bind(payment_date)
                .execute(&mut *conn)
                .await
                .map_err(map_write_error)?;

            if result.rows_affected() == 0 {
                return Err(AppError::not_found("Título"));
            }
        }

        StagedWrite::DeleteTitle { title_id } => {
            let result = sqlx::query("DELETE FROM financial_titles WHERE id = $1")
                .bind(title_id)
                .execute(&mut *conn)
                .await
                .map_err(map_write_error)?;

            if result.rows_affected() == 0 {
                return Err(AppError::not_found("Título"));
            }
        }

        StagedWrite::InsertCredit(credit) => {
            sqlx::query(
                r#"
                INSERT INTO staff_credits (
                    id, staff_id, credit_type, financial_event_id, description, value,
                    status, date, payment_forecast, unlock_requested, unlock_reason,
                    payroll_reference, payment_date, paid_by, created_by, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                "#,
            )
                .bind(credit.id)
                .bind(credit.staff_id)
                .bind(credit.credit_type)
                .bind(credit.financial_event_id)
                .bind(&credit.description)
                .bind(credit.value)
                .bind(credit.status)
                .bind(credit.date)
                .bind(credit.payment_forecast)
                .bind(credit.unlock_requested)
                .bind(&credit.unlock_reason)
                .bind(&credit.payroll_reference)
                .bind(credit.payment_date)
                .bind(credit.paid_by)
                .bind(credit.created_by)
                .bind(credit.created_at)
                .execute(&mut *conn)
                .await
                .map_err(map_write_error)?;
        }

        StagedWrite::SetCreditLock { credit_id, status } => {
            // Zero linhas é aceitável: o crédito pode ter sido pago ou excluído.
            sqlx::query(
                "UPDATE staff_credits SET status = $2 WHERE id = $1 AND status <> 'PAGO'",
            )
                .bind(credit_id)
                .bind(status)
                .execute(&mut *conn)
                .await
                .map_err(map_write_error)?;
        }

        StagedWrite::SettleCredit { staff_id, credit_id, paid_at, paid_by } => {
            let result = sqlx::query(
                r#"
                UPDATE staff_credits
                SET status = 'PAGO', payment_date = $3, paid_by = $4
                WHERE id = $1 AND staff_id = $2 AND status = 'DISPONIVEL'
                "#,
            )
                .bind(credit_id)
                .bind(staff_id)
                .bind(paid_at)
                .bind(paid_by)
                .execute(&mut *conn)
                .await
                .map_err(map_write_error)?;

            if result.rows_affected() == 0 {
                return match credit_status_of(conn, staff_id, credit_id).await? {
                    None => Err(AppError::not_found("Crédito")),
                    Some(status) => Err(AppError::Conflict(format!(
                        "Crédito {} está {:?} e não pode ser repassado.",
                        credit_id, status
                    ))),
                };
            }
        }

        StagedWrite::UpdateCredit { staff_id, credit_id, description, value } => {
            let result = sqlx::query(
                r#"
                UPDATE staff_credits
                SET description = COALESCE($3, description),
                    value = COALESCE($4, value)
                WHERE id = $1 AND staff_id = $2
                  AND ($4::numeric IS NULL OR status <> 'PAGO')
                "#,
            )
                .bind(credit_id)
                .bind(staff_id)
                .bind(description)
                .bind(value)
                .execute(&mut *conn)
                .await
                .map_err(map_write_error)?;

            if result.rows_affected() == 0 {
                return match credit_status_of(conn, staff_id, credit_id).await? {
                    None => Err(AppError::not_found("Crédito")),
                    Some(_) => Err(AppError::Conflict(format!(
                        "Crédito {} já foi pago; o valor não pode ser alterado.",
                        credit_id
                    ))),
                };
            }
        }

        StagedWrite::DeleteCredit { staff_id, credit_id } => {
            let result = sqlx::query("DELETE FROM staff_credits WHERE id = $1 AND staff_id = $2")
                .bind(credit_id)
                .bind(staff_id)
                .execute(&mut *conn)
                .await
                .map_err(map_write_error)?;

            if result.rows_affected() == 0 {
                return Err(AppError::not_found("Crédito"));
            }
        }

        StagedWrite::SetCreditForecast { staff_id, credit_ids, forecast } => {
            let result = sqlx::query(
                "UPDATE staff_credits SET payment_forecast = $3 WHERE staff_id = $1 AND id = ANY($2)",
            )
                .bind(staff_id)
                .bind(credit_ids.as_slice())
                .bind(forecast)
                .execute(&mut *conn)
                .await
                .map_err(map_write_error)?;

            if result.rows_affected() != credit_ids.len() as u64 {
                return Err(AppError::not_found("Crédito"));
            }
        }

        StagedWrite::RequestUnlock { staff_id, credit_id, reason } => {
            let result = sqlx::query(
                r#"
                UPDATE staff_credits
                SET unlock_requested = TRUE, unlock_reason = $3
                WHERE id = $1 AND staff_id = $2
                "#,
            )
                .bind(credit_id)
                .bind(staff_id)
                .bind(reason)
                .execute(&mut *conn)
                .await
                .map_err(map_write_error)?;

            if result.rows_affected() == 0 {
                return Err(AppError::not_found("Crédito"));
            }
        }

        StagedWrite::AppendOutbox(message) => {
            sqlx::query(
                r#"
                INSERT INTO notification_outbox (
                    id, staff_id, recipient_user_id, title, description, category,
                    link, created_at, delivered_at, attempts, last_error, claimed_until
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
                .bind(message.id)
                .bind(message.staff_id)
                .bind(message.recipient_user_id)
                .bind(&message.title)
                .bind(&message.description)
                .bind(&message.category)
                .bind(&message.link)
                .bind(message.created_at)
                .bind(message.delivered_at)
                .bind(message.attempts)
                .bind(&message.last_error)
                .bind(message.claimed_until)
                .execute(&mut *conn)
                .await
                .map_err(map_write_error)?;
        }
    }

    Ok(())
}

#[async_trait]
impl DirectoryRepository for PgLedgerRepository {
    async fn find_process(&self, process_id: Uuid) -> Result<Option<Process>, AppError> {
        let process = sqlx::query_as::<_, Process>(
            "SELECT id, client_id, lead_staff_id, title FROM processes WHERE id = $1",
        )
            .bind(process_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(process)
    }

    async fn find_staff(&self, staff_id: Uuid) -> Result<Option<Staff>, AppError> {
        let staff = sqlx::query_as::<_, Staff>(
            "SELECT id, user_id, name, remuneration FROM staff WHERE id = $1",
        )
            .bind(staff_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(staff)
    }

    async fn list_staff(&self) -> Result<Vec<Staff>, AppError> {
        let staff = sqlx::query_as::<_, Staff>(
            "SELECT id, user_id, name, remuneration FROM staff ORDER BY name ASC",
        )
            .fetch_all(&self.pool)
            .await?;

        Ok(staff)
    }
}

#[async_trait]
impl LedgerRepository for PgLedgerRepository {
    async fn find_event(&self, event_id: Uuid) -> Result<Option<FinancialEvent>, AppError> {
        let event = sqlx::query_as::<_, FinancialEvent>(
            "SELECT * FROM financial_events WHERE id = $1",
        )
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(event)
    }

    async fn find_title(&self, title_id: Uuid) -> Result<Option<FinancialTitle>, AppError> {
        let title = sqlx::query_as::<_, FinancialTitle>(
            "SELECT * FROM financial_titles WHERE id = $1",
        )
            .bind(title_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(title)
    }

    async fn list_titles(
        &self,
        filter: &TitleFilter,
        today: NaiveDate,
    ) -> Result<Vec<FinancialTitle>, AppError> {
        // ATRASADO é derivado: PENDENTE com vencimento anterior a hoje.
        let titles = sqlx::query_as::<_, FinancialTitle>(
            r#"
            SELECT * FROM financial_titles
            WHERE ($1::uuid IS NULL OR process_id = $1)
              AND ($2::title_direction IS NULL OR direction = $2)
              AND (
                    $3::title_status IS NULL
                 OR ($3 = 'PAGO' AND status = 'PAGO')
                 OR ($3 = 'PENDENTE' AND status = 'PENDENTE' AND due_date >= $4)
                 OR ($3 = 'ATRASADO' AND (status = 'ATRASADO' OR (status = 'PENDENTE' AND due_date < $4)))
              )
            ORDER BY due_date ASC, created_at ASC
            "#,
        )
            .bind(filter.process_id)
            .bind(filter.direction)
            .bind(filter.status)
            .bind(today)
            .fetch_all(&self.pool)
            .await?;

        Ok(titles)
    }

    async fn list_titles_by_event(&self, event_id: Uuid) -> Result<Vec<FinancialTitle>, AppError> {
        let titles = sqlx::query_as::<_, FinancialTitle>(
            "SELECT * FROM financial_titles WHERE financial_event_id = $1 ORDER BY due_date ASC",
        )
            .bind(event_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(titles)
    }

    async fn find_credit(
        &self,
        staff_id: Uuid,
        credit_id: Uuid,
    ) -> Result<Option<StaffCredit>, AppError> {
        let credit = sqlx::query_as::<_, StaffCredit>(
            "SELECT * FROM staff_credits WHERE id = $1 AND staff_id = $2",
        )
            .bind(credit_id)
            .bind(staff_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(credit)
    }

    async fn list_credits(&self, staff_id: Uuid) -> Result<Vec<StaffCredit>, AppError> {
        let credits = sqlx::query_as::<_, StaffCredit>(
            "SELECT * FROM staff_credits WHERE staff_id = $1 ORDER BY date DESC, created_at DESC",
        )
            .bind(staff_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(credits)
    }

    async fn list_credits_by_event(&self, event_id: Uuid) -> Result<Vec<StaffCredit>, AppError> {
        let credits = sqlx::query_as::<_, StaffCredit>(
            "SELECT * FROM staff_credits WHERE financial_event_id = $1",
        )
            .bind(event_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(credits)
    }

    async fn has_payroll_credit(&self, staff_id: Uuid, reference: &str) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM staff_credits WHERE staff_id = $1 AND payroll_reference = $2)",
        )
            .bind(staff_id)
            .bind(reference)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    async fn commit(&self, uow: UnitOfWork) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(map_write_error)?;

        for write in uow.into_writes() {
            // Se falhar aqui, o tx sofre rollback automático ao sair do escopo (drop)
            apply(&mut *tx, write).await?;
        }

        tx.commit().await.map_err(map_write_error)?;
        Ok(())
    }

    async fn claim_pending_outbox(
        &self,
        limit: i64,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
    ) -> Result<Vec<OutboxMessage>, AppError> {
        let mut messages = sqlx::query_as::<_, OutboxMessage>(
            r#"
            UPDATE notification_outbox
            SET claimed_until = $3
            WHERE id IN (
                SELECT id FROM notification_outbox
                WHERE delivered_at IS NULL
                  AND attempts < $4
                  AND (claimed_until IS NULL OR claimed_until <= $2)
                ORDER BY attempts ASC, created_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
            .bind(limit)
            .bind(now)
            .bind(lease_until)
            .bind(MAX_OUTBOX_ATTEMPTS)
            .fetch_all(&self.pool)
            .await?;

        // RETURNING não preserva a ordem da subconsulta
        messages.sort_by_key(|m| (m.attempts, m.created_at));
        Ok(messages)
    }

    async fn mark_outbox_delivered(&self, message_id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE notification_outbox SET delivered_at = $2, attempts = attempts + 1 WHERE id = $1",
        )
            .bind(message_id)
            .bind(at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn record_outbox_failure(&self, message_id: Uuid, error: &str) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE notification_outbox SET attempts = attempts + 1, last_error = $2, claimed_until = NULL WHERE id = $1",
        )
            .bind(message_id)
            .bind(error)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
