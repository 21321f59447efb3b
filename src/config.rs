// src/config.rs

use std::{env, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{
        memory_repo::DirectorySeed, DirectoryRepositoryRef, InMemoryLedgerRepository,
        LedgerRepositoryRef, PgLedgerRepository,
    },
    services::{
        auth::AuthService,
        credit_service::CreditService,
        document_service::DocumentService,
        event_ledger_service::EventLedgerService,
        notification_service::{LogNotificationSender, NotificationSender, NotificationService},
        payout_service::PayoutService,
        payroll_service::PayrollService,
        title_service::TitleService,
    },
};

/// Configuração lida do ambiente (e do `.env`, se existir).
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Sem DATABASE_URL o servidor sobe com o store em memória
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub fonts_dir: PathBuf,
    pub outbox_interval: Duration,
    pub directory_seed_file: Option<PathBuf>,
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("{} inválida: {}", name, raw)),
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok(),
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", 5)?,
            fonts_dir: env::var("FONTS_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("./fonts")),
            outbox_interval: Duration::from_secs(parse_var::<u64>("OUTBOX_INTERVAL_SECS", 30)?.max(1)),
            directory_seed_file: env::var("DIRECTORY_SEED_FILE").ok().map(PathBuf::from),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: Option<PgPool>,
    pub auth_service: AuthService,
    pub event_ledger_service: EventLedgerService,
    pub title_service: TitleService,
    pub payout_service: PayoutService,
    pub credit_service: CreditService,
    pub payroll_service: PayrollService,
    pub document_service: DocumentService,
    pub notification_service: NotificationService,
}

impl AppState {
    pub async fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let sender: Arc<dyn NotificationSender> = Arc::new(LogNotificationSender);

        match &config.database_url {
            Some(database_url) => {
                let db_pool = PgPoolOptions::new()
                    .max_connections(config.db_max_connections)
                    .acquire_timeout(Duration::from_secs(3))
                    .connect(database_url)
                    .await?;

                tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

                let repo = Arc::new(PgLedgerRepository::new(db_pool.clone()));
                let mut state = Self::from_parts(
                    repo.clone(),
                    repo,
                    sender,
                    config.jwt_secret.clone(),
                    config.fonts_dir.clone(),
                );
                state.db_pool = Some(db_pool);
                Ok(state)
            }
            None => {
                let seed = match &config.directory_seed_file {
                    Some(path) => {
                        let raw = std::fs::read_to_string(path)
                            .with_context(|| format!("Falha ao ler {}", path.display()))?;
                        serde_json::from_str::<DirectorySeed>(&raw)
                            .with_context(|| format!("Cadastro inválido em {}", path.display()))?
                    }
                    None => DirectorySeed::default(),
                };
                tracing::warn!(
                    "DATABASE_URL não definida: usando store em memória ({} processo(s), {} profissional(is))",
                    seed.processes.len(),
                    seed.staff.len()
                );

                let store = Arc::new(InMemoryLedgerRepository::with_directory(seed));
                Ok(Self::from_parts(
                    store.clone(),
                    store,
                    sender,
                    config.jwt_secret.clone(),
                    config.fonts_dir.clone(),
                ))
            }
        }
    }

    /// Monta o gráfico de dependências sobre repositórios já criados.
    pub fn from_parts(
        ledger: LedgerRepositoryRef,
        directory: DirectoryRepositoryRef,
        sender: Arc<dyn NotificationSender>,
        jwt_secret: String,
        fonts_dir: PathBuf,
    ) -> Self {
        let notification_service = NotificationService::new(ledger.clone(), sender);

        Self {
            db_pool: None,
            auth_service: AuthService::new(jwt_secret),
            event_ledger_service: EventLedgerService::new(ledger.clone(), directory.clone()),
            title_service: TitleService::new(ledger.clone(), directory.clone()),
            payout_service: PayoutService::new(ledger.clone(), directory.clone(), notification_service.clone()),
            credit_service: CreditService::new(ledger.clone(), directory.clone()),
            payroll_service: PayrollService::new(ledger.clone(), directory.clone()),
            document_service: DocumentService::new(ledger, directory, fonts_dir),
            notification_service,
        }
    }
}
