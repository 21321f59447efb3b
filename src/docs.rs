// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Eventos ---
        handlers::ledger::record_event,
        handlers::ledger::get_event,

        // --- Títulos ---
        handlers::ledger::set_title_status,
        handlers::ledger::create_title,
        handlers::ledger::list_titles,
        handlers::ledger::delete_title,

        // --- Repasses ---
        handlers::credits::settle_repasse,
        handlers::documents::repasse_voucher,

        // --- Créditos ---
        handlers::credits::add_credit,
        handlers::credits::staff_statement,
        handlers::credits::update_credit,
        handlers::credits::delete_credit,
        handlers::credits::request_unlock,
        handlers::credits::set_credit_forecast,

        // --- Folha ---
        handlers::credits::run_payroll,
    ),
    components(
        schemas(
            // --- Lançamentos ---
            models::finance::EventType,
            models::finance::TitleDirection,
            models::finance::TitleOrigin,
            models::finance::TitleStatus,
            models::finance::FinancialEvent,
            models::finance::FinancialTitle,

            // --- Créditos ---
            models::credit::CreditType,
            models::credit::CreditStatus,
            models::credit::StaffCredit,
            models::credit::StaffStatement,

            // --- Respostas ---
            services::event_ledger_service::RecordedEvent,
            services::event_ledger_service::EventDetail,
            services::payout_service::RepasseReceipt,
            services::payroll_service::PayrollReport,
            services::payroll_service::PayrollFailure,
            services::compensation::FeeBreakdown,

            // --- Payloads ---
            handlers::ledger::RecordEventPayload,
            handlers::ledger::SetTitleStatusPayload,
            handlers::ledger::CreateTitlePayload,
            handlers::credits::SettleRepassePayload,
            handlers::credits::ManualCreditPayload,
            handlers::credits::UpdateCreditPayload,
            handlers::credits::UnlockRequestPayload,
            handlers::credits::CreditForecastPayload,
        )
    ),
    tags(
        (name = "Eventos", description = "Fatos faturáveis: parcelas e comissões"),
        (name = "Títulos", description = "Contas a receber e a pagar"),
        (name = "Repasses", description = "Pagamento dos créditos da equipe"),
        (name = "Créditos", description = "Créditos e extrato dos profissionais"),
        (name = "Folha", description = "Pró-labore mensal")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
