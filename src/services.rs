pub mod auth;
pub mod compensation;
pub mod credit_service;
pub mod document_service;
pub mod event_ledger_service;
pub mod notification_service;
pub mod payout_service;
pub mod payroll_service;
pub mod title_service;
