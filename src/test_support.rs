// src/test_support.rs

// Fixtures compartilhadas pelos testes dos services e handlers.

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    db::InMemoryLedgerRepository,
    models::{
        auth::{ActingUser, UserRole},
        directory::{Process, RemunerationRule, Staff},
    },
};

pub fn admin() -> ActingUser {
    ActingUser { id: Uuid::new_v4(), role: UserRole::Admin, staff_id: None }
}

pub fn staff_user(staff_id: Uuid) -> ActingUser {
    ActingUser { id: Uuid::new_v4(), role: UserRole::Staff, staff_id: Some(staff_id) }
}

pub fn staff_with(rule: RemunerationRule) -> Staff {
    Staff {
        id: Uuid::new_v4(),
        user_id: Some(Uuid::new_v4()),
        name: "Dra. Helena Prado".to_string(),
        remuneration: rule,
    }
}

pub fn sucumbencia(percentage: Decimal) -> RemunerationRule {
    RemunerationRule::Sucumbencia { lawyer_percentage: Some(percentage) }
}

/// Store com um processo cujo advogado responsável segue `rule`.
pub struct Fixture {
    pub store: Arc<InMemoryLedgerRepository>,
    pub process: Process,
    pub lead: Staff,
}

pub async fn fixture_with_lead(rule: RemunerationRule) -> Fixture {
    let store = Arc::new(InMemoryLedgerRepository::new());
    let lead = staff_with(rule);
    let process = Process {
        id: Uuid::new_v4(),
        client_id: Uuid::new_v4(),
        lead_staff_id: Some(lead.id),
        title: "Reclamação trabalhista 0001234-55.2025".to_string(),
    };
    store.insert_staff(lead.clone()).await;
    store.insert_process(process.clone()).await;
    Fixture { store, process, lead }
}
