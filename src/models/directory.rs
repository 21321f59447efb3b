// src/models/directory.rs

// Registros mantidos pelo cadastro externo (processos, clientes, equipe).
// Este serviço apenas os lê.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    pub id: Uuid,
    pub client_id: Uuid,
    // Advogado responsável pelo processo
    pub lead_staff_id: Option<Uuid>,
    pub title: String,
}

/// Regra de remuneração do profissional. Persistida como JSONB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemunerationRule {
    #[serde(rename_all = "camelCase")]
    Sucumbencia { lawyer_percentage: Option<Decimal> },
    #[serde(rename_all = "camelCase")]
    QuotaLitis { lawyer_percentage: Option<Decimal> },
    #[serde(rename_all = "camelCase")]
    FixoMensal { fixed_monthly_value: Decimal },
    // Pago por audiência realizada, lançado manualmente
    #[serde(rename_all = "camelCase")]
    Audiencista { value_per_hearing: Option<Decimal> },
    // Pago por ato/peça produzida, lançado manualmente
    #[serde(rename_all = "camelCase")]
    Producao { value_per_act: Option<Decimal> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Staff {
    pub id: Uuid,
    // Usuário do sistema vinculado (destinatário das notificações)
    pub user_id: Option<Uuid>,
    pub name: String,
    #[sqlx(json)]
    pub remuneration: RemunerationRule,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn remuneration_rule_reads_the_directory_json() {
        let rule: RemunerationRule =
            serde_json::from_str(r#"{"type":"QUOTA_LITIS","lawyerPercentage":20}"#).unwrap();
        assert_eq!(rule, RemunerationRule::QuotaLitis { lawyer_percentage: Some(dec!(20)) });

        let rule: RemunerationRule =
            serde_json::from_str(r#"{"type":"FIXO_MENSAL","fixedMonthlyValue":3000}"#).unwrap();
        assert_eq!(rule, RemunerationRule::FixoMensal { fixed_monthly_value: dec!(3000) });
    }

    #[test]
    fn missing_percentage_is_accepted_as_unset() {
        let rule: RemunerationRule = serde_json::from_str(r#"{"type":"SUCUMBENCIA"}"#).unwrap();
        assert_eq!(rule, RemunerationRule::Sucumbencia { lawyer_percentage: None });
    }
}
