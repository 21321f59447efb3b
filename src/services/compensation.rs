// src/services/compensation.rs

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::directory::RemunerationRule;

/// Honorário contratual do escritório: 30% do valor bruto do evento.
/// Os outros 70% pertencem ao cliente. Usado também no recibo de repasse.
pub const CONTRACTUAL_FEE_RATE: Decimal = dec!(0.30);

/// Comissão do advogado sobre um evento.
///
/// Só SUCUMBENCIA e QUOTA_LITIS derivam de eventos. FIXO_MENSAL é creditado
/// pela folha mensal; AUDIENCISTA e PRODUCAO são lançados manualmente por ato.
/// Por isso essas regras sempre retornam zero aqui.
pub fn commission_for(total_value: Decimal, rule: &RemunerationRule) -> Decimal {
    let percentage = match rule {
        RemunerationRule::Sucumbencia { lawyer_percentage }
        | RemunerationRule::QuotaLitis { lawyer_percentage } => *lawyer_percentage,
        RemunerationRule::FixoMensal { .. }
        | RemunerationRule::Audiencista { .. }
        | RemunerationRule::Producao { .. } => None,
    };

    let Some(percentage) = percentage else {
        return Decimal::ZERO;
    };

    let commission = (total_value * CONTRACTUAL_FEE_RATE * percentage / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    if commission <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    commission
}

/// Divisão do valor bruto entre escritório e cliente, para recibos.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeeBreakdown {
    pub gross: Decimal,
    pub firm_fee: Decimal,
    pub client_share: Decimal,
}

pub fn fee_breakdown(gross: Decimal) -> FeeBreakdown {
    let firm_fee = (gross * CONTRACTUAL_FEE_RATE)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    FeeBreakdown {
        gross,
        firm_fee,
        client_share: gross - firm_fee,
    }
}
