// src/common/validation.rs

use rust_decimal::Decimal;
use validator::{ValidationError, ValidationErrors};

use crate::common::error::AppError;

// Valor monetário: positivo e com no máximo duas casas decimais.
// Usada tanto em `#[validate(custom(...))]` dos payloads quanto nos services.
pub fn validate_amount(val: &Decimal) -> Result<(), ValidationError> {
    if *val <= Decimal::ZERO {
        let mut err = ValidationError::new("range");
        err.add_param("min".into(), &0.0);
        err.message = Some("O valor deve ser maior que zero.".into());
        return Err(err);
    }
    if val.normalize().scale() > 2 {
        let mut err = ValidationError::new("scale");
        err.add_param("max".into(), &2);
        err.message = Some("Use no máximo duas casas decimais.".into());
        return Err(err);
    }
    Ok(())
}

/// Monta um `AppError::ValidationError` para um único campo, no mesmo
/// formato de resposta que o `validator` gera para os payloads.
pub fn field_error(field: &'static str, code: &'static str, message: &str) -> AppError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.to_string().into());
    let mut errors = ValidationErrors::new();
    errors.add(field, err);
    AppError::ValidationError(errors)
}

pub fn ensure_amount(field: &'static str, val: Decimal) -> Result<(), AppError> {
    validate_amount(&val).map_err(|e| {
        let mut errors = ValidationErrors::new();
        errors.add(field, e);
        AppError::ValidationError(errors)
    })
}
