// src/models/auth.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    Staff,
}

// Estrutura de dados ("claims") dentro do JWT emitido pelo provedor de identidade
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub sub: Uuid,  // Subject (ID do usuário)
    pub role: UserRole,
    pub staff_id: Option<Uuid>, // Cadastro de equipe vinculado ao usuário, se houver
    pub exp: usize, // Expiration time (quando o token expira)
    pub iat: usize, // Issued At (quando o token foi criado)
}

/// Quem está executando o comando.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActingUser {
    pub id: Uuid,
    pub role: UserRole,
    pub staff_id: Option<Uuid>,
}

impl From<Claims> for ActingUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            role: claims.role,
            staff_id: claims.staff_id,
        }
    }
}

impl ActingUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn ensure_admin(&self, action: &str) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden(action.to_string()))
        }
    }

    /// Administradores veem qualquer profissional; os demais, só o próprio cadastro.
    pub fn ensure_can_access_staff(&self, staff_id: Uuid, action: &str) -> Result<(), AppError> {
        if self.is_admin() || self.staff_id == Some(staff_id) {
            Ok(())
        } else {
            Err(AppError::Forbidden(action.to_string()))
        }
    }
}
