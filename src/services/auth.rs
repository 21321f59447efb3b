// src/services/auth.rs

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::auth::{ActingUser, Claims, UserRole},
};

/// Validação dos tokens emitidos pelo provedor de identidade (HS256).
#[derive(Clone)]
pub struct AuthService {
    jwt_secret: String,
}

impl AuthService {
    pub fn new(jwt_secret: String) -> Self {
        Self { jwt_secret }
    }

    pub fn validate_token(&self, token: &str) -> Result<ActingUser, AppError> {
        let validation = Validation::default();
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &validation,
        )
        .map_err(|_| AppError::InvalidToken)?;

        let user = ActingUser::from(token_data.claims);
        if user.role == UserRole::Staff && user.staff_id.is_none() {
            tracing::warn!("Token de {} com papel STAFF sem staffId", user.id);
        }
        Ok(user)
    }

    /// Emite um token. Usado em desenvolvimento e nos testes; em produção
    /// quem emite é o provedor de identidade.
    pub fn create_token(
        &self,
        user_id: Uuid,
        role: UserRole,
        staff_id: Option<Uuid>,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::days(7);

        let claims = Claims {
            sub: user_id,
            role,
            staff_id,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }
}
