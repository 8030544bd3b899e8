use jsonwebtoken::{encode, Header, decode, Validation, TokenData, Algorithm};
use chrono::{Utc, Duration};
use uuid::Uuid;

use crate::entities::token::Claims;
use crate::settings::{AppConfig, JwtKeys};
use crate::errors::AuthError;

const JWT_ALGORITHM: Algorithm = Algorithm::HS512;

/// Verifies bearer tokens issued by the identity service.
///
/// Minting is only used by tests and operator tooling; the service itself
/// never issues tokens.
#[derive(Clone)]
pub struct JwtService {
    keys: JwtKeys,
    access_expiration: Duration,
}

impl JwtService {
    pub fn new(config: &AppConfig) -> Self {
        JwtService {
            keys: JwtKeys::from(config),
            access_expiration: Duration::minutes(config.jwt_expiration_minutes),
        }
    }

    pub fn create_jwt(&self, owner_id: &Uuid, role: &str) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = (now + self.access_expiration).timestamp() as usize;

        let claims = Claims {
            sub: owner_id.to_string(),
            role: role.to_string(),
            exp,
            iat: now.timestamp() as usize,
        };

        encode(&Header::new(JWT_ALGORITHM), &claims, &self.keys.encoding)
            .map_err(|_| AuthError::TokenCreation)
    }

    pub fn decode_jwt(&self, token: &str) -> Result<TokenData<Claims>, AuthError> {
        let mut validation = Validation::new(JWT_ALGORITHM);
        validation.validate_exp = true;

        decode::<Claims>(
            token,
            &self.keys.decoding,
            &validation
        )
        .map_err(AuthError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{AppEnvironment, UploadSettings};

    fn config(secret: &str, minutes: i64) -> AppConfig {
        AppConfig {
            env: AppEnvironment::Testing,
            name: "test".into(),
            port: 0,
            host: "127.0.0.1".into(),
            worker_count: 1,
            database_url: "memory".into(),
            jwt_secret: secret.into(),
            jwt_expiration_minutes: minutes,
            maintenance_interval_secs: 60,
            upload: UploadSettings::default(),
        }
    }

    #[test]
    fn round_trips_owner_and_role() {
        let service = JwtService::new(&config("test_jwt_secret_that_is_long_enough_for_hs512", 5));
        let owner = Uuid::new_v4();

        let token = service.create_jwt(&owner, "admin").unwrap();
        let claims = service.decode_jwt(&token).unwrap().claims;
        let requester = claims.requester().unwrap();

        assert_eq!(requester.owner_id, owner);
        assert!(requester.is_admin());
    }

    #[test]
    fn rejects_tokens_signed_with_another_secret() {
        let issuer = JwtService::new(&config("one_secret_that_is_definitely_long_enough_1234", 5));
        let verifier = JwtService::new(&config("another_secret_that_is_definitely_long_enough", 5));

        let token = issuer.create_jwt(&Uuid::new_v4(), "user").unwrap();
        assert!(matches!(verifier.decode_jwt(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn rejects_expired_tokens() {
        let service = JwtService::new(&config("test_jwt_secret_that_is_long_enough_for_hs512", -10));

        let token = service.create_jwt(&Uuid::new_v4(), "user").unwrap();
        assert!(matches!(service.decode_jwt(&token), Err(AuthError::TokenExpired)));
    }
}
