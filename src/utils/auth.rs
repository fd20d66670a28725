use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::env;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub mobile: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, mobile: String) -> Self {
        let now = Utc::now();
        let exp = now + Duration::hours(24); // Token expires in 24 hours

        Self {
            sub: user_id.to_string(),
            mobile,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        }
    }
}

pub fn create_token(user_id: Uuid, mobile: String) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims::new(user_id, mobile);
    let secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

pub fn verify_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

pub fn hash_pin(pin: &str) -> Result<String, bcrypt::BcryptError> {
    hash(pin, DEFAULT_COST)
}

pub fn verify_pin(pin: &str, pin_hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(pin, pin_hash)
}

/// PINs are exactly four ASCII digits.
pub fn is_valid_pin(pin: &str) -> bool {
    pin.len() == 4 && pin.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_format_requires_exactly_four_digits() {
        assert!(is_valid_pin("0000"));
        assert!(is_valid_pin("1234"));
        assert!(!is_valid_pin("123"));
        assert!(!is_valid_pin("12345"));
        assert!(!is_valid_pin("12a4"));
        assert!(!is_valid_pin(""));
        assert!(!is_valid_pin("١٢٣٤")); // non-ASCII digits
    }

    #[test]
    fn pin_hash_round_trip() {
        let hashed = hash_pin("4321").unwrap();
        assert!(verify_pin("4321", &hashed).unwrap());
        assert!(!verify_pin("1234", &hashed).unwrap());
    }

    #[test]
    fn token_round_trip_preserves_claims() {
        env::set_var("JWT_SECRET", "test-secret");

        let user_id = Uuid::new_v4();
        let token = create_token(user_id, "9876543210".to_string()).unwrap();
        let claims = verify_token(&token).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.mobile, "9876543210");
        assert!(claims.exp > claims.iat);
    }
}
