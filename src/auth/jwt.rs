use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;

const DEFAULT_TOKEN_TTL_MINUTES: i64 = 60;

#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: Option<String>,
    audience: String,
}

impl JwtService {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        if config.jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }

        Ok(Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
        })
    }

    pub fn generate_token(&self, user_id: Uuid, email: Option<&str>, role: &str) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::minutes(DEFAULT_TOKEN_TTL_MINUTES);
        let claims = Claims {
            sub: user_id,
            email: email.map(str::to_owned),
            role: Some(role.to_owned()),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(&[self.audience.clone()]);
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer.clone()]);
        }
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    pub aud: String,
    pub iat: usize,
    pub exp: usize,
}
