//! Claim codec — signs claim sets into compact HS256 JWTs and verifies them back.
//!
//! The codec checks structure, algorithm and signature only. Expiry is the
//! caller's concern (`TokenService::validate_token`).

use std::collections::HashSet;

use chrono::DateTime;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode,
};
use serde::Serialize;
use serde_json::{Map, Value};

use super::AuthError;
use crate::models::auth::{ClaimKind, ClaimType, Claims, Role};

const ALGORITHM: Algorithm = Algorithm::HS256;

/// JWT payload as it appears on the wire.
#[derive(Debug, Serialize)]
struct WireClaims<'a> {
    sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pid: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<Role>,
    #[serde(rename = "type")]
    claim_type: ClaimType,
    exp: i64,
    jti: &'a str,
}

/// Encodes and decodes signed claim sets with a shared secret.
#[derive(Clone)]
pub struct ClaimCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl ClaimCodec {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Sign `claims` into a compact token string.
    pub fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        let wire = WireClaims {
            sub: claims.subject_id.to_string(),
            pid: claims.delegated_provider_id(),
            role: claims.role(),
            claim_type: claims.claim_type(),
            exp: claims.expires_at.timestamp(),
            jti: &claims.jti,
        };
        encode(&Header::new(ALGORITHM), &wire, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    /// Verify `token` and decode its claims. Does not check expiry.
    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        let header = decode_header(token)
            .map_err(|e| AuthError::TokenFormat(format!("jwt header: {e}")))?;
        if header.alg != ALGORITHM {
            return Err(AuthError::TokenFormat(format!(
                "unsupported signing algorithm {:?}",
                header.alg
            )));
        }

        let data = decode::<Value>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                ErrorKind::Json(_) => AuthError::MalformedClaims(format!("jwt payload: {e}")),
                _ => AuthError::TokenFormat(format!("jwt decode: {e}")),
            }
        })?;

        match data.claims {
            Value::Object(map) => parse_claims(&map),
            _ => Err(AuthError::MalformedClaims("payload is not an object".into())),
        }
    }
}

fn malformed(msg: &str) -> AuthError {
    AuthError::MalformedClaims(msg.to_string())
}

fn parse_claims(map: &Map<String, Value>) -> Result<Claims, AuthError> {
    let subject_id = match map.get("sub") {
        Some(Value::String(s)) => s.parse::<i64>().ok(),
        Some(Value::Number(n)) => n.as_i64(),
        _ => None,
    }
    .ok_or_else(|| malformed("invalid subject"))?;

    let exp = map
        .get("exp")
        .and_then(Value::as_i64)
        .ok_or_else(|| malformed("invalid expiration"))?;
    let expires_at =
        DateTime::from_timestamp(exp, 0).ok_or_else(|| malformed("invalid expiration"))?;

    let jti = map
        .get("jti")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| malformed("invalid jti"))?
        .to_string();

    let claim_type = map
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("missing claim type"))?
        .parse::<ClaimType>()
        .map_err(AuthError::MalformedClaims)?;

    let kind = match claim_type {
        ClaimType::User => {
            let role = map
                .get("role")
                .and_then(Value::as_str)
                .ok_or_else(|| malformed("user claim without role"))?
                .parse::<Role>()
                .map_err(AuthError::MalformedClaims)?;
            ClaimKind::User { role }
        }
        ClaimType::Provider => {
            let provider_id = map
                .get("pid")
                .and_then(Value::as_i64)
                .ok_or_else(|| malformed("provider claim without provider id"))?;
            ClaimKind::Provider { provider_id }
        }
    };

    Ok(Claims {
        subject_id,
        kind,
        expires_at,
        jti,
    })
}
