//! Signed session tokens
//!
//! Sessions travel as HS256 JSON Web Tokens, the same format the `jsonwebtoken`
//! npm package produces with `jwt.sign(payload, secret)`:
//! `base64url(header) + "." + base64url(claims) + "." + base64url(hmac_sha256(...))`,
//! all without padding. The base64url alphabet never contains `=`, so a token can
//! sit in a cookie that is split on the first `=`.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;

use crate::error::SessionError;

type HmacSha256 = Hmac<Sha256>;

const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;
const ALGORITHM: &str = "HS256";

/// Keyed signing service that turns claims into an opaque token and back.
///
/// `verify` must fail on a bad signature, an expired token or a malformed
/// structure. Session storage treats every such failure as "no session".
pub trait TokenSigner: Send + Sync + 'static {
    /// Sign a JSON object, producing a token string
    fn sign(&self, claims: &Value, secret: &str) -> Result<String, SessionError>;

    /// Verify a token and return its claims
    fn verify(&self, token: &str, secret: &str) -> Result<Value, SessionError>;
}

#[derive(Deserialize)]
struct Header {
    alg: String,
}

/// HS256 JWT signer
#[derive(Clone, Debug, Default)]
pub struct JwtSigner {
    ttl_secs: Option<u64>,
}

impl JwtSigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an `exp` claim `ttl_secs` after the issue time
    pub fn with_ttl(mut self, ttl_secs: impl Into<Option<u64>>) -> Self {
        self.ttl_secs = ttl_secs.into();
        self
    }

    fn mac(secret: &str) -> Result<HmacSha256, SessionError> {
        if secret.is_empty() {
            return Err(SessionError::InvalidSecret);
        }
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SessionError::InvalidSecret)
    }
}

impl TokenSigner for JwtSigner {
    fn sign(&self, claims: &Value, secret: &str) -> Result<String, SessionError> {
        let mut claims = match claims {
            Value::Object(map) => map.clone(),
            other => {
                return Err(SessionError::SerializationError(format!(
                    "token claims must be a JSON object, got {}",
                    other
                )))
            }
        };

        let issued_at = Utc::now().timestamp();
        claims.insert("iat".to_string(), issued_at.into());
        if let Some(ttl) = self.ttl_secs {
            let expires_at = i64::try_from(ttl)
                .ok()
                .and_then(|ttl| issued_at.checked_add(ttl))
                .ok_or(SessionError::InvalidTtl(ttl))?;
            claims.insert("exp".to_string(), expires_at.into());
        }

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(HEADER),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
        );

        let mut mac = Self::mac(secret)?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", signing_input, signature))
    }

    fn verify(&self, token: &str, secret: &str) -> Result<Value, SessionError> {
        let mut mac = Self::mac(secret)?;

        let mut parts = token.split('.');
        let (header, claims, signature) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(h), Some(c), Some(s), None) => (h, c, s),
            _ => {
                return Err(SessionError::MalformedToken(
                    "expected three dot-separated segments".to_string(),
                ))
            }
        };

        let decoded: Header = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header)?)
            .map_err(|e| SessionError::MalformedToken(e.to_string()))?;
        if decoded.alg != ALGORITHM {
            return Err(SessionError::MalformedToken(format!(
                "unsupported algorithm {}",
                decoded.alg
            )));
        }

        // verify_slice compares in constant time
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(claims.as_bytes());
        mac.verify_slice(&URL_SAFE_NO_PAD.decode(signature)?)
            .map_err(|_| SessionError::InvalidSignature)?;

        let claims: Value = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(claims)?)
            .map_err(|e| SessionError::MalformedToken(e.to_string()))?;

        if let Some(exp) = claims.get("exp").and_then(Value::as_i64) {
            if Utc::now().timestamp() >= exp {
                return Err(SessionError::Expired);
            }
        }

        Ok(claims)
    }
}
