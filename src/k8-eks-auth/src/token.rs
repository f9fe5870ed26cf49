use std::fmt;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;

use crate::AuthError;
use crate::PresignedRequest;

/// every EKS bearer token starts with this
pub const TOKEN_PREFIX: &str = "k8s-aws-v1.";

/// lifetime EKS grants a token, less a minute of slack
pub const TOKEN_TTL: Duration = Duration::from_secs(14 * 60);

/// opaque bearer credential accepted by the EKS api server
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken {
    value: String,
    minted_at: DateTime<Utc>,
    ttl_hint: Duration,
}

impl BearerToken {
    /// wrap a presigned identity request
    pub fn from_presigned(request: &PresignedRequest) -> Self {
        Self {
            value: encode_presigned_url(&request.url),
            minted_at: request.signed_at,
            ttl_hint: TOKEN_TTL,
        }
    }

    /// accept a token produced elsewhere, rejecting anything without the prefix
    pub fn from_value(
        value: impl Into<String>,
        minted_at: DateTime<Utc>,
        ttl_hint: Duration,
    ) -> Result<Self, AuthError> {
        let value = value.into();
        validate(&value)?;
        Ok(Self {
            value,
            minted_at,
            ttl_hint,
        })
    }

    /// re-check the wire prefix of a token handed over by a strategy
    pub fn validated(self) -> Result<Self, AuthError> {
        validate(&self.value)?;
        Ok(self)
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn minted_at(&self) -> DateTime<Utc> {
        self.minted_at
    }

    pub fn ttl_hint(&self) -> Duration {
        self.ttl_hint
    }

    /// RFC 3339 instant after which the token should not be used
    pub fn expiration_timestamp(&self) -> String {
        let ttl =
            chrono::Duration::from_std(self.ttl_hint).unwrap_or_else(|_| chrono::Duration::zero());
        (self.minted_at + ttl).to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// recover the presigned url carried by the token
    pub fn presigned_url(&self) -> Result<String, AuthError> {
        decode_presigned_url(&self.value)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BearerToken")
            .field("value", &format_args!("{TOKEN_PREFIX}** redacted **"))
            .field("minted_at", &self.minted_at)
            .field("ttl_hint", &self.ttl_hint)
            .finish()
    }
}

pub fn encode_presigned_url(url: &str) -> String {
    format!("{}{}", TOKEN_PREFIX, URL_SAFE_NO_PAD.encode(url))
}

pub fn decode_presigned_url(token: &str) -> Result<String, AuthError> {
    let payload = token
        .strip_prefix(TOKEN_PREFIX)
        .ok_or_else(|| AuthError::decode("token", format!("missing {TOKEN_PREFIX} prefix")))?;
    // some producers keep the padding
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|err| AuthError::decode("token", err))?;
    String::from_utf8(bytes).map_err(|err| AuthError::decode("token", err))
}

fn validate(value: &str) -> Result<(), AuthError> {
    match value.strip_prefix(TOKEN_PREFIX) {
        Some(payload) if !payload.is_empty() => Ok(()),
        _ => Err(AuthError::decode(
            "token",
            format!("expected {TOKEN_PREFIX} prefix followed by payload"),
        )),
    }
}
