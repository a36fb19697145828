//! Binary allow/deny gate for privileged operations (`X-api-key: user=key`).

use tracing::warn;

use crate::error::ApiError;

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone, Default)]
pub struct ApiKeyGate {
    expected: Option<(String, String)>,
}

impl ApiKeyGate {
    /// `raw` is the configured `user=key` pair. A missing or malformed value
    /// yields a gate that refuses everything.
    pub fn from_config(raw: Option<&str>) -> Self {
        let expected = raw.and_then(|v| match v.split_once('=') {
            Some((user, key)) if !user.is_empty() && !key.is_empty() => Some((user.to_string(), key.to_string())),
            _ => { warn!("api_key is not a user=key pair; privileged operations are disabled"); None }
        });
        Self { expected }
    }

    pub fn is_configured(&self) -> bool { self.expected.is_some() }

    /// Unknown user or unparseable key is 401, right user with the wrong key is 403.
    pub fn check(&self, presented: Option<&str>) -> Result<(), ApiError> {
        let Some((user, key)) = &self.expected else {
            return Err(ApiError::forbidden("Privileged operations are disabled on this service"));
        };
        let (p_user, p_key) = presented.and_then(|p| p.split_once('=')).ok_or_else(ApiError::unauthorized)?;
        if p_user != user.as_str() { return Err(ApiError::unauthorized()); }
        if p_key != key.as_str() { return Err(ApiError::forbidden("The API key is not valid")); }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn status(gate: &ApiKeyGate, presented: Option<&str>) -> StatusCode {
        gate.check(presented).err().map(|e| e.status).unwrap_or(StatusCode::OK)
    }

    #[test]
    fn gate_outcomes() {
        let gate = ApiKeyGate::from_config(Some("admin=s3cret"));
        assert!(gate.is_configured());
        assert_eq!(status(&gate, Some("admin=s3cret")), StatusCode::OK);
        assert_eq!(status(&gate, Some("user=s3cret")), StatusCode::UNAUTHORIZED);
        assert_eq!(status(&gate, Some("admin")), StatusCode::UNAUTHORIZED);
        assert_eq!(status(&gate, None), StatusCode::UNAUTHORIZED);
        assert_eq!(status(&gate, Some("admin=APIKEY")), StatusCode::FORBIDDEN);
    }

    #[test]
    fn unconfigured_gate_denies() {
        for raw in [None, Some("no-separator"), Some("=key")] {
            let gate = ApiKeyGate::from_config(raw);
            assert!(!gate.is_configured());
            assert_eq!(status(&gate, Some("admin=s3cret")), StatusCode::FORBIDDEN);
        }
    }
}
