// Session/JWT extraction (spec.md §1 "out of scope: session/JWT issuance",
// §6 "their interfaces with the core are specified here"). The core only
// consumes a bearer token and trusts its `sub` claim as `user_id`; issuing
// and refreshing tokens is the external auth subsystem's job.

use actix_web::{dev::Payload, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;

use crate::config::get_config;
use crate::errors::Error;

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    pod: Option<String>,
}

/// The authenticated caller, if any. Anonymous requests are allowed through
/// to the permission engine, which treats `user` as `None`.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub user_id: Option<String>,
    /// The token's `pod` claim, if any; `None` means the token is not
    /// scoped to a single pod.
    pub pod_scope: Option<String>,
}

impl SessionContext {
    pub fn require_user(&self) -> Result<&str, Error> {
        self.user_id.as_deref().ok_or(Error::Unauthorized)
    }

    /// Enforces the token's pod scope, if it carries one (spec.md §6).
    pub fn check_pod_scope(&self, pod: &str) -> Result<(), Error> {
        match &self.pod_scope {
            Some(scoped) if scoped != pod => Err(Error::PodMismatch),
            _ => Ok(()),
        }
    }
}

fn extract_bearer(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

fn decode_claims(token: &str) -> Result<Claims, Error> {
    let cfg = get_config();
    let key = DecodingKey::from_secret(cfg.jwt_secret.as_bytes());
    let data = decode::<Claims>(token, &key, &Validation::default())
        .map_err(|_| Error::Unauthorized)?;
    Ok(data.claims)
}

impl FromRequest for SessionContext {
    type Error = Error;
    type Future = Ready<Result<Self, Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let outcome = match extract_bearer(req) {
            None => Ok(SessionContext::default()),
            Some(token) => decode_claims(&token).map(|claims| SessionContext {
                user_id: Some(claims.sub),
                pod_scope: claims.pod,
            }),
        };
        ready(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_user_is_unauthorized() {
        let ctx = SessionContext::default();
        assert!(matches!(ctx.require_user(), Err(Error::Unauthorized)));
    }

    #[test]
    fn mismatched_pod_scope_is_rejected() {
        let ctx = SessionContext {
            user_id: Some("alice".to_string()),
            pod_scope: Some("alice-blog".to_string()),
        };
        assert!(ctx.check_pod_scope("alice-blog").is_ok());
        assert!(matches!(
            ctx.check_pod_scope("other-pod"),
            Err(Error::PodMismatch)
        ));
    }
}
