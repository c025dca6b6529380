//! Caller role extraction.
//!
//! Authentication happens upstream; by the time a request reaches the API
//! the gateway has resolved the caller to a single role and forwarded it
//! in the `X-User-Role` header.

use std::str::FromStr;

use axum::{extract::FromRequestParts, http::request::Parts};

use super::models::Role;
use crate::errors::ApiError;

pub const ROLE_HEADER: &str = "x-user-role";

/// The role of the authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerRole(pub Role);

impl CallerRole {
    /// Reject the request with 403 unless the caller holds one of `allowed`.
    pub fn require(&self, allowed: &[Role]) -> Result<Role, ApiError> {
        if allowed.contains(&self.0) {
            Ok(self.0)
        } else {
            tracing::debug!(role = %self.0, "role not permitted for endpoint");
            Err(ApiError::Forbidden(format!(
                "Role {} is not allowed to access this resource",
                self.0
            )))
        }
    }
}

impl<S> FromRequestParts<S> for CallerRole
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(ROLE_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("Missing role header".into()))?;
        let text = value
            .to_str()
            .map_err(|_| ApiError::Unauthorized("Role header is not valid text".into()))?;
        Role::from_str(text)
            .map(CallerRole)
            .map_err(ApiError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<CallerRole, ApiError> {
        let mut builder = Request::builder().uri("/api/orders/1/selection");
        if let Some(value) = header {
            builder = builder.header(ROLE_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        CallerRole::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_extracts_plain_and_prefixed_roles() {
        assert_eq!(extract(Some("MACHINING")).await.unwrap().0, Role::Machining);
        assert_eq!(extract(Some("ROLE_ADMIN")).await.unwrap().0, Role::Admin);
    }

    #[tokio::test]
    async fn test_missing_or_unknown_role_is_unauthorized() {
        assert!(matches!(extract(None).await, Err(ApiError::Unauthorized(_))));
        assert!(matches!(extract(Some("JANITOR")).await, Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn test_require_checks_membership() {
        let caller = CallerRole(Role::Inspection);
        assert_eq!(caller.require(&[Role::Admin, Role::Inspection]).unwrap(), Role::Inspection);
        assert!(matches!(caller.require(&[Role::Admin]), Err(ApiError::Forbidden(_))));
    }
}
