//! Bearer token authorization for the control plane

use hyper::header::{HeaderMap, AUTHORIZATION};
use subtle::ConstantTimeEq;

use crate::error::ApiError;

const BEARER_SCHEME: &str = "Bearer";

/// Checks requests against the single configured token
#[derive(Clone)]
pub struct BearerAuth {
    token: String,
}

impl BearerAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Authorize a request by its headers
    pub fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let header = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        self.check_header(header)
    }

    /// Authorize a raw `Authorization` header value
    pub fn check_header(&self, header: Option<&str>) -> Result<(), ApiError> {
        let header = match header {
            Some(h) if h.starts_with(BEARER_SCHEME) => h,
            _ => return Err(ApiError::MissingCredential),
        };

        let presented = extract_token(header);
        if bool::from(presented.as_bytes().ct_eq(self.token.as_bytes())) {
            Ok(())
        } else {
            Err(ApiError::InvalidCredential)
        }
    }
}

impl std::fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerAuth").field("token", &"<redacted>").finish()
    }
}

/// Extract the credential from a header carrying the bearer scheme.
/// Anything but `Bearer <token>` yields the whole header, which never matches.
fn extract_token(header: &str) -> &str {
    header
        .strip_prefix(BEARER_SCHEME)
        .and_then(|rest| rest.strip_prefix(' '))
        .unwrap_or(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;
    use proptest::prelude::*;

    #[test]
    fn test_missing_header() {
        let auth = BearerAuth::new("secret");
        assert!(matches!(
            auth.authorize(&HeaderMap::new()),
            Err(ApiError::MissingCredential)
        ));
    }

    #[test]
    fn test_wrong_scheme() {
        let auth = BearerAuth::new("secret");
        assert!(matches!(
            auth.check_header(Some("Basic c2VjcmV0")),
            Err(ApiError::MissingCredential)
        ));
        assert!(matches!(
            auth.check_header(Some("bearer secret")),
            Err(ApiError::MissingCredential)
        ));
    }

    #[test]
    fn test_valid_token() {
        let auth = BearerAuth::new("secret");
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer secret"));
        assert!(auth.authorize(&headers).is_ok());
    }

    #[test]
    fn test_mismatched_token() {
        let auth = BearerAuth::new("secret");
        assert!(matches!(
            auth.check_header(Some("Bearer wrong")),
            Err(ApiError::InvalidCredential)
        ));
        assert!(matches!(
            auth.check_header(Some("Bearer secret ")),
            Err(ApiError::InvalidCredential)
        ));
        assert!(matches!(
            auth.check_header(Some("Bearersecret")),
            Err(ApiError::InvalidCredential)
        ));
        assert!(matches!(
            auth.check_header(Some("Bearer")),
            Err(ApiError::InvalidCredential)
        ));
    }

    #[test]
    fn test_repeated_scheme_not_stripped() {
        let auth = BearerAuth::new("secret");
        // Only one "Bearer " prefix is removed, leaving "Bearer secret"
        assert!(matches!(
            auth.check_header(Some("Bearer Bearer secret")),
            Err(ApiError::InvalidCredential)
        ));

        // Same token configured literally is accepted
        let auth = BearerAuth::new("Bearer secret");
        assert!(auth.check_header(Some("Bearer Bearer secret")).is_ok());
    }

    #[test]
    fn test_non_utf8_header_is_missing() {
        let auth = BearerAuth::new("secret");
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_bytes(b"Bearer \xffsecret").unwrap(),
        );
        assert!(matches!(
            auth.authorize(&headers),
            Err(ApiError::MissingCredential)
        ));
    }

    #[test]
    fn test_debug_redacts_token() {
        let auth = BearerAuth::new("secret");
        assert!(!format!("{:?}", auth).contains("secret"));
    }

    proptest! {
        #[test]
        fn prop_authorized_iff_token_matches(
            configured in "[A-Za-z0-9._~+/-]{1,32}",
            presented in "[A-Za-z0-9._~+/-]{0,32}"
        ) {
            let auth = BearerAuth::new(configured.clone());
            let header = format!("Bearer {}", presented);
            let result = auth.check_header(Some(&header));
            prop_assert_eq!(result.is_ok(), presented == configured);
        }

        #[test]
        fn prop_unprefixed_header_rejected(
            configured in "[A-Za-z0-9]{1,32}",
            scheme in "(Basic|Token|Digest|bearer)"
        ) {
            let auth = BearerAuth::new(configured.clone());
            let header = format!("{} {}", scheme, configured);
            prop_assert!(matches!(
                auth.check_header(Some(&header)),
                Err(ApiError::MissingCredential)
            ));
        }
    }
}
