//! Mapping from HTTP and client errors to [`ErrorKind`] tags.
//!
//! | source | tag |
//! |---|---|
//! | status 404, 410 | `content_not_found` |
//! | status 401, 407 | `auth_required` |
//! | status 408, 504, client timeout | `timeout` |
//! | DNS resolution failure | `host_not_found` |
//! | connect failure, interrupted body | `connection_lost` |
//! | anything else | `other` |

use crate::item::ErrorKind;

use reqwest::StatusCode;
use std::error::Error as StdError;

/// Tag for a non-success status, `None` for 2xx.
pub fn classify_status(status: StatusCode) -> Option<ErrorKind> {
    if status.is_success() {
        return None;
    }
    let kind = match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => ErrorKind::ContentNotFound,
        StatusCode::UNAUTHORIZED | StatusCode::PROXY_AUTHENTICATION_REQUIRED => {
            ErrorKind::AuthRequired
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ErrorKind::Timeout,
        _ => ErrorKind::Other,
    };
    Some(kind)
}

/// Tag for an error raised by reqwest.
pub fn classify_reqwest_error(error: &reqwest::Error) -> ErrorKind {
    if error.is_timeout() {
        return ErrorKind::Timeout;
    }
    if is_dns_failure(error) {
        return ErrorKind::HostNotFound;
    }
    if error.is_connect() {
        return ErrorKind::ConnectionLost;
    }
    if let Some(kind) = error.status().and_then(classify_status) {
        return kind;
    }
    if error.is_body() || error.is_decode() || error.is_request() {
        return ErrorKind::ConnectionLost;
    }
    ErrorKind::Other
}

/// Tag for an error raised by the middleware stack.
pub fn classify_middleware_error(error: &reqwest_middleware::Error) -> ErrorKind {
    match error {
        reqwest_middleware::Error::Reqwest(e) => classify_reqwest_error(e),
        reqwest_middleware::Error::Middleware(e) => e
            .downcast_ref::<reqwest::Error>()
            .map(classify_reqwest_error)
            .unwrap_or(ErrorKind::Other),
    }
}

// Resolver failures are only visible in the error chain text.
fn is_dns_failure(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(e) = current {
        let text = e.to_string().to_ascii_lowercase();
        if text.contains("dns error")
            || text.contains("failed to lookup address")
            || text.contains("name or service not known")
            || text.contains("no such host")
        {
            return true;
        }
        current = e.source();
    }
    false
}
