use axum::http::{HeaderMap, StatusCode};

use super::shared::{CallerIdentity, ErrorKind};

/// Header carrying the user id resolved by the upstream auth gateway.
pub const CALLER_HEADER: &str = "x-user-id";

pub fn caller_from_headers(headers: &HeaderMap) -> CallerIdentity {
    headers
        .get(CALLER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(CallerIdentity::user)
        .unwrap_or(CallerIdentity::Anonymous)
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::ValidationFailed => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::PersistenceFailure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
