use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::Serialize;

/// Typed failure taxonomy for every use case. Each kind is recovered at the
/// HTTP boundary and rendered as the standard error envelope; nothing
/// propagates as an unhandled fault.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or malformed field for the requested transition. The message
    /// names the offending field so the caller can fix the input.
    #[error("{0}")]
    Validation(String),

    /// Actor's role lacks the capability. Deliberately terse: the body never
    /// explains which role would have been allowed.
    #[error("forbidden")]
    Authorization,

    /// The record left the state that permitted this transition (already
    /// adjudicated, application already decided). Distinct from Validation:
    /// the input was fine, the caller was too late.
    #[error("{0}")]
    Conflict(String),

    /// Classification, storage, or record-store failure/timeout. Never
    /// retried inside the core.
    #[error("{0}")]
    Collaborator(String),

    #[error("{0} not found")]
    NotFound(&'static str),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Authorization => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Collaborator(_) => StatusCode::BAD_GATEWAY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "ValidationError",
            ApiError::Authorization => "Forbidden",
            ApiError::Conflict(_) => "Conflict",
            ApiError::Collaborator(_) => "CollaboratorUnavailable",
            ApiError::NotFound(_) => "NotFound",
        }
    }

    pub fn into_response(self) -> Result<Response<Body>, Error> {
        let envelope = ErrorResponse {
            error: self.kind().to_string(),
            message: self.to_string(),
        };
        Ok(Response::builder()
            .status(self.status())
            .header("Content-Type", "application/json")
            .header("Access-Control-Allow-Origin", "*")
            .body(serde_json::to_string(&envelope)?.into())
            .map_err(Box::new)?)
    }
}

/// Standard JSON response used by every endpoint.
pub fn json_response<T: Serialize>(
    status: StatusCode,
    payload: &T,
) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::to_string(payload)?.into())
        .map_err(Box::new)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Authorization.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::Collaborator("x".into()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(ApiError::NotFound("account").status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_authorization_stays_terse() {
        let err = ApiError::Authorization;
        assert_eq!(err.to_string(), "forbidden");
    }
}
