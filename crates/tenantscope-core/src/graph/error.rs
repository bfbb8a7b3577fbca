use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Substrings Graph uses when the signed-in admin lacks a scope or role.
const PERMISSION_MARKERS: &[&str] = &[
    "Authorization_RequestDenied",
    "Insufficient privileges",
    "insufficient privileges",
    "AccessDenied",
    "Access denied",
    "Forbidden",
    "does not have the required permissions",
    "Missing scope",
    "missing scope",
];

#[derive(Debug, Deserialize)]
struct GraphErrorEnvelope {
    error: GraphErrorBody,
}

#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl GraphError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Prefer `code: message` from the Graph error envelope over the raw body.
    fn describe_body(body: &str) -> String {
        match serde_json::from_str::<GraphErrorEnvelope>(body) {
            Ok(envelope) => match (envelope.error.code, envelope.error.message) {
                (Some(code), Some(message)) => format!("{}: {}", code, message),
                (Some(code), None) => code,
                (None, Some(message)) => message,
                (None, None) => Self::truncate_body(body),
            },
            Err(_) => Self::truncate_body(body),
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let detail = Self::describe_body(body);
        match status.as_u16() {
            401 => GraphError::Unauthorized,
            403 => GraphError::AccessDenied(detail),
            404 => GraphError::NotFound(detail),
            429 => GraphError::RateLimited,
            500..=599 => GraphError::ServerError(detail),
            _ => GraphError::InvalidResponse(format!("Status {}: {}", status, detail)),
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        match self {
            GraphError::AccessDenied(_) => true,
            GraphError::InvalidResponse(msg) | GraphError::ServerError(msg) => {
                message_indicates_permission(msg)
            }
            _ => false,
        }
    }
}

fn message_indicates_permission(message: &str) -> bool {
    PERMISSION_MARKERS.iter().any(|marker| message.contains(marker))
}

/// Whether an error chain means the admin lacks the Graph scope or role for a call.
pub fn is_permission_denied(err: &anyhow::Error) -> bool {
    if let Some(graph) = err.downcast_ref::<GraphError>() {
        return graph.is_permission_denied();
    }
    err.chain()
        .any(|cause| message_indicates_permission(&cause.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_parses_envelope() {
        let body = r#"{"error":{"code":"Authorization_RequestDenied","message":"Insufficient privileges to complete the operation."}}"#;
        let err = GraphError::from_status(StatusCode::FORBIDDEN, body);
        match &err {
            GraphError::AccessDenied(msg) => {
                assert!(msg.starts_with("Authorization_RequestDenied: Insufficient"));
            }
            other => panic!("unexpected variant {:?}", other),
        }
        assert!(err.is_permission_denied());
    }

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(
            GraphError::from_status(StatusCode::UNAUTHORIZED, ""),
            GraphError::Unauthorized
        ));
        assert!(matches!(
            GraphError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            GraphError::RateLimited
        ));
        assert!(matches!(
            GraphError::from_status(StatusCode::BAD_GATEWAY, "oops"),
            GraphError::ServerError(_)
        ));
        assert!(matches!(
            GraphError::from_status(StatusCode::BAD_REQUEST, "bad"),
            GraphError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "x".repeat(MAX_ERROR_BODY_LENGTH + 20);
        let err = GraphError::from_status(StatusCode::NOT_FOUND, &body);
        let GraphError::NotFound(msg) = err else {
            panic!("expected NotFound");
        };
        assert!(msg.contains("truncated, 520 total bytes"));
    }

    #[test]
    fn test_permission_detection_on_anyhow_chain() {
        let direct: anyhow::Error = GraphError::AccessDenied("nope".to_string()).into();
        assert!(is_permission_denied(&direct));

        let wrapped = anyhow::anyhow!("Insufficient privileges to complete the operation.")
            .context("Failed to fetch sign-in logs");
        assert!(is_permission_denied(&wrapped));

        let bad_request = GraphError::InvalidResponse(
            "Status 400: Request_UnsupportedQuery".to_string(),
        );
        assert!(!bad_request.is_permission_denied());

        let not_found: anyhow::Error = GraphError::NotFound("gone".to_string()).into();
        assert!(!is_permission_denied(&not_found));
    }
}
