//! Error types for the API client and the controller

use thiserror::Error;

/// Failure talking to the tag-group service
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{path} returned HTTP {status}")]
    Status { path: String, status: u16 },

    #[error("unexpected response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Input rejected before any request is made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Enter a tag group name")]
    EmptyName,

    #[error("Select at least one member")]
    EmptySelection,

    #[error("No group is open")]
    NoGroupOpen,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_message() {
        let err = ApiError::Status {
            path: "/api/groups".to_string(),
            status: 502,
        };
        assert_eq!(err.to_string(), "/api/groups returned HTTP 502");
    }

    #[test]
    fn test_decode_error_keeps_source() {
        let source = serde_json::from_str::<Vec<u8>>("{").unwrap_err();
        let err = ApiError::Decode {
            path: "/api/members/1".to_string(),
            source,
        };
        assert!(err.to_string().starts_with("unexpected response from /api/members/1"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
