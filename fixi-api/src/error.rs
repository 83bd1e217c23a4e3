use std::fmt::Display;
use thiserror::Error;

/// レスポンス本文の読み取りで発生した下位エラー
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Unsupported parameter type: field `{field}` has unsupported kind {kind}")]
    UnsupportedParameterType { field: String, kind: &'static str },

    #[error("Invalid response: could not read {type_name} from the response body")]
    InvalidResponse {
        type_name: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("Unsupported media type `{content_type}` for {type_name}")]
    UnsupportedMediaType {
        content_type: String,
        type_name: &'static str,
    },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl Error {
    /// キャンセルによる失敗かどうか
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// 通信層（接続・タイムアウト・非2xx）の失敗かどうか
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::RequestFailed(_) | Error::ApiError { .. })
    }

    /// レスポンスのデシリアライズ失敗かどうか
    pub fn is_invalid_response(&self) -> bool {
        matches!(self, Error::InvalidResponse { .. })
    }

    /// 非2xxレスポンスのステータスコード
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::ApiError { status, .. } => Some(*status),
            Error::RequestFailed(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl serde::ser::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        Error::SerializationError(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_predicates() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(!Error::Cancelled.is_transport());

        let api = Error::ApiError {
            status: 404,
            message: "not found".to_string(),
        };
        assert!(api.is_transport());
        assert_eq!(api.status(), Some(404));

        let invalid = Error::InvalidResponse {
            type_name: "fixi_api::models::Issue",
            source: "boom".into(),
        };
        assert!(invalid.is_invalid_response());
        assert_eq!(invalid.status(), None);
    }

    #[test]
    fn test_invalid_response_keeps_source() {
        use std::error::Error as _;

        let parse_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = Error::InvalidResponse {
            type_name: "alloc::string::String",
            source: Box::new(parse_error),
        };

        assert!(error.to_string().contains("alloc::string::String"));
        assert!(error.source().is_some());
    }
}
