use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;
pub type ConfigError = Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Feed parsing error: {0}")]
    FeedParse(String),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image decode error: {0}")]
    ImageDecode(String),

    #[error("Response too large: {0}")]
    ResponseTooLarge(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid: {0}")]
    Invalid(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl Error {
    pub fn is_temporary(&self) -> bool {
        matches!(
            self,
            Error::HttpError(_) | Error::Timeout(_) | Error::Io(_)
        )
    }

    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidUrl(_) | Error::Config(_) | Error::Invalid(_)
        )
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Error::FeedParse(_) => "FEED_PARSE",
            Error::HttpError(_) => "HTTP_ERROR",
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::Timeout(_) => "TIMEOUT",
            Error::Io(_) => "IO_ERROR",
            Error::Serialization(_) => "SERIALIZATION",
            Error::Config(_) => "CONFIG",
            Error::ImageDecode(_) => "IMAGE_DECODE",
            Error::ResponseTooLarge(_) => "RESPONSE_TOO_LARGE",
            Error::NotFound(_) => "NOT_FOUND",
            Error::AlreadyExists(_) => "ALREADY_EXISTS",
            Error::Invalid(_) => "INVALID",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporary_classification() {
        assert!(Error::Timeout("slow".into()).is_temporary());
        assert!(Error::HttpError("503".into()).is_temporary());
        assert!(!Error::FeedParse("bad".into()).is_temporary());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::ImageDecode("x".into()).error_code(), "IMAGE_DECODE");
        assert_eq!(Error::Config("x".into()).error_code(), "CONFIG");
        assert!(Error::InvalidUrl("x".into()).is_user_error());
    }

    #[test]
    fn test_toml_error_maps_to_config() {
        let err: Error = toml::from_str::<toml::Value>("not = = toml").unwrap_err().into();
        assert!(matches!(err, Error::Config(_)));
    }
}
