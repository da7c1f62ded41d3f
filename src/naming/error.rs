//! 命名服务客户端错误类型

/// 命名服务客户端错误
#[derive(Debug, thiserror::Error)]
pub enum NamingError {
    #[cfg(feature = "http")]
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned error: status={status}, body={body}")]
    Server { status: u16, body: String },

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("no naming server configured")]
    NoServers,

    #[error("invalid param: {0}")]
    InvalidParam(String),
}

pub type Result<T> = std::result::Result<T, NamingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NamingError::NoServers;
        assert_eq!(err.to_string(), "no naming server configured");

        let err = NamingError::Server {
            status: 500,
            body: "internal error".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "server returned error: status=500, body=internal error"
        );

        let err = NamingError::InvalidParam("serviceName is empty".to_string());
        assert_eq!(err.to_string(), "invalid param: serviceName is empty");
    }

    #[test]
    fn test_from_serde_error() {
        let parse_err = serde_json::from_str::<u32>("not-a-number").unwrap_err();
        let err: NamingError = parse_err.into();
        assert!(matches!(err, NamingError::Decode(_)));
    }
}
