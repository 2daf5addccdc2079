//! Grepable error codes shared by the engine and the relay server.

/// Stable machine-readable code for an error, e.g. `"E_TOKEN_NOT_FOUND"`.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}
