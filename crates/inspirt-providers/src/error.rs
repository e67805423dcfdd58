use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure: DNS, TLS, timeout, connection reset.
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-2xx status. `message` carries the
    /// provider's own error text when its body was parseable.
    #[error("{provider} returned {status}: {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    /// 2xx response whose body did not have the expected shape.
    #[error("unexpected {provider} response: {detail}")]
    InvalidResponse {
        provider: &'static str,
        detail: String,
    },
}
