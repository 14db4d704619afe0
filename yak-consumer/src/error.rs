use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error talking to broker: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("broker rejected request: {status}: {message}")]
    Rejected {
        status: reqwest::StatusCode,
        message: String,
    },

    #[error("local state I/O failure: {0}")]
    State(#[from] std::io::Error),
}
