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

    #[error("retries exhausted talking to the cluster")]
    RetriesExhausted,

    #[error("local bookkeeping I/O failure: {0}")]
    Journal(#[from] std::io::Error),
}
