use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Timed out waiting for {what} on page {page}")]
    PageTimeout { page: u32, what: &'static str },

    #[error("Csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Fragment schema mismatch: {0}")]
    Schema(String),

    #[error("No data found: {0}")]
    NoData(String),

    #[error("Identifier mismatch between datapoints and metadata: {0}")]
    Consistency(String),

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<chromiumoxide::error::CdpError> for Error {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        Error::Browser(e.to_string())
    }
}
