use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("detector misconfigured: {0}")]
    Config(String),
    #[error("inference request failed")]
    Http(#[from] reqwest::Error),
    #[error("inference endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("inference response is not valid JSON")]
    Decode(#[from] serde_json::Error),
    #[error("failed to encode image for upload")]
    Encode(#[from] image::ImageError),
    #[error("failed to read {path:?}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("model error: {0}")]
    Model(String),
}
