use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("network error: {0}")]
    Network(String),
    #[error("annotation service returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("invalid annotation response: {0}")]
    InvalidResponse(String),
}
