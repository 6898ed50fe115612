use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to read document: {0}")]
    Acquisition(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Language model unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Model output did not conform to the {schema} schema: {details}")]
    SchemaMismatch { schema: String, details: String },

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Classification failed: {0}")]
    Classification(String),

    #[error("Insight generation failed: {0}")]
    Insight(String),

    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
