use thiserror::Error;

/// Error types for the document cleaning and recommendation pipeline
///
/// Cleaning stages themselves are total and never produce these; only
/// structurally required inputs (file type, corpus schema, configuration)
/// and external collaborators can fail.
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Unsupported input format for '{file_name}': {detected}")]
    InputFormat { file_name: String, detected: String },

    #[error("Text extraction failed for {file_type} document: {causes}")]
    Extraction { file_type: String, causes: String },

    #[error("Historical corpus '{source_name}' is missing required columns: {}", missing.join(", "))]
    Schema { source_name: String, missing: Vec<String> },

    #[error("Invalid historical sample at row {row}: {reason}")]
    InvalidSample { row: usize, reason: String },

    #[error("Historical corpus is empty; nothing to fit")]
    EmptyCorpus,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Collaborator '{stage}' failed: {message}")]
    Collaborator { stage: String, message: String },

    #[error("Parallel processing error: {0}")]
    ParallelError(String),
}
