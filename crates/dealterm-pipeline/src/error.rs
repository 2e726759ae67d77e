//! Pipeline error taxonomy.
//!
//! Transport, malformed-output, and schema errors from the classifier are
//! contained per batch; the same errors from the extractor are fatal for the
//! run. Content problems (missing price, absent parties) are never errors;
//! they travel in the `ValidationReport`.

use thiserror::Error;

use dealterm_llm::{ConfigError, ModelError, RecoverError};

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Every classification batch failed; there is nothing to proceed with.
    #[error("no usable page content: all {batches} classification batches failed")]
    NoUsableContent { batches: usize },

    /// Classification succeeded but nothing met the critical-page rules.
    #[error("no critical pages selected from a {total_pages}-page packet")]
    NoCriticalPages { total_pages: usize },

    #[error("model call failed during {stage}: {source}")]
    Model {
        stage: &'static str,
        #[source]
        source: ModelError,
    },

    /// Extraction output that cannot be merged: unrecoverable JSON, an empty
    /// array, missing mandatory keys, or records that fail the schema.
    #[error("malformed extraction response: {0}")]
    MalformedExtraction(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Why a single classification batch was discarded. Batch failures degrade
/// coverage but never abort the run on their own.
#[derive(Debug, Error)]
pub(crate) enum BatchFailure {
    #[error("model call failed: {0}")]
    Model(#[from] ModelError),
    #[error("unrecoverable response: {0}")]
    Unparsable(#[from] RecoverError),
    #[error("wrong shape: {0}")]
    WrongShape(String),
}
