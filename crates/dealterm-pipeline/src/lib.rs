//! Dealterm pipeline: orchestration of the contract extraction run.
//!
//! ```text
//! pages ──► Batch Classifier ──► Critical Page Selector ──► Per-Page
//!            (batched fan-out)     (pure rules)              Extractor
//!                                                               │
//!    final term set ◄── Validator ◄── Temporal ◄── Merge ◄──────┘
//!         │                 │
//!         │            errors only
//!         │                 ▼
//!         └──────── Second-Turn Retry (once, spliced, re-merged)
//! ```
//!
//! Classification fans out one concurrent model call per 15-page batch and
//! settles all of them, tolerating per-batch failure. Extraction and the
//! second turn are single calls. The pipeline holds no state across runs.

pub mod classify;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod second_turn;
pub mod testing;

pub use classify::{classify_pages, CLASSIFY_BATCH_SIZE};
pub use error::PipelineError;
pub use extract::extract_page_terms;
pub use pipeline::{
    ExtractionDetails, ExtractionOutcome, Pipeline, MAX_SECOND_TURNS,
};
pub use second_turn::{problem_fields, run_second_turn, splice_records};
