//! Dealterm annotate: the document OCR/annotation backend.
//!
//! Same logical contract as the per-page extractor, different transport:
//! the assembled packet artifact is uploaded once to write-once blob
//! storage, then annotated against a JSON schema in page-range chunks no
//! larger than the service's ceiling. The `annotation` field of each chunk
//! response is string-or-object and goes through the same defensive
//! recovery as model output.

pub mod annotate;
pub mod blob;
pub mod error;

pub use annotate::{page_ranges, parse_annotation, term_schema, AnnotationClient, ANNOTATE_PAGE_LIMIT};
pub use blob::{BlobRef, BlobStore};
pub use error::AnnotateError;
