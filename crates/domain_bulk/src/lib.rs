//! Bulk operations over customers
//!
//! Two shapes of batch work live here:
//!
//! - **Verbs** (`BulkVerb`) mutate an explicit list of customer ids in
//!   chunks. Each chunk commits independently; the returned `BulkOutcome`
//!   carries affected and failed counts rather than a single success flag.
//! - **Imports** read a CSV file, map its columns onto customer fields and
//!   create each row through the regular customer creation path. Progress
//!   is tracked on a `BulkImport` record.

pub mod error;
pub mod import;
pub mod operation;
pub mod ports;
pub mod service;

pub use error::BulkError;
pub use import::{BulkImport, FieldMapping, ImportStatus, IMPORT_FIELDS};
pub use operation::{BulkOutcome, BulkVerb, DEFAULT_CHUNK_SIZE};
pub use ports::BulkStore;
#[cfg(any(test, feature = "mock"))]
pub use ports::mock::MockBulkStore;
pub use service::BulkService;
