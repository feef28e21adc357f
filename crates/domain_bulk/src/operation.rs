//! Chunked bulk verbs

use serde::{Deserialize, Serialize};

use core_kernel::PackageId;

/// Ids per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// A mutation applied to an explicit list of customers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BulkVerb {
    ExtendExpiry { days: u32 },
    ChangePackage { package_id: PackageId },
    /// Status becomes `active`
    Enable,
    /// Status becomes `suspended`
    Disable,
    /// Status becomes `deleted`
    Delete,
}

impl BulkVerb {
    pub fn name(&self) -> &'static str {
        match self {
            BulkVerb::ExtendExpiry { .. } => "extend_expiry",
            BulkVerb::ChangePackage { .. } => "change_package",
            BulkVerb::Enable => "enable",
            BulkVerb::Disable => "disable",
            BulkVerb::Delete => "delete",
        }
    }
}

/// Counts from one bulk run
///
/// A failed chunk is recorded in `errors` and does not undo earlier chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    pub requested: usize,
    pub affected: u64,
    pub failed_chunks: usize,
    pub errors: Vec<String>,
}

impl BulkOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed_chunks == 0
    }
}
