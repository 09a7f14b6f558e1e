//! Source adapters: pluggable producers of raw scraped records
//!
//! **[CIN-SRC-010]** One adapter per external catalog. An adapter's only
//! obligation is a lazy stream of `RawScrapedRecord`s; how the bytes were
//! obtained (paginated HTTP, a cached batch file) is its own business. The
//! stream is restartable only by calling `stream()` again — there is no
//! checkpointing.

pub mod json_file;
pub mod ratelimit;
pub mod transpondery;
pub mod uhs;

use futures::stream::BoxStream;

use crate::error::CiError;
use crate::types::RawScrapedRecord;

/// Item-level errors are page/record failures: the consumer counts them and
/// keeps reading. A stream that can't start at all yields a single error.
pub type RecordStream<'a> = BoxStream<'a, Result<RawScrapedRecord, CiError>>;

pub trait SourceAdapter: Send + Sync {
    /// Source tag, also used as the provenance name in merged records.
    fn name(&self) -> &str;

    /// Produce the lazy record sequence for one run.
    fn stream(&self) -> RecordStream<'_>;
}
