//! Domain-level constants shared across the indexing pipeline.

/// Character ceiling applied to any text sent to an embedding provider.
pub const MAX_EMBED_CHARS: usize = 8_000;

/// Marker appended to text clipped at [`MAX_EMBED_CHARS`].
pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// Character cap for the content excerpt stored in backend metadata.
pub const METADATA_EXCERPT_CHARS: usize = 1_000;

/// Default number of chunks embedded and upserted per backend call.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Pacing delay inserted between upsert batches, in milliseconds.
pub const BATCH_PACING_MS: u64 = 200;

/// Line count per fallback chunk when no structural chunk is detected.
pub const FALLBACK_CHUNK_LINES: usize = 50;

/// Sample string embedded once to determine backend dimensionality.
pub const DIMENSION_PROBE_TEXT: &str = "dimension probe";

/// State-store key for the per-file metadata map.
pub const STATE_KEY_FILES: &str = "cdx/file-metadata";

/// State-store key for the project metadata singleton.
pub const STATE_KEY_PROJECT: &str = "cdx/project-metadata";
