//! Fixed-size line-block fallback chunking.
//!
//! Used when no structural chunk was detected, so that every parseable
//! file yields at least one chunk. Blocks preserve line endings, so
//! concatenating chunk contents in order reconstructs the file exactly.

use cdx_domain::constants::FALLBACK_CHUNK_LINES;
use cdx_domain::entities::{ChunkKind, CodeChunk};
use cdx_domain::ports::providers::ChunkStrategy;

pub struct LineChunkStrategy {
    lines_per_chunk: usize,
}

impl Default for LineChunkStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl LineChunkStrategy {
    pub fn new() -> Self {
        Self {
            lines_per_chunk: FALLBACK_CHUNK_LINES,
        }
    }

    pub fn with_lines_per_chunk(lines_per_chunk: usize) -> Self {
        Self { lines_per_chunk }
    }
}

impl ChunkStrategy for LineChunkStrategy {
    fn chunk(&self, file_path: &str, content: &str) -> Vec<CodeChunk> {
        if content.is_empty() {
            return Vec::new();
        }
        let lines: Vec<&str> = content.split_inclusive('\n').collect();
        lines
            .chunks(self.lines_per_chunk)
            .enumerate()
            .map(|(i, block)| {
                let start_line = (i * self.lines_per_chunk) as u32 + 1;
                let end_line = start_line + block.len() as u32 - 1;
                CodeChunk::new(
                    block.concat(),
                    file_path.to_string(),
                    start_line,
                    end_line,
                    ChunkKind::Other,
                    format!("lines_{start_line}_{end_line}"),
                )
            })
            .collect()
    }

    fn strategy_name(&self) -> &str {
        "lines"
    }
}
