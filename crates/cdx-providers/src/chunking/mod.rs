//! Code chunking engine.
//!
//! Splits a source file into named, typed fragments. Boundary detection
//! is delegated to one [`ChunkStrategy`] per language family, selected by
//! file extension:
//!
//! - JavaScript/TypeScript: tree-sitter structural parsing
//! - Python: indentation tracking
//! - Brace-delimited languages: per-extension regex tables + brace counter
//! - Everything else, and any file where no chunk was detected: fixed-size
//!   line blocks
//!
//! The engine never lets a read or parse failure escape: a failing file
//! yields an empty list and the caller proceeds with the rest.

pub mod indent;
pub mod lines;
pub mod patterns;
pub mod tree_sitter;

use cdx_domain::entities::{CodeChunk, Language};
use cdx_domain::ports::infrastructure::FileSystemPort;
use cdx_domain::ports::providers::ChunkStrategy;
use std::path::Path;

pub use indent::IndentStrategy;
pub use lines::LineChunkStrategy;
pub use patterns::BracePatternStrategy;
pub use tree_sitter::TreeSitterStrategy;

/// Chunking engine with per-family strategy dispatch
pub struct Chunker {
    tree_sitter: TreeSitterStrategy,
    indent: IndentStrategy,
    brace: BracePatternStrategy,
    fallback: LineChunkStrategy,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new()
    }
}

impl Chunker {
    pub fn new() -> Self {
        Self {
            tree_sitter: TreeSitterStrategy::new(),
            indent: IndentStrategy::new(),
            brace: BracePatternStrategy::new(),
            fallback: LineChunkStrategy::new(),
        }
    }

    /// Whether the file extension belongs to a recognized language family.
    pub fn is_supported(&self, path: &str) -> bool {
        Self::extension(path)
            .map(|ext| Language::from_extension(&ext) != Language::Unknown)
            .unwrap_or(false)
    }

    /// Split `content` into chunks. Deterministic for identical input;
    /// guarantees at least one chunk for non-empty content by falling
    /// back to fixed-size line blocks.
    pub fn parse(&self, file_path: &str, content: &str) -> Vec<CodeChunk> {
        if content.is_empty() {
            return Vec::new();
        }
        let mut chunks = self
            .strategy_for(file_path)
            .map(|strategy| strategy.chunk(file_path, content))
            .unwrap_or_default();
        if chunks.is_empty() {
            chunks = self.fallback.chunk(file_path, content);
        }
        chunks
    }

    /// Read and parse a file through the filesystem port. Failures are
    /// caught here: the file is logged and skipped, never fatal.
    pub async fn parse_file(&self, fs: &dyn FileSystemPort, path: &str) -> Vec<CodeChunk> {
        match fs.read_to_string(path).await {
            Ok(content) => self.parse(path, &content),
            Err(e) => {
                tracing::warn!("[CHUNK] failed to read {}: {}", path, e);
                Vec::new()
            }
        }
    }

    fn strategy_for(&self, file_path: &str) -> Option<&dyn ChunkStrategy> {
        let ext = Self::extension(file_path)?;
        match Language::from_extension(&ext) {
            Language::JavaScript | Language::TypeScript => Some(&self.tree_sitter),
            Language::Python => Some(&self.indent),
            Language::Unknown => None,
            _ => Some(&self.brace),
        }
    }

    fn extension(path: &str) -> Option<String> {
        Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdx_domain::entities::ChunkKind;

    #[test]
    fn supported_extensions() {
        let chunker = Chunker::new();
        assert!(chunker.is_supported("src/app.ts"));
        assert!(chunker.is_supported("src/main.rs"));
        assert!(chunker.is_supported("scripts/run.py"));
        assert!(!chunker.is_supported("README.md"));
        assert!(!chunker.is_supported("Makefile"));
    }

    #[test]
    fn parse_is_deterministic() {
        let chunker = Chunker::new();
        let content = "function add(a, b) {\n  return a + b;\n}\n";
        let first = chunker.parse("src/math.js", content);
        let second = chunker.parse("src/math.js", content);
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn empty_content_yields_no_chunks() {
        let chunker = Chunker::new();
        assert!(chunker.parse("src/empty.ts", "").is_empty());
    }

    #[test]
    fn structureless_file_falls_back_to_line_blocks() {
        let chunker = Chunker::new();
        let chunks = chunker.parse("src/const.js", "const x = 1;\n");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, ChunkKind::Other);
    }
}
