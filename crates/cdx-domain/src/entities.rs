//! Core business entities of the indexing pipeline.
//!
//! A [`CodeChunk`] is a named, typed, line-bounded fragment of a source
//! file. Chunks are immutable: when a file changes, its old chunks are
//! deleted from the backend and new ones are created, never mutated.

use serde::{Deserialize, Serialize};

/// Kind of code fragment a chunk represents
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Function,
    Method,
    Class,
    Other,
}

impl std::fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Function => write!(f, "function"),
            Self::Method => write!(f, "method"),
            Self::Class => write!(f, "class"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Semantically addressable code fragment
///
/// Identity is `(file_path, name, start_line)`; the derived `id` is stable
/// for identical input so re-parsing an unchanged file reproduces the same
/// ids in the same order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeChunk {
    /// Unique identifier derived from the chunk identity
    pub id: String,
    /// The actual code content
    pub content: String,
    /// Path to the source file
    pub file_path: String,
    /// Starting line number, 1-based
    pub start_line: u32,
    /// Ending line number, 1-based, inclusive
    pub end_line: u32,
    /// Fragment kind
    pub kind: ChunkKind,
    /// Declared name; methods use `Class.method`
    pub name: String,
}

impl CodeChunk {
    /// Build a chunk, deriving the id from its identity triple.
    pub fn new(
        content: String,
        file_path: String,
        start_line: u32,
        end_line: u32,
        kind: ChunkKind,
        name: String,
    ) -> Self {
        let id = format!("{file_path}:{name}:{start_line}");
        Self {
            id,
            content,
            file_path,
            start_line,
            end_line,
            kind,
            name,
        }
    }

    /// Base identifier used for coverage cross-referencing: the owning
    /// class for methods, the name itself otherwise.
    pub fn base_name(&self) -> &str {
        match self.kind {
            ChunkKind::Method => self.name.split('.').next().unwrap_or(&self.name),
            _ => &self.name,
        }
    }
}

/// Per-file bookkeeping owned exclusively by the index manager
///
/// Invariant: `chunk_ids` is exactly the set of embedding ids currently
/// live in the backend for this file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedFileMetadata {
    pub file_path: String,
    /// Modification time at last index, epoch milliseconds
    pub last_modified: i64,
    /// Hex-encoded SHA-256 of the content at last index
    pub checksum: String,
    /// File size in bytes at last index
    pub size: u64,
    /// Chunk ids currently stored in the backend for this file
    pub chunk_ids: Vec<String>,
}

/// Re-indexing policy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IndexingStrategy {
    /// Always re-index only the changed file
    Incremental,
    /// Always re-index the whole project
    Full,
    /// Choose between the two based on size and change-rate heuristics
    #[default]
    Smart,
}

impl std::fmt::Display for IndexingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Incremental => write!(f, "incremental"),
            Self::Full => write!(f, "full"),
            Self::Smart => write!(f, "smart"),
        }
    }
}

/// Project-level indexing state, persisted for restart recovery
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ProjectMetadata {
    pub total_files: usize,
    /// Epoch milliseconds of the last completed full index, if any
    pub last_full_index_time: Option<i64>,
    pub strategy: IndexingStrategy,
    /// The working set defined by the last `set_watched_files` call
    pub included_files: Vec<String>,
}

/// Language families recognized by the chunker, keyed by file extension
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Language {
    JavaScript,
    TypeScript,
    Python,
    Rust,
    Go,
    Java,
    C,
    Cpp,
    CSharp,
    Ruby,
    Php,
    Swift,
    Kotlin,
    Unknown,
}

impl Language {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "js" | "jsx" | "mjs" | "cjs" => Self::JavaScript,
            "ts" | "tsx" | "mts" | "cts" => Self::TypeScript,
            "py" | "pyi" => Self::Python,
            "rs" => Self::Rust,
            "go" => Self::Go,
            "java" => Self::Java,
            "c" | "h" => Self::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" => Self::Cpp,
            "cs" => Self::CSharp,
            "rb" => Self::Ruby,
            "php" => Self::Php,
            "swift" => Self::Swift,
            "kt" | "kts" => Self::Kotlin,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JavaScript => "JavaScript",
            Self::TypeScript => "TypeScript",
            Self::Python => "Python",
            Self::Rust => "Rust",
            Self::Go => "Go",
            Self::Java => "Java",
            Self::C => "C",
            Self::Cpp => "Cpp",
            Self::CSharp => "CSharp",
            Self::Ruby => "Ruby",
            Self::Php => "Php",
            Self::Swift => "Swift",
            Self::Kotlin => "Kotlin",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
