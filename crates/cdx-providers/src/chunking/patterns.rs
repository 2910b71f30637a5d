//! Regex/brace-counter chunking for brace-delimited languages.
//!
//! Each supported extension gets a pair of pattern sets (class-like and
//! function-like declarations), falling back to a generic pair. A match
//! opens a chunk; subsequent lines accumulate until the structural brace
//! counter returns to zero. One-line bodies close immediately. A function
//! matched while a class chunk is open becomes a `Class.method` chunk and
//! its lines accumulate into both chunks, so nested declarations can
//! yield overlapping text (known carried-over limitation).

use cdx_domain::entities::{ChunkKind, CodeChunk, Language};
use cdx_domain::ports::providers::ChunkStrategy;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

/// Class-like and function-like declaration patterns for one family.
/// Every pattern captures the declared name in group 1.
struct PatternSet {
    class: Vec<Regex>,
    function: Vec<Regex>,
}

impl PatternSet {
    fn new(class: &[&str], function: &[&str]) -> Self {
        let compile = |patterns: &[&str]| {
            patterns
                .iter()
                .map(|p| Regex::new(p).expect("invalid chunking pattern"))
                .collect()
        };
        Self {
            class: compile(class),
            function: compile(function),
        }
    }

    fn match_class(&self, line: &str) -> Option<String> {
        first_capture(&self.class, line)
    }

    fn match_function(&self, line: &str) -> Option<String> {
        first_capture(&self.function, line)
    }
}

fn first_capture(patterns: &[Regex], line: &str) -> Option<String> {
    patterns
        .iter()
        .find_map(|re| re.captures(line))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// An open chunk being accumulated during the line scan
struct OpenChunk {
    name: String,
    kind: ChunkKind,
    start_line: u32,
    lines: Vec<String>,
    depth: i32,
    seen_brace: bool,
}

impl OpenChunk {
    fn new(name: String, kind: ChunkKind, start_line: u32) -> Self {
        Self {
            name,
            kind,
            start_line,
            lines: Vec::new(),
            depth: 0,
            seen_brace: false,
        }
    }

    fn accumulate(&mut self, line: &str) {
        self.lines.push(line.to_string());
        for ch in line.chars() {
            match ch {
                '{' => {
                    self.depth += 1;
                    self.seen_brace = true;
                }
                '}' => self.depth -= 1,
                _ => {}
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.seen_brace && self.depth <= 0
    }

    fn into_chunk(self, file_path: &str) -> CodeChunk {
        let end_line = self.start_line + self.lines.len().saturating_sub(1) as u32;
        CodeChunk::new(
            self.lines.join("\n"),
            file_path.to_string(),
            self.start_line,
            end_line,
            self.kind,
            self.name,
        )
    }
}

pub struct BracePatternStrategy {
    tables: HashMap<Language, PatternSet>,
    generic: PatternSet,
}

impl Default for BracePatternStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl BracePatternStrategy {
    pub fn new() -> Self {
        let mut tables = HashMap::new();
        tables.insert(
            Language::Rust,
            PatternSet::new(
                &[
                    r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|trait)\s+([A-Za-z_]\w*)",
                    r"^\s*impl(?:<[^>]*>)?\s+(?:\S+\s+for\s+)?([A-Za-z_]\w*)",
                ],
                &[r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:unsafe\s+)?fn\s+([A-Za-z_]\w*)"],
            ),
        );
        tables.insert(
            Language::Go,
            PatternSet::new(
                &[r"^type\s+([A-Za-z_]\w*)\s+(?:struct|interface)\b"],
                &[r"^func\s+(?:\([^)]*\)\s+)?([A-Za-z_]\w*)"],
            ),
        );
        tables.insert(
            Language::Java,
            PatternSet::new(
                &[r"^\s*(?:public\s+|protected\s+|private\s+)?(?:abstract\s+|final\s+|static\s+)*(?:class|interface|enum)\s+([A-Za-z_]\w*)"],
                &[r"^\s*(?:public|protected|private)\s+(?:static\s+|final\s+|synchronized\s+)*[\w<>\[\],\s]+?\s+([A-Za-z_]\w*)\s*\("],
            ),
        );
        tables.insert(
            Language::CSharp,
            PatternSet::new(
                &[r"^\s*(?:public\s+|internal\s+|private\s+)?(?:abstract\s+|sealed\s+|static\s+|partial\s+)*(?:class|interface|struct|enum)\s+([A-Za-z_]\w*)"],
                &[r"^\s*(?:public|internal|protected|private)\s+(?:static\s+|virtual\s+|override\s+|async\s+)*[\w<>\[\],\s]+?\s+([A-Za-z_]\w*)\s*\("],
            ),
        );
        tables.insert(
            Language::C,
            PatternSet::new(
                &[r"^\s*(?:typedef\s+)?(?:struct|enum|union)\s+([A-Za-z_]\w*)"],
                &[r"^[A-Za-z_][\w\s\*]*?\b([A-Za-z_]\w*)\s*\([^;!]*$"],
            ),
        );
        tables.insert(
            Language::Cpp,
            PatternSet::new(
                &[r"^\s*(?:class|struct|enum|namespace)\s+([A-Za-z_]\w*)"],
                &[r"^[\w:&<>,\*\s~]+?\b([A-Za-z_~]\w*)\s*\([^;!]*$"],
            ),
        );
        tables.insert(
            Language::Php,
            PatternSet::new(
                &[r"^\s*(?:abstract\s+|final\s+)?(?:class|interface|trait)\s+([A-Za-z_]\w*)"],
                &[r"^\s*(?:public\s+|protected\s+|private\s+|static\s+)*function\s+([A-Za-z_]\w*)"],
            ),
        );
        tables.insert(
            Language::Swift,
            PatternSet::new(
                &[r"^\s*(?:public\s+|internal\s+|private\s+|open\s+)?(?:final\s+)?(?:class|struct|enum|protocol|extension)\s+([A-Za-z_]\w*)"],
                &[r"^\s*(?:public\s+|internal\s+|private\s+|open\s+|static\s+|override\s+)*func\s+([A-Za-z_]\w*)"],
            ),
        );
        tables.insert(
            Language::Kotlin,
            PatternSet::new(
                &[r"^\s*(?:open\s+|data\s+|sealed\s+|abstract\s+)*(?:class|interface|object)\s+([A-Za-z_]\w*)"],
                &[r"^\s*(?:override\s+|open\s+|private\s+|public\s+|internal\s+|suspend\s+)*fun\s+([A-Za-z_]\w*)"],
            ),
        );
        tables.insert(
            Language::Ruby,
            PatternSet::new(
                &[r"^\s*(?:class|module)\s+([A-Z]\w*)"],
                &[r"^\s*def\s+(?:self\.)?([a-z_]\w*[?!]?)"],
            ),
        );

        let generic = PatternSet::new(
            &[r"\bclass\s+([A-Za-z_$][\w$]*)"],
            &[r"\bfunction\s+([A-Za-z_$][\w$]*)"],
        );

        Self { tables, generic }
    }

    fn patterns_for(&self, file_path: &str) -> &PatternSet {
        let ext = Path::new(file_path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        self.tables
            .get(&Language::from_extension(ext))
            .unwrap_or(&self.generic)
    }
}

impl ChunkStrategy for BracePatternStrategy {
    fn chunk(&self, file_path: &str, content: &str) -> Vec<CodeChunk> {
        let patterns = self.patterns_for(file_path);
        let mut chunks = Vec::new();
        let mut open_class: Option<OpenChunk> = None;
        let mut open_fn: Option<OpenChunk> = None;

        for (idx, line) in content.lines().enumerate() {
            let line_no = idx as u32 + 1;

            if open_fn.is_none() {
                if let Some(fn_name) = patterns.match_function(line) {
                    let (name, kind) = match &open_class {
                        Some(class) => (format!("{}.{}", class.name, fn_name), ChunkKind::Method),
                        None => (fn_name, ChunkKind::Function),
                    };
                    open_fn = Some(OpenChunk::new(name, kind, line_no));
                } else if open_class.is_none() {
                    if let Some(class_name) = patterns.match_class(line) {
                        open_class = Some(OpenChunk::new(class_name, ChunkKind::Class, line_no));
                    }
                }
            }

            // Lines inside a method accumulate into both the method and
            // its enclosing class chunk (overlap limitation, preserved).
            if let Some(class) = open_class.as_mut() {
                class.accumulate(line);
            }
            if let Some(function) = open_fn.as_mut() {
                function.accumulate(line);
            }

            if open_fn.as_ref().is_some_and(OpenChunk::is_closed) {
                if let Some(function) = open_fn.take() {
                    chunks.push(function.into_chunk(file_path));
                }
            }
            if open_class.as_ref().is_some_and(OpenChunk::is_closed) {
                if let Some(function) = open_fn.take() {
                    chunks.push(function.into_chunk(file_path));
                }
                if let Some(class) = open_class.take() {
                    chunks.push(class.into_chunk(file_path));
                }
            }
        }

        // Unterminated chunks close at end of file.
        if let Some(function) = open_fn.take() {
            chunks.push(function.into_chunk(file_path));
        }
        if let Some(class) = open_class.take() {
            chunks.push(class.into_chunk(file_path));
        }

        chunks.sort_by_key(|c| c.start_line);
        chunks
    }

    fn strategy_name(&self) -> &str {
        "brace"
    }
}
