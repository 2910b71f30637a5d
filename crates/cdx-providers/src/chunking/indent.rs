//! Indentation-based chunking for brace-less, indentation-significant
//! syntax (the Python family).
//!
//! A class chunk stays open until a later line's indentation is at or
//! below the class's opening indentation. Inside a class, a nested
//! function/method chunk opens the same way and is tracked independently;
//! both accumulate their lines, and closing a method falls back to
//! accumulating into the enclosing class.

use cdx_domain::entities::{ChunkKind, CodeChunk};
use cdx_domain::ports::providers::ChunkStrategy;
use regex::Regex;

struct IndentChunk {
    name: String,
    kind: ChunkKind,
    indent: usize,
    start_line: u32,
    lines: Vec<String>,
}

impl IndentChunk {
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

pub struct IndentStrategy {
    class_pattern: Regex,
    def_pattern: Regex,
}

impl Default for IndentStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl IndentStrategy {
    pub fn new() -> Self {
        Self {
            class_pattern: Regex::new(r"^(\s*)class\s+([A-Za-z_]\w*)")
                .expect("invalid class pattern"),
            def_pattern: Regex::new(r"^(\s*)(?:async\s+)?def\s+([A-Za-z_]\w*)")
                .expect("invalid def pattern"),
        }
    }

    fn indent_width(line: &str) -> usize {
        line.chars().take_while(|c| c.is_whitespace()).count()
    }
}

impl ChunkStrategy for IndentStrategy {
    fn chunk(&self, file_path: &str, content: &str) -> Vec<CodeChunk> {
        let mut chunks = Vec::new();
        let mut open_class: Option<IndentChunk> = None;
        let mut open_fn: Option<IndentChunk> = None;

        for (idx, line) in content.lines().enumerate() {
            let line_no = idx as u32 + 1;
            let non_blank = !line.trim().is_empty();
            let indent = Self::indent_width(line);

            // Dedent closes chunks; blank lines never do.
            if non_blank {
                if open_fn.as_ref().is_some_and(|f| indent <= f.indent) {
                    if let Some(function) = open_fn.take() {
                        chunks.push(function.into_chunk(file_path));
                    }
                }
                if open_class.as_ref().is_some_and(|c| indent <= c.indent) {
                    if let Some(class) = open_class.take() {
                        chunks.push(class.into_chunk(file_path));
                    }
                }
            }

            if open_fn.is_none() {
                if let Some(caps) = self.def_pattern.captures(line) {
                    let def_name = caps[2].to_string();
                    let (name, kind) = match &open_class {
                        Some(class) => (format!("{}.{}", class.name, def_name), ChunkKind::Method),
                        None => (def_name, ChunkKind::Function),
                    };
                    open_fn = Some(IndentChunk {
                        name,
                        kind,
                        indent,
                        start_line: line_no,
                        lines: Vec::new(),
                    });
                } else if open_class.is_none() {
                    if let Some(caps) = self.class_pattern.captures(line) {
                        open_class = Some(IndentChunk {
                            name: caps[2].to_string(),
                            kind: ChunkKind::Class,
                            indent,
                            start_line: line_no,
                            lines: Vec::new(),
                        });
                    }
                }
            }

            if let Some(class) = open_class.as_mut() {
                class.lines.push(line.to_string());
            }
            if let Some(function) = open_fn.as_mut() {
                function.lines.push(line.to_string());
            }
        }

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
        "indent"
    }
}
