//! Structural chunking for the JavaScript/TypeScript family.
//!
//! Walks the tree-sitter syntax tree and emits a chunk per top-level
//! function declaration, per method inside a class (named
//! `Class.method`), and per variable declaration whose initializer is an
//! arrow or anonymous function (named after the variable). Offsets come
//! from exact token positions; line numbers are 1-based.

use cdx_domain::entities::{ChunkKind, CodeChunk, Language};
use cdx_domain::ports::providers::ChunkStrategy;
use std::path::Path;
use tree_sitter::{Node, Parser};

pub struct TreeSitterStrategy;

impl Default for TreeSitterStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeSitterStrategy {
    pub fn new() -> Self {
        Self
    }

    fn language_for(file_path: &str) -> tree_sitter::Language {
        let ext = Path::new(file_path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        match Language::from_extension(ext) {
            Language::TypeScript if ext.eq_ignore_ascii_case("tsx") => {
                tree_sitter_typescript::LANGUAGE_TSX.into()
            }
            Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            _ => tree_sitter_javascript::LANGUAGE.into(),
        }
    }

    fn node_text<'a>(node: Node<'_>, content: &'a str) -> &'a str {
        content.get(node.start_byte()..node.end_byte()).unwrap_or("")
    }

    fn emit(node: Node<'_>, content: &str, file_path: &str, kind: ChunkKind, name: String) -> CodeChunk {
        CodeChunk::new(
            Self::node_text(node, content).to_string(),
            file_path.to_string(),
            node.start_position().row as u32 + 1,
            node.end_position().row as u32 + 1,
            kind,
            name,
        )
    }

    fn name_of(node: Node<'_>, content: &str) -> Option<String> {
        node.child_by_field_name("name")
            .map(|n| Self::node_text(n, content).to_string())
            .filter(|n| !n.is_empty())
    }

    /// Name of the enclosing class, found by walking ancestor nodes.
    fn enclosing_class_name(node: Node<'_>, content: &str) -> Option<String> {
        let mut current = node.parent();
        while let Some(ancestor) = current {
            if matches!(ancestor.kind(), "class_declaration" | "class") {
                return Self::name_of(ancestor, content);
            }
            current = ancestor.parent();
        }
        None
    }

    fn collect_statement(
        node: Node<'_>,
        content: &str,
        file_path: &str,
        chunks: &mut Vec<CodeChunk>,
    ) {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" => {
                if let Some(name) = Self::name_of(node, content) {
                    chunks.push(Self::emit(node, content, file_path, ChunkKind::Function, name));
                }
            }
            "class_declaration" | "abstract_class_declaration" => {
                if let Some(body) = node.child_by_field_name("body") {
                    for i in 0..body.named_child_count() {
                        let Some(member) = body.named_child(i) else {
                            continue;
                        };
                        if member.kind() != "method_definition" {
                            continue;
                        }
                        let Some(method) = Self::name_of(member, content) else {
                            continue;
                        };
                        let name = match Self::enclosing_class_name(member, content) {
                            Some(class) => format!("{class}.{method}"),
                            None => method,
                        };
                        chunks.push(Self::emit(member, content, file_path, ChunkKind::Method, name));
                    }
                }
            }
            "lexical_declaration" | "variable_declaration" => {
                for i in 0..node.named_child_count() {
                    let Some(declarator) = node.named_child(i) else {
                        continue;
                    };
                    if declarator.kind() != "variable_declarator" {
                        continue;
                    }
                    let is_function_init = declarator
                        .child_by_field_name("value")
                        .map(|value| {
                            matches!(
                                value.kind(),
                                "arrow_function" | "function_expression" | "function"
                            )
                        })
                        .unwrap_or(false);
                    if !is_function_init {
                        continue;
                    }
                    if let Some(name) = declarator
                        .child_by_field_name("name")
                        .map(|n| Self::node_text(n, content).to_string())
                    {
                        chunks.push(Self::emit(
                            node,
                            content,
                            file_path,
                            ChunkKind::Function,
                            name,
                        ));
                    }
                }
            }
            "export_statement" => {
                if let Some(declaration) = node.child_by_field_name("declaration") {
                    Self::collect_statement(declaration, content, file_path, chunks);
                }
            }
            _ => {}
        }
    }
}

impl ChunkStrategy for TreeSitterStrategy {
    fn chunk(&self, file_path: &str, content: &str) -> Vec<CodeChunk> {
        let mut parser = Parser::new();
        if parser.set_language(&Self::language_for(file_path)).is_err() {
            return Vec::new();
        }
        let Some(tree) = parser.parse(content, None) else {
            return Vec::new();
        };

        let root = tree.root_node();
        let mut chunks = Vec::new();
        for i in 0..root.named_child_count() {
            if let Some(statement) = root.named_child(i) {
                Self::collect_statement(statement, content, file_path, &mut chunks);
            }
        }
        chunks
    }

    fn strategy_name(&self) -> &str {
        "tree-sitter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(path: &str, content: &str) -> Vec<CodeChunk> {
        TreeSitterStrategy::new().chunk(path, content)
    }

    #[test]
    fn function_and_class_method() {
        let content = "\
function add(a, b) {
  return a + b;
}

class Calc {
  sum(values) {
    return values.reduce((a, b) => a + b, 0);
  }
}
";
        let chunks = parse("src/calc.js", content);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].kind, ChunkKind::Function);
        assert_eq!(chunks[0].name, "add");
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 3);
        assert_eq!(chunks[1].kind, ChunkKind::Method);
        assert_eq!(chunks[1].name, "Calc.sum");
        assert_eq!(chunks[1].start_line, 6);
    }

    #[test]
    fn arrow_function_variable_is_named_after_variable() {
        let content = "const handler = async (req) => {\n  return req.body;\n};\n";
        let chunks = parse("src/handler.ts", content);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, ChunkKind::Function);
        assert_eq!(chunks[0].name, "handler");
    }

    #[test]
    fn exported_declarations_are_unwrapped() {
        let content = "export function greet() {\n  return 'hi';\n}\n";
        let chunks = parse("src/greet.ts", content);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].name, "greet");
    }

    #[test]
    fn plain_constants_yield_nothing() {
        assert!(parse("src/config.js", "const x = 1;\nconst y = 2;\n").is_empty());
    }

    #[test]
    fn identical_input_yields_identical_chunks() {
        let content = "function f() { return 1; }\n";
        assert_eq!(parse("a.js", content), parse("a.js", content));
    }
}
