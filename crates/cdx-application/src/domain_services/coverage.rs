//! Heuristic extraction of symbols exercised by test code.
//!
//! No test runner or coverage instrumentation is involved; we scan test
//! sources for assertion targets, call sites and constructor uses, and
//! treat the referenced base identifiers as "tested".

use std::collections::HashSet;

use cdx_domain::ports::FileSystemPort;
use regex::Regex;
use tracing::warn;

/// Identifiers that show up in test code without naming production symbols.
const IGNORED_IDENTIFIERS: &[&str] = &[
    "test",
    "it",
    "describe",
    "suite",
    "context",
    "beforeEach",
    "afterEach",
    "beforeAll",
    "afterAll",
    "setup",
    "teardown",
    "expect",
    "assert",
    "should",
    "require",
    "import",
    "console",
    "module",
    "exports",
    "setTimeout",
    "setInterval",
    "Promise",
    "Array",
    "Object",
    "String",
    "Number",
    "Boolean",
    "Math",
    "JSON",
    "Date",
    "Error",
    "Map",
    "Set",
    "if",
    "for",
    "while",
    "switch",
    "catch",
    "return",
    "function",
    "new",
    "await",
    "async",
    "constructor",
    "super",
    "this",
    "typeof",
    "print",
    "println",
    "len",
];

pub struct CoverageAnalyzer {
    assertion: Regex,
    bare_call: Regex,
    constructor: Regex,
}

impl Default for CoverageAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl CoverageAnalyzer {
    pub fn new() -> Self {
        Self {
            // expect(Foo.bar(..)), assert.equal(foo(..)), foo.should(..)
            assertion: Regex::new(
                r"(?:expect|assert(?:\.\w+)?|should)\s*\(\s*(?:new\s+)?([A-Za-z_$][\w$]*(?:\.[\w$]+)*)",
            )
            .expect("assertion pattern is valid"),
            bare_call: Regex::new(r"\b([A-Za-z_$][\w$]*)\s*\(")
                .expect("call pattern is valid"),
            constructor: Regex::new(r"\bnew\s+([A-Za-z_$][\w$]*)")
                .expect("constructor pattern is valid"),
        }
    }

    /// Extract the set of base identifiers referenced by the given test
    /// sources. Dotted references collapse to their leading segment, so
    /// `Calc.sum(..)` marks `Calc` as tested.
    pub fn analyze_sources(&self, sources: &[String]) -> HashSet<String> {
        let mut tested = HashSet::new();
        for source in sources {
            for caps in self.assertion.captures_iter(source) {
                Self::record(&mut tested, &caps[1]);
            }
            for caps in self.bare_call.captures_iter(source) {
                Self::record(&mut tested, &caps[1]);
            }
            for caps in self.constructor.captures_iter(source) {
                Self::record(&mut tested, &caps[1]);
            }
        }
        tested
    }

    /// Read and analyze test files. Unreadable files are skipped with a
    /// warning so one stale path cannot abort the analysis.
    pub async fn analyze(&self, fs: &dyn FileSystemPort, paths: &[String]) -> HashSet<String> {
        let mut sources = Vec::with_capacity(paths.len());
        for path in paths {
            match fs.read_to_string(path).await {
                Ok(content) => sources.push(content),
                Err(e) => warn!("[CHUNK] skipping unreadable test file {path}: {e}"),
            }
        }
        self.analyze_sources(&sources)
    }

    fn record(tested: &mut HashSet<String>, reference: &str) {
        let base = reference.split('.').next().unwrap_or(reference);
        if base.is_empty() || IGNORED_IDENTIFIERS.contains(&base) {
            return;
        }
        tested.insert(base.to_string());
    }
}
