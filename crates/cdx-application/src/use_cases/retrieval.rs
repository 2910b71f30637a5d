//! Retrieval and context assembly for downstream consumers.
//!
//! `retrieve` pulls the closest source and test chunks for a query;
//! `augment` folds retrieved chunks into a structured context document a
//! prompt layer can serialize or render.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cdx_domain::entities::{ChunkKind, CodeChunk};
use cdx_domain::error::Result;
use cdx_domain::ports::infrastructure::FileSystemPort;
use cdx_domain::value_objects::ChunkNamespace;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain_services::coverage::CoverageAnalyzer;
use crate::use_cases::vector_index::VectorIndexService;

/// Cooperative cancellation token checked between retrieval steps.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    inner: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }
}

/// Chunks retrieved for a query, split by namespace
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievedContext {
    pub source_chunks: Vec<CodeChunk>,
    pub test_chunks: Vec<CodeChunk>,
}

/// One source file's contribution to a context document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileContext {
    pub path: String,
    /// Declaration headers, e.g. `function add (lines 1-3)`
    pub headers: Vec<String>,
    pub code: String,
}

/// One test file's contribution; code only, no headers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestFileContext {
    pub path: String,
    pub code: String,
}

/// Structured context document assembled from retrieved chunks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextDocument {
    pub query: String,
    pub feature: String,
    /// Directories the contributing source files live in
    pub directory_summary: Vec<String>,
    pub files: Vec<FileContext>,
    pub test_files: Vec<TestFileContext>,
}

impl ContextDocument {
    /// Render the document as markdown for direct prompt inclusion.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# Context: {}\n\n", self.feature));
        out.push_str(&format!("Query: {}\n\n", self.query));
        if !self.directory_summary.is_empty() {
            out.push_str("## Directories\n\n");
            for dir in &self.directory_summary {
                out.push_str(&format!("- {dir}\n"));
            }
            out.push('\n');
        }
        for file in &self.files {
            out.push_str(&format!("## {}\n\n", file.path));
            for header in &file.headers {
                out.push_str(&format!("- {header}\n"));
            }
            out.push_str(&format!("\n```\n{}\n```\n\n", file.code));
        }
        if !self.test_files.is_empty() {
            out.push_str("## Tests\n\n");
            for test in &self.test_files {
                out.push_str(&format!("### {}\n\n```\n{}\n```\n\n", test.path, test.code));
            }
        }
        out
    }
}

/// Retrieval use case over an initialized [`VectorIndexService`]
pub struct RetrievalAugmenter {
    vectors: Arc<VectorIndexService>,
    coverage: CoverageAnalyzer,
}

impl RetrievalAugmenter {
    pub fn new(vectors: Arc<VectorIndexService>) -> Self {
        Self {
            vectors,
            coverage: CoverageAnalyzer::new(),
        }
    }

    /// Retrieve the closest source and test chunks for a query. The
    /// cancellation flag is checked before each backend round trip; a
    /// cancelled call short-circuits to empty results, discarding any
    /// chunks already fetched.
    pub async fn retrieve(
        &self,
        query: &str,
        max_results: usize,
        cancel: &CancelFlag,
    ) -> Result<RetrievedContext> {
        let mut context = RetrievedContext::default();
        if cancel.is_cancelled() {
            debug!("[VECTOR] retrieval cancelled before source query");
            return Ok(context);
        }
        context.source_chunks = self
            .vectors
            .query(query, max_results, ChunkNamespace::Source)
            .await?;
        if cancel.is_cancelled() {
            debug!("[VECTOR] retrieval cancelled before test query");
            return Ok(RetrievedContext::default());
        }
        context.test_chunks = self
            .vectors
            .query(query, max_results, ChunkNamespace::Test)
            .await?;
        info!(
            "[VECTOR] retrieved {} source / {} test chunks for query",
            context.source_chunks.len(),
            context.test_chunks.len()
        );
        Ok(context)
    }

    /// Assemble a context document from retrieved chunks. Source files
    /// carry declaration headers; test files carry code only.
    pub fn augment(
        &self,
        query: &str,
        feature: &str,
        source_chunks: &[CodeChunk],
        test_chunks: &[CodeChunk],
    ) -> ContextDocument {
        let mut by_file: BTreeMap<&str, Vec<&CodeChunk>> = BTreeMap::new();
        for chunk in source_chunks {
            by_file.entry(&chunk.file_path).or_default().push(chunk);
        }
        let mut directories = BTreeSet::new();
        let mut files = Vec::with_capacity(by_file.len());
        for (path, chunks) in by_file {
            if let Some((dir, _)) = path.rsplit_once('/') {
                directories.insert(dir.to_string());
            }
            let headers = chunks
                .iter()
                .filter(|c| c.kind != ChunkKind::Other)
                .map(|c| format!("{} {} (lines {}-{})", c.kind, c.name, c.start_line, c.end_line))
                .collect();
            let code = chunks
                .iter()
                .map(|c| c.content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n");
            files.push(FileContext {
                path: path.to_string(),
                headers,
                code,
            });
        }

        let mut by_test_file: BTreeMap<&str, Vec<&CodeChunk>> = BTreeMap::new();
        for chunk in test_chunks {
            by_test_file.entry(&chunk.file_path).or_default().push(chunk);
        }
        let test_files = by_test_file
            .into_iter()
            .map(|(path, chunks)| TestFileContext {
                path: path.to_string(),
                code: chunks
                    .iter()
                    .map(|c| c.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n"),
            })
            .collect();

        ContextDocument {
            query: query.to_string(),
            feature: feature.to_string(),
            directory_summary: directories.into_iter().collect(),
            files,
            test_files,
        }
    }

    /// Like [`augment`](Self::augment), but drops source chunks whose base
    /// identifier already appears in the given test files, focusing the
    /// document on untested code.
    pub async fn augment_untested(
        &self,
        fs: &dyn FileSystemPort,
        query: &str,
        feature: &str,
        source_chunks: &[CodeChunk],
        test_chunks: &[CodeChunk],
        test_paths: &[String],
    ) -> ContextDocument {
        let tested = self.coverage.analyze(fs, test_paths).await;
        let untested: Vec<CodeChunk> = source_chunks
            .iter()
            .filter(|c| !tested.contains(c.base_name()))
            .cloned()
            .collect();
        debug!(
            "[VECTOR] untested focus kept {} of {} source chunks",
            untested.len(),
            source_chunks.len()
        );
        self.augment(query, feature, &untested, test_chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cdx_domain::ports::providers::EmbeddingProvider;
    use cdx_domain::value_objects::{Embedding, Tenant};
    use cdx_providers::embedding::NullEmbeddingProvider;
    use cdx_providers::vector_store::InMemoryVectorBackend;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    /// Delegates to the null provider, cancelling the armed flag on each
    /// embed call. Arming after seeding lets a test trip cancellation in
    /// the middle of a retrieve.
    struct CancelOnEmbed {
        inner: NullEmbeddingProvider,
        armed: StdMutex<Option<CancelFlag>>,
    }

    impl CancelOnEmbed {
        fn new(dimensions: usize) -> Self {
            Self {
                inner: NullEmbeddingProvider::new(dimensions),
                armed: StdMutex::new(None),
            }
        }

        fn arm(&self, flag: CancelFlag) {
            *self.armed.lock().unwrap() = Some(flag);
        }
    }

    #[async_trait]
    impl EmbeddingProvider for CancelOnEmbed {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
            if let Some(flag) = self.armed.lock().unwrap().as_ref() {
                flag.cancel();
            }
            self.inner.embed_batch(texts).await
        }

        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }

        fn provider_name(&self) -> &str {
            "cancel-on-embed"
        }
    }

    async fn seeded_augmenter() -> (RetrievalAugmenter, Arc<InMemoryVectorBackend>) {
        let backend = Arc::new(InMemoryVectorBackend::new());
        let vectors = Arc::new(
            VectorIndexService::new(
                Arc::new(NullEmbeddingProvider::new(16)),
                Arc::clone(&backend) as Arc<dyn cdx_domain::ports::VectorBackend>,
                Tenant::new("alice", "proj"),
            )
            .with_batch_pacing(Duration::from_millis(0)),
        );
        vectors.initialize().await.unwrap();
        let source = vec![
            CodeChunk::new(
                "function add(a, b) { return a + b; }".into(),
                "src/math.js".into(),
                1,
                1,
                ChunkKind::Function,
                "add".into(),
            ),
            CodeChunk::new(
                "function sub(a, b) { return a - b; }".into(),
                "src/math.js".into(),
                3,
                3,
                ChunkKind::Function,
                "sub".into(),
            ),
        ];
        let tests = vec![CodeChunk::new(
            "expect(add(1, 2)).toBe(3);".into(),
            "tests/math.test.js".into(),
            1,
            1,
            ChunkKind::Other,
            "lines_1_1".into(),
        )];
        vectors
            .upsert_chunks(&source, ChunkNamespace::Source, 10)
            .await
            .unwrap();
        vectors
            .upsert_chunks(&tests, ChunkNamespace::Test, 10)
            .await
            .unwrap();
        (RetrievalAugmenter::new(vectors), backend)
    }

    #[tokio::test]
    async fn retrieve_splits_results_by_namespace() {
        let (augmenter, _backend) = seeded_augmenter().await;
        let context = augmenter
            .retrieve("add two numbers", 5, &CancelFlag::new())
            .await
            .unwrap();
        assert_eq!(context.source_chunks.len(), 2);
        assert_eq!(context.test_chunks.len(), 1);
    }

    #[tokio::test]
    async fn cancelled_retrieve_returns_empty_without_queries() {
        let (augmenter, _backend) = seeded_augmenter().await;
        let cancel = CancelFlag::new();
        cancel.cancel();
        let context = augmenter.retrieve("anything", 5, &cancel).await.unwrap();
        assert!(context.source_chunks.is_empty());
        assert!(context.test_chunks.is_empty());
    }

    #[tokio::test]
    async fn cancellation_between_queries_discards_fetched_chunks() {
        let embedder = Arc::new(CancelOnEmbed::new(16));
        let vectors = Arc::new(
            VectorIndexService::new(
                Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>,
                Arc::new(InMemoryVectorBackend::new()),
                Tenant::new("alice", "proj"),
            )
            .with_batch_pacing(Duration::from_millis(0)),
        );
        vectors.initialize().await.unwrap();
        let source = vec![CodeChunk::new(
            "function add(a, b) { return a + b; }".into(),
            "src/math.js".into(),
            1,
            1,
            ChunkKind::Function,
            "add".into(),
        )];
        vectors
            .upsert_chunks(&source, ChunkNamespace::Source, 10)
            .await
            .unwrap();
        let augmenter = RetrievalAugmenter::new(vectors);

        // The flag trips while the source query embeds, so the test-side
        // checkpoint observes cancellation after source results exist.
        let cancel = CancelFlag::new();
        embedder.arm(cancel.clone());
        let context = augmenter.retrieve("add", 5, &cancel).await.unwrap();
        assert!(cancel.is_cancelled());
        assert!(context.source_chunks.is_empty());
        assert!(context.test_chunks.is_empty());
    }

    #[tokio::test]
    async fn retrieve_from_empty_namespace_yields_empty_list() {
        let backend = Arc::new(InMemoryVectorBackend::new());
        let vectors = Arc::new(
            VectorIndexService::new(
                Arc::new(NullEmbeddingProvider::new(16)),
                backend,
                Tenant::new("alice", "proj"),
            )
            .with_batch_pacing(Duration::from_millis(0)),
        );
        vectors.initialize().await.unwrap();
        let augmenter = RetrievalAugmenter::new(vectors);
        let context = augmenter
            .retrieve("anything", 5, &CancelFlag::new())
            .await
            .unwrap();
        assert!(context.source_chunks.is_empty());
        assert!(context.test_chunks.is_empty());
    }

    #[tokio::test]
    async fn augment_groups_files_and_separates_tests() {
        let (augmenter, _backend) = seeded_augmenter().await;
        let context = augmenter
            .retrieve("math", 5, &CancelFlag::new())
            .await
            .unwrap();
        let doc = augmenter.augment(
            "math",
            "arithmetic",
            &context.source_chunks,
            &context.test_chunks,
        );
        assert_eq!(doc.files.len(), 1);
        assert_eq!(doc.files[0].path, "src/math.js");
        assert_eq!(doc.files[0].headers.len(), 2);
        assert_eq!(doc.directory_summary, vec!["src".to_string()]);
        assert_eq!(doc.test_files.len(), 1);
        let markdown = doc.to_markdown();
        assert!(markdown.contains("## src/math.js"));
        assert!(markdown.contains("function add"));
    }

    #[tokio::test]
    async fn untested_focus_drops_covered_symbols() {
        let (augmenter, _backend) = seeded_augmenter().await;
        let fs = cdx_infrastructure::fs::InMemoryFileSystem::new();
        fs.write_file("tests/math.test.js", "expect(add(1, 2)).toBe(3);")
            .await;
        let context = augmenter
            .retrieve("math", 5, &CancelFlag::new())
            .await
            .unwrap();
        let doc = augmenter
            .augment_untested(
                &fs,
                "math",
                "arithmetic",
                &context.source_chunks,
                &context.test_chunks,
                &["tests/math.test.js".to_string()],
            )
            .await;
        // `add` is exercised by the test file; only `sub` remains.
        assert_eq!(doc.files.len(), 1);
        assert!(doc.files[0].code.contains("sub"));
        assert!(!doc.files[0].headers.iter().any(|h| h.contains(" add ")));
    }
}
