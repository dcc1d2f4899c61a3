use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use super::flat_index::{FlatIndex, Neighbor};
use crate::domain::{
    ports::{EmbeddingService, VectorStore},
    DomainError, Embedding, Record, SearchHit,
};

/// Flat inner-product index plus the record sequence it labels, persisted as
/// an index file and a JSON Lines metadata file.
///
/// Label `i` in the index is ordinal `i` in the record sequence. Both halves
/// live behind one lock, so readers never see one without the other.
pub struct PersistedVectorStore {
    embedder: Arc<dyn EmbeddingService>,
    index_path: PathBuf,
    meta_path: PathBuf,
    dimension: usize,
    state: RwLock<StoreState>,
}

struct StoreState {
    index: FlatIndex,
    records: Vec<Record>,
}

impl StoreState {
    fn len(&self) -> usize {
        self.records.len()
    }

    fn truncate(&mut self, len: usize) {
        self.index.truncate(len);
        self.records.truncate(len);
    }
}

impl PersistedVectorStore {
    /// Loads the snapshot at the given paths, or starts empty when either
    /// file is absent. Fails if the snapshot is unreadable, its dimension
    /// differs from the provider's, or the two files disagree on the count.
    pub fn open(
        index_path: impl Into<PathBuf>,
        meta_path: impl Into<PathBuf>,
        embedder: Arc<dyn EmbeddingService>,
    ) -> Result<Self, DomainError> {
        let index_path = index_path.into();
        let meta_path = meta_path.into();
        let dimension = embedder.dimension();

        let state = load_snapshot(&index_path, &meta_path, dimension)?;
        info!(
            index = %index_path.display(),
            meta = %meta_path.display(),
            records = state.len(),
            dimension,
            "vector store opened"
        );

        Ok(Self {
            embedder,
            index_path,
            meta_path,
            dimension,
            state: RwLock::new(state),
        })
    }

    /// Writes both snapshot files. Each file is staged and synced next to its
    /// target before either rename, so a failed write leaves the previous
    /// snapshot untouched.
    async fn persist(&self, state: &StoreState) -> Result<(), PersistFailure> {
        let mut index_bytes = Vec::with_capacity(64 + state.index.len() * self.dimension * 4);
        state
            .index
            .write_to(&mut index_bytes)
            .map_err(|e| PersistFailure::staged(e.into()))?;

        let mut meta = String::new();
        for record in &state.records {
            let line = serde_json::to_string(record)
                .map_err(|e| PersistFailure::staged(DomainError::internal(e.to_string())))?;
            meta.push_str(&line);
            meta.push('\n');
        }

        let index_tmp = stage(&self.index_path, index_bytes)
            .await
            .map_err(PersistFailure::staged)?;
        let meta_tmp = match stage(&self.meta_path, meta.into_bytes()).await {
            Ok(path) => path,
            Err(e) => {
                discard(&index_tmp).await;
                return Err(PersistFailure::staged(e));
            }
        };

        // From here on the index may already be replaced on disk.
        if let Err(e) = commit(&index_tmp, &self.index_path).await {
            discard(&index_tmp).await;
            discard(&meta_tmp).await;
            return Err(PersistFailure {
                error: e,
                index_replaced: true,
            });
        }
        if let Err(e) = commit(&meta_tmp, &self.meta_path).await {
            discard(&meta_tmp).await;
            return Err(PersistFailure {
                error: e,
                index_replaced: true,
            });
        }
        Ok(())
    }

    fn check_dimension(&self, vector: &Embedding) -> Result<(), DomainError> {
        if vector.dimension() != self.dimension {
            return Err(DomainError::external(format!(
                "embedding provider returned dimension {}, expected {}",
                vector.dimension(),
                self.dimension
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for PersistedVectorStore {
    #[instrument(skip(self, texts, sources), fields(count = texts.len()))]
    async fn add_texts(&self, texts: &[String], sources: &[String]) -> Result<(), DomainError> {
        if texts.len() != sources.len() {
            return Err(DomainError::validation(format!(
                "got {} texts but {} sources",
                texts.len(),
                sources.len()
            )));
        }
        if texts.is_empty() {
            return Ok(());
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(DomainError::validation("texts must not be blank"));
        }

        let mut state = self.state.write().await;

        let batch: Vec<&str> = texts.iter().map(String::as_str).collect();
        let vectors = self.embedder.embed_batch(&batch).await?;
        if vectors.len() != texts.len() {
            return Err(DomainError::external(format!(
                "embedding provider returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        let vectors: Vec<Embedding> = vectors.into_iter().map(Embedding::normalized).collect();
        for vector in &vectors {
            self.check_dimension(vector)?;
        }

        let before = state.len();
        state.index.add(&vectors)?;
        state.records.extend(
            texts
                .iter()
                .zip(sources)
                .map(|(text, source)| Record::new(text.clone(), source.clone())),
        );

        if let Err(failure) = self.persist(&state).await {
            warn!(error = %failure.error, "persist failed, rolling back append");
            state.truncate(before);
            if failure.index_replaced {
                // The index on disk may be ahead of the metadata; write the
                // rolled-back snapshot over both.
                if let Err(restore) = self.persist(&state).await {
                    error!(error = %restore.error, "failed to restore previous snapshot");
                }
            }
            return Err(failure.error);
        }

        info!(added = texts.len(), total = state.len(), "texts added");
        Ok(())
    }

    #[instrument(skip(self, query))]
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, DomainError> {
        let state = self.state.read().await;
        if state.index.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query = self.embedder.embed(query).await?.normalized();
        self.check_dimension(&query)?;

        let neighbors = state
            .index
            .search(query.as_slice(), k.min(state.index.len()))?;

        let hits = resolve_hits(&state.records, neighbors);

        debug!(found = hits.len(), "search completed");
        Ok(hits)
    }

    async fn len(&self) -> usize {
        self.state.read().await.len()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn load_snapshot(
    index_path: &Path,
    meta_path: &Path,
    dimension: usize,
) -> Result<StoreState, DomainError> {
    let empty = || -> Result<StoreState, DomainError> {
        Ok(StoreState {
            index: FlatIndex::new(dimension)?,
            records: Vec::new(),
        })
    };

    match (index_path.exists(), meta_path.exists()) {
        (true, true) => {}
        (false, false) => return empty(),
        (index_present, meta_present) => {
            warn!(
                index_present,
                meta_present, "incomplete snapshot, starting with an empty store"
            );
            return empty();
        }
    }

    let mut reader = BufReader::new(File::open(index_path)?);
    let index = FlatIndex::read_from(&mut reader)?;
    if index.dimension() != dimension {
        return Err(DomainError::storage(format!(
            "index dimension {} does not match embedding dimension {}",
            index.dimension(),
            dimension
        )));
    }

    let records = read_records(meta_path)?;
    if index.len() != records.len() {
        return Err(DomainError::Inconsistent {
            index: index.len(),
            records: records.len(),
        });
    }

    Ok(StoreState { index, records })
}

fn read_records(path: &Path) -> Result<Vec<Record>, DomainError> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: Record = serde_json::from_str(&line).map_err(|e| {
            DomainError::storage(format!(
                "{}:{}: invalid record: {e}",
                path.display(),
                line_no + 1
            ))
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Index slots map to record ordinals; unfilled slots (label `-1`) and
/// labels past the record sequence are dropped.
fn resolve_hits(records: &[Record], neighbors: Vec<Neighbor>) -> Vec<SearchHit> {
    neighbors
        .into_iter()
        .filter_map(|n| {
            let ordinal = usize::try_from(n.label).ok()?;
            records
                .get(ordinal)
                .map(|record| SearchHit::from_record(record, n.score))
        })
        .collect()
}

struct PersistFailure {
    error: DomainError,
    /// The index file may have been renamed into place without the metadata.
    index_replaced: bool,
}

impl PersistFailure {
    fn staged(error: DomainError) -> Self {
        Self {
            error,
            index_replaced: false,
        }
    }
}

fn tmp_path(path: &Path) -> Result<PathBuf, DomainError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| DomainError::storage(format!("{} is not a file path", path.display())))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    Ok(path.with_file_name(tmp_name))
}

/// Writes `bytes` to the sibling temp file of `path` and syncs it to disk.
async fn stage(path: &Path, bytes: Vec<u8>) -> Result<PathBuf, DomainError> {
    let tmp = tmp_path(path)?;
    let target = tmp.clone();
    tokio::task::spawn_blocking(move || -> Result<(), DomainError> {
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(&target)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        Ok(())
    })
    .await
    .map_err(|e| DomainError::internal(format!("snapshot write task failed: {e}")))??;
    Ok(tmp)
}

/// Renames a staged file over `path` and syncs the directory entry.
async fn commit(tmp: &Path, path: &Path) -> Result<(), DomainError> {
    tokio::fs::rename(tmp, path).await?;
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || sync_parent_directory(&path))
        .await
        .map_err(|e| DomainError::internal(format!("directory sync task failed: {e}")))??;
    Ok(())
}

async fn discard(tmp: &Path) {
    if let Err(e) = tokio::fs::remove_file(tmp).await {
        debug!(path = %tmp.display(), error = %e, "could not remove staged file");
    }
}

fn sync_parent_directory(path: &Path) -> Result<(), DomainError> {
    #[cfg(unix)]
    {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            File::open(parent)?.sync_all()?;
        }
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::embedding::HashingEmbedding;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Returns fixed vectors for known texts.
    struct FixedEmbedder {
        vectors: HashMap<&'static str, Vec<f32>>,
        calls: AtomicUsize,
    }

    impl FixedEmbedder {
        fn new(entries: &[(&'static str, &[f32])]) -> Self {
            Self {
                vectors: entries.iter().map(|(k, v)| (*k, v.to_vec())).collect(),
                calls: AtomicUsize::new(0),
            }
        }

        fn lookup(&self, text: &str) -> Result<Embedding, DomainError> {
            self.vectors
                .get(text)
                .map(|v| Embedding::new(v.clone()))
                .ok_or_else(|| DomainError::external(format!("unknown text {text}")))
        }
    }

    #[async_trait]
    impl EmbeddingService for FixedEmbedder {
        async fn embed(&self, text: &str) -> Result<Embedding, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.lookup(text)
        }

        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            texts.iter().map(|t| self.lookup(t)).collect()
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    struct Paths {
        _dir: TempDir,
        index: PathBuf,
        meta: PathBuf,
    }

    fn paths() -> Paths {
        let dir = TempDir::new().unwrap();
        let index = dir.path().join("embeddings").join("faiss.index");
        let meta = dir.path().join("embeddings").join("meta.jsonl");
        Paths {
            _dir: dir,
            index,
            meta,
        }
    }

    fn hashing_store(p: &Paths) -> PersistedVectorStore {
        PersistedVectorStore::open(&p.index, &p.meta, Arc::new(HashingEmbedding::new(64))).unwrap()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_store_search_returns_nothing() {
        let p = paths();
        let embedder = Arc::new(FixedEmbedder::new(&[]));
        let store = PersistedVectorStore::open(&p.index, &p.meta, embedder.clone()).unwrap();

        let hits = store.search("anything", 5).await.unwrap();

        assert!(hits.is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert!(!p.index.exists());
    }

    #[tokio::test]
    async fn test_add_texts_persists_both_files() {
        let p = paths();
        let store = hashing_store(&p);

        store
            .add_texts(
                &strings(&["The cat sat on the mat.", "Dogs are loyal companions."]),
                &strings(&["doc1.txt", "doc1.txt"]),
            )
            .await
            .unwrap();

        assert_eq!(store.len().await, 2);
        let meta = std::fs::read_to_string(&p.meta).unwrap();
        let lines: Vec<&str> = meta.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            r#"{"text":"The cat sat on the mat.","source":"doc1.txt"}"#
        );

        let mut reader = BufReader::new(File::open(&p.index).unwrap());
        assert_eq!(FlatIndex::read_from(&mut reader).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_add_texts_rejects_length_mismatch() {
        let p = paths();
        let store = hashing_store(&p);

        let err = store
            .add_texts(&strings(&["a", "b"]), &strings(&["src"]))
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(store.len().await, 0);
        assert!(!p.meta.exists());
    }

    #[tokio::test]
    async fn test_add_texts_empty_is_noop() {
        let p = paths();
        let store = hashing_store(&p);

        store.add_texts(&[], &[]).await.unwrap();

        assert!(store.is_empty().await);
        assert!(!p.index.exists());
    }

    #[tokio::test]
    async fn test_provider_failure_leaves_store_unchanged() {
        let p = paths();
        let embedder = Arc::new(FixedEmbedder::new(&[("known", &[1.0, 0.0])]));
        let store = PersistedVectorStore::open(&p.index, &p.meta, embedder).unwrap();
        store
            .add_texts(&strings(&["known"]), &strings(&["a"]))
            .await
            .unwrap();

        let err = store
            .add_texts(&strings(&["known", "unknown"]), &strings(&["a", "b"]))
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::ExternalService(_)));
        assert_eq!(store.len().await, 1);
        assert_eq!(std::fs::read_to_string(&p.meta).unwrap().lines().count(), 1);
    }

    #[tokio::test]
    async fn test_persist_failure_rolls_back() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"x").unwrap();
        let store = PersistedVectorStore::open(
            blocker.join("faiss.index"),
            blocker.join("meta.jsonl"),
            Arc::new(HashingEmbedding::new(16)),
        )
        .unwrap();

        let err = store
            .add_texts(&strings(&["some text"]), &strings(&["a"]))
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Storage(_)));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_failed_metadata_write_keeps_snapshot_loadable() {
        let p = paths();
        {
            let store = hashing_store(&p);
            store
                .add_texts(&strings(&["first text"]), &strings(&["a"]))
                .await
                .unwrap();

            let meta_tmp = tmp_path(&p.meta).unwrap();
            std::fs::create_dir_all(meta_tmp.join("x")).unwrap();

            let err = store
                .add_texts(&strings(&["second text"]), &strings(&["b"]))
                .await
                .unwrap_err();

            assert!(matches!(err, DomainError::Storage(_)));
            assert_eq!(store.len().await, 1);
            assert!(!tmp_path(&p.index).unwrap().exists());
        }

        let reopened = hashing_store(&p);
        assert_eq!(reopened.len().await, 1);
        let hits = reopened.search("first text", 1).await.unwrap();
        assert_eq!(hits[0].text, "first text");
    }

    #[tokio::test]
    async fn test_successful_add_leaves_no_staged_files() {
        let p = paths();
        let store = hashing_store(&p);

        store
            .add_texts(&strings(&["some text"]), &strings(&["a"]))
            .await
            .unwrap();

        assert!(p.index.exists());
        assert!(p.meta.exists());
        assert!(!tmp_path(&p.index).unwrap().exists());
        assert!(!tmp_path(&p.meta).unwrap().exists());
    }

    #[test]
    fn test_resolve_hits_skips_unfilled_and_unknown_labels() {
        let records = vec![Record::new("only", "a.txt")];
        let neighbors = vec![
            Neighbor {
                label: 0,
                score: 0.9,
            },
            Neighbor::MISSING,
            Neighbor {
                label: 7,
                score: 0.1,
            },
        ];

        let hits = resolve_hits(&records, neighbors);

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "only");
        assert_eq!(hits[0].source, "a.txt");
        assert!((hits[0].score - 0.9).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_search_returns_top_k_descending() {
        let p = paths();
        let embedder = Arc::new(FixedEmbedder::new(&[
            ("north", &[0.0, 1.0]),
            ("east", &[1.0, 0.0]),
            ("north-east", &[1.0, 1.0]),
            ("south", &[0.0, -1.0]),
            ("query", &[0.2, 1.0]),
        ]));
        let store = PersistedVectorStore::open(&p.index, &p.meta, embedder).unwrap();
        store
            .add_texts(
                &strings(&["north", "east", "north-east", "south"]),
                &strings(&["n", "e", "ne", "s"]),
            )
            .await
            .unwrap();

        let hits = store.search("query", 3).await.unwrap();

        let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["north", "north-east", "east"]);
        assert!(hits.windows(2).all(|w| w[0].score > w[1].score));
        assert_eq!(hits[0].source, "n");
    }

    #[tokio::test]
    async fn test_search_k_larger_than_store() {
        let p = paths();
        let store = hashing_store(&p);
        store
            .add_texts(&strings(&["alpha beta"]), &strings(&["a"]))
            .await
            .unwrap();

        let hits = store.search("alpha", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(store.search("alpha", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reload_yields_identical_results() {
        let p = paths();
        let texts = strings(&[
            "rust ownership and borrowing",
            "async runtimes schedule tasks",
            "vector search uses inner products",
            "the borrow checker enforces ownership",
        ]);
        let sources = strings(&["a.md", "b.md", "c.md", "a.md"]);

        let before = {
            let store = hashing_store(&p);
            store.add_texts(&texts[..2], &sources[..2]).await.unwrap();
            store.add_texts(&texts[2..], &sources[2..]).await.unwrap();
            store.search("ownership borrow", 4).await.unwrap()
        };

        let reopened = hashing_store(&p);
        let after = reopened.search("ownership borrow", 4).await.unwrap();

        assert_eq!(reopened.len().await, 4);
        assert_eq!(before.len(), after.len());
        for (a, b) in before.iter().zip(&after) {
            assert_eq!(a.text, b.text);
            assert_eq!(a.source, b.source);
            assert!((a.score - b.score).abs() < 1e-6);
        }
    }

    #[tokio::test]
    async fn test_count_invariant_across_calls() {
        let p = paths();
        let store = hashing_store(&p);

        for batch in [1usize, 3, 2] {
            let texts: Vec<String> = (0..batch).map(|i| format!("text number {i}")).collect();
            let sources = vec!["s".to_string(); batch];
            store.add_texts(&texts, &sources).await.unwrap();
        }

        assert_eq!(store.len().await, 6);
        let state = store.state.read().await;
        assert_eq!(state.index.len(), state.records.len());
    }

    #[tokio::test]
    async fn test_open_fails_on_count_mismatch() {
        let p = paths();
        {
            let store = hashing_store(&p);
            store
                .add_texts(&strings(&["one", "two"]), &strings(&["a", "a"]))
                .await
                .unwrap();
        }
        let meta = std::fs::read_to_string(&p.meta).unwrap();
        let first_line = meta.lines().next().unwrap();
        std::fs::write(&p.meta, format!("{first_line}\n")).unwrap();

        let result =
            PersistedVectorStore::open(&p.index, &p.meta, Arc::new(HashingEmbedding::new(64)));

        assert!(matches!(
            result,
            Err(DomainError::Inconsistent {
                index: 2,
                records: 1
            })
        ));
    }

    #[tokio::test]
    async fn test_open_fails_on_dimension_mismatch() {
        let p = paths();
        {
            let store = hashing_store(&p);
            store
                .add_texts(&strings(&["one"]), &strings(&["a"]))
                .await
                .unwrap();
        }

        let result =
            PersistedVectorStore::open(&p.index, &p.meta, Arc::new(HashingEmbedding::new(32)));

        assert!(matches!(result, Err(DomainError::Storage(_))));
    }

    #[tokio::test]
    async fn test_open_with_one_file_missing_starts_empty() {
        let p = paths();
        std::fs::create_dir_all(p.meta.parent().unwrap()).unwrap();
        std::fs::write(&p.meta, "{\"text\":\"orphan\",\"source\":\"x\"}\n").unwrap();

        let store = hashing_store(&p);

        assert!(store.is_empty().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_and_searches_keep_pairs_aligned() {
        let p = paths();
        let store = Arc::new(hashing_store(&p));

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let texts = vec![format!("writer {i} first"), format!("writer {i} second")];
                let sources = vec![format!("w{i}"), format!("w{i}")];
                store.add_texts(&texts, &sources).await.unwrap();

                for hit in store.search(&format!("writer {i}"), 4).await.unwrap() {
                    assert!(hit.text.starts_with("writer"));
                    assert_eq!(hit.source, format!("w{}", &hit.text[7..8]));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len().await, 16);
        let reopened = hashing_store(&p);
        assert_eq!(reopened.len().await, 16);
    }

    #[tokio::test]
    #[ignore] // Requires OPENAI_API_KEY
    async fn test_semantic_scenario_with_remote_model() {
        use crate::infrastructure::config::EmbeddingConfig;
        use crate::infrastructure::embedding::TextEmbedding;

        let p = paths();
        let embedder = Arc::new(TextEmbedding::from_config(&EmbeddingConfig::default()));
        let store = PersistedVectorStore::open(&p.index, &p.meta, embedder).unwrap();
        store
            .add_texts(
                &strings(&["The cat sat on the mat.", "Dogs are loyal companions."]),
                &strings(&["doc1.txt", "doc1.txt"]),
            )
            .await
            .unwrap();

        let hits = store.search("feline pet", 1).await.unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "The cat sat on the mat.");
        assert_eq!(hits[0].source, "doc1.txt");
    }
}
