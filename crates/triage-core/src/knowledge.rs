//! Reference knowledge corpus and similarity retrieval.
//!
//! The corpus is loaded once at startup (embedded default or a
//! configured JSON file) and is immutable afterwards. Entry embeddings
//! are computed at most once per process, behind a double-checked async
//! init, and can be cached on disk keyed by the corpus content so a
//! restart does not re-pay the embedding cost.

use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::TriageConfig;
use crate::embedding::{cosine, Embedder};
use crate::error::TriageError;
use crate::schemas::{KnowledgeEntry, RetrievedExample};

/// Built-in corpus shipped with the crate.
const BUILTIN_CORPUS: &str = include_str!("../data/knowledge.json");

/// Immutable reference corpus plus its once-computed embedding index.
pub struct KnowledgeBase {
    entries: Vec<KnowledgeEntry>,
    embeddings: OnceCell<Vec<Vec<f32>>>,
    /// Hash of embedding model + corpus JSON, cache key for the
    /// embedding file
    corpus_hash: String,
    cache_path: Option<PathBuf>,
}

impl KnowledgeBase {
    /// Load and validate the corpus. Missing required fields are a fatal
    /// startup error - the process must not serve with a broken corpus.
    pub fn load(config: &TriageConfig) -> Result<Self, TriageError> {
        let raw = match &config.knowledge_path {
            Some(path) => std::fs::read_to_string(path).map_err(|e| {
                TriageError::Corpus(format!("cannot read {}: {}", path.display(), e))
            })?,
            None => BUILTIN_CORPUS.to_string(),
        };
        let entries: Vec<KnowledgeEntry> = serde_json::from_str(&raw)
            .map_err(|e| TriageError::Corpus(format!("corpus is not valid JSON: {e}")))?;

        for (i, entry) in entries.iter().enumerate() {
            if entry.instruction.trim().is_empty() || entry.response.trim().is_empty() {
                return Err(TriageError::Corpus(format!(
                    "entry {i} is missing a required instruction/response field"
                )));
            }
        }

        // Key the cache on corpus content AND embedding model: vectors
        // from a different model are a different space even when the
        // dimensions happen to match.
        let mut hasher = Sha256::new();
        hasher.update(config.embedding_model.as_bytes());
        hasher.update([0u8]);
        hasher.update(raw.as_bytes());
        let corpus_hash = hex::encode(hasher.finalize());
        let cache_path = if config.cache_embeddings {
            dirs::cache_dir().map(|d| d.join("triage").join(format!("kb-{corpus_hash}.json")))
        } else {
            None
        };

        info!("Loaded {} knowledge entries", entries.len());
        Ok(Self {
            entries,
            embeddings: OnceCell::new(),
            corpus_hash,
            cache_path,
        })
    }

    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }

    pub fn corpus_hash(&self) -> &str {
        &self.corpus_hash
    }

    /// Corpus embeddings, computed at most once per process. Disk cache
    /// reads/writes are best-effort: failures are logged and ignored.
    async fn index(&self, embedder: &dyn Embedder) -> Result<&Vec<Vec<f32>>, TriageError> {
        self.embeddings
            .get_or_try_init(|| async {
                if let Some(cached) = self.read_cache() {
                    return Ok(cached);
                }
                let texts: Vec<String> =
                    self.entries.iter().map(|e| e.instruction.clone()).collect();
                let vectors = embedder.embed(&texts).await?;
                self.write_cache(&vectors);
                Ok(vectors)
            })
            .await
    }

    fn read_cache(&self) -> Option<Vec<Vec<f32>>> {
        let path = self.cache_path.as_ref()?;
        let raw = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str::<Vec<Vec<f32>>>(&raw) {
            Ok(vectors) if vectors.len() == self.entries.len() => {
                debug!("Loaded corpus embeddings from {}", path.display());
                Some(vectors)
            }
            _ => {
                warn!("Ignoring unreadable embedding cache {}", path.display());
                None
            }
        }
    }

    fn write_cache(&self, vectors: &[Vec<f32>]) {
        let Some(path) = self.cache_path.as_ref() else {
            return;
        };
        let write = || -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let json = serde_json::to_string(vectors)?;
            std::fs::write(path, json)
        };
        if let Err(e) = write() {
            warn!("Could not write embedding cache {}: {}", path.display(), e);
        }
    }

    /// Top-k entries by cosine similarity to `text`, highest first, ties
    /// broken by corpus insertion order. Empty corpus yields an empty
    /// vec, never an error.
    pub async fn retrieve(
        &self,
        embedder: &dyn Embedder,
        text: &str,
        k: usize,
    ) -> Result<Vec<RetrievedExample>, TriageError> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let index = self.index(embedder).await?;
        let query_text = [text.to_string()];
        let query = embedder.embed(&query_text).await?;
        let query = query
            .first()
            .ok_or_else(|| TriageError::Embedding("no query vector returned".into()))?;

        let mut scored: Vec<(usize, f32)> = index
            .iter()
            .enumerate()
            .map(|(i, emb)| (i, cosine(query, emb)))
            .collect();
        // Stable: equal scores keep insertion order
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| RetrievedExample {
                entry: self.entries[i].clone(),
                score,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Deterministic bag-of-words embedder: identical texts embed
    /// identically, overlapping texts score high.
    struct FakeEmbedder;

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, TriageError> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; 64];
                    for word in t.to_lowercase().split_whitespace() {
                        let mut h: u32 = 2166136261;
                        for b in word.bytes() {
                            h = (h ^ b as u32).wrapping_mul(16777619);
                        }
                        v[(h % 64) as usize] += 1.0;
                    }
                    v
                })
                .collect())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, TriageError> {
            Err(TriageError::Embedding("host unreachable".into()))
        }
    }

    fn base() -> KnowledgeBase {
        KnowledgeBase::load(&TriageConfig {
            cache_embeddings: false,
            ..TriageConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_builtin_corpus_loads() {
        let kb = base();
        assert_eq!(kb.entries().len(), 8);
        assert!(!kb.corpus_hash().is_empty());
    }

    #[test]
    fn test_cache_key_changes_with_embedding_model() {
        let kb_a = KnowledgeBase::load(&TriageConfig {
            embedding_model: "nomic-embed-text".to_string(),
            ..TriageConfig::default()
        })
        .unwrap();
        let kb_b = KnowledgeBase::load(&TriageConfig {
            embedding_model: "mxbai-embed-large".to_string(),
            ..TriageConfig::default()
        })
        .unwrap();
        // Same corpus, different model: vectors must not be shared
        assert_ne!(kb_a.corpus_hash(), kb_b.corpus_hash());
    }

    #[test]
    fn test_corpus_missing_fields_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.json");
        std::fs::write(&path, r#"[{"instruction": "", "response": "ACCOUNT"}]"#).unwrap();
        let config = TriageConfig {
            knowledge_path: Some(path),
            ..TriageConfig::default()
        };
        assert!(matches!(
            KnowledgeBase::load(&config),
            Err(TriageError::Corpus(_))
        ));
    }

    #[tokio::test]
    async fn test_retrieve_ranks_near_duplicate_first() {
        let kb = base();
        let results = kb
            .retrieve(&FakeEmbedder, "I can't log into my account", 3)
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].entry.instruction, "I can't log into my account");
        assert!((results[0].score - 1.0).abs() < 1e-5);
        assert!(results[0].score >= results[1].score);
        assert!(results[1].score >= results[2].score);
    }

    #[tokio::test]
    async fn test_retrieve_k_zero_is_empty() {
        let kb = base();
        assert!(kb.retrieve(&FakeEmbedder, "anything", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_propagates_embedder_failure() {
        let kb = base();
        assert!(kb.retrieve(&FailingEmbedder, "anything", 3).await.is_err());
    }

    #[tokio::test]
    async fn test_index_computed_once() {
        // Second retrieve must not re-embed the corpus: a one-shot
        // embedder that fails after the first batch would error otherwise.
        struct CountingEmbedder(std::sync::atomic::AtomicUsize);

        #[async_trait]
        impl Embedder for CountingEmbedder {
            async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, TriageError> {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                FakeEmbedder.embed(texts).await
            }
        }

        let kb = base();
        let embedder = CountingEmbedder(std::sync::atomic::AtomicUsize::new(0));
        kb.retrieve(&embedder, "first", 2).await.unwrap();
        kb.retrieve(&embedder, "second", 2).await.unwrap();
        // 1 corpus batch + 2 query embeds
        assert_eq!(embedder.0.load(std::sync::atomic::Ordering::SeqCst), 3);
    }
}
