//! 检索索引：查询 → top-k (段落, 来源链接)
//!
//! 索引内部实现不属于本设计核心，这里给出 trait 边界与一个向量实现：
//! 语料为预嵌入 JSONL（每行 text / link / embedding），查询经嵌入 API 编码后
//! 按余弦相似度取 top-k。

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::llm::EmbeddingProvider;

/// 一条检索结果：段落文本与来源链接
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    pub link: String,
}

/// 检索索引 trait：给定查询与数量上限，返回按相似度排序的段落
#[async_trait]
pub trait RetrievalIndex: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>, String>;
}

/// 语料条目（JSONL 单行）
#[derive(Debug, Clone, Deserialize)]
struct CorpusEntry {
    text: String,
    link: String,
    embedding: Vec<f32>,
}

/// 向量索引：预嵌入语料 + 查询时嵌入 + 余弦相似度 top-k
pub struct EmbeddingIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    entries: Vec<(Vec<f32>, Passage)>,
}

impl EmbeddingIndex {
    /// 从 JSONL 语料文件加载；空行跳过，单行解析失败视为语料损坏
    pub fn load(
        path: &Path,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, String> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("read corpus {}: {}", path.display(), e))?;
        let mut entries = Vec::new();
        for (i, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: CorpusEntry = serde_json::from_str(line)
                .map_err(|e| format!("corpus line {}: {}", i + 1, e))?;
            entries.push((
                entry.embedding,
                Passage {
                    text: entry.text,
                    link: entry.link,
                },
            ));
        }
        Ok(Self { embedder, entries })
    }

    /// 直接从内存条目构建（测试用）
    pub fn from_entries(
        embedder: Arc<dyn EmbeddingProvider>,
        entries: Vec<(Vec<f32>, Passage)>,
    ) -> Self {
        Self { embedder, entries }
    }
}

#[async_trait]
impl RetrievalIndex for EmbeddingIndex {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>, String> {
        let query_embedding = self.embedder.embed(query).await?;
        if query_embedding.is_empty() {
            return Ok(vec![]);
        }
        let mut scored: Vec<(f32, &Passage)> = self
            .entries
            .iter()
            .map(|(emb, passage)| (cosine_similarity(&query_embedding, emb), passage))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored.into_iter().take(k).map(|(_, p)| p.clone()).collect())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, String> {
            Ok(self.0.clone())
        }
    }

    fn passage(text: &str) -> Passage {
        Passage {
            text: text.to_string(),
            link: format!("http://example.com/{}", text),
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);
        let c = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &c).abs() < 0.001);
        assert_eq!(cosine_similarity(&a, &[]), 0.0);
    }

    #[tokio::test]
    async fn test_load_jsonl_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.jsonl");
        std::fs::write(
            &path,
            concat!(
                r#"{"text": "office hours 9-17", "link": "http://x.test/a", "embedding": [1.0, 0.0]}"#,
                "\n\n",
                r#"{"text": "campus map", "link": "http://x.test/b", "embedding": [0.0, 1.0]}"#,
                "\n",
            ),
        )
        .unwrap();

        let embedder = Arc::new(FixedEmbedder(vec![1.0, 0.0]));
        let index = EmbeddingIndex::load(&path, embedder).unwrap();
        let results = index.search("hours", 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].link, "http://x.test/a");
    }

    #[test]
    fn test_load_rejects_broken_corpus_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.jsonl");
        std::fs::write(&path, "{\"text\": \"no embedding\"}\n").unwrap();
        let embedder = Arc::new(FixedEmbedder(vec![1.0]));
        let err = EmbeddingIndex::load(&path, embedder);
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_search_ranks_by_similarity_and_caps_k() {
        let embedder = Arc::new(FixedEmbedder(vec![1.0, 0.0]));
        let entries = vec![
            (vec![0.0, 1.0], passage("far")),
            (vec![1.0, 0.0], passage("near")),
            (vec![0.7, 0.7], passage("mid")),
        ];
        let index = EmbeddingIndex::from_entries(embedder, entries);
        let results = index.search("q", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "near");
        assert_eq!(results[1].text, "mid");
        assert!(results.iter().all(|p| !p.link.is_empty()));
    }
}
