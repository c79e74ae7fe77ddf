use super::*;
use crate::chat::ChatError;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Scores chunks by how many query words they contain
struct KeywordIndex {
    chunks: Vec<DocumentChunk>,
    searches: Mutex<Vec<String>>,
}

impl KeywordIndex {
    fn new(contents: &[&str]) -> Self {
        let chunks = contents
            .iter()
            .enumerate()
            .map(|(i, content)| DocumentChunk {
                id: format!("doc.txt#{i}"),
                source: "doc.txt".to_string(),
                chunk_index: i,
                content: (*content).to_string(),
            })
            .collect();
        Self {
            chunks,
            searches: Mutex::new(Vec::new()),
        }
    }

    fn searched(&self) -> Vec<String> {
        self.searches.lock().expect("lock should not be poisoned").clone()
    }
}

#[async_trait]
impl ChunkSearch for KeywordIndex {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        self.searches
            .lock()
            .expect("lock should not be poisoned")
            .push(query.to_string());

        let words: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        let mut scored: Vec<RetrievedChunk> = self
            .chunks
            .iter()
            .map(|chunk| {
                let content = chunk.content.to_lowercase();
                let hits = words.iter().filter(|w| content.contains(w.as_str())).count();
                RetrievedChunk {
                    chunk: chunk.clone(),
                    distance: 1.0 / (hits as f32 + 1.0),
                }
            })
            .collect();
        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scored.truncate(k);
        Ok(scored)
    }
}

struct ScriptedChat {
    reply: std::result::Result<String, String>,
    calls: AtomicUsize,
}

impl ScriptedChat {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(reason: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(reason.to_string()),
            calls: AtomicUsize::new(0),
        })
    }
}

impl ChatModel for ScriptedChat {
    fn complete(&self, _request: &ChatRequest) -> std::result::Result<String, ChatError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply
            .clone()
            .map_err(|reason| ChatError::Request(anyhow::anyhow!(reason)))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

fn corpus() -> KeywordIndex {
    KeywordIndex::new(&[
        "Quarterly revenue grew by eight percent",
        "The new data center opens in Frankfurt",
        "Sovereign cloud for public sector customers",
        "Partnership with a European chip maker",
        "Revenue guidance for the full year was raised",
        "Frankfurt campus expands with renewable energy",
    ])
}

fn multi_query_config() -> RetrievalConfig {
    RetrievalConfig {
        strategy: RetrievalStrategy::MultiQuery,
        top_k: 2,
        ..Default::default()
    }
}

#[tokio::test]
async fn plain_retriever_returns_top_k() {
    let index = corpus();
    let retriever = PlainRetriever::new(2);

    let results = retriever
        .retrieve(&index, "revenue")
        .await
        .expect("retrieval should succeed");

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.chunk.content.to_lowercase().contains("revenue")));
    assert_eq!(index.searched(), vec!["revenue".to_string()]);
}

#[tokio::test]
async fn multi_query_is_a_superset_of_plain() {
    let index = corpus();
    let chat = ScriptedChat::replying("1. Frankfurt data center\n2. sovereign cloud offering\n3. chip partnership");

    let plain = PlainRetriever::new(2)
        .retrieve(&index, "revenue growth")
        .await
        .expect("plain retrieval should succeed");
    let multi = MultiQueryRetriever::new(chat, &multi_query_config(), 0.5)
        .retrieve(&index, "revenue growth")
        .await
        .expect("multi-query retrieval should succeed");

    let multi_ids: HashSet<&str> = multi.iter().map(|r| r.chunk.id.as_str()).collect();
    for hit in &plain {
        assert!(multi_ids.contains(hit.chunk.id.as_str()));
    }
    assert!(multi.len() > plain.len());
}

#[tokio::test]
async fn multi_query_deduplicates_in_first_seen_order() {
    let index = corpus();
    let chat = ScriptedChat::replying("revenue\nrevenue growth\nFrankfurt");

    let results = MultiQueryRetriever::new(chat, &multi_query_config(), 0.5)
        .retrieve(&index, "revenue")
        .await
        .expect("retrieval should succeed");

    let ids: Vec<&str> = results.iter().map(|r| r.chunk.id.as_str()).collect();
    let unique: HashSet<&str> = ids.iter().copied().collect();
    assert_eq!(ids.len(), unique.len());

    let original = PlainRetriever::new(2)
        .retrieve(&index, "revenue")
        .await
        .expect("retrieval should succeed");
    assert_eq!(results[0].chunk.id, original[0].chunk.id);
    assert_eq!(results[1].chunk.id, original[1].chunk.id);

    assert_eq!(
        index.searched(),
        vec!["revenue", "revenue", "revenue growth", "Frankfurt"]
    );
}

#[tokio::test]
async fn original_query_can_be_excluded() {
    let index = corpus();
    let chat = ScriptedChat::replying("Frankfurt");
    let config = RetrievalConfig {
        include_original: false,
        ..multi_query_config()
    };

    MultiQueryRetriever::new(chat, &config, 0.5)
        .retrieve(&index, "revenue")
        .await
        .expect("retrieval should succeed");

    assert_eq!(index.searched(), vec!["Frankfurt".to_string()]);
}

#[tokio::test]
async fn paraphrase_failure_fails_retrieval() {
    let index = corpus();
    let chat = ScriptedChat::failing("rate limited");

    let result = MultiQueryRetriever::new(Arc::<ScriptedChat>::clone(&chat), &multi_query_config(), 0.5)
        .retrieve(&index, "revenue")
        .await;

    assert!(result.is_err());
    assert_eq!(chat.calls.load(Ordering::SeqCst), 1);
    assert!(index.searched().is_empty());
}

#[test]
fn variants_are_capped_at_configured_count() {
    let chat = ScriptedChat::replying("a\nb\nc\nd\ne");
    let config = RetrievalConfig {
        query_variants: 2,
        ..multi_query_config()
    };
    let variants = MultiQueryRetriever::new(chat, &config, 0.5)
        .generate_variants("q")
        .expect("generation should succeed");
    assert_eq!(variants, vec!["a", "b"]);
}

#[test]
fn list_markers_are_stripped() {
    let response = "1. First question?\n\n2) Second question?\n- Third question?\n* 4. Fourth\n   \n2024 results overview";
    assert_eq!(
        parse_variants(response),
        vec![
            "First question?",
            "Second question?",
            "Third question?",
            "Fourth",
            "2024 results overview"
        ]
    );
}

#[test]
fn leading_numbers_in_questions_are_kept() {
    let response = "2024: revenue outlook?\n3.5 billion invested where?\n10)no space\n12. Real item";
    assert_eq!(
        parse_variants(response),
        vec![
            "2024: revenue outlook?",
            "3.5 billion invested where?",
            "10)no space",
            "Real item"
        ]
    );
}

#[test]
fn strategy_serialization() {
    assert_eq!(RetrievalStrategy::Plain.to_string(), "plain");
    assert_eq!(RetrievalStrategy::MultiQuery.to_string(), "multi_query");

    let config: RetrievalConfig =
        toml::from_str("strategy = \"multi_query\"\ntop_k = 6").expect("should parse");
    assert_eq!(config.strategy, RetrievalStrategy::MultiQuery);
    assert_eq!(config.top_k, 6);
    assert_eq!(config.query_variants, 3);
    assert!(config.include_original);
}

#[test]
fn config_validation() {
    assert!(RetrievalConfig::default().validate().is_ok());

    let config = RetrievalConfig {
        top_k: 0,
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::InvalidTopK(0))));

    let config = RetrievalConfig {
        query_variants: 11,
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidQueryVariants(11))
    ));
}

#[tokio::test]
async fn build_retriever_follows_strategy() {
    let index = corpus();
    let chat = ScriptedChat::replying("Frankfurt");

    let plain = build_retriever(&RetrievalConfig::default(), Arc::<ScriptedChat>::clone(&chat), 0.5);
    plain
        .retrieve(&index, "revenue")
        .await
        .expect("retrieval should succeed");
    assert_eq!(chat.calls.load(Ordering::SeqCst), 0);

    let multi = build_retriever(&multi_query_config(), Arc::<ScriptedChat>::clone(&chat), 0.5);
    multi
        .retrieve(&index, "revenue")
        .await
        .expect("retrieval should succeed");
    assert_eq!(chat.calls.load(Ordering::SeqCst), 1);
}
