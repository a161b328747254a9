//! Document retrieval + synthesis engine
//!
//! Loads plain-text documents from a directory, ranks paragraph chunks
//! by term overlap with the question, and asks a completion model to
//! answer grounded in the top-ranked passages. A lexical stand-in for a
//! vector index; good enough for the shipped binary.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::Error;
use crate::reasoning::CompletionClient;
use crate::tools::QueryEngine;
use crate::Result;

const TOP_K: usize = 5;
const MIN_TERM_LEN: usize = 4;

const STOPWORDS: &[&str] = &[
    "what", "when", "where", "which", "does", "this", "that", "with", "about", "tell", "have",
    "from", "your", "their",
];

const SYNTHESIS_SYSTEM_PROMPT: &str = "\
You are a knowledgeable assistant analyzing documents. Your task is to answer \
the user's question based on the provided context from the documents.

Guidelines:
1. Base your answer primarily on the provided context
2. If the context contains relevant information, provide a comprehensive answer
3. If the context doesn't contain sufficient information, state this clearly
4. Synthesize information from multiple parts of the context when relevant
5. Be precise and factual in your response";

struct Chunk {
    source: String,
    text: String,
}

pub struct DocumentStore {
    chunks: Vec<Chunk>,
    source_count: usize,
    llm: Arc<dyn CompletionClient>,
}

impl DocumentStore {
    /// Load every `.txt`/`.md` file under `dir` into paragraph chunks.
    pub fn load(dir: &Path, llm: Arc<dyn CompletionClient>) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::Config(format!(
                "document directory not found: {}",
                dir.display()
            )));
        }

        let mut chunks = Vec::new();
        let mut source_count = 0usize;
        let mut entries: Vec<_> = std::fs::read_dir(dir)?
            .collect::<std::io::Result<Vec<_>>>()?
            .into_iter()
            .map(|e| e.path())
            .collect();
        entries.sort();

        for path in entries {
            let supported = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| matches!(e.to_lowercase().as_str(), "txt" | "md"))
                .unwrap_or(false);
            if !supported {
                continue;
            }
            let text = std::fs::read_to_string(&path)?;
            let source = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let before = chunks.len();
            for paragraph in text.split("\n\n") {
                let paragraph = paragraph.trim();
                if paragraph.is_empty() {
                    continue;
                }
                chunks.push(Chunk {
                    source: source.clone(),
                    text: paragraph.to_string(),
                });
            }
            if chunks.len() > before {
                source_count += 1;
            }
        }

        if chunks.is_empty() {
            return Err(Error::Config(format!(
                "no supported documents (.txt, .md) found in {}",
                dir.display()
            )));
        }

        info!(
            "loaded {} chunks from {} document(s)",
            chunks.len(),
            source_count
        );
        Ok(Self {
            chunks,
            source_count,
            llm,
        })
    }

    pub fn source_count(&self) -> usize {
        self.source_count
    }

    /// Top-ranked chunks by term overlap, best first
    fn retrieve(&self, query: &str) -> Vec<&Chunk> {
        let terms = query_terms(query);
        let mut scored: Vec<(usize, &Chunk)> = self
            .chunks
            .iter()
            .map(|chunk| (overlap_score(&chunk.text, &terms), chunk))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().take(TOP_K).map(|(_, c)| c).collect()
    }
}

#[async_trait]
impl QueryEngine for DocumentStore {
    async fn query(&self, query: &str) -> Result<String> {
        let relevant = self.retrieve(query);
        if relevant.is_empty() {
            return Ok("No relevant passages were found in the document set.".to_string());
        }
        debug!("retrieved {} passage(s) for synthesis", relevant.len());

        let context = relevant
            .iter()
            .map(|chunk| format!("[{}]\n{}", chunk.source, chunk.text))
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = format!("Context: {}\n\nQuestion: {}\n\nAnswer:", context, query);
        self.llm.complete(SYNTHESIS_SYSTEM_PROMPT, &prompt).await
    }
}

fn query_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= MIN_TERM_LEN && !STOPWORDS.contains(t))
        .map(str::to_string)
        .collect()
}

fn overlap_score(text: &str, terms: &[String]) -> usize {
    let haystack = text.to_lowercase();
    terms.iter().filter(|t| haystack.contains(t.as_str())).count()
}
