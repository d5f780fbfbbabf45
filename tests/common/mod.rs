#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document as PdfDocument, Object, Stream};
use pdf_chatbot::document::{Chunk, Metadata, ScoredChunk};
use pdf_chatbot::providers::CompletionProvider;
use pdf_chatbot::VectorStore;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Keeps records in memory and "searches" by shared words, so retrieval is
/// predictable without embeddings.
#[derive(Default)]
pub struct InMemoryStore {
    records: Mutex<Vec<Chunk>>,
    pub reset_calls: AtomicUsize,
    pub add_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
    pub fail_reset: bool,
}

impl InMemoryStore {
    pub fn failing() -> Self {
        Self {
            fail_reset: true,
            ..Default::default()
        }
    }

    pub fn total_calls(&self) -> usize {
        self.reset_calls.load(Ordering::SeqCst)
            + self.add_calls.load(Ordering::SeqCst)
            + self.search_calls.load(Ordering::SeqCst)
    }

    pub fn records(&self) -> Vec<Chunk> {
        self.records.lock().unwrap().clone()
    }
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 3)
        .map(|w| w.to_lowercase())
        .collect()
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn reset(&self) -> Result<()> {
        self.reset_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reset {
            bail!("connection refused");
        }
        self.records.lock().unwrap().clear();
        Ok(())
    }

    async fn add_texts(&self, texts: &[String], metadatas: &[Metadata]) -> Result<Vec<String>> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        let mut records = self.records.lock().unwrap();
        let mut ids = Vec::new();
        for (text, metadata) in texts.iter().zip(metadatas) {
            ids.push(format!("record-{}", records.len()));
            records.push(Chunk {
                content: text.clone(),
                metadata: metadata.clone(),
            });
        }
        Ok(ids)
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let query_words = words(query);
        let mut hits: Vec<ScoredChunk> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter_map(|chunk| {
                let chunk_words = words(&chunk.content);
                let shared = query_words.iter().filter(|w| chunk_words.contains(w)).count();
                (shared > 0).then(|| ScoredChunk {
                    chunk: chunk.clone(),
                    score: shared as f32,
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }
}

pub struct ScriptedLlm {
    reply: String,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedLlm {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }

    fn get_model_info(&self) -> String {
        "scripted".to_string()
    }
}

/// Writes a PDF with one line of Courier text per page.
pub fn write_pdf(path: &Path, pages: &[&str]) {
    let mut doc = PdfDocument::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => pages.len() as i64,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();
    doc.save(path).unwrap();
}
