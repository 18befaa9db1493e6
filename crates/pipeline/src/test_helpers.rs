//! Shared test helpers for pipeline tests.

use async_trait::async_trait;
use itzai_core::document::DocumentSource;
use itzai_core::error::{ExtractError, ProviderError};
use itzai_core::message::Message;
use itzai_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::extractor::DocumentExtractor;

/// A mock provider that returns scripted results in sequence and records
/// every prompt it receives.
///
/// Panics if more calls are made than results provided.
pub struct ScriptedProvider {
    results: Mutex<VecDeque<Result<String, ProviderError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(results: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A provider that answers once with `text`.
    pub fn answer(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    /// A provider that fails once with `err`.
    pub fn failing(err: ProviderError) -> Self {
        Self::new(vec![Err(err)])
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let prompt = request
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().unwrap().push(prompt);

        let next = self.results.lock().unwrap().pop_front();
        let text = match next {
            Some(result) => result?,
            None => panic!("ScriptedProvider: no more scripted results"),
        };

        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "mock-model".into(),
        })
    }
}

/// An extractor with canned results keyed by source descriptor.
/// Unknown sources are `NotFound`.
#[derive(Default)]
pub struct StubExtractor {
    results: HashMap<String, Result<String, ExtractError>>,
}

impl StubExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, descriptor: &str, text: &str) -> Self {
        self.results.insert(descriptor.to_string(), Ok(text.to_string()));
        self
    }

    pub fn with_error(mut self, descriptor: &str, err: ExtractError) -> Self {
        self.results.insert(descriptor.to_string(), Err(err));
        self
    }
}

#[async_trait]
impl DocumentExtractor for StubExtractor {
    fn name(&self) -> &str {
        "stub"
    }

    async fn extract(&self, source: &DocumentSource) -> Result<String, ExtractError> {
        let descriptor = source.descriptor();
        self.results
            .get(&descriptor)
            .cloned()
            .unwrap_or(Err(ExtractError::NotFound(descriptor)))
    }
}

/// Generate a valid PDF with one text line per page using lopdf.
pub fn text_pdf(pages: &[&str]) -> Vec<u8> {
    build_pdf(pages.iter().map(|text| format!("BT /F1 12 Tf 100 700 Td ({text}) Tj ET")))
}

/// A one-page PDF whose page has no text layer, like a scanned record.
pub fn textless_pdf() -> Vec<u8> {
    build_pdf(std::iter::once(String::new()))
}

fn build_pdf(contents: impl Iterator<Item = String>) -> Vec<u8> {
    use lopdf::dictionary;
    use lopdf::{Document, Object, Stream};

    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids: Vec<Object> = Vec::new();
    for content in contents {
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! {
                    "F1" => font_id,
                },
            },
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}
