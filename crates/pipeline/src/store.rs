//! The per-session document store.
//!
//! Holds at most one clinical history and one treatment protocol plus the
//! "include protocol" toggle. A failed load never touches the slot it
//! targeted: a bad re-upload must not erase a document that already works.

use chrono::{DateTime, Utc};
use itzai_core::document::{Document, DocumentSlot, DocumentSource};
use itzai_core::error::LoadError;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::extractor::DocumentExtractor;

/// Read-only copy of the store taken at the start of prompt assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentStoreView {
    pub primary: Option<Document>,
    pub supplementary: Option<Document>,
    pub include_supplementary: bool,
    /// When the snapshot was taken; printed in the report header.
    pub captured_at: DateTime<Utc>,
}

impl DocumentStoreView {
    /// The supplementary document, but only if it is toggled on.
    pub fn effective_supplementary(&self) -> Option<&Document> {
        if self.include_supplementary {
            self.supplementary.as_ref()
        } else {
            None
        }
    }
}

/// What the presentation layer needs to know about one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotStatus {
    pub slot: DocumentSlot,
    pub loaded: bool,
    pub source: Option<String>,
    pub chars: usize,
    pub loaded_at: Option<DateTime<Utc>>,
}

/// Document slots for a single session.
pub struct DocumentStore {
    extractor: Arc<dyn DocumentExtractor>,
    primary: Option<Document>,
    supplementary: Option<Document>,
    include_supplementary: bool,
}

impl DocumentStore {
    pub fn new(extractor: Arc<dyn DocumentExtractor>) -> Self {
        Self {
            extractor,
            primary: None,
            supplementary: None,
            include_supplementary: false,
        }
    }

    /// Extract `source` and store it in `slot`, replacing any prior document.
    ///
    /// On `NotFound`, `ParseError` or `Empty` the slot keeps its previous
    /// content.
    pub async fn load(
        &mut self,
        slot: DocumentSlot,
        source: &DocumentSource,
    ) -> Result<&Document, LoadError> {
        let descriptor = source.descriptor();

        let text = self.extractor.extract(source).await.map_err(|e| {
            warn!(
                %slot,
                source = %descriptor,
                extractor = self.extractor.name(),
                error = %e,
                "Document extraction failed"
            );
            LoadError::from(e)
        })?;

        if text.trim().is_empty() {
            warn!(%slot, source = %descriptor, "Document has no extractable text");
            return Err(LoadError::Empty(descriptor));
        }

        let document = Document::new(slot, text, descriptor);
        info!(
            %slot,
            source = %document.source_descriptor,
            chars = document.char_count(),
            "Document loaded"
        );

        Ok(&*self.slot_mut(slot).insert(document))
    }

    pub fn set_include_supplementary(&mut self, include: bool) {
        self.include_supplementary = include;
    }

    pub fn include_supplementary(&self) -> bool {
        self.include_supplementary
    }

    pub fn get(&self, slot: DocumentSlot) -> Option<&Document> {
        match slot {
            DocumentSlot::Primary => self.primary.as_ref(),
            DocumentSlot::Supplementary => self.supplementary.as_ref(),
        }
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    pub fn snapshot(&self) -> DocumentStoreView {
        DocumentStoreView {
            primary: self.primary.clone(),
            supplementary: self.supplementary.clone(),
            include_supplementary: self.include_supplementary,
            captured_at: Utc::now(),
        }
    }

    pub fn status(&self, slot: DocumentSlot) -> SlotStatus {
        match self.get(slot) {
            Some(doc) => SlotStatus {
                slot,
                loaded: true,
                source: Some(doc.source_descriptor.clone()),
                chars: doc.char_count(),
                loaded_at: Some(doc.loaded_at),
            },
            None => SlotStatus {
                slot,
                loaded: false,
                source: None,
                chars: 0,
                loaded_at: None,
            },
        }
    }

    fn slot_mut(&mut self, slot: DocumentSlot) -> &mut Option<Document> {
        match slot {
            DocumentSlot::Primary => &mut self.primary,
            DocumentSlot::Supplementary => &mut self.supplementary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::StubExtractor;
    use itzai_core::error::ExtractError;

    fn store_with(extractor: StubExtractor) -> DocumentStore {
        DocumentStore::new(Arc::new(extractor))
    }

    #[tokio::test]
    async fn load_populates_slot() {
        let mut store =
            store_with(StubExtractor::new().with_text("HC.pdf", "Patient X, dx: migraine."));
        let doc = store
            .load(DocumentSlot::Primary, &DocumentSource::path("HC.pdf"))
            .await
            .unwrap();
        assert_eq!(doc.raw_text, "Patient X, dx: migraine.");
        assert_eq!(doc.slot, DocumentSlot::Primary);
        assert!(store.has_primary());
        assert!(store.get(DocumentSlot::Supplementary).is_none());
    }

    #[tokio::test]
    async fn reload_replaces_prior_document() {
        let mut store = store_with(
            StubExtractor::new()
                .with_text("old.pdf", "old history")
                .with_text("new.pdf", "new history"),
        );
        store.load(DocumentSlot::Primary, &DocumentSource::path("old.pdf")).await.unwrap();
        store.load(DocumentSlot::Primary, &DocumentSource::path("new.pdf")).await.unwrap();

        let doc = store.get(DocumentSlot::Primary).unwrap();
        assert_eq!(doc.raw_text, "new history");
        assert_eq!(doc.source_descriptor, "new.pdf");
    }

    #[tokio::test]
    async fn failed_reload_keeps_prior_document() {
        let mut store = store_with(
            StubExtractor::new()
                .with_text("good.pdf", "working history")
                .with_error("corrupt.pdf", ExtractError::ParseError("bad xref".into()))
                .with_text("scan.pdf", "  \n "),
        );
        store.load(DocumentSlot::Primary, &DocumentSource::path("good.pdf")).await.unwrap();
        let before = store.get(DocumentSlot::Primary).cloned();

        let err = store
            .load(DocumentSlot::Primary, &DocumentSource::path("missing.pdf"))
            .await
            .unwrap_err();
        assert_eq!(err, LoadError::NotFound("missing.pdf".into()));

        let err = store
            .load(DocumentSlot::Primary, &DocumentSource::path("corrupt.pdf"))
            .await
            .unwrap_err();
        assert_eq!(err, LoadError::ParseError("bad xref".into()));

        let err = store
            .load(DocumentSlot::Primary, &DocumentSource::path("scan.pdf"))
            .await
            .unwrap_err();
        assert_eq!(err, LoadError::Empty("scan.pdf".into()));

        assert_eq!(store.get(DocumentSlot::Primary).cloned(), before);
    }

    #[tokio::test]
    async fn empty_extraction_leaves_empty_slot_absent() {
        let mut store = store_with(StubExtractor::new().with_text("scan.pdf", ""));
        let err = store
            .load(DocumentSlot::Primary, &DocumentSource::path("scan.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Empty(_)));
        assert!(!store.has_primary());
    }

    #[tokio::test]
    async fn snapshot_copies_documents_and_toggle() {
        let mut store = store_with(
            StubExtractor::new()
                .with_text("HC.pdf", "history")
                .with_text("protocol.pdf", "protocol"),
        );
        store.load(DocumentSlot::Primary, &DocumentSource::path("HC.pdf")).await.unwrap();
        store
            .load(DocumentSlot::Supplementary, &DocumentSource::path("protocol.pdf"))
            .await
            .unwrap();
        store.set_include_supplementary(true);

        let view = store.snapshot();
        assert_eq!(view.primary.as_ref().unwrap().raw_text, "history");
        assert_eq!(view.effective_supplementary().unwrap().raw_text, "protocol");

        // Later mutations do not leak into an existing snapshot.
        store.set_include_supplementary(false);
        assert!(view.include_supplementary);
        assert!(store.snapshot().effective_supplementary().is_none());
    }

    #[test]
    fn status_of_empty_slot() {
        let store = store_with(StubExtractor::new());
        let status = store.status(DocumentSlot::Supplementary);
        assert!(!status.loaded);
        assert_eq!(status.chars, 0);
        assert!(status.source.is_none());
        assert!(!store.include_supplementary());
    }

    #[tokio::test]
    async fn status_of_loaded_slot() {
        let mut store = store_with(StubExtractor::new().with_text("HC.pdf", "diagnóstico"));
        store.load(DocumentSlot::Primary, &DocumentSource::path("HC.pdf")).await.unwrap();
        let status = store.status(DocumentSlot::Primary);
        assert!(status.loaded);
        assert_eq!(status.chars, 11);
        assert_eq!(status.source.as_deref(), Some("HC.pdf"));
    }
}
