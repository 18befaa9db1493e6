//! The document-grounded query pipeline — the heart of ItzAI.
//!
//! One query cycle follows a fixed sequence:
//!
//! 1. **Read** the pending question and clear the input buffer
//! 2. **Validate** that a clinical history is loaded
//! 3. **Assemble** a single grounded prompt from the loaded documents
//! 4. **Query** the configured completion provider once
//! 5. **Settle** with either the answer or a typed error
//!
//! Documents enter the session through the extractor and the document store;
//! nothing is persisted across process restarts.

pub mod assembler;
pub mod engine;
pub mod extractor;
pub mod registry;
pub mod session;
pub mod store;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use assembler::{AssembledPrompt, PromptAssembler, PromptSection, QueryRequest};
pub use engine::QueryEngine;
pub use extractor::{DocumentExtractor, PdfExtractor};
pub use registry::{SessionId, SessionRegistry};
pub use session::{
    CyclePhase, PendingQuestionBuffer, QueryOutcome, QueryResult, SessionController,
    SessionView, Trigger, TriggerOutcome,
};
pub use store::{DocumentStore, DocumentStoreView, SlotStatus};
