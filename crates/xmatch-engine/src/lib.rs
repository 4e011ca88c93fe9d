//! Cross-marketplace matching: query construction, similarity scoring,
//! candidate selection and the coordinator that drives a search context.

pub mod context;
pub mod coordinator;
pub mod error;
pub mod handoff;
pub mod query;
pub mod selector;
pub mod similarity;

pub use context::{
    ContextHandle, ContextId, ContextLauncher, ContextMessage, DispatchSignal, MessageKind,
    TaskContextLauncher,
};
pub use coordinator::{Coordinator, SearchState};
pub use error::EngineError;
pub use handoff::{
    run_blocking, HandoffEntry, HandoffStore, JsonFileHandoffStore, MemoryHandoffStore,
};
pub use query::{build_search_url, parse_query_terms, search_terms};
pub use selector::{rank, select_best, SelectionPolicy};
pub use similarity::{brand_similarity, normalize_text, score_candidate, title_similarity};
