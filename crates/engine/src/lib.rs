//! Core domain logic for drugsearch: the condition → top-drugs
//! aggregation service and its supporting text helpers.

pub mod search;
pub mod text;

pub use search::{
    run_search, DrugResult, SearchError, SearchResponse, RESULT_CAP, SUPPORT_THRESHOLD,
};
pub use text::title_case;
