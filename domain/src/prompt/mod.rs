//! Prompt domain
//!
//! Templates for specialist turns, rolling summaries and the final synthesis.

mod template;

pub use template::PromptTemplate;
