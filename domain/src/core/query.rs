//! Query value object

use super::error::DomainError;
use serde::{Deserialize, Serialize};

/// The user query a discussion is held about (Value Object)
///
/// Carries the question itself plus optional background context that is
/// shown to every specialist alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<String>,
}

impl Query {
    /// Create a new query, rejecting empty or whitespace-only content
    pub fn try_new(content: impl Into<String>) -> Result<Self, DomainError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(DomainError::InvalidQuery("query cannot be empty".into()));
        }
        Ok(Self {
            content,
            context: None,
        })
    }

    /// Attach background context; blank context is dropped
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        self.context = if context.trim().is_empty() {
            None
        } else {
            Some(context)
        };
        self
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Text used for keyword relevance: the query plus its context.
    pub fn searchable_text(&self) -> String {
        match &self.context {
            Some(ctx) => format!("{}\n{}", self.content, ctx),
            None => self.content.clone(),
        }
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.content)
    }
}

impl std::str::FromStr for Query {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_new(s)
    }
}
