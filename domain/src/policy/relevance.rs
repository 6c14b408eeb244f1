//! Keyword relevance signal.

use crate::core::query::Query;
use crate::discussion::Contribution;

/// Fraction of `expertise` keywords found in the query or recent texts.
///
/// Matching is a case-insensitive substring test, so multi-word keywords
/// like `what if` work. A specialist without keywords is a generalist and
/// always scores 1.0.
pub fn relevance(expertise: &[String], query: &Query, recent: &[Contribution]) -> f64 {
    if expertise.is_empty() {
        return 1.0;
    }
    let mut haystack = query.searchable_text().to_lowercase();
    for contribution in recent {
        haystack.push('\n');
        haystack.push_str(&contribution.text.to_lowercase());
    }
    let hits = expertise
        .iter()
        .filter(|keyword| haystack.contains(keyword.to_lowercase().as_str()))
        .count();
    hits as f64 / expertise.len() as f64
}
