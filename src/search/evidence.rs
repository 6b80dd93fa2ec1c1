//! Evidence gathering
//!
//! Keywords are first searched pairwise (every 2-combination, in order). Only when no pair yields
//! an article does the search fall back to each keyword on its own.

use tracing::{debug, info};

use crate::search::{ArticleRecord, LiteratureSearch};
use crate::types::AppResult;

pub const NO_ARTICLES_FOUND: &str = "No articles found for any keyword combination. \
Consider expanding search terms (e.g. using broader synonyms or aliases).";

/// All 2-combinations of `keywords`, preserving order: (A,B), (A,C), (B,C)
pub fn keyword_pairs(keywords: &[String]) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (i, first) in keywords.iter().enumerate() {
        for second in &keywords[i + 1..] {
            pairs.push((first.clone(), second.clone()));
        }
    }
    pairs
}

/// One JSON object per line
fn render(articles: &[ArticleRecord]) -> String {
    articles
        .iter()
        .filter_map(|a| serde_json::to_string(a).ok())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Aggregated literature evidence for a keyword set. Search failures propagate unchanged.
pub async fn gather_evidence(
    search: &dyn LiteratureSearch,
    keywords: &[String],
    max_results: u32,
) -> AppResult<String> {
    let mut results = Vec::new();

    for (first, second) in keyword_pairs(keywords) {
        let term = format!("{} {}", first, second);
        debug!(term = %term, "Searching PubMed with keyword pair");
        let articles = search.search_keyword(&term, max_results).await?;
        if !articles.is_empty() {
            results.push(render(&articles));
        }
    }

    if results.is_empty() {
        for keyword in keywords {
            debug!(keyword = %keyword, "Searching PubMed with single keyword");
            let articles = search.search_keyword(keyword, max_results).await?;
            if !articles.is_empty() {
                results.push(render(&articles));
            }
        }
    }

    info!(keywords = ?keywords, blocks = results.len(), "Literature evidence gathered");

    if results.is_empty() {
        Ok(NO_ARTICLES_FOUND.to_string())
    } else {
        Ok(results.join("\n"))
    }
}
