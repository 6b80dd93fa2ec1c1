//! Search Module
//!
//! Biomedical literature retrieval through the PubMed E-utilities:
//! - `pubmed`: two-phase esearch/efetch client returning structured article records
//! - `evidence`: keyword-pair search strategy that turns records into critic-ready evidence text

pub mod evidence;
pub mod pubmed;

pub use evidence::{gather_evidence, NO_ARTICLES_FOUND};
pub use pubmed::{format_articles, ArticleRecord, PubMedClient};

use crate::types::AppResult;
use async_trait::async_trait;

/// Keyword literature lookup as the orchestrator consumes it
#[async_trait]
pub trait LiteratureSearch: Send + Sync {
    async fn search_keyword(&self, term: &str, max_results: u32) -> AppResult<Vec<ArticleRecord>>;
}

#[async_trait]
impl LiteratureSearch for PubMedClient {
    async fn search_keyword(&self, term: &str, max_results: u32) -> AppResult<Vec<ArticleRecord>> {
        self.search_by_keyword(term, None, None, max_results).await
    }
}
