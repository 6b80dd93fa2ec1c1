//! PubMed E-utilities Client
//!
//! Retrieval is two-phase:
//!
//! 1. `esearch.fcgi` resolves the boolean query into at most `retmax` PMIDs (JSON)
//! 2. `efetch.fcgi` fetches the full records for exactly those PMIDs (XML)
//!
//! Records are returned newest-first by publication year.

use chrono::Local;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::PubMedConfig;
use crate::types::{AppError, AppResult};

pub const NO_TITLE: &str = "no title";
pub const UNKNOWN_DATE: &str = "Unknown";
const EARLIEST_DATE: &str = "1800/01/01";

const MEDLINE_CITATION: &[u8] = b"MedlineCitation";
const ARTICLE: &[u8] = b"Article";
const JOURNAL_ISSUE: &[u8] = b"JournalIssue";
const PUB_DATE: &[u8] = b"PubDate";

/// One PubMed article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub pub_date: String,
    pub url: String,
}

impl ArticleRecord {
    /// Year used for ordering; unparsable dates sort as year 0
    pub fn year(&self) -> i32 {
        self.pub_date
            .get(..4)
            .and_then(|y| y.parse::<i32>().ok())
            .unwrap_or(0)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    esearchresult: SearchResult,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

pub struct PubMedClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl PubMedClient {
    pub fn new(config: &PubMedConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    /// Free-text keyword search with an optional inclusive publication-date window
    pub async fn search_by_keyword(
        &self,
        keyword: &str,
        start_date: Option<&str>,
        end_date: Option<&str>,
        max_results: u32,
    ) -> AppResult<Vec<ArticleRecord>> {
        let term = keyword_query(keyword, start_date, end_date, &today());
        self.search(&term, max_results).await
    }

    /// MeSH-term search from `start_date` up to `end_date` (today when absent)
    pub async fn search_by_mesh_term(
        &self,
        mesh_term: &str,
        start_date: &str,
        end_date: Option<&str>,
        max_results: u32,
    ) -> AppResult<Vec<ArticleRecord>> {
        let term = mesh_query(mesh_term, start_date, end_date, &today());
        self.search(&term, max_results).await
    }

    async fn search(&self, term: &str, max_results: u32) -> AppResult<Vec<ArticleRecord>> {
        info!(term = %term, max_results, "Searching PubMed");

        let ids = self.search_ids(term, max_results).await?;
        if ids.is_empty() {
            debug!(term = %term, "No PubMed ids matched");
            return Ok(Vec::new());
        }

        let xml = self.fetch_records(&ids).await?;
        let mut articles = parse_articles(&xml)?;
        sort_newest_first(&mut articles);

        info!(count = articles.len(), "PubMed articles retrieved");
        Ok(articles)
    }

    async fn search_ids(&self, term: &str, max_results: u32) -> AppResult<Vec<String>> {
        let url = format!("{}/esearch.fcgi", self.base_url);
        let retmax = max_results.to_string();
        let mut params = vec![
            ("db", "pubmed"),
            ("term", term),
            ("retmax", retmax.as_str()),
            ("retmode", "json"),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.as_str()));
        }

        let response = self.client.get(&url).query(&params).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Retrieval {
                phase: "esearch",
                status: status.as_u16(),
            });
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::Parse(format!("Invalid esearch response: {}", e)))?;
        Ok(body.esearchresult.idlist)
    }

    async fn fetch_records(&self, ids: &[String]) -> AppResult<String> {
        let url = format!("{}/efetch.fcgi", self.base_url);
        let id_list = ids.join(",");
        let mut params = vec![("db", "pubmed"), ("id", id_list.as_str()), ("retmode", "xml")];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.as_str()));
        }

        let response = self.client.get(&url).query(&params).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Retrieval {
                phase: "efetch",
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}

fn today() -> String {
    Local::now().format("%Y/%m/%d").to_string()
}

fn date_filter(start: &str, end: &str) -> String {
    format!("(\"{}\"[PDAT] : \"{}\"[PDAT])", start, end)
}

/// `keyword`, plus a `[PDAT]` range when either bound is given
pub fn keyword_query(keyword: &str, start_date: Option<&str>, end_date: Option<&str>, today: &str) -> String {
    if start_date.is_none() && end_date.is_none() {
        return keyword.to_string();
    }
    let start = start_date.unwrap_or(EARLIEST_DATE);
    let end = end_date.unwrap_or(today);
    format!("{} AND {}", keyword, date_filter(start, end))
}

pub fn mesh_query(mesh_term: &str, start_date: &str, end_date: Option<&str>, today: &str) -> String {
    format!(
        "{}[MeSH Terms] AND {}",
        mesh_term,
        date_filter(start_date, end_date.unwrap_or(today))
    )
}

/// Stable sort by year, descending
pub fn sort_newest_first(articles: &mut [ArticleRecord]) {
    articles.sort_by_key(|a| std::cmp::Reverse(a.year()));
}

#[derive(Default)]
struct ArticleBuilder {
    pmid: Option<String>,
    title: String,
    has_title: bool,
    paragraphs: Vec<String>,
    current_paragraph: String,
    year: Option<String>,
    medline_date: Option<String>,
}

impl ArticleBuilder {
    fn build(self) -> ArticleRecord {
        let id = self.pmid.unwrap_or_else(|| UNKNOWN_DATE.to_string());
        let title = if self.has_title {
            normalize_whitespace(&self.title)
        } else {
            NO_TITLE.to_string()
        };
        let pub_date = self
            .year
            .or(self.medline_date)
            .map(|d| normalize_whitespace(&d))
            .unwrap_or_else(|| UNKNOWN_DATE.to_string());
        let url = format!("https://pubmed.ncbi.nlm.nih.gov/{}/", id);

        ArticleRecord {
            id,
            title,
            abstract_text: self.paragraphs.join(" "),
            pub_date,
            url,
        }
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn path_ends_with(stack: &[Vec<u8>], suffix: &[&[u8]]) -> bool {
    stack.len() >= suffix.len()
        && stack[stack.len() - suffix.len()..]
            .iter()
            .zip(suffix)
            .all(|(a, b)| a.as_slice() == *b)
}

fn path_contains(stack: &[Vec<u8>], name: &[u8]) -> bool {
    stack.iter().any(|n| n.as_slice() == name)
}

/// Parse an efetch `PubmedArticleSet` document
pub fn parse_articles(xml: &str) -> AppResult<Vec<ArticleRecord>> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut current: Option<ArticleBuilder> = None;
    let mut articles = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name().as_ref().to_vec();
                if name == b"PubmedArticle" {
                    current = Some(ArticleBuilder::default());
                }
                if name == b"ArticleTitle" && path_ends_with(&stack, &[MEDLINE_CITATION, ARTICLE]) {
                    if let Some(article) = current.as_mut() {
                        article.has_title = true;
                    }
                }
                stack.push(name);
            }
            Ok(Event::End(e)) => {
                let name = e.name().as_ref().to_vec();
                if name == b"AbstractText" {
                    if let Some(article) = current.as_mut() {
                        let paragraph = normalize_whitespace(&article.current_paragraph);
                        if !paragraph.is_empty() {
                            article.paragraphs.push(paragraph);
                        }
                        article.current_paragraph.clear();
                    }
                }
                if name == b"PubmedArticle" {
                    if let Some(article) = current.take() {
                        articles.push(article.build());
                    }
                }
                stack.pop();
            }
            Ok(Event::Text(t)) => {
                let Some(article) = current.as_mut() else { continue };
                let text = t
                    .unescape()
                    .map_err(|e| AppError::Parse(format!("Invalid efetch text: {}", e)))?;

                if path_ends_with(&stack, &[MEDLINE_CITATION, b"PMID".as_slice()]) {
                    if article.pmid.is_none() {
                        article.pmid = Some(text.trim().to_string());
                    }
                } else if path_contains(&stack, b"ArticleTitle") {
                    article.title.push_str(&text);
                } else if path_contains(&stack, b"AbstractText") && path_contains(&stack, ARTICLE) {
                    article.current_paragraph.push_str(&text);
                } else if path_ends_with(&stack, &[JOURNAL_ISSUE, PUB_DATE, b"Year".as_slice()]) {
                    article.year = Some(text.trim().to_string());
                } else if path_ends_with(&stack, &[JOURNAL_ISSUE, PUB_DATE, b"MedlineDate".as_slice()]) {
                    article.medline_date = Some(text.trim().to_string());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AppError::Parse(format!(
                    "Invalid efetch XML at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(articles)
}

/// Human-readable digest: date and title, abstract, URL
pub fn format_articles(articles: &[ArticleRecord]) -> String {
    articles
        .iter()
        .map(|a| format!("{}: {}\nAbstract: {}\nURL: {}\n", a.pub_date, a.title, a.abstract_text, a.url))
        .collect::<Vec<_>>()
        .join("\n")
}
