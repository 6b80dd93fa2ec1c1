//! Tolerant parsers over free-form role output
//!
//! None of these fail on model output. Anything unrecognized falls back to a default (score 0.0,
//! `Terminate`, empty keyword list) so a rambling model never aborts a run.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static SCORE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)overall\s+score\s*\**\s*:\s*\**\s*(\d+(?:\.\d+)?)").unwrap());

static DIRECTIVE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(neo4j|pubmed)\s*:\s*(.*)").unwrap());

/// `1.`, `2)`, `**3.**`, `### 4.` at the start of a line. A decimal like `2.5-fold` is not one.
static ENUMERATOR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:#{1,6}[ \t]*)?(?:\*\*)?[ \t]*(\d+)[.)](?:\s|\*\*|$)").unwrap()
});

static ENTITY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Entity\W*:\W*([A-Za-z0-9_-]+)").unwrap());

static QUOTED_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"'([^']+)'").unwrap());

/// Generic words the keyword extractor tends to echo back
pub const STOP_WORDS: &[&str] = &[
    "research",
    "information",
    "hypotheses",
    "based",
    "factors:",
    "disease",
    "genetic",
    "initial",
    "subgraph",
    "related",
    "provided",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevisionDirective {
    /// Re-query the knowledge graph with these keywords
    Graph(Vec<String>),
    /// Search the literature with these keywords
    Literature(Vec<String>),
    Terminate,
}

impl fmt::Display for RevisionDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevisionDirective::Graph(kw) => write!(f, "neo4j:{}", kw.join(",")),
            RevisionDirective::Literature(kw) => write!(f, "pubmed:{}", kw.join(",")),
            RevisionDirective::Terminate => f.write_str("terminate"),
        }
    }
}

/// First `Overall Score: X` in the critique, 0.0 when absent
pub fn extract_score(feedback: &str) -> f64 {
    SCORE_PATTERN
        .captures(feedback)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0)
}

pub fn contains_terminate(text: &str) -> bool {
    text.to_lowercase().contains("terminate")
}

/// Parse `"<option>:<kw1,kw2,...>"`. The first line carrying a known option wins.
pub fn parse_directive(text: &str) -> RevisionDirective {
    for line in text.lines() {
        let Some(caps) = DIRECTIVE_PATTERN.captures(line) else {
            continue;
        };
        let option = caps.get(1).map(|m| m.as_str().to_lowercase()).unwrap_or_default();
        let keywords = split_keyword_list(caps.get(2).map(|m| m.as_str()).unwrap_or_default());
        if keywords.is_empty() {
            return RevisionDirective::Terminate;
        }
        return match option.as_str() {
            "neo4j" => RevisionDirective::Graph(keywords),
            _ => RevisionDirective::Literature(keywords),
        };
    }

    RevisionDirective::Terminate
}

fn split_keyword_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|k| k.trim().trim_matches(|c: char| matches!(c, '\'' | '"' | '`' | '*' | '<' | '>')).trim())
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Comma-separated KeywordExtractor output with generic words removed
pub fn parse_keywords(text: &str) -> Vec<String> {
    split_keyword_list(text)
        .into_iter()
        .filter(|k| !STOP_WORDS.contains(&k.to_lowercase().as_str()))
        .collect()
}

/// Keywords for the initial subgraph lookup.
///
/// Uses the Explorer's comma list, falling back to [`query_keywords`].
pub fn explorer_keywords(explorer_output: &str, user_query: &str) -> Vec<String> {
    let from_explorer: Vec<String> = explorer_output
        .lines()
        .find(|l| !l.trim().is_empty())
        .map(split_keyword_list)
        .unwrap_or_default();
    if from_explorer.is_empty() {
        query_keywords(user_query)
    } else {
        from_explorer
    }
}

/// A single-quoted phrase from the query, else its first two words
pub fn query_keywords(user_query: &str) -> Vec<String> {
    if let Some(quoted) = QUOTED_PATTERN.captures(user_query).and_then(|caps| caps.get(1)) {
        return vec![quoted.as_str().trim().to_string()];
    }

    let fallback = first_two_words(user_query);
    if fallback.is_empty() {
        Vec::new()
    } else {
        vec![fallback]
    }
}

pub fn first_two_words(text: &str) -> String {
    text.split_whitespace().take(2).collect::<Vec<_>>().join(" ")
}

/// Numbers of every enumerator that opens a line, in order of appearance
fn enumerators(text: &str) -> Vec<(usize, u32)> {
    ENUMERATOR_PATTERN
        .captures_iter(text)
        .filter_map(|caps| {
            let start = caps.get(0)?.start();
            let n = caps.get(1)?.as_str().parse::<u32>().ok()?;
            Some((start, n))
        })
        .collect()
}

pub fn has_terminal_enumerator(text: &str, n: usize) -> bool {
    enumerators(text).iter().any(|(_, k)| *k as usize == n)
}

/// Split Scientist output into candidate hypotheses.
///
/// Enumerated output becomes one block per enumerator (text before the first marker is dropped).
/// Otherwise every non-empty line is a candidate.
pub fn split_hypotheses(text: &str) -> Vec<String> {
    let starts: Vec<usize> = enumerators(text).into_iter().map(|(start, _)| start).collect();

    if starts.is_empty() {
        return text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
    }

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            text[start..end].trim().to_string()
        })
        .filter(|block| !block.is_empty())
        .collect()
}

/// `Entity: NAME` captures, de-duplicated in first-seen order
pub fn extract_entities(text: &str) -> Vec<String> {
    let mut entities: Vec<String> = Vec::new();
    for caps in ENTITY_PATTERN.captures_iter(text) {
        if let Some(m) = caps.get(1) {
            let name = m.as_str().to_string();
            if !entities.contains(&name) {
                entities.push(name);
            }
        }
    }
    entities
}
