use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::types::LLMProvider;

pub const DEFAULT_PUBMED_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub llm: LLMConfig,
    pub graph: GraphConfig,
    pub pubmed: PubMedConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    pub model: String,
    pub openai_api_key: String,
    pub anthropic_api_key: String,
    pub openrouter_api_key: String,
    pub groq_api_key: String,
    pub api_base: Option<String>,
    pub temperature: f32,
}

impl LLMConfig {
    /// API key for the configured provider, if one is set
    pub fn active_api_key(&self) -> Option<String> {
        let key = match self.provider {
            LLMProvider::OpenAI => &self.openai_api_key,
            LLMProvider::Anthropic => &self.anthropic_api_key,
            LLMProvider::OpenRouter => &self.openrouter_api_key,
            LLMProvider::Groq => &self.groq_api_key,
        };
        if key.is_empty() {
            None
        } else {
            Some(key.clone())
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PubMedConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub max_results: u32,
}

impl Default for PubMedConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_PUBMED_BASE_URL.to_string(),
            max_results: 10,
        }
    }
}

/// Which orchestration flavour drives the roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineVariant {
    /// Two hypotheses, one per line
    Lightweight,
    /// Five structured, enumerated hypotheses
    Extended,
    /// Event-driven manager over the same roles
    GroupChat,
}

impl PipelineVariant {
    /// Number of hypotheses the Scientist must emit
    pub fn hypothesis_count(&self) -> usize {
        match self {
            PipelineVariant::Lightweight => 2,
            PipelineVariant::Extended | PipelineVariant::GroupChat => 5,
        }
    }
}

impl FromStr for PipelineVariant {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "lightweight" | "light" => Ok(PipelineVariant::Lightweight),
            "extended" => Ok(PipelineVariant::Extended),
            "group-chat" | "groupchat" | "group_chat" => Ok(PipelineVariant::GroupChat),
            other => Err(anyhow::anyhow!("Unknown pipeline variant: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub variant: PipelineVariant,
    pub max_iterations: u32,
    pub discard_threshold: f64,
    pub accept_threshold: f64,
    pub scientist_max_attempts: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            variant: PipelineVariant::Lightweight,
            max_iterations: 3,
            discard_threshold: 3.0,
            accept_threshold: 9.0,
            scientist_max_attempts: 3,
        }
    }
}

fn parse_var<T>(name: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("Invalid value for {}: {} ({})", name, raw, e))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            llm: LLMConfig {
                provider: parse_var("LLM_PROVIDER", "openai")?,
                model: env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
                openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
                anthropic_api_key: env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
                openrouter_api_key: env::var("OPENROUTER_API_KEY").unwrap_or_default(),
                groq_api_key: env::var("GROQ_API_KEY").unwrap_or_default(),
                api_base: env::var("LLM_API_BASE").ok().filter(|s| !s.is_empty()),
                temperature: parse_var("LLM_TEMPERATURE", "0.8")?,
            },
            graph: GraphConfig {
                uri: env::var("NEO4J_URI").unwrap_or_else(|_| "bolt://localhost:7687".to_string()),
                user: env::var("NEO4J_USER").unwrap_or_else(|_| "neo4j".to_string()),
                password: env::var("NEO4J_PASSWORD").context("NEO4J_PASSWORD must be set")?,
            },
            pubmed: PubMedConfig {
                api_key: env::var("PUBMED_API_KEY").ok().filter(|s| !s.is_empty()),
                base_url: env::var("PUBMED_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_PUBMED_BASE_URL.to_string()),
                max_results: parse_var("PUBMED_RETMAX", "10")?,
            },
            pipeline: PipelineConfig {
                variant: parse_var("PIPELINE_VARIANT", "lightweight")?,
                max_iterations: parse_var("MAX_ITERATIONS", "3")?,
                discard_threshold: parse_var("DISCARD_THRESHOLD", "3.0")?,
                accept_threshold: parse_var("ACCEPT_THRESHOLD", "9.0")?,
                scientist_max_attempts: parse_var("SCIENTIST_MAX_ATTEMPTS", "3")?,
            },
        })
    }
}
