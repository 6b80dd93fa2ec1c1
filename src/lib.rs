// sci-discovery - multi-agent biomedical hypothesis generation over a knowledge graph and PubMed

pub mod agents;
pub mod cli;
pub mod config;
pub mod graph;
pub mod llm;
pub mod orchestrator; // Stage sequencing, refine loop, group-chat manager
pub mod search; // PubMed E-utilities client and evidence gathering
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use orchestrator::{Orchestrator, PipelineReport, PipelineStatus};
