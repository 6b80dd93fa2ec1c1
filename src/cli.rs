use clap::Parser;

use crate::config::{Config, PipelineVariant};

/// Generate and refine biomedical hypotheses from a knowledge graph and PubMed
#[derive(Parser, Debug)]
#[command(name = "sci-discovery")]
#[command(version)]
pub struct Args {
    /// Research question, e.g. "Investigate 'Parkinson disease' mechanisms"
    #[arg(required = true, num_args = 1..)]
    pub query: Vec<String>,

    /// Pipeline variant (lightweight, extended, group-chat)
    #[arg(short, long)]
    pub pipeline: Option<PipelineVariant>,

    /// Refinement iterations per hypothesis
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Print the full run report as JSON instead of the final text
    #[arg(long)]
    pub json: bool,
}

impl Args {
    pub fn query_text(&self) -> String {
        self.query.join(" ")
    }

    /// Command-line flags win over the environment
    pub fn apply(&self, config: &mut Config) {
        if let Some(variant) = self.pipeline {
            config.pipeline.variant = variant;
        }
        if let Some(max_iterations) = self.max_iterations {
            config.pipeline.max_iterations = max_iterations;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_and_flags() {
        let args = Args::try_parse_from([
            "sci-discovery",
            "--pipeline",
            "extended",
            "--max-iterations",
            "2",
            "Parkinson",
            "disease",
        ])
        .unwrap();
        assert_eq!(args.query_text(), "Parkinson disease");
        assert_eq!(args.pipeline, Some(PipelineVariant::Extended));
        assert_eq!(args.max_iterations, Some(2));
        assert!(!args.json);
    }

    #[test]
    fn test_query_is_required() {
        assert!(Args::try_parse_from(["sci-discovery"]).is_err());
    }

    #[test]
    fn test_unknown_variant_rejected() {
        assert!(Args::try_parse_from(["sci-discovery", "--pipeline", "swarm", "q"]).is_err());
    }
}
