use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sci_discovery::agents::LlmRoleInvoker;
use sci_discovery::cli::Args;
use sci_discovery::config::Config;
use sci_discovery::graph::Neo4jGraph;
use sci_discovery::llm::{LLMProviderConfig, LLM};
use sci_discovery::search::PubMedClient;
use sci_discovery::{Orchestrator, PipelineStatus};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sci_discovery=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    // Load configuration
    let mut config = Config::from_env()?;
    args.apply(&mut config);
    info!(
        provider = %config.llm.provider,
        model = %config.llm.model,
        variant = ?config.pipeline.variant,
        "Configuration loaded"
    );

    let api_key = config
        .llm
        .active_api_key()
        .with_context(|| format!("No API key configured for provider {}", config.llm.provider))?;
    let llm = LLM::new(LLMProviderConfig {
        provider: config.llm.provider,
        api_key,
        api_base: config.llm.api_base.clone(),
    });
    let roles = Arc::new(LlmRoleInvoker::new(
        Box::new(llm),
        config.llm.model.clone(),
        config.llm.temperature,
    ));

    let graph = Arc::new(
        Neo4jGraph::connect(&config.graph)
            .await
            .context("Failed to connect to Neo4j")?,
    );
    let literature = Arc::new(PubMedClient::new(&config.pubmed));

    let orchestrator = Orchestrator::new(roles, graph, literature, config.pipeline.clone())
        .with_max_results(config.pubmed.max_results);

    let report = orchestrator.run(&args.query_text()).await?;
    if report.status == PipelineStatus::Halted {
        warn!(run_id = %report.run_id, "Pipeline halted before a decision");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.final_text);
    }

    Ok(())
}
