//! sandsmith CLI
//!
//! Records the request as a user message, runs the code agent workflow and
//! prints the outcome as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use sandsmith::agent::{AgentConfig, CodeAgentWorkflow, TriggerEvent};
use sandsmith::llm::ModelClient;
use sandsmith::ollama::ChatClient;
use sandsmith::sandbox::{HttpSandbox, LocalSandbox, Sandbox};
use sandsmith::store::{JsonStore, MessageStore, NewMessage};

/// Run an LLM coding agent against a sandbox
#[derive(Parser, Debug)]
#[command(name = "sandsmith", version, about)]
struct Cli {
    /// Project the request and its result belong to
    #[arg(long)]
    project: String,

    /// What the agent should build
    request: String,

    /// Ollama server URL
    #[arg(long, env = "OLLAMA_URL", default_value = "http://localhost:11434")]
    ollama_url: String,

    /// Model for the coding agent and the post-processors
    #[arg(long, env = "SANDSMITH_MODEL", default_value = "qwen3")]
    model: String,

    /// Maximum agent turns
    #[arg(long, default_value_t = 10)]
    max_iterations: usize,

    /// Remote sandbox service; the local directory sandbox is used when unset
    #[arg(long, env = "SANDSMITH_SANDBOX_URL")]
    sandbox_url: Option<String>,

    /// Domain under which remote sandbox ports are exposed
    #[arg(long, default_value = "sandbox.localhost")]
    sandbox_domain: String,

    /// Root directory for local sandboxes (default ~/.sandsmith/sandboxes)
    #[arg(long)]
    sandbox_root: Option<PathBuf>,

    /// Directory for project message files (default ~/.sandsmith/projects)
    #[arg(long, env = "SANDSMITH_STORE_DIR")]
    store_dir: Option<PathBuf>,

    /// Sandbox template for new sessions
    #[arg(long, default_value = "sandsmith-nextjs")]
    template: String,

    /// OTLP collector endpoint for trace export
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    /// Print Prometheus metrics after the run
    #[arg(long)]
    print_metrics: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    sandsmith::tracing::init_tracing("sandsmith", cli.otlp_endpoint.as_deref())?;

    let model: Arc<dyn ModelClient> = Arc::new(ChatClient::new(cli.ollama_url.clone()));

    let sandbox: Arc<dyn Sandbox> = match (&cli.sandbox_url, &cli.sandbox_root) {
        (Some(url), _) => Arc::new(HttpSandbox::new(url.clone(), cli.sandbox_domain.clone())),
        (None, Some(root)) => Arc::new(LocalSandbox::new(root)?),
        (None, None) => Arc::new(LocalSandbox::default_root()?),
    };

    let store: Arc<dyn MessageStore> = match &cli.store_dir {
        Some(dir) => Arc::new(JsonStore::new(dir)?),
        None => Arc::new(JsonStore::default_store()?),
    };

    let config = AgentConfig {
        model: cli.model.clone(),
        postprocess_model: cli.model.clone(),
        max_iterations: cli.max_iterations,
        template: cli.template.clone(),
        ..AgentConfig::default()
    };

    store
        .create_message(NewMessage::user(&cli.project, &cli.request))
        .await?;

    let workflow = CodeAgentWorkflow::new(model, sandbox, store, config);
    let result = workflow
        .run(&TriggerEvent::new(&cli.project, &cli.request))
        .await;

    if cli.print_metrics {
        print!("{}", sandsmith::metrics::render());
    }
    sandsmith::tracing::shutdown_tracing();

    let outcome = result?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
