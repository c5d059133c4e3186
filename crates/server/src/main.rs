//! # Inkflow
//!
//! HTTP server and CLI for the blog content pipeline.

mod api;
mod logging;

use anyhow::Context;
use api::{AppState, SharedState};
use clap::{Parser, Subcommand};
use inkflow_core::agents::{LlmStageRunner, SharedConfig};
use inkflow_core::config::{PipelineConfig, DEFAULT_CONFIG_PATH};
use inkflow_core::pipeline::{BlogPipeline, RunOutcome};
use inkflow_core::state::{ArtifactStore, BlogId, MemoryArtifactStore, PipelineDb, SqliteArtifactStore};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

#[derive(Parser, Clone)]
#[command(author, version, about = "Inkflow - resumable blog content pipeline")]
struct Args {
    /// Log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Config file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Keep blogs in memory instead of SQLite
    #[arg(long, global = true)]
    in_memory: bool,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Start the HTTP server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
    },
    /// Generate topics, pick one and run the pipeline to the end
    Create {
        /// Working title
        #[arg(short, long)]
        title: Option<String>,
        /// Topic number to pick; prompts when omitted
        #[arg(long)]
        topic: Option<usize>,
    },
    /// Show one blog's process status, or list all blogs
    Status {
        id: Option<BlogId>,
    },
    /// Resume a paused or failed blog and wait for the run to stop
    Resume {
        id: BlogId,
    },
}

fn build_pipeline(args: &Args, config: &PipelineConfig, shared: SharedConfig) -> anyhow::Result<BlogPipeline> {
    let store: Arc<dyn ArtifactStore> = if args.in_memory {
        Arc::new(MemoryArtifactStore::new())
    } else {
        let db = PipelineDb::open_at(&config.db_path)
            .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;
        Arc::new(SqliteArtifactStore::new(&db))
    };

    let runner = Arc::new(LlmStageRunner::shared(shared));
    Ok(BlogPipeline::new(store, runner).with_auto_resume(config.auto_resume_on_select))
}

async fn serve(state: SharedState, host: &str, port: u16) -> anyhow::Result<()> {
    let app = api::router(state);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!(%addr, "inkflow server listening");
    tracing::info!("OpenAPI spec at http://{}/api/v1/openapi.json", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

fn read_topic_number(max: usize) -> anyhow::Result<usize> {
    use std::io::Write;

    loop {
        print!("Select a topic (1-{}): ", max);
        std::io::stdout().flush()?;
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line)? == 0 {
            anyhow::bail!("no topic selected");
        }
        match line.trim().parse::<usize>() {
            Ok(n) if (1..=max).contains(&n) => return Ok(n),
            _ => println!("Enter a number between 1 and {}", max),
        }
    }
}

fn report(outcome: &RunOutcome, blog_id: BlogId) {
    match outcome {
        RunOutcome::Completed => println!("Blog {} completed", blog_id),
        RunOutcome::Paused => println!("Blog {} paused", blog_id),
        RunOutcome::AwaitingTopic => println!("Blog {} is waiting for a topic", blog_id),
        RunOutcome::Failed(message) => {
            println!("Blog {} failed: {}", blog_id, message);
            println!("Run `inkflow resume {}` to retry from the failed stage", blog_id);
        }
    }
}

async fn create(pipeline: &BlogPipeline, title: Option<String>, topic: Option<usize>) -> anyhow::Result<()> {
    let blog = pipeline.create(title)?;
    println!("Created blog {}. Researching topics...", blog.id);

    let list = pipeline.generate_topics(blog.id).await?;
    if let Some(error) = list.error_message {
        anyhow::bail!("topic generation failed: {}", error);
    }
    if list.topics.is_empty() {
        anyhow::bail!("topic generation produced no topics");
    }

    for (i, idea) in list.topics.iter().enumerate() {
        if idea.category.is_empty() {
            println!("{:>2}. {}", i + 1, idea.title);
        } else {
            println!("{:>2}. [{}] {}", i + 1, idea.category, idea.title);
        }
    }

    let number = match topic {
        Some(n) => n,
        None => read_topic_number(list.topics.len())?,
    };
    let selection = pipeline.select_topic(blog.id, number)?;
    println!(
        "Writing \"{}\"...",
        selection.blog.title.as_deref().unwrap_or_default()
    );

    let outcome = pipeline.resume_and_wait(blog.id).await?;
    report(&outcome, blog.id);

    if outcome == RunOutcome::Completed {
        let blog = pipeline.get(blog.id)?;
        if let Some(post) = blog.output(inkflow_core::pipeline::Stage::SeoOptimization) {
            println!("\n{}", post);
        }
    }
    Ok(())
}

fn status(pipeline: &BlogPipeline, id: Option<BlogId>) -> anyhow::Result<()> {
    match id {
        Some(id) => {
            let status = pipeline.process_status(id)?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        None => {
            for blog in pipeline.list()? {
                println!(
                    "{:>4}  {:<18} {:>3}%  {}",
                    blog.id,
                    blog.status.as_str(),
                    blog.step_completion.progress_percentage(),
                    blog.title.as_deref().unwrap_or("(untitled)")
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    logging::init(&args.log_level);

    let config = PipelineConfig::load(&args.config)?;
    let provider = config.global_provider;
    if !provider.has_api_key() {
        tracing::warn!(
            provider = provider.id(),
            env_var = provider.api_key_env(),
            "API key not set; stage calls will fail"
        );
    }

    let shared: SharedConfig = Arc::new(RwLock::new(config.clone()));
    let pipeline = build_pipeline(&args, &config, shared.clone())?;

    let command = args.command.clone().unwrap_or(CliCommand::Serve {
        port: 8080,
        host: "0.0.0.0".to_string(),
    });

    match command {
        CliCommand::Serve { port, host } => {
            let state = Arc::new(AppState {
                pipeline,
                config: shared,
                config_path: args.config.clone(),
            });
            serve(state, &host, port).await
        }
        CliCommand::Create { title, topic } => {
            // The CLI drives the run itself
            pipeline.set_auto_resume(false);
            create(&pipeline, title, topic).await
        }
        CliCommand::Status { id } => status(&pipeline, id),
        CliCommand::Resume { id } => {
            let outcome = pipeline.resume_and_wait(id).await?;
            report(&outcome, id);
            Ok(())
        }
    }
}
