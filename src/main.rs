use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lesson_pipeline::events::{Event, FnEventHandler};
use lesson_pipeline::{
    telemetry, CancellationToken, ClientConfig, ContentView, ControllerError, FeedbackView,
    PipelineClient, PipelineController, PipelineView, ReviewView, StageMarker, StageStatus,
};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "lesson-pipeline", about = "Run the lesson generate/review pipeline and show each stage")]
struct Cli {
    /// Base URL of the pipeline service (overrides LESSON_PIPELINE_API_URL and the config file)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Give up on the service after this many seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate, review and (if needed) refine content for a grade and topic
    Run {
        /// Grade level (positive whole number)
        #[arg(short, long)]
        grade: Option<String>,

        /// Lesson topic
        #[arg(short, long)]
        topic: Option<String>,

        /// Print the rendered views as JSON
        #[arg(long)]
        json: bool,

        /// Print stage progress as it happens
        #[arg(short, long)]
        progress: bool,
    },
    /// Check that the pipeline service is up
    Health,
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = ClientConfig::from_env().context("loading client configuration")?;
    if cli.api_url.is_some() || cli.timeout_secs.is_some() {
        let mut builder =
            ClientConfig::builder(cli.api_url.clone().unwrap_or_else(|| config.base_url.clone()))
                .timeout(cli.timeout_secs.map(Duration::from_secs).unwrap_or(config.timeout));
        if let Some(ref ua) = config.user_agent {
            builder = builder.user_agent(ua.clone());
        }
        config = builder.build().context("applying command-line overrides")?;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = telemetry::init_tracing() {
        eprintln!("warning: tracing not initialised: {}", e);
    }

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli)?;
    info!(target: "lesson_pipeline", base_url = %config.base_url, timeout = ?config.timeout, "configuration resolved");
    let client = PipelineClient::new(config).context("building pipeline client")?;

    match cli.command {
        Commands::Health => {
            let healthy = client.health().await.context("health probe failed")?;
            println!("{}", if healthy { "healthy" } else { "unhealthy" });
            Ok(if healthy { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Commands::Run {
            grade,
            topic,
            json,
            progress,
        } => {
            let mut controller = PipelineController::new(client);
            if progress {
                controller = controller.with_event_handler(Arc::new(FnEventHandler(|event: Event| {
                    if let Event::StageUpdated(marker) = event {
                        eprintln!("[{}] {}", marker.stage.title(), marker.label);
                    }
                })));
            }

            let cancel = CancellationToken::new();
            {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        warn!(target: "lesson_pipeline", "interrupt received, cancelling");
                        cancel.cancel();
                    }
                });
            }

            let outcome = controller
                .submit_cancellable(grade.as_deref(), topic.as_deref(), &cancel)
                .await;

            match outcome {
                Ok(view) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&view)?);
                    } else {
                        print_stages(&controller.stages());
                        print_view(&view);
                    }
                    Ok(ExitCode::SUCCESS)
                }
                Err(ControllerError::Validation(e)) => {
                    eprintln!("{}", e);
                    Ok(ExitCode::from(2))
                }
                Err(e) => {
                    if !json {
                        print_stages(&controller.stages());
                    }
                    eprintln!("Error: {}", e);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

fn print_stages(stages: &[StageMarker]) {
    println!("== Pipeline ==");
    for marker in stages.iter().filter(|m| m.visible) {
        let icon = match marker.status {
            StageStatus::Pending => " ",
            StageStatus::Active => "…",
            StageStatus::Complete => "✓",
            StageStatus::Failed => "✗",
        };
        println!("  [{}] {:<10} {}", icon, marker.stage.title(), marker.label);
    }
    println!();
}

fn print_view(view: &PipelineView) {
    print_content("Initial content", &view.initial.content);
    print_review("Initial review", &view.initial.review);
    if let Some(ref refined) = view.refined {
        print_content("Refined content", &refined.content);
        print_review("Refined review", &refined.review);
    }
    println!("== Final result: {} ==", view.summary.final_status_label);
    println!("The content {}.", view.summary.outcome);
}

fn print_content(title: &str, content: &ContentView) {
    println!("== {} ==", title);
    println!("{}", content.explanation);
    for mcq in &content.mcqs {
        println!();
        println!("Q{}: {}", mcq.number, mcq.question);
        for opt in &mcq.options {
            println!("  {} {}", if opt.correct { "*" } else { "-" }, opt.text);
        }
        println!("  Correct answer: {}", mcq.answer);
    }
    println!();
}

fn print_review(title: &str, review: &ReviewView) {
    println!("== {}: {} ==", title, review.status_label);
    for score in &review.scores {
        println!("  {:<24} {:>3}/10 ({})", score.label, score.value.to_string(), score.tier.as_str());
    }
    match review.feedback {
        FeedbackView::Items(ref items) => {
            println!("  Feedback:");
            for item in items {
                println!("  - {}", item);
            }
        }
        FeedbackView::NoIssues => println!("  No issues found!"),
    }
    println!();
}
