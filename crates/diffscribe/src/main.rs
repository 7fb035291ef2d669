use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use diffscribe::compactor;
use diffscribe::config::{AppConfig, MessageStyle};
use diffscribe::git::{GitCli, RepoQueries};
use diffscribe::orchestrator::Orchestrator;
use diffscribe::session::{GenerationError, SessionController};
use diffscribe::tools::registry::ToolRegistry;
use tracing::info;

/// Generate a commit message for the staged changes.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Repository to read
    #[arg(long, default_value = ".")]
    repo: PathBuf,

    /// Configuration file (defaults to $DIFFSCRIBE_CONFIG or the user config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Model id override
    #[arg(long)]
    model: Option<String>,

    /// Message style override
    #[arg(long, value_enum)]
    style: Option<MessageStyle>,

    /// Force Conventional Commits format
    #[arg(long, conflicts_with = "no_conventional")]
    conventional: bool,

    /// Disable Conventional Commits format
    #[arg(long)]
    no_conventional: bool,

    /// Feedback on a previous attempt, for regeneration
    #[arg(long)]
    feedback: Option<String>,

    /// Commit the staged changes with the generated message
    #[arg(long)]
    commit: bool,

    /// Push after committing
    #[arg(long, requires = "commit")]
    push: bool,

    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .init();
}

fn resolve_config(args: &Args) -> Result<AppConfig> {
    let mut config = AppConfig::load(args.config.as_deref()).context("Failed to load config")?;

    if let Some(ref model) = args.model {
        config.provider.model = model.clone();
    }
    if let Some(style) = args.style {
        config.preferences.style = style;
    }
    if args.conventional {
        config.preferences.use_conventional_commits = true;
    }
    if args.no_conventional {
        config.preferences.use_conventional_commits = false;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = resolve_config(&args)?;
    let git = Arc::new(GitCli::open(&args.repo)?);
    info!(
        repo = %git.repo_root().display(),
        model = %config.provider.model,
        base_url = %config.provider.base_url,
        "diffscribe starting"
    );

    let repo_for_diff = Arc::clone(&git);
    let bundle = tokio::task::spawn_blocking(move || compactor::collect(repo_for_diff.as_ref()))
        .await
        .context("Diff collection task failed")?;

    let queries: Arc<dyn RepoQueries> = git.clone();
    let registry = ToolRegistry::standard(git.repo_root(), queries);
    let orchestrator = Orchestrator::from_config(&config.orchestrator_config(), registry)
        .context("Failed to build model client")?;

    let controller = SessionController::new(&orchestrator);
    let message = match controller
        .generate(&bundle, &config.preferences, args.feedback.as_deref())
        .await
    {
        Ok(message) => message,
        Err(GenerationError::NothingToSummarize) => {
            bail!("Nothing staged. Stage changes with `git add` first.")
        }
        Err(e) => return Err(e).context("Commit message generation failed"),
    };

    println!("{message}");

    if args.commit {
        if message.trim().is_empty() {
            bail!("Model returned an empty message; not committing");
        }
        git.commit(&message)?;
        info!("Committed");
        if args.push {
            git.push()?;
            info!("Pushed");
        }
    }

    Ok(())
}
