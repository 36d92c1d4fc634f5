use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use roost_core::app::{AppCollaborators, AppContext};
use roost_core::config::Config;
use roost_core::core_backend::MemoryBackend;
use roost_core::core_filter::{Cipher, ContentFilter};
use roost_core::core_loadable::{Loadable, SnapshotCache};
use roost_core::core_model::{DirectedPost, MessageRow, ProfileCandidate, RemotePost, Timestamp, Uid, UserKey};
use roost_core::core_session::TracingActivityLog;
use roost_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "roost")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Set the log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Content filter tools
    Filter {
        #[command(subcommand)]
        action: FilterAction,
    },
    /// Store snapshot tools
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Run a full offline session against the in-memory backend
    Demo {
        /// Where store snapshots are written
        #[arg(long)]
        cache_dir: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum FilterAction {
    /// Check text against the bundled lexicon
    Check { text: String },
    /// Encode (or decode) text with the configured cipher key
    Cipher {
        text: String,
        #[arg(long)]
        decode: bool,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Print the posts held in a snapshot file
    Inspect { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::from_env().context("Invalid environment configuration")?,
    };

    let mut log_config = LogConfig::from_settings(&config.logging)?;
    if let Some(level) = &args.log_level {
        let level = LogLevel::from_str(level).unwrap_or_else(|e| {
            eprintln!("{}, using 'info'", e);
            LogLevel::Info
        });
        log_config = LogConfig::new(level).with_target(config.logging.with_target);
    }
    init_logging_with_config(log_config.json_format(args.json_logs || config.logging.json_format))?;
    roost_core::metrics::init_metrics();

    info!("Roost CLI started");

    match args.command {
        Some(Command::Filter { action }) => run_filter(&config, action)?,
        Some(Command::Cache { action }) => run_cache(action)?,
        Some(Command::Demo { cache_dir }) => run_demo(config, cache_dir).await?,
        None => {
            info!("No command specified. Use --help for usage information.");
        }
    }

    info!("Roost CLI finished");

    Ok(())
}

fn run_filter(config: &Config, action: FilterAction) -> Result<()> {
    let cipher = Cipher::new(&config.filter.cipher_key).context("Invalid cipher key")?;

    match action {
        FilterAction::Check { text } => {
            let filter = ContentFilter::new(cipher);
            let entries = filter.enable_with_bundled();
            let blocked = filter.contains(&text);
            let report = serde_json::json!({
                "text": text,
                "blocked": blocked,
                "entries": entries,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        FilterAction::Cipher { text, decode } => {
            let output = if decode { cipher.decode(&text) } else { cipher.encode(&text) };
            println!("{}", output);
        }
    }
    Ok(())
}

fn run_cache(action: CacheAction) -> Result<()> {
    match action {
        CacheAction::Inspect { file } => {
            let cache = SnapshotCache::<DirectedPost>::at(file.clone());
            let Some(posts) = cache.load() else {
                bail!("No readable snapshot at {}", file.display());
            };

            println!("{} post(s) in {}", posts.len(), file.display());
            for post in &posts {
                println!(
                    "{}  {}  {} -> {}  {}",
                    format_timestamp(post.timestamp()),
                    post.id(),
                    post.from.display_name,
                    post.to.display_name,
                    post.subject
                );
            }
        }
    }
    Ok(())
}

fn format_timestamp(at: Timestamp) -> String {
    i64::try_from(at.as_millis())
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| at.to_string())
}

async fn run_demo(mut config: Config, cache_dir: PathBuf) -> Result<()> {
    config.cache.enabled = true;
    config.cache.dir = cache_dir;

    let backend = Arc::new(MemoryBackend::new());
    let app = AppContext::new(
        config,
        AppCollaborators::in_memory(backend.clone(), Arc::new(TracingActivityLog)),
    )?;
    let tasks = app.start().await?;
    let session = app.session();

    let uid = session.sign_in_or_create("demo@roost.app", "demo-password").await?;
    info!(%uid, phase = %session.phase(), "Demo account linked");

    let me = UserKey::new(uid.clone(), "Demo");
    let friend = UserKey::new(Uid::new("friend"), "Friend");
    backend.seed_rows(vec![RemotePost::Message(MessageRow {
        id: "welcome".to_string(),
        sent_at: Timestamp::now().as_millis(),
        sender: friend.clone(),
        recipient: me,
        subject: "welcome".to_string(),
        text: "Glad you made it!".to_string(),
        reply_to: None,
        statuses: Vec::new(),
    })]);

    let report = session
        .create_profile_saga(ProfileCandidate::new(uid, "Demo"))
        .await?;
    for warning in &report.warnings {
        warn!(step = %warning.step, error = %warning.error, "Profile step skipped");
    }

    let mut posts = app.posts().watch();
    tokio::time::timeout(Duration::from_secs(5), posts.wait_for(Loadable::is_loaded))
        .await
        .context("Posts did not load in time")??;

    app.submit_post(friend, "thanks", "Happy to be here.").await?;
    let outcome = app.refresh_posts().await?;
    info!(?outcome, "Posts refreshed");

    for partner in app.partners() {
        println!(
            "partner {} ({} post(s), last {})",
            partner.key.display_name,
            partner.post_count,
            format_timestamp(partner.latest)
        );
    }
    for text in ["see you soon", "you are a bozo"] {
        println!("filter {:?}: blocked={}", text, app.check_text(text));
    }

    session.sign_out().await?;
    println!("phase after sign-out: {}", session.phase());
    println!("{}", serde_json::to_string_pretty(&app.metrics().snapshot())?);

    tasks.shutdown();
    Ok(())
}
