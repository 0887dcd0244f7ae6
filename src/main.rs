use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::Write;
use std::path::{Path, PathBuf};

use feedrank::config::Config;
use feedrank::feed::{aggregate, atom_feed_of_posts, read_opml, AtomOptions, FetchOptions};
use feedrank::model::Post;
use feedrank::rank::{rank_scored, RankedPost};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// One synthesized Atom feed
    Atom,
    /// JSON array of posts with their scores
    Json,
    /// One line per post
    Text,
}

#[derive(Parser, Debug)]
#[command(
    name = "feedrank",
    version,
    about = "Merge the feeds of an OPML list into one cadence-fair ranked stream"
)]
struct Args {
    /// OPML subscription list
    #[arg(value_name = "OPML")]
    opml: PathBuf,

    /// Config file (default: ~/.config/feedrank/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Format::Atom)]
    format: Format,

    /// Write here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Title of the synthesized feed
    #[arg(long)]
    title: Option<String>,

    /// Id of the synthesized feed
    #[arg(long)]
    id: Option<String>,

    /// Keep only the first N ranked posts (0 = all)
    #[arg(long, value_name = "N")]
    limit: Option<usize>,
}

/// Config file (explicit `--config`, else `default_path`) with flags applied on top.
fn load_config(args: &Args, default_path: Option<PathBuf>) -> Result<Config> {
    let mut config = match args.config.clone().or(default_path) {
        Some(path) => {
            Config::load(&path).with_context(|| format!("Failed to load {}", path.display()))?
        }
        None => Config::default(),
    };

    // Flags win over the file
    if let Some(title) = &args.title {
        config.title = Some(title.clone());
    }
    if let Some(id) = &args.id {
        config.feed_id = Some(id.clone());
    }
    if let Some(limit) = args.limit {
        config.limit = limit;
    }
    Ok(config)
}

fn render(format: Format, ranked: &[RankedPost<'_>], config: &Config) -> Result<String> {
    match format {
        Format::Atom => {
            let opts = AtomOptions {
                title: config.title.clone(),
                id: config.feed_id.clone(),
            };
            atom_feed_of_posts(ranked.iter().map(|r| r.post), &opts)
        }
        Format::Json => {
            let mut json =
                serde_json::to_string_pretty(ranked).context("Failed to serialize posts")?;
            json.push('\n');
            Ok(json)
        }
        Format::Text => Ok(ranked.iter().map(text_line).collect()),
    }
}

fn text_line(ranked: &RankedPost<'_>) -> String {
    let post: &Post = ranked.post;
    let date = post
        .date
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "----------------".to_string());
    format!(
        "{date}  [{}] {}  {}\n",
        post.feed().title,
        post.title,
        post.url
    )
}

fn write_output(path: Option<&Path>, body: &str) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, body)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(body.as_bytes())
                .and_then(|()| stdout.flush())
                .context("Failed to write to stdout")
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean for the feed
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args, Config::default_path())?;

    let list = read_opml(&args.opml).await?;
    if list.feeds.is_empty() {
        eprintln!("Warning: No valid feeds found in {}", args.opml.display());
    }

    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .build()
        .context("Failed to build HTTP client")?;

    let aggregation = aggregate(&client, list.feeds, &FetchOptions::from(&config)).await;
    if aggregation.all_failed() {
        anyhow::bail!("All {} feeds failed to load", aggregation.failures.len());
    }
    if !aggregation.failures.is_empty() {
        eprintln!(
            "Warning: {} of {} feeds skipped (RUST_LOG=warn lists them)",
            aggregation.failures.len(),
            aggregation.failures.len() + aggregation.feeds.len()
        );
    }

    let mut ranked = rank_scored(&aggregation.feeds);
    if config.limit > 0 {
        ranked.truncate(config.limit);
    }

    let body = render(args.format, &ranked, &config)?;
    write_output(args.output.as_deref(), &body)
}
