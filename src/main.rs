//! Wiki Anchor
//!
//! Command-line front end: re-anchors stored comments against a page, or
//! prints the descriptor for a text selection.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wiki_anchor::capture::{CommentMode, RawSelection, SelectionState, SelectionValidator};
use wiki_anchor::dom::sanitize_html;
use wiki_anchor::store::{CommentStore, MemoryStore, PageContext, StatusFilter};
use wiki_anchor::{find_nth, AnchorConfig, CommentAnchor, Document, LoadReport, Reanchorer};

#[derive(Parser, Debug)]
#[command(
    name = "wiki-anchor",
    version,
    about = "Anchor comments to wiki pages and find them again"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Re-anchor stored comments and print a JSON report
    Resolve {
        /// XHTML page
        #[arg(long)]
        page: PathBuf,
        /// JSON array of comment anchors
        #[arg(long)]
        comments: PathBuf,
        /// Write the highlighted page here
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the descriptor for an occurrence of some text
    Encode {
        #[arg(long)]
        page: PathBuf,
        #[arg(long)]
        text: String,
        #[arg(long, default_value_t = 0)]
        occurrence: i64,
    },
}

#[derive(Serialize)]
struct ResolveOutput {
    #[serde(flatten)]
    report: LoadReport,
    comments: Vec<CommentAnchor>,
}

fn load_page(path: &Path, config: &AnchorConfig) -> anyhow::Result<Document> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let html = if config.sanitize {
        sanitize_html(&raw)?
    } else {
        raw
    };
    Document::parse(&html).with_context(|| format!("parsing {}", path.display()))
}

async fn resolve(
    config: AnchorConfig,
    page: PathBuf,
    comments: PathBuf,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut doc = load_page(&page, &config)?;
    let json = fs::read_to_string(&comments)
        .with_context(|| format!("reading {}", comments.display()))?;
    let anchors: Vec<CommentAnchor> = serde_json::from_str(&json).context("parsing comments")?;

    let context = PageContext::new(page.display().to_string());
    let store = MemoryStore::with_anchors(&context, anchors).await;
    let mut anchors = store.list(&context, StatusFilter::All).await?;

    let mut reanchorer = Reanchorer::with_defaults(config);
    let report = reanchorer.load_all(&mut doc, &mut anchors);

    if let Some(out) = out {
        fs::write(&out, doc.to_html(doc.root()))
            .with_context(|| format!("writing {}", out.display()))?;
        tracing::info!("Wrote highlighted page to {}", out.display());
    }

    let output = ResolveOutput {
        report,
        comments: anchors,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn encode(config: AnchorConfig, page: PathBuf, text: String, occurrence: i64) -> anyhow::Result<()> {
    let doc = load_page(&page, &config)?;
    let reanchorer = Reanchorer::with_defaults(config.clone());
    let root = config.content_root_in(&doc);

    let Some(found) = find_nth(&doc, root, &text, occurrence, config.search_options()) else {
        bail!("occurrence {} of {:?} not found", occurrence, text);
    };

    let mut validator = SelectionValidator::new(config, CommentMode::new(true));
    let state = validator
        .capture(&doc, reanchorer.layout(), RawSelection::Text(found.range))
        .await;
    if state != SelectionState::Valid {
        bail!(
            "cannot comment here: {}",
            validator.last_error().unwrap_or("invalid selection")
        );
    }
    let Some(capture) = validator.take() else {
        bail!("selection was not captured");
    };

    println!("{}", reanchorer.encode(&capture)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr, reports to stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wiki_anchor=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();
    let config = AnchorConfig::from_env();
    tracing::debug!("Configuration: {:?}", config);

    match Cli::parse().command {
        Command::Resolve {
            page,
            comments,
            out,
        } => resolve(config, page, comments, out).await,
        Command::Encode {
            page,
            text,
            occurrence,
        } => encode(config, page, text, occurrence).await,
    }
}
