use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use royale_scrape::api::{build_router, state::AppState};
use royale_scrape::config::AppConfig;
use royale_scrape::fetch::{PageSource, RoyaleApiClient};
use royale_scrape::models::{PlayerRecord, PlayerTag};
use royale_scrape::parse::{
    extract_basic_profile, extract_battle_history, extract_card_levels, extract_cards_by_level,
    extract_collections, PageDocument,
};

#[derive(Parser)]
#[command(name = "royale-scrape")]
#[command(about = "Clash Royale player stats scraped from royaleapi.com")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Bind address
        #[arg(long)]
        host: Option<String>,

        /// Port number
        #[arg(long)]
        port: Option<u16>,

        /// Allowed CORS origin ("*" for any)
        #[arg(long)]
        cors_origin: Option<String>,
    },

    /// Run one extractor over a saved HTML page and print JSON
    Parse {
        /// Which extractor to run
        #[arg(value_enum)]
        kind: PageKind,

        /// Saved HTML page
        file: PathBuf,

        /// Player tag (needed for profile, player and battles)
        #[arg(long)]
        tag: Option<String>,

        /// Saved card levels page, for `player`
        #[arg(long)]
        card_levels: Option<PathBuf>,
    },

    /// Fetch a player from upstream and print the composed record
    Fetch {
        /// Player tag, with or without '#'
        tag: String,

        /// Print the battle log instead of the player record
        #[arg(long)]
        battles: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PageKind {
    /// Basic profile from a profile page
    Profile,
    /// Full player record from a profile page (plus optional card levels)
    Player,
    /// Card level histogram from a card levels page
    CardLevels,
    /// Tower, hero and evolution collections from a profile page
    Collections,
    /// Cards grouped by level from a card levels page
    CardsByLevel,
    /// Battle history from a battle log page
    Battles,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }

    init_tracing(&config.log_level, cli.json_logs);

    match cli.command {
        Commands::Serve {
            host,
            port,
            cors_origin,
        } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(origin) = cors_origin {
                config.server.cors_origin = origin;
            }
            config.validate()?;
            serve(config).await?;
        }
        Commands::Parse {
            kind,
            file,
            tag,
            card_levels,
        } => {
            let json = parse_file(kind, &file, tag.as_deref(), card_levels.as_deref())?;
            println!("{}", json);
        }
        Commands::Fetch { tag, battles } => {
            if !PlayerTag::is_valid(&tag) {
                bail!("Invalid player tag format: {}", tag);
            }
            let tag = PlayerTag::normalize(&tag);
            let client = RoyaleApiClient::from_config(&config.source)?;

            let json = if battles {
                let html = client.battles_page(&tag).await?;
                let history = extract_battle_history(&PageDocument::parse(&html), tag.as_str());
                serde_json::to_string_pretty(&history)?
            } else {
                let (profile, card_levels) =
                    tokio::join!(client.profile_page(&tag), client.card_levels_page(&tag));
                let card_levels = card_levels.ok().flatten();
                let record =
                    PlayerRecord::from_pages(tag.as_str(), &profile?, card_levels.as_deref());
                serde_json::to_string_pretty(&record)?
            };
            println!("{}", json);
        }
    }

    Ok(())
}

fn init_tracing(log_level: &str, json_logs: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    tracing::info!("Starting royale-scrape v{}", env!("CARGO_PKG_VERSION"));

    let client = RoyaleApiClient::from_config(&config.source)?;
    let state = AppState::new(Arc::new(client), config.server.cors_origin.clone());
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;
    Ok(())
}

fn read_page(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn parse_file(
    kind: PageKind,
    file: &Path,
    tag: Option<&str>,
    card_levels: Option<&Path>,
) -> Result<String> {
    let html = read_page(file)?;
    let require_tag = || tag.context("--tag is required for this page kind");

    let json = match kind {
        PageKind::Profile => {
            let doc = PageDocument::parse(&html);
            serde_json::to_string_pretty(&extract_basic_profile(&doc, require_tag()?))?
        }
        PageKind::Player => {
            let card_levels_html = card_levels.map(read_page).transpose()?;
            let record =
                PlayerRecord::from_pages(require_tag()?, &html, card_levels_html.as_deref());
            serde_json::to_string_pretty(&record)?
        }
        PageKind::CardLevels => {
            serde_json::to_string_pretty(&extract_card_levels(&PageDocument::parse(&html)))?
        }
        PageKind::Collections => {
            serde_json::to_string_pretty(&extract_collections(&PageDocument::parse(&html)))?
        }
        PageKind::CardsByLevel => {
            serde_json::to_string_pretty(&extract_cards_by_level(&PageDocument::parse(&html)))?
        }
        PageKind::Battles => {
            let doc = PageDocument::parse(&html);
            serde_json::to_string_pretty(&extract_battle_history(&doc, require_tag()?))?
        }
    };
    Ok(json)
}
