//! deckscan CLI - scan decklist screenshots into deck exports.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use deckscan_carddb::{CardCorpus, ScryfallClient};
use deckscan_core::types::WarningCode;
use deckscan_core::{ExportFormat, ScanConfig};
use deckscan_ocr::{PaddleOcr, VisionOcr};
use deckscan_pipeline::ScanPipeline;
use deckscan_preprocess::sanitize;

#[derive(Parser)]
#[command(
    name = "deckscan",
    version,
    about = "Scan Magic: The Gathering decklist screenshots into deck exports"
)]
struct Cli {
    /// Path to a TOML config file (defaults to the per-user config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan one image and print the deck.
    Scan {
        /// Screenshot or photo of a decklist.
        image: PathBuf,

        /// Export format: arena, mtgo, deckstats, tappedout.
        #[arg(long, default_value = "arena")]
        to: String,

        /// Print the full scan report as JSON instead of an export.
        #[arg(long)]
        json: bool,
    },

    /// Manage the local card corpus.
    Corpus {
        #[command(subcommand)]
        command: CorpusCommands,
    },

    /// List the supported export formats with samples.
    Formats,
}

#[derive(Subcommand)]
enum CorpusCommands {
    /// Rebuild the corpus from a Scryfall bulk dump (downloads when no
    /// file is given).
    Update {
        /// Use a local bulk JSON file instead of downloading.
        #[arg(long)]
        bulk_file: Option<PathBuf>,
    },
    /// Show corpus statistics.
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Scan { image, to, json } => scan(&config, &image, &to, json).await,
        Commands::Corpus { command } => match command {
            CorpusCommands::Update { bulk_file } => {
                corpus_update(&config, bulk_file.as_deref()).await
            }
            CorpusCommands::Info => corpus_info(),
        },
        Commands::Formats => {
            print_formats();
            Ok(())
        }
    }
}

fn load_config(explicit: Option<&Path>) -> Result<ScanConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => dirs::config_dir()
            .map(|d| d.join("deckscan").join("config.toml"))
            .filter(|p| p.exists()),
    };
    let Some(path) = path else {
        return Ok(ScanConfig::default());
    };
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: ScanConfig =
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
    log::info!("loaded config from {}", path.display());
    Ok(config)
}

fn corpus_cache_path() -> Result<PathBuf> {
    let dir = dirs::cache_dir()
        .context("no cache directory on this platform")?
        .join("deckscan");
    std::fs::create_dir_all(&dir)?;
    Ok(dir.join("corpus.json"))
}

fn load_corpus() -> Result<Arc<CardCorpus>> {
    let path = corpus_cache_path()?;
    let corpus = CardCorpus::new();
    match corpus.load_cache(&path) {
        Ok(count) => log::info!("corpus loaded: {count} cards"),
        Err(err) => bail!(
            "no usable card corpus at {} ({err}); run `deckscan corpus update` first",
            path.display()
        ),
    }
    Ok(Arc::new(corpus))
}

async fn scan(config: &ScanConfig, image: &Path, to: &str, json: bool) -> Result<()> {
    let format: ExportFormat = to.parse()?;
    let bytes =
        std::fs::read(image).with_context(|| format!("reading image {}", image.display()))?;

    let corpus = load_corpus()?;
    let engine = Arc::new(PaddleOcr::new().context("loading OCR models")?);
    let vision = config.vision_api_key.as_ref().filter(|_| config.enable_vision_fallback).map(
        |key| {
            Arc::new(VisionOcr::new(
                config.vision_endpoint.clone(),
                key.clone(),
                config.vision_rate_per_minute,
            ))
        },
    );
    let online = config.enable_carddb_online_fallback.then(|| {
        Arc::new(ScryfallClient::new(
            config.carddb_base_url.clone(),
            config.carddb_api_rate_limit_ms,
            config.carddb_api_timeout_s,
        ))
    });

    let pipeline = ScanPipeline::new(config.clone(), engine, vision, corpus, online);

    let (_, decoded) = sanitize(&bytes, config).map_err(deckscan_core::ScanError::from)?;

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:30.cyan/blue}] {pos}% {msg}")
            .expect("progress template")
            .progress_chars("=> "),
    );
    bar.set_message("scanning");

    let bar_sink = bar.clone();
    let report = pipeline
        .scan_image(&decoded, "cli", &move |p| bar_sink.set_position(u64::from(p)))
        .await?;
    bar.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} {} main / {} side cards ({:?}, {} ms)",
        "scanned:".green().bold(),
        report.deck.main_count(),
        report.deck.side_count(),
        report.format_hint,
        report.timings.total_ms
    );
    for warning in &report.deck.warnings {
        match warning.code {
            WarningCode::MatchAmbiguous => {
                eprintln!("  {} {}", "ambiguous:".yellow().bold(), warning.detail);
            }
            WarningCode::OcrLowConf => {
                eprintln!("  {} {}", "low confidence:".yellow().bold(), warning.detail);
            }
            _ => eprintln!("  {:?}: {}", warning.code, warning.detail),
        }
    }

    println!();
    println!("{}", deckscan_core::export_deck(&report.deck, format)?);
    Ok(())
}

async fn corpus_update(config: &ScanConfig, bulk_file: Option<&Path>) -> Result<()> {
    let bulk = match bulk_file {
        Some(path) => {
            std::fs::read(path).with_context(|| format!("reading bulk file {}", path.display()))?
        }
        None => {
            println!("downloading Scryfall bulk catalogue...");
            let client = ScryfallClient::new(
                config.carddb_base_url.clone(),
                config.carddb_api_rate_limit_ms,
                config.carddb_api_timeout_s,
            );
            client.bulk_oracle_cards().await?
        }
    };

    let corpus = CardCorpus::new();
    let count = corpus.build_from_bulk_json(&bulk)?;
    let path = corpus_cache_path()?;
    corpus.save_cache(&path)?;
    println!(
        "{} {count} cards -> {}",
        "corpus updated:".green().bold(),
        path.display()
    );
    Ok(())
}

fn corpus_info() -> Result<()> {
    let path = corpus_cache_path()?;
    let corpus = CardCorpus::new();
    match corpus.load_cache(&path) {
        Ok(count) => {
            println!("path:     {}", path.display());
            println!("cards:    {count}");
            if let Some(built) = corpus.built_at() {
                println!("built at: {built}");
            }
        }
        Err(_) => println!("no corpus cache at {}", path.display()),
    }
    Ok(())
}

fn print_formats() {
    use deckscan_core::serializer::{
        ArenaSerializer, DeckstatsSerializer, MtgoSerializer, TappedoutSerializer,
    };
    use deckscan_core::types::{NormalizedDeck, ResolvedCard, Section};

    let card = |qty, name: &str, id: &str, section| ResolvedCard {
        quantity: qty,
        canonical_name: name.to_string(),
        card_id: Some(id.to_string()),
        set_code: None,
        collector_number: None,
        section,
        candidates: Vec::new(),
    };
    let deck = NormalizedDeck {
        main: vec![
            card(4, "Island", "a", Section::Main),
            card(4, "Opt", "b", Section::Main),
        ],
        side: vec![card(2, "Negate", "c", Section::Side)],
        warnings: Vec::new(),
    };

    for format in ExportFormat::ALL {
        println!("{}", format.as_str().cyan().bold());
        let sample = match format {
            ExportFormat::Arena => ArenaSerializer.serialize(&deck),
            ExportFormat::Mtgo => MtgoSerializer.serialize(&deck),
            ExportFormat::Deckstats => DeckstatsSerializer.serialize(&deck),
            ExportFormat::Tappedout => TappedoutSerializer.serialize(&deck),
        };
        for line in sample.lines() {
            println!("  {line}");
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn scan_args_parse() {
        let cli = Cli::parse_from(["deckscan", "scan", "deck.png", "--to", "mtgo", "--json"]);
        match cli.command {
            Commands::Scan { image, to, json } => {
                assert_eq!(image, PathBuf::from("deck.png"));
                assert_eq!(to, "mtgo");
                assert!(json);
            }
            _ => panic!("expected scan command"),
        }
    }

    #[test]
    fn corpus_update_accepts_bulk_file() {
        let cli = Cli::parse_from(["deckscan", "corpus", "update", "--bulk-file", "dump.json"]);
        match cli.command {
            Commands::Corpus {
                command: CorpusCommands::Update { bulk_file },
            } => assert_eq!(bulk_file, Some(PathBuf::from("dump.json"))),
            _ => panic!("expected corpus update"),
        }
    }
}
