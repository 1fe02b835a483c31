//! # GitKB CLI (`gitkb`)
//!
//! ## Usage
//!
//! ```bash
//! gitkb --config ./config/gitkb.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `gitkb serve` | Start the REST server |
//! | `gitkb search [query]` | Search with filters, date bound, file kinds, sort |
//! | `gitkb get <id>` | Show one asset |
//! | `gitkb facets` | Facet counts |
//! | `gitkb guide` | Deal-guide recommendations by sales stage |
//! | `gitkb import <dir>` | Extract and save every file in a directory |
//! | `gitkb extract <file>` | Print the metadata draft for one file |
//! | `gitkb stale` | Assets due for re-verification |
//! | `gitkb verify <id>` | Mark an asset verified |
//! | `gitkb stats` | Catalog analytics |
//! | `gitkb plays list` / `match` / `link` | Go-to-market plays and their assets |
//! | `gitkb schema show` | Active metadata schemas |

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use gitkb::config::{self, Config};
use gitkb::guide::GuideArgs;
use gitkb::search::{parse_key_val, SearchArgs};
use gitkb::{extract, get, guide, import, logging, plays, schemas, search, server, stats};
use gitkb_core::bucket::Stage;
use gitkb_core::models::{AssetCategory, AssetDraft, AssetType, Confidentiality};
use gitkb_core::plays::PlayCriteria;
use gitkb_core::wizard::DealType;

/// GitKB: search, import, and curate a Git-friendly catalog of sales and
/// technical assets.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/gitkb.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "gitkb",
    version,
    about = "GitKB: a Git-friendly sales and technical knowledge-base catalog"
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/gitkb.toml")]
    config: PathBuf,

    /// More logging (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST server on `[server].bind`.
    Serve,

    /// Search the catalog.
    ///
    /// Text matches title or summary (case-insensitive). Filters take one
    /// value per key; keys are category, type, confidentiality, offering,
    /// industry, region, stage, tags, related_technologies, author, or
    /// custom.<name>.
    Search {
        /// Text to look for. Empty matches everything.
        #[arg(default_value = "")]
        query: String,

        /// Facet filter, e.g. `--filter offering=RHOV`.
        #[arg(long = "filter", value_parser = parse_key_val)]
        filters: Vec<(String, String)>,

        /// Date-modified bound: 24h, 7d, 30d, or year.
        #[arg(long)]
        date: Option<String>,

        /// Artifact kind (deck, doc, code, video, sheet...). Repeatable.
        #[arg(long = "kind")]
        kinds: Vec<String>,

        /// relevance, newest, oldest, or az.
        #[arg(long)]
        sort: Option<String>,

        /// Restrict to these asset ids (the briefcase). Repeatable.
        #[arg(long)]
        starred: Vec<String>,

        #[arg(long)]
        json: bool,
    },

    /// Show one asset by id.
    Get {
        id: String,
        #[arg(long)]
        json: bool,
    },

    /// Facet counts for offering, technologies, and tags.
    Facets {
        #[arg(long)]
        json: bool,
    },

    /// Recommend assets for a deal, bucketed by sales stage.
    Guide {
        /// new-logo, expansion, renewal, or services.
        #[arg(long)]
        deal_type: DealType,

        /// Current stage: discovery, solutioning, proposal, or closing.
        #[arg(long)]
        stage: Stage,

        /// Offering in play. Repeatable; at least one is required.
        #[arg(long = "offering", required = true)]
        offerings: Vec<String>,

        /// Technology in the customer's stack. Repeatable.
        #[arg(long = "technology")]
        technologies: Vec<String>,

        #[arg(long)]
        json: bool,
    },

    /// Extract metadata from every file in a directory and save it.
    Import {
        dir: PathBuf,

        /// Asset type for every imported file (default: inferred).
        #[arg(long = "type")]
        asset_type: Option<AssetType>,

        #[arg(long)]
        category: Option<AssetCategory>,

        #[arg(long)]
        confidentiality: Option<Confidentiality>,

        #[arg(long)]
        offering: Option<String>,

        /// Tag for every imported file. Repeatable.
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Print the drafts without saving.
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the metadata draft extracted from one file.
    Extract { file: PathBuf },

    /// List assets not verified recently.
    Stale {
        /// Override `[catalog].stale_after_days`.
        #[arg(long)]
        days: Option<u32>,
    },

    /// Mark an asset as verified.
    Verify {
        id: String,
        /// Verification date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Catalog analytics.
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Go-to-market plays.
    Plays {
        #[command(subcommand)]
        action: PlaysAction,
    },

    /// Metadata schemas.
    Schema {
        #[command(subcommand)]
        action: SchemaAction,
    },
}

#[derive(Subcommand)]
enum PlaysAction {
    List {
        #[arg(long)]
        json: bool,
    },
    /// Plays matching offerings, industry, and region.
    Match {
        #[arg(long = "offering")]
        offerings: Vec<String>,
        #[arg(long)]
        industry: Option<String>,
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Attach an asset to a play at a sales stage.
    Link {
        play_id: String,
        asset_id: String,
        /// discovery, solutioning, proposal, or closing.
        #[arg(long, default_value = "discovery")]
        stage: Stage,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum SchemaAction {
    Show {
        /// Only this asset type.
        #[arg(long = "type")]
        asset_type: Option<AssetType>,
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    // Extraction needs no store; use the config if there is one.
    if let Commands::Extract { file } = &cli.command {
        let cfg = config::load_config(&cli.config).unwrap_or_else(|_| Config::minimal());
        extract::run_extract(&cfg, file)?;
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Search {
            query,
            filters,
            date,
            kinds,
            sort,
            starred,
            json,
        } => {
            let args = SearchArgs {
                query,
                filters,
                date,
                kinds,
                sort,
                starred,
                json,
            };
            search::run_search(&cfg, args).await?;
        }
        Commands::Get { id, json } => {
            get::run_get(&cfg, &id, json).await?;
        }
        Commands::Facets { json } => {
            search::run_facets(&cfg, json).await?;
        }
        Commands::Guide {
            deal_type,
            stage,
            offerings,
            technologies,
            json,
        } => {
            let args = GuideArgs {
                deal_type,
                stage,
                offerings,
                technologies,
                json,
            };
            guide::run_guide(&cfg, args).await?;
        }
        Commands::Import {
            dir,
            asset_type,
            category,
            confidentiality,
            offering,
            tags,
            dry_run,
        } => {
            let overrides = AssetDraft {
                asset_type,
                category: category.or_else(|| asset_type.map(|t| t.default_category())),
                confidentiality,
                offering,
                tags: (!tags.is_empty()).then_some(tags),
                ..Default::default()
            };
            import::run_import(&cfg, &dir, &overrides, dry_run).await?;
        }
        Commands::Extract { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
        Commands::Stale { days } => {
            stats::run_stale(&cfg, days).await?;
        }
        Commands::Verify { id, date } => {
            get::run_verify(&cfg, &id, date).await?;
        }
        Commands::Stats { json } => {
            stats::run_stats(&cfg, json).await?;
        }
        Commands::Plays { action } => match action {
            PlaysAction::List { json } => {
                plays::run_plays_list(&cfg, json).await?;
            }
            PlaysAction::Match {
                offerings,
                industry,
                region,
                json,
            } => {
                let criteria = PlayCriteria {
                    offerings,
                    industry,
                    region,
                };
                plays::run_plays_match(&cfg, criteria, json).await?;
            }
            PlaysAction::Link {
                play_id,
                asset_id,
                stage,
                json,
            } => {
                plays::run_plays_link(&cfg, &play_id, &asset_id, stage, json).await?;
            }
        },
        Commands::Schema { action } => match action {
            SchemaAction::Show { asset_type, json } => {
                schemas::run_schema_show(&cfg, asset_type, json).await?;
            }
        },
    }

    Ok(())
}
