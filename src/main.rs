use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use serde::Serialize;
use tracing::info;

use integration_features::cache::ExtractionCache;
use integration_features::db::{self, SqliteSource};
use integration_features::features::FeatureParser;
use integration_features::model::Tier;
use integration_features::parser::{blocks, markup};
use integration_features::query::{self, FeaturesData, QueryError, QueryService};
use integration_features::settings::Settings;
use integration_features::source::{Document, DocumentSource};
use integration_features::{index, wp_api, wxr};

#[derive(Parser)]
#[command(
    name = "integration_features",
    about = "Extract integration feature lists from WordPress block content"
)]
struct Cli {
    /// SQLite database path (overrides config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema
    Init,
    /// Import posts from a WordPress export (WXR) file
    Import {
        /// Path to the .xml export
        file: PathBuf,
    },
    /// Pull posts from the WordPress REST API
    Sync {
        /// Site URL (overrides config)
        #[arg(long)]
        site: Option<String>,
        /// Max result pages to fetch (default: all)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        pages: Option<u32>,
    },
    /// Store a local content file as a document
    Add {
        file: PathBuf,
        #[arg(long)]
        id: i64,
        #[arg(long)]
        title: String,
        #[arg(long)]
        slug: Option<String>,
        #[arg(long)]
        url: Option<String>,
    },
    /// Extract features from a content file (.json files are read as a parsed block tree)
    Extract {
        file: PathBuf,
        /// Print JSON instead of a readable listing
        #[arg(long)]
        json: bool,
        /// full, api or summary
        #[arg(long, default_value = "full")]
        format: String,
        #[arg(long)]
        include_descriptions: bool,
    },
    /// Print the parsed block tree of a content file
    Blocks { file: PathBuf },
    /// Features of one stored document
    Features {
        id: i64,
        /// full, api or summary
        #[arg(long, default_value = "full")]
        format: String,
        #[arg(long)]
        include_descriptions: bool,
    },
    /// Cross-document feature index
    Index {
        /// Only list features of this tier (free, pro, proplus)
        #[arg(long)]
        tier: Option<String>,
        /// Case-insensitive label search
        #[arg(long)]
        search: Option<String>,
        /// Reuse stored extraction results where content is unchanged
        #[arg(long)]
        cached: bool,
    },
    /// Features grouped by tier
    ByTier,
    /// Integrations overview table
    Overview {
        /// Only integrations with features of this tier
        #[arg(short, long)]
        tier: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Show database statistics
    Stats,
    /// Drop all stored extraction results
    CacheClear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load()?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }

    let result = match cli.command {
        Commands::Init => {
            open(&settings)?;
            println!("Schema ready at {:?}", settings.db_path);
            Ok(())
        }
        Commands::Import { file } => {
            let xml = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {:?}", file))?;
            let docs = wxr::parse_wxr(&xml)?;
            let filter = settings.filter();
            let matching = docs.iter().filter(|d| filter.matches(d)).count();
            let conn = open(&settings)?;
            let written = db::upsert_documents(&conn, &docs)?;
            println!(
                "Imported {} posts ({} {} / {})",
                written, matching, filter.post_type, filter.status
            );
            Ok(())
        }
        Commands::Sync { site, pages } => {
            let Some(site_url) = site.or_else(|| settings.site_url.clone()) else {
                bail!("No site URL: pass --site or set INTEGRATION_FEATURES_SITE_URL");
            };
            let opts = wp_api::SyncOptions {
                site_url,
                rest_base: settings.rest_base(),
                post_type: settings.post_type.clone(),
                status: settings.post_status.clone(),
                username: settings.username.clone(),
                app_password: settings.app_password.clone(),
                max_pages: pages,
            };
            let docs = wp_api::fetch_documents(&opts).await?;
            let conn = open(&settings)?;
            let written = db::upsert_documents(&conn, &docs)?;
            println!("Synced {} posts", written);
            Ok(())
        }
        Commands::Add { file, id, title, slug, url } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {:?}", file))?;
            let slug = slug.unwrap_or_else(|| markup::slugify(&title));
            let doc = Document {
                id,
                post_type: settings.post_type.clone(),
                status: settings.post_status.clone(),
                title,
                url: url.unwrap_or_default(),
                slug,
                content,
                modified: None,
            };
            let conn = open(&settings)?;
            db::upsert_documents(&conn, std::slice::from_ref(&doc))?;
            println!("Stored document {} ({})", doc.id, doc.slug);
            Ok(())
        }
        Commands::Extract { file, json, format, include_descriptions } => {
            let format = match query::parse_format(&format) {
                Ok(f) => f,
                Err(e) => return fail(e),
            };
            let parser = load_parser(&file)?;
            if json {
                print_json(&FeaturesData::render(parser, format, include_descriptions))
            } else {
                print_listing(&parser);
                Ok(())
            }
        }
        Commands::Blocks { file } => {
            let parser = load_parser(&file)?;
            print_json(&parser.blocks())
        }
        Commands::Features { id, format, include_descriptions } => {
            let conn = open(&settings)?;
            let service = QueryService::new(SqliteSource(&conn), settings.filter());
            let response = query::parse_format(&format)
                .and_then(|format| service.integration_features(id, format, include_descriptions));
            respond(response)
        }
        Commands::Index { tier, search, cached } => {
            let conn = open(&settings)?;
            let tier = match tier.as_deref().map(query::parse_tier).transpose() {
                Ok(t) => t,
                Err(e) => return fail(e),
            };
            let response = if cached {
                let docs = SqliteSource(&conn).list_documents(&settings.filter())?;
                let cache = ExtractionCache::new(&conn);
                let index = index::build_index_cached(&docs, &cache)?;
                Ok(query::filter_index(index, tier, search.as_deref()))
            } else {
                QueryService::new(SqliteSource(&conn), settings.filter()).index(tier, search.as_deref())
            };
            respond(response)
        }
        Commands::ByTier => {
            let conn = open(&settings)?;
            respond(QueryService::new(SqliteSource(&conn), settings.filter()).by_tier())
        }
        Commands::Overview { tier, limit } => {
            let tier = match tier.as_deref().map(query::parse_tier).transpose() {
                Ok(t) => t,
                Err(e) => return fail(e),
            };
            let conn = open(&settings)?;
            let docs = db::fetch_documents(&conn, &settings.filter())?;
            print_overview(&docs, tier, limit);
            Ok(())
        }
        Commands::Stats => {
            let conn = open(&settings)?;
            let filter = settings.filter();
            let s = db::get_stats(&conn, &filter)?;
            println!("Documents: {}", s.documents);
            println!("Matching:  {} ({} / {})", s.matching, filter.post_type, filter.status);
            println!("Other:     {}", s.other);
            println!("Cached:    {}", s.cached);
            println!("Uncached:  {}", s.uncached);
            Ok(())
        }
        Commands::CacheClear => {
            let conn = open(&settings)?;
            let n = ExtractionCache::new(&conn).clear()?;
            println!("Cleared {} cached extractions", n);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        info!("Done in {}", format_duration(elapsed));
    }

    result
}

fn open(settings: &Settings) -> anyhow::Result<Connection> {
    let conn = db::connect(&settings.db_path)?;
    db::init_schema(&conn)?;
    Ok(conn)
}

fn load_parser(path: &Path) -> anyhow::Result<FeatureParser> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    let mut parser = FeatureParser::new();
    if path.extension().is_some_and(|ext| ext == "json") {
        let value: serde_json::Value =
            serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {:?}", path))?;
        parser.parse_blocks(blocks::blocks_from_json(&value));
    } else {
        parser.parse(&text);
    }
    Ok(parser)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn respond<T: Serialize>(result: Result<T, QueryError>) -> anyhow::Result<()> {
    match result {
        Ok(value) => print_json(&value),
        Err(e) => fail(e),
    }
}

/// Print the error body on stdout, then exit non-zero through the returned error.
fn fail(e: QueryError) -> anyhow::Result<()> {
    print_json(&e.body())?;
    Err(e.into())
}

fn print_listing(parser: &FeatureParser) {
    for category in parser.categories() {
        println!("## {} [{}] ({} features)", category.heading, category.id, category.features.len());
        for f in &category.features {
            let desc = if f.has_description { " +desc" } else { "" };
            println!("  - {:<40} {:<8}{}", truncate(&f.label, 40), f.tier.as_str(), desc);
        }
    }
    let counts = parser.tier_counts();
    println!(
        "\n{} features | free {} | pro {} | proplus {}",
        parser.total_count(),
        counts.free,
        counts.pro,
        counts.proplus
    );
}

fn print_overview(docs: &[Document], tier: Option<Tier>, limit: usize) {
    let rows: Vec<_> = index::collect_integration_features(docs)
        .into_iter()
        .filter(|row| tier.map_or(true, |t| row.summary.features_by_tier.get(t) > 0))
        .take(limit)
        .collect();
    if rows.is_empty() {
        println!("No integrations found.");
        return;
    }

    println!(
        "{:>3} | {:>6} | {:<24} | {:<20} | {:>4} | {:>5} | {:>4} | {:>4} | {:>7}",
        "#", "ID", "Integration", "Slug", "Cats", "Total", "Free", "Pro", "Pro+"
    );
    println!("{}", "-".repeat(100));

    for (i, r) in rows.iter().enumerate() {
        let s = &r.summary;
        println!(
            "{:>3} | {:>6} | {:<24} | {:<20} | {:>4} | {:>5} | {:>4} | {:>4} | {:>7}",
            i + 1,
            r.document.id,
            truncate(&r.document.title, 24),
            truncate(&r.document.slug, 20),
            s.total_categories,
            s.total_features,
            s.features_by_tier.free,
            s.features_by_tier.pro,
            s.features_by_tier.proplus
        );
    }

    let total: usize = rows.iter().map(|r| r.summary.total_features).sum();
    println!("\n{} integrations | {} features", rows.len(), total);
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
