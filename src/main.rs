mod classify;
mod db;
mod loader;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use url::Url;

use classify::record::{Category, PageOutcome};

#[derive(Parser)]
#[command(name = "lot_scraper", about = "Vehicle marketplace page classifier and extractor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a single saved HTML file and print the outcome as JSON
    Classify {
        /// Path to the HTML file
        file: PathBuf,
        /// Page URL the file was fetched from (used to resolve links)
        #[arg(short, long)]
        url: Option<String>,
        /// Persist extracted records to the database
        #[arg(long)]
        save: bool,
    },
    /// Classify every .html file in a directory
    Run {
        /// Directory of saved HTML files
        dir: PathBuf,
        /// Max files to classify (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Persist extracted records to the database
        #[arg(long)]
        save: bool,
    },
    /// Fetch a live URL, classify it, and print the outcome as JSON
    Fetch {
        url: String,
        /// Render through the spider.cloud API before classifying
        #[arg(long)]
        render: bool,
        /// Persist extracted records to the database
        #[arg(long)]
        save: bool,
    },
    /// Show store statistics
    Stats,
    /// Extracted listings overview table
    Overview {
        /// Filter by normalized brand (e.g. "Ford")
        #[arg(short, long)]
        brand: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Classify { file, url, save } => {
            let html = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let sample_id = sample_id_of(&file);
            let page_url = parse_page_url(url.as_deref(), &sample_id)?;

            let outcome = classify::classify_page(&sample_id, &html, &page_url);
            println!("{}", serde_json::to_string_pretty(&outcome)?);

            if save {
                let conn = db::connect()?;
                db::init_schema(&conn)?;
                save_outcome(&conn, page_url.as_str(), &outcome)?;
            }
            Ok(())
        }
        Commands::Run { dir, limit, save } => run_directory(&dir, limit, save),
        Commands::Fetch { url, render, save } => {
            let page = loader::fetch_page(&url, render).await?;
            let page_url = Url::parse(&page.url)?;
            let sample_id = page_url
                .path_segments()
                .and_then(|mut s| s.next_back())
                .filter(|s| !s.is_empty())
                .unwrap_or("fetched")
                .to_string();

            let outcome = classify::classify_page(&sample_id, &page.html, &page_url);
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            println!(
                "\nFetched in {}ms (status {:?}, rendered: {})",
                page.latency_ms, page.status, page.rendered
            );

            if save {
                let conn = db::connect()?;
                db::init_schema(&conn)?;
                save_outcome(&conn, page_url.as_str(), &outcome)?;
            }
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Listings:       {}", s.listings);
            println!("  with price:   {}", s.with_price);
            println!("  with VIN:     {}", s.with_vin);
            println!("Site info rows: {}", s.site_info);
            println!("Samples:        {}", s.samples);
            println!("  detail:       {}", s.detail_samples);
            Ok(())
        }
        Commands::Overview { brand, limit } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let rows = db::fetch_overview(&conn, brand.as_deref(), limit)?;
            if rows.is_empty() {
                println!("No listings found.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<12} | {:<16} | {:>4} | {:>10} | {:>8} | {:>4} | {:<14}",
                "#", "Brand", "Model", "Year", "Price", "Mileage", "Conf", "Source"
            );
            println!("{}", "-".repeat(90));

            for (i, r) in rows.iter().enumerate() {
                let price = r
                    .price_value
                    .map(|p| format!("{} {}", p, r.currency))
                    .unwrap_or_else(|| "-".into());
                let mileage = r
                    .mileage_value
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "-".into());
                let year = r.year.map(|y| y.to_string()).unwrap_or_else(|| "-".into());

                println!(
                    "{:>3} | {:<12} | {:<16} | {:>4} | {:>10} | {:>8} | {:>4} | {:<14}",
                    i + 1,
                    truncate(&r.brand, 12),
                    truncate(&r.model, 16),
                    year,
                    truncate(&price, 10),
                    mileage,
                    r.confidence,
                    truncate(&r.source, 14)
                );
            }

            println!("\n{} listings", rows.len());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

struct RunCounts {
    detail: usize,
    listing: usize,
    pagination: usize,
    site_info: usize,
    none: usize,
    saved: usize,
    errors: usize,
}

impl RunCounts {
    fn print(&self) {
        println!(
            "Classified: {} detail, {} listing, {} pagination, {} site info, {} none.",
            self.detail, self.listing, self.pagination, self.site_info, self.none,
        );
        if self.saved > 0 || self.errors > 0 {
            println!("Saved {} records ({} store errors).", self.saved, self.errors);
        }
    }
}

fn run_directory(dir: &Path, limit: Option<usize>, save: bool) -> Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "html"))
        .collect();
    files.sort();
    if let Some(n) = limit {
        files.truncate(n);
    }
    if files.is_empty() {
        println!("No .html files in {}.", dir.display());
        return Ok(());
    }

    let conn = if save {
        let conn = db::connect()?;
        db::init_schema(&conn)?;
        Some(conn)
    } else {
        None
    };

    println!("Classifying {} files...", files.len());
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut counts = RunCounts {
        detail: 0,
        listing: 0,
        pagination: 0,
        site_info: 0,
        none: 0,
        saved: 0,
        errors: 0,
    };

    for chunk in files.chunks(500) {
        let results: Vec<(Url, Result<PageOutcome>)> = chunk
            .par_iter()
            .map(|file| {
                let sample_id = sample_id_of(file);
                let page_url = local_url(&sample_id);
                let outcome = std::fs::read_to_string(file)
                    .with_context(|| format!("reading {}", file.display()))
                    .map(|html| classify::classify_page(&sample_id, &html, &page_url));
                (page_url, outcome)
            })
            .collect();

        for (page_url, result) in results {
            match result {
                Ok(outcome) => {
                    match outcome.category {
                        Category::Detail => counts.detail += 1,
                        Category::Listing => counts.listing += 1,
                        Category::Pagination => counts.pagination += 1,
                        Category::SiteInfo => counts.site_info += 1,
                        Category::None => counts.none += 1,
                    }
                    if let Some(conn) = &conn {
                        match save_outcome(conn, page_url.as_str(), &outcome) {
                            Ok(stored) => {
                                counts.saved += stored;
                            }
                            Err(e) => {
                                counts.errors += 1;
                                tracing::warn!("Store failed for {}: {}", outcome.sample_id, e);
                            }
                        }
                    }
                }
                Err(e) => {
                    counts.errors += 1;
                    tracing::warn!("{}", e);
                }
            }
            pb.inc(1);
        }
    }

    pb.finish_and_clear();
    counts.print();
    Ok(())
}

/// Persist whatever the outcome carries. Returns how many records were
/// stored (listing store failures count as zero, not as hard errors).
fn save_outcome(conn: &rusqlite::Connection, url: &str, outcome: &PageOutcome) -> Result<usize> {
    db::log_outcome(conn, url, outcome)?;

    let mut stored = 0;
    if let Some(record) = &outcome.detail_record {
        let result = db::upsert_listing(conn, Some(url), &outcome.sample_id, record);
        if let Some(e) = result.error {
            tracing::warn!("Listing store error for {}: {}", outcome.sample_id, e);
        } else {
            stored += 1;
        }
    }
    if let Some(info) = &outcome.site_info_record {
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
            .unwrap_or_else(|| url.to_string());
        db::upsert_site_info(conn, &host, info)?;
        stored += 1;
    }
    Ok(stored)
}

fn sample_id_of(file: &Path) -> String {
    file.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "sample".to_string())
}

/// Synthetic base URL for offline files, so relative links still resolve.
fn local_url(sample_id: &str) -> Url {
    Url::parse(&format!("https://local.sample/{}", sample_id))
        .unwrap_or_else(|_| Url::parse("https://local.sample/").unwrap())
}

fn parse_page_url(url: Option<&str>, sample_id: &str) -> Result<Url> {
    match url {
        Some(u) => Url::parse(u).with_context(|| format!("invalid URL {}", u)),
        None => Ok(local_url(sample_id)),
    }
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
