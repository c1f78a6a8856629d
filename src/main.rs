//! Manga Saver CLI - manga chapter downloader.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::TryStreamExt;
use manga_saver::config::Config;
use manga_saver::console::Console;
use manga_saver::{SeriesCache, Scraper, SourceDescriptor, SourceRegistry};
use std::path::{Path, PathBuf};

/// Manga chapter downloader.
#[derive(Parser, Debug)]
#[command(name = "manga-saver")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Use this config file instead of the default location.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List configured sources and check whether they are online.
    Sources,

    /// Print the chapter list of a series.
    Chapters {
        /// Series title.
        title: String,

        /// Source name.
        #[arg(long)]
        source: String,

        /// Read the chapter list from this index page instead.
        #[arg(long)]
        index_url: Option<String>,

        /// Print the list as a JSON object.
        #[arg(long)]
        json: bool,
    },

    /// Download chapters of a series.
    Download {
        /// Series title.
        title: String,

        /// Source name.
        #[arg(long)]
        source: String,

        /// Chapter number to download (repeatable).
        #[arg(long = "chapter", required = true)]
        chapters: Vec<String>,

        /// Read the chapter list from this index page instead.
        #[arg(long)]
        index_url: Option<String>,

        /// Output directory (defaults to the configured one).
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let console = Console::new();

    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    manga_saver::logging::init(config.scraping.debug)?;

    let registry = config.source_registry()?;
    let scraper = Scraper::new(&config.scraping).context("Failed to create HTTP client")?;

    match args.command {
        Command::Sources => list_sources(&console, &scraper, &registry).await,
        Command::Chapters {
            title,
            source,
            index_url,
            json,
        } => {
            let source = find_source(&registry, &source)?;
            let mut cache = SeriesCache::with_update_interval(&title, config.cache.update_interval_sec)?;
            let chapters = scraper
                .chapter_list(&mut cache, source, index_url.as_deref())
                .await
                .with_context(|| format!("Failed to fetch chapter list for {}", title))?;

            if json {
                let map: serde_json::Map<String, serde_json::Value> = chapters
                    .iter()
                    .map(|(chapter, url)| (chapter.to_string(), url.into()))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&map)?);
            } else {
                console.section(&format!("{} @ {}", title, source));
                for (chapter, url) in chapters.iter() {
                    println!("{}", console.chapter_line(chapter, url));
                }
                console.success(&format!("Found {} chapters", console.count(chapters.len())));
            }
            Ok(())
        }
        Command::Download {
            title,
            source,
            chapters,
            index_url,
            output,
        } => {
            let source = find_source(&registry, &source)?;
            let output = output.unwrap_or_else(|| config.paths.output_directory.clone());
            let mut cache = SeriesCache::with_update_interval(&title, config.cache.update_interval_sec)?;

            console.section(&format!("Manga Saver - {}", title));
            console.step("Fetching chapter list...");
            let available = scraper
                .chapter_list(&mut cache, source, index_url.as_deref())
                .await
                .context("Failed to fetch chapter list")?;
            console.success(&format!("Found {} chapters", console.count(available.len())));

            for chapter in &chapters {
                let dir = output.join(dir_name(&title)).join(dir_name(chapter));
                if let Err(e) =
                    download_chapter(&console, &scraper, &mut cache, source, chapter, &dir).await
                {
                    console.error(&format!("Chapter {}: {:#}", chapter, e));
                }
            }

            console.section("Done!");
            Ok(())
        }
    }
}

/// Prints every configured source with its online status.
async fn list_sources(console: &Console, scraper: &Scraper, registry: &SourceRegistry) -> Result<()> {
    console.section("Configured sources");
    for source in registry.all() {
        let online = scraper.ping(source).await;
        println!("{}", console.source_line(source.name(), source.root_url(), online));
    }
    Ok(())
}

fn find_source<'a>(registry: &'a SourceRegistry, name: &str) -> Result<&'a SourceDescriptor> {
    registry
        .find(name)
        .ok_or_else(|| anyhow::anyhow!("No source named {}", name))
}

/// Streams one chapter's pages to `dir`, numbering files from 001.
async fn download_chapter(
    console: &Console,
    scraper: &Scraper,
    cache: &mut SeriesCache,
    source: &SourceDescriptor,
    chapter: &str,
    dir: &Path,
) -> Result<()> {
    console.step(&format!("Downloading chapter {}", chapter));
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut pages = scraper.chapter_pages(chapter, cache, source).await?;
    let mut count = 0usize;
    while let Some(page) = pages.try_next().await? {
        count += 1;
        let path = dir.join(page_file_name(count, &page.extension));
        tokio::fs::write(&path, &page.data)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        console.page_progress(chapter, count);
    }
    console.finish_progress();

    console.success(&format!(
        "Chapter {}: saved {} pages to {}",
        chapter,
        console.count(count),
        dir.display()
    ));
    Ok(())
}

/// File name of the `n`th page, e.g. `001.jpg`.
///
/// The extension is whatever followed the last dot of the image URL, so path
/// separators in it are replaced.
fn page_file_name(n: usize, extension: &str) -> String {
    format!("{:03}.{}", n, extension.replace(['/', '\\'], "_"))
}

/// Makes a title or chapter usable as a single path component.
fn dir_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect()
}
