//! medline-dl: download the MEDLINE baseline and print the citations it contains.

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use medline_dl::{
    ArticleRecord, Config, Downloader, Error, LocalStore, Result, cancel_on_signal, extract_store,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "medline-dl")]
#[command(about = "Download MEDLINE/PubMed baseline files and extract their citations")]
#[command(version)]
struct Cli {
    /// JSON configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL of the remote listing
    #[arg(long)]
    base_url: Option<String>,

    /// Destination directory for downloaded files
    #[arg(short, long)]
    dest: Option<PathBuf>,

    /// Maximum number of concurrent downloads
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// Decompress `.gz` files while downloading
    #[arg(long)]
    decompress: bool,

    /// Delete the files in the destination directory before downloading
    #[arg(long)]
    clean: bool,

    /// Extract from the files already in the destination directory
    #[arg(long)]
    skip_download: bool,

    /// Print records as JSON lines instead of text
    #[arg(long)]
    json: bool,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn to_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_json_file(path)?,
            None => Config::default(),
        };
        if let Some(base_url) = &self.base_url {
            config.source.base_url = base_url.clone();
        }
        if let Some(dest) = &self.dest {
            config.download.dest_dir = dest.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.download.concurrency_limit = concurrency;
        }
        config.download.decompress_on_download |= self.decompress;
        config.download.clean_before_download |= self.clean;
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(kind = e.kind(), error = %e, "Run failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    // Logs go to stderr so stdout carries only records
    let default = match verbose {
        0 => "warn,medline_dl=info",
        1 => "info,medline_dl=debug",
        _ => "debug,medline_dl=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Returns whether every download and every document succeeded.
async fn run(cli: &Cli) -> Result<bool> {
    let config = cli.to_config()?;
    let cancel_token = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel_token.clone()));

    let mut success = true;
    if !cli.skip_download {
        let downloader = Downloader::with_http(&config)?.with_cancellation_token(cancel_token.clone());
        let report = downloader.run().await?;
        tracing::info!(
            downloaded = report.downloaded.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Download finished"
        );
        for failure in &report.failed {
            eprintln!("download failed: {}: {}", failure.name, failure.error);
        }
        success &= report.is_success();
    }
    if cancel_token.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let store = LocalStore::new(config.download.dest_dir.clone());
    let json = cli.json;
    let token = cancel_token.clone();
    let (report, write_error) = tokio::task::spawn_blocking(move || {
        let mut out = BufWriter::new(io::stdout().lock());
        let mut write_error: Option<io::Error> = None;
        let report = extract_store(&store, &token, |_path, record| {
            if write_error.is_some() {
                return;
            }
            if let Err(e) = write_record(&mut out, &record, json) {
                // Nobody is reading (e.g. closed pipe): stop extracting
                write_error = Some(e);
                token.cancel();
            }
        });
        if let Err(e) = out.flush() {
            write_error.get_or_insert(e);
        }
        (report, write_error)
    })
    .await
    .map_err(|e| Error::Io(io::Error::other(format!("extraction task failed: {}", e))))?;

    if let Some(e) = write_error {
        return Err(Error::Io(e));
    }
    let report = report?;
    for failure in &report.failed {
        eprintln!(
            "extraction failed: {} (after {} records): {}",
            failure.path.display(),
            failure.records_before_failure,
            failure.error
        );
    }
    success &= report.is_success();

    Ok(success)
}

fn write_record(out: &mut impl Write, record: &ArticleRecord, json: bool) -> io::Result<()> {
    if json {
        serde_json::to_writer(&mut *out, record)?;
        return writeln!(out);
    }

    writeln!(out, "PMID: {}", record.record_id)?;
    if !record.keywords.is_empty() {
        writeln!(out, "Keywords: ")?;
    }
    for keyword in &record.keywords {
        writeln!(out, "\t{keyword}")?;
    }
    if !record.publication_types.is_empty() {
        writeln!(out, "Publication Types: ")?;
    }
    for publication_type in &record.publication_types {
        writeln!(out, "\t{publication_type}")?;
    }
    writeln!(out)
}
