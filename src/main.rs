//! # News Harness CLI (`newsctx`)
//!
//! Batch-cleans saved news HTML into text or markdown, browses the converted
//! archive, and answers questions over it with a local model.
//!
//! ## Usage
//!
//! ```bash
//! newsctx --config ./config/newsctx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `newsctx clean` | Convert every HTML file under the input root |
//! | `newsctx clean-file <input>` | Convert a single file |
//! | `newsctx ask "<question>"` | Answer from the best-matching article |
//! | `newsctx list` | List archive articles |
//! | `newsctx get <name>` | Print one article |
//! | `newsctx search "<query>"` | Keyword search with snippets |
//! | `newsctx latest` | Most recently modified articles |
//! | `newsctx serve` | Start the HTTP server |
//!
//! ## Exit codes
//!
//! `0` everything succeeded, `1` some documents failed, `2` fatal error
//! (bad configuration, missing input directory).

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use news_harness::answer::AnswerStreamer;
use news_harness::archive::{self, ArchiveError};
use news_harness::batch::{clean_file, run_batch, BatchOptions};
use news_harness::completion::OllamaClient;
use news_harness::config::{self, Config};
use news_harness::extract::create_extractor;
use news_harness::manifest::MANIFEST_FILE;
use news_harness::models::{ExtractOptions, OutputFormat};
use news_harness::progress::ProgressMode;
use news_harness::{logging, server};

/// News Harness: clean saved news pages and ask questions about them.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Command-line flags override configured values.
#[derive(Parser)]
#[command(
    name = "newsctx",
    about = "Clean saved news HTML into text and answer questions over the archive",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = "./config/newsctx.toml")]
    config: PathBuf,

    /// Log level for diagnostics on stderr. `RUST_LOG` overrides it.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// Extraction flags shared by `clean` and `clean-file`.
#[derive(clap::Args)]
struct ExtractArgs {
    /// Output format: `markdown`, `txt` or `html`.
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Drop tables from the extracted content.
    #[arg(long)]
    no_tables: bool,

    /// Keep comment sections.
    #[arg(long)]
    include_comments: bool,
}

impl ExtractArgs {
    fn apply(&self, mut options: ExtractOptions) -> ExtractOptions {
        if let Some(format) = self.format {
            options.output_format = format;
        }
        if self.no_tables {
            options.include_tables = false;
        }
        if self.include_comments {
            options.include_comments = true;
        }
        options
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a directory of HTML files and write `manifest.json`.
    ///
    /// With explicit FILES only those are converted; otherwise the input
    /// directory is walked for `*.html` and `*.htm`.
    Clean {
        #[arg(long)]
        input_dir: Option<PathBuf>,

        #[arg(long)]
        output_dir: Option<PathBuf>,

        #[command(flatten)]
        extract: ExtractArgs,

        /// Keep existing outputs instead of rewriting them.
        #[arg(long)]
        no_overwrite: bool,

        /// Process at most N documents.
        #[arg(long)]
        limit: Option<usize>,

        /// Mirror the input tree instead of flat file names.
        #[arg(long)]
        mirror: bool,

        /// Documents converted at once.
        #[arg(long)]
        concurrency: Option<usize>,

        /// Progress on stderr: `off`, `human` or `json`. Human when stderr
        /// is a terminal, otherwise off.
        #[arg(long)]
        progress: Option<ProgressMode>,

        /// Explicit input files.
        files: Vec<PathBuf>,
    },

    /// Convert one HTML file.
    CleanFile {
        input: PathBuf,

        /// Exact output path. Defaults to a flat name under the output dir.
        #[arg(long)]
        output: Option<PathBuf>,

        #[arg(long)]
        output_dir: Option<PathBuf>,

        #[command(flatten)]
        extract: ExtractArgs,
    },

    /// Answer a question from the best-matching article.
    Ask {
        #[arg(required = true)]
        question: Vec<String>,

        /// Print the answer once complete instead of token by token.
        #[arg(long)]
        buffered: bool,
    },

    /// List archive articles.
    List,

    /// Print one article by file name.
    Get { name: String },

    /// Case-insensitive keyword search over the archive.
    Search { query: String },

    /// Most recently modified articles.
    Latest {
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Clean {
            input_dir,
            output_dir,
            extract,
            no_overwrite,
            limit,
            mirror,
            concurrency,
            progress,
            files,
        } => {
            let mut opts = BatchOptions::from_config(&cfg.cleaner)?;
            if let Some(dir) = input_dir {
                opts.input_dir = dir;
            }
            if let Some(dir) = output_dir {
                opts.output_dir = dir;
            }
            opts.extract = extract.apply(opts.extract);
            if no_overwrite {
                opts.overwrite = false;
            }
            if mirror {
                opts.flat_output = false;
            }
            if let Some(n) = concurrency {
                if n == 0 {
                    bail!("--concurrency must be at least 1");
                }
                opts.concurrency = n;
            }
            opts.limit = limit;
            if !files.is_empty() {
                opts.input_files = Some(files);
            }

            let extractor = create_extractor(&cfg.extractor)?;
            let reporter = progress
                .unwrap_or_else(ProgressMode::default_for_tty)
                .reporter();

            let results = run_batch(&opts, extractor.as_ref(), reporter.as_ref()).await?;
            let failed = results.iter().filter(|r| !r.ok).count();

            for r in results.iter().filter(|r| !r.ok) {
                eprintln!(
                    "failed: {} ({})",
                    r.input_path,
                    r.error.as_deref().unwrap_or("unknown error")
                );
            }
            println!(
                "Cleaned {} of {} documents ({} failed)",
                results.len() - failed,
                results.len(),
                failed
            );
            println!("Manifest: {}", opts.output_dir.join(MANIFEST_FILE).display());

            Ok(if failed > 0 {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            })
        }
        Commands::CleanFile {
            input,
            output,
            output_dir,
            extract,
        } => {
            let extractor = create_extractor(&cfg.extractor)?;
            let options = extract.apply(cfg.cleaner.extract_options()?);
            let output_dir = output_dir.unwrap_or_else(|| cfg.cleaner.output_dir.clone());

            match clean_file(
                extractor.as_ref(),
                &input,
                output.as_deref(),
                &output_dir,
                &options,
            )
            .await
            {
                Ok(path) => {
                    println!("{}", path.display());
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("failed: {} ({:#})", input.display(), e);
                    Ok(ExitCode::from(1))
                }
            }
        }
        Commands::Ask { question, buffered } => {
            ask(&cfg, &question.join(" "), buffered).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::List => {
            let names = archive::list_articles(&cfg.corpus.dir)?;
            if names.is_empty() {
                println!("No articles in {}.", cfg.corpus.dir.display());
            }
            for name in names {
                println!("{}", name);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Get { name } => match archive::get_article(&cfg.corpus.dir, &name) {
            Ok(text) => {
                print!("{}", text);
                Ok(ExitCode::SUCCESS)
            }
            Err(ArchiveError::Other(e)) => Err(e),
            Err(e) => {
                eprintln!("{}", e);
                Ok(ExitCode::from(1))
            }
        },
        Commands::Search { query } => {
            let hits = archive::search_articles(&cfg.corpus.dir, &query)?;
            if hits.is_empty() {
                println!("No matches found for '{}'.", query);
            }
            for hit in hits {
                println!("- **{}**: ...{}...", hit.name, hit.snippet);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Latest { limit } => {
            for article in archive::latest_articles(&cfg.corpus.dir, limit)? {
                println!("- **{}**: {}...", article.name, article.summary);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn ask(cfg: &Config, question: &str, buffered: bool) -> Result<()> {
    let client = Arc::new(OllamaClient::new(&cfg.completion)?);
    let streamer = AnswerStreamer::new(
        cfg.corpus.dir.clone(),
        client,
        cfg.completion.max_context_chars,
    );
    let mut answer = streamer.stream_answer(question);

    if buffered {
        println!("{}", answer.collect_text().await);
        return Ok(());
    }

    let mut stdout = std::io::stdout();
    while let Some(token) = answer.recv().await {
        stdout.write_all(token.as_bytes())?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}
