//! # docchat CLI
//!
//! ## Usage
//!
//! ```bash
//! docchat --config ./config/docchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat health` | Check that the QA backend answers `/health` |
//! | `docchat s3-check` | Check bucket access with the configured credentials |
//! | `docchat upload <FILE>...` | Upload PDF files to the bucket |
//! | `docchat ask "<question>"` | Ask the backend a question |
//! | `docchat status` | Show backend and storage status together |
//! | `docchat config` | Print the effective configuration |
//!
//! Set `DOCCHAT_LOG=debug` for diagnostic logging on stderr.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

use docchat::{backend, chat, config, progress::ProgressMode, status, storage, upload};

/// docchat — upload PDFs to S3 and ask questions about them.
///
/// Settings come from `--config` (optional), then from environment
/// variables (`BACKEND_URL`, `POD_ID`, `BUCKET_NAME`, `S3_ENDPOINT`,
/// `AWS_REGION`). A `.env` file in the working directory is loaded first.
#[derive(Parser)]
#[command(
    name = "docchat",
    about = "docchat — upload PDFs to S3 and ask questions to a document QA backend",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = "./config/docchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether the QA backend is up.
    ///
    /// Sends `GET /health`; exits non-zero unless the backend answers 200.
    Health,

    /// Test access to the S3 bucket.
    ///
    /// Issues `HeadBucket` with the credentials from `AWS_ACCESS_KEY_ID`,
    /// `AWS_SECRET_ACCESS_KEY` and optional `AWS_SESSION_TOKEN`.
    #[command(name = "s3-check")]
    S3Check,

    /// Upload PDF files to the bucket.
    ///
    /// Each file is stored under `<prefix>/<random id>.pdf`. Failures are
    /// listed per file; the command exits non-zero if any file failed.
    Upload {
        /// PDF files to upload.
        files: Vec<PathBuf>,

        /// Progress output on stderr. Defaults to `human` on a terminal,
        /// `off` otherwise.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Ask the backend a question about the uploaded documents.
    Ask {
        /// The question.
        question: String,

        /// Number of documents to retrieve (1-10). Defaults to `backend.default_k`.
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=10))]
        k: Option<u32>,

        /// Optional namespace passed through to the backend.
        #[arg(long)]
        namespace: Option<String>,

        /// Extra documents as JSON, e.g. `[{"id":"1","text":"...","metadata":{}}]`.
        #[arg(long, conflicts_with = "documents_file")]
        documents: Option<String>,

        /// Read the documents JSON from a file.
        #[arg(long)]
        documents_file: Option<PathBuf>,

        /// Print the backend's JSON response as-is.
        #[arg(long)]
        json: bool,
    },

    /// Show backend and storage status.
    Status,

    /// Print the effective configuration (credentials are never shown).
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_env("DOCCHAT_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Health => {
            backend::run_health(&cfg.backend).await?;
        }
        Commands::S3Check => {
            storage::run_check(&cfg.storage).await?;
        }
        Commands::Upload { files, progress } => {
            upload::run_upload(&cfg, &files, progress).await?;
        }
        Commands::Ask {
            question,
            k,
            namespace,
            documents,
            documents_file,
            json,
        } => {
            let documents = match documents_file {
                Some(path) => Some(std::fs::read_to_string(&path).map_err(|e| {
                    anyhow::anyhow!("Failed to read documents file {}: {}", path.display(), e)
                })?),
                None => documents,
            };
            chat::run_ask(&cfg, &question, k, namespace, documents, json).await?;
        }
        Commands::Status => {
            status::run_status(&cfg).await?;
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
    }

    Ok(())
}
