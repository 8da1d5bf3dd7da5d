//! # docchat
//!
//! A command-line front-end for a document question-answering service.
//!
//! docchat uploads PDF files to an S3 (or S3-compatible) bucket and sends
//! natural-language questions to a remote backend over HTTP, printing the
//! answer and its source citations. Retrieval, inference and indexing all
//! happen in the backend; this crate only validates input, forwards requests,
//! and renders results.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────────┐
//! │  config  │──▶│ BackendClient│──▶│ QA backend /chat │
//! │ TOML+env │   └──────────────┘   └──────────────────┘
//! │          │   ┌──────────────┐   ┌──────────────────┐
//! │          │──▶│ StorageClient│──▶│   S3 bucket      │
//! └──────────┘   └──────────────┘   └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docchat health                       # is the backend up?
//! docchat s3-check                     # can we reach the bucket?
//! docchat upload contract.pdf memo.pdf
//! docchat ask "What is the notice period?" --k 6
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Defaults, TOML file and environment overrides |
//! | [`error`] | Library error type |
//! | [`backend`] | Backend HTTP client (`/health`, `/chat`) |
//! | [`chat`] | `/chat` request/response contract |
//! | [`storage`] | S3 client with SigV4 signing |
//! | [`upload`] | Batch PDF upload |
//! | [`progress`] | Upload progress reporting |
//! | [`status`] | Combined backend/storage status |

pub mod backend;
pub mod chat;
pub mod config;
pub mod error;
pub mod progress;
pub mod status;
pub mod storage;
pub mod upload;

pub use error::{Error, Result};
