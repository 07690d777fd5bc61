//! # docchat
//!
//! Ask natural-language questions about a single document. The document is
//! converted to text, split into overlapping chunks, and indexed with
//! TF-IDF; each question retrieves the closest chunks and sends them to a
//! chat-completion model as context.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────┐   ┌─────────┐   ┌───────────┐
//! │  extract  │──▶│  chunk   │──▶│  index  │──▶│  session  │
//! │ pdf/xls/  │   │ sections │   │ TF-IDF  │   │ Empty ⇄   │
//! │ csv       │   │ + lines  │   │         │   │ Loaded    │
//! └───────────┘   └──────────┘   └─────────┘   └─────┬─────┘
//!                                                    │
//!                                 ┌──────────────────┼──────────┐
//!                                 ▼                  ▼          ▼
//!                            ┌─────────┐       ┌─────────┐ ┌────────────┐
//!                            │   CLI   │       │  HTTP   │ │ completion │
//!                            │(docchat)│       │  (axum) │ │  (OpenAI)  │
//!                            └─────────┘       └─────────┘ └────────────┘
//! ```
//!
//! The chunker, index, and ranking live in the `docchat-core` crate and do
//! no I/O.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment credentials |
//! | [`error`] | Ingest and answer error types |
//! | [`extract`] | PDF, spreadsheet, and CSV text extraction |
//! | [`tabular`] | Row/column data to narrative text |
//! | [`session`] | Document state and question answering |
//! | [`completion`] | Chat-completion client |
//! | [`server`] | HTTP JSON API |

pub mod completion;
pub mod config;
pub mod error;
pub mod extract;
pub mod server;
pub mod session;
pub mod tabular;

pub use docchat_core::{chunk, index, models, search};
