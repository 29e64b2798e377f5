//! # News Harness
//!
//! Turns a directory of saved news pages into clean text or markdown, then
//! answers questions over the converted archive with a local model.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌─────────────────────┐   ┌──────────────────┐
//! │ HTML files │──▶│ Extract + Normalize │──▶│ output/*.md      │
//! │ (store)    │   │ (convert, batch)    │   │ + manifest.json  │
//! └────────────┘   └─────────────────────┘   └────────┬─────────┘
//!                                                     │ corpus
//!                      ┌──────────────────────────────┤
//!                      ▼                              ▼
//!                ┌───────────┐   ┌────────────┐  ┌──────────┐
//!                │ retrieve  │──▶│  answer    │  │ archive  │
//!                │ (scoring) │   │ (streamed) │  │ (browse) │
//!                └───────────┘   └────────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`store`] | HTML discovery and corpus loading |
//! | [`extract`] | Main-content extraction (built-in or HTTP) |
//! | [`normalize`] | Whitespace normalization |
//! | [`naming`] | Flat and mirrored output names |
//! | [`convert`] | Single-document conversion |
//! | [`batch`] | Batch runner |
//! | [`manifest`] | `manifest.json` audit record |
//! | [`progress`] | Batch progress on stderr |
//! | [`retrieve`] | Term-frequency article selection |
//! | [`completion`] | Streaming completion client |
//! | [`answer`] | Streamed question answering |
//! | [`archive`] | List, get, search and latest |
//! | [`server`] | HTTP API |
//! | [`logging`] | Tracing subscriber setup |

pub mod answer;
pub mod archive;
pub mod batch;
pub mod completion;
pub mod config;
pub mod convert;
pub mod extract;
pub mod logging;
pub mod manifest;
pub mod models;
pub mod naming;
pub mod normalize;
pub mod progress;
pub mod retrieve;
pub mod server;
pub mod store;
