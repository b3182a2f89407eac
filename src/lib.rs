//! # docviz
//!
//! Document question answering, tabular dashboards, and an assistant chat
//! behind one HTTP API.
//!
//! The algorithms (segmentation, keyword retrieval, context assembly,
//! column typing, statistics, dashboard synthesis) live in the I/O-free
//! [`docviz_core`] crate. This crate adds everything around them: file
//! extraction, configuration, session persistence, the completion,
//! search, and speech clients, the Axum server, and the `docviz` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────────┐   ┌──────────────┐
//! │   Uploads    │──▶│  docviz-core    │──▶│ SessionStore │
//! │ PDF/DOCX/CSV │   │ segment/analyze │   │ memory/SQLite│
//! └──────────────┘   └────────┬────────┘   └──────────────┘
//!                             │
//!                   ┌─────────┴─────────┐
//!                   ▼                   ▼
//!              ┌──────────┐       ┌──────────┐
//!              │   CLI    │       │   HTTP   │
//!              │ (docviz) │       │  (Axum)  │
//!              └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docviz init                              # create the session database
//! docviz serve                             # start the HTTP server
//! docviz search "refund policy" terms.pdf  # rank chunks of local files
//! docviz profile sales.csv --json          # print a generated dashboard
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | PDF, Word, and text extraction |
//! | [`table`] | CSV, JSON, and XLSX parsing |
//! | [`llm`] | Chat-completion client |
//! | [`dociq`] | Document upload and question answering |
//! | [`viziq`] | Dataset upload and dashboards |
//! | [`chat`] | Assistant chat with web search |
//! | [`websearch`] | Web search client |
//! | [`speech`] | Text-to-speech client |
//! | [`server`] | HTTP server |
//! | [`inspect`] | Offline CLI commands |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`sqlite_store`] | SQLite session store |

pub mod chat;
pub mod config;
pub mod db;
pub mod dociq;
pub mod extract;
pub mod inspect;
pub mod llm;
pub mod migrate;
pub mod server;
pub mod speech;
pub mod sqlite_store;
pub mod table;
pub mod viziq;
pub mod websearch;
