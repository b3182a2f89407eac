//! # docviz core
//!
//! Pure, I/O-free logic shared by the docviz server and CLI: the data
//! model, the document segmentation and keyword retrieval pipeline, and
//! the tabular profiling pipeline that turns rows into a dashboard.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem code. Every
//! pipeline function is synchronous and degrades to an empty result
//! instead of failing; the only fallible surface is the
//! [`store::SessionStore`] trait implemented by the application.
//!
//! ```text
//! text ──▶ segment ──▶ retrieve ──▶ context ──▶ (LLM, app crate)
//! rows ──▶ infer ──▶ stats ──▶ synth ──▶ dashboard JSON
//! ```

pub mod context;
pub mod models;
pub mod retrieve;
pub mod segment;
pub mod store;
pub mod tabular;
