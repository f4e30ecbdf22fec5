//! OncoReader - a journal feed reader for oncology literature
//!
//! This crate fetches journal feeds through a relay, normalizes their items
//! into uniform articles, and filters them by keyword relevance, title search
//! and recency.

pub mod config;
pub mod dates;
pub mod db;
pub mod error;
pub mod fetcher;
pub mod filter;
pub mod model;
pub mod parser;
pub mod prefs;
pub mod reader;
pub mod routes;
pub mod sanitize;
pub mod summarizer;
