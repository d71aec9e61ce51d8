//! Paperdex arXiv - Atom feed adapter
//!
//! Keyword search and id lookup against the arXiv export API, converted
//! into canonical [`Paper`](paperdex_core::Paper) records.
//!
//! # Example
//!
//! ```ignore
//! use paperdex_arxiv::{ArxivClient, ArxivConfig};
//! use paperdex_core::PaperSource;
//!
//! let client = ArxivClient::new(ArxivConfig::default());
//! let results = client.search("transformer attention", 10, 0)?;
//! println!("{} of {} papers", results.papers.len(), results.total);
//! ```

pub mod client;
pub mod feed;

pub use client::{ArxivClient, ArxivConfig};
pub use feed::{Feed, FeedEntry, entry_id, parse_feed};
