//! Paperdex PubMed - E-utilities two-step adapter
//!
//! `esearch` resolves a query to PMIDs, then one batched `efetch` call
//! returns the full XML records, which are parsed with quick-xml and
//! converted to canonical papers.

pub mod client;
pub mod parser;
pub mod transform;

// Re-exports
pub use client::{PubmedClient, PubmedConfig};
pub use parser::{PubmedArticle, parse_pubmed_xml};
pub use transform::article_to_paper;
