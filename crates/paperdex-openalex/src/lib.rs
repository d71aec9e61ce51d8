//! Paperdex OpenAlex - resumable works import over the cursor API
//!
//! Works are listed with `/works?filter&cursor`, converted to canonical
//! papers (arXiv id resolved from location URLs and the DOI, abstract
//! rebuilt from the inverted index) and written through a
//! [`paperdex_core::PaperSink`] by the shared cursor driver.
//!
//! ```no_run
//! use paperdex_core::{Paper, ShutdownFlag, START_CURSOR};
//! use paperdex_openalex::{OpenAlexConfig, run};
//!
//! let mut sink: Vec<Paper> = Vec::new();
//! let outcome = run(&OpenAlexConfig::default(), START_CURSOR, &mut sink, ShutdownFlag::new());
//! if let Some(cursor) = outcome.resume_cursor {
//!     println!("resume with --cursor {cursor}");
//! }
//! ```

pub mod abstract_decode;
pub mod api;
pub mod config;
pub mod runner;
pub mod transform;

// Re-exports for convenience
pub use api::{WorksQuery, parse_page};
pub use config::{ARXIV_SOURCE_ID, OpenAlexConfig};
pub use runner::{run, run_with};
pub use transform::{WorkRow, work_to_paper};
