//! # Stricture Engine
//!
//! Wires the stages together: discover files, lower them to IR through a
//! [`FrontEnd`], extract facts per file on a worker pool, build the
//! dependency graph, evaluate the rule catalogue, apply inline suppressions
//! and hand back an ordered [`AnalysisReport`].
//!
//! ```no_run
//! use std::path::{Path, PathBuf};
//!
//! let report = stricture_engine::analyze(Path::new("stricture.yml"), &[PathBuf::from(".")])?;
//! for violation in &report.violations {
//!     println!("{violation}");
//! }
//! # Ok::<(), stricture_engine::AnalyzeError>(())
//! ```

pub mod analyze;
pub mod cache;
pub mod error;
pub mod frontend;
pub mod report;
pub mod suppress;

pub use analyze::{AnalyzeOptions, Analyzer, analyze};
pub use cache::IrCache;
pub use error::AnalyzeError;
pub use frontend::{FrontEnd, FrontEndRegistry, IrJsonFrontEnd};
pub use report::{AnalysisReport, Reporter, Summary};
pub use suppress::SuppressionPolicy;
