//! Completion detection for a WSDL-to-REST code-generation workflow.
//!
//! The core answers three questions about an external run: have the expected
//! files appeared, has the generator printed its terminal line, and what did
//! the runtime log at startup. Every wait is bounded with [`deadline::race`].
//! The [`scenario`] layer strings these together into end-to-end checks.
pub mod artifacts;
pub mod cli;
pub mod config;
pub mod deadline;
pub mod error;
pub mod extract;
pub mod lines;
pub mod manifest;
pub mod poll;
pub mod process;
pub mod scenario;
pub mod util;
pub mod walk;
pub mod watch;

pub use error::{HarnessError, Result};
