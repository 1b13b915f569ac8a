// Library surface for headless/integration tests and reuse.
// The binary in main.rs only wires these together with the real terminal.
pub mod app_dirs;
pub mod config;
pub mod error;
pub mod experiment;
pub mod logging;
pub mod results;
pub mod runtime;
pub mod sequence;
pub mod session;
pub mod stats;
pub mod text;
pub mod timeline;
pub mod trial;
pub mod ui;
pub mod util;

pub use error::{NbackError, Result};
