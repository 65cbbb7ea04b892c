//! Shared utilities for NiftyNavigator
//!
//! Logging setup and environment-variable configuration helpers used by the
//! bot binary and its configuration layer.

pub mod config;
pub mod logging;

pub use config::{EnvError, env_flag, env_parse, env_string, load_dotenv};
pub use logging::{LogFormat, init_tracing};
