//! # addrscope utilities
//!
//! Logging setup and TOML configuration shared by the addrscope binaries.

pub mod config;
pub mod logging;

pub use config::{ConfigError, ModuleConfig, ResolverConfig, ToolchainConfig, ToolchainName};
pub use logging::{
    init_logging, init_logging_to_dir, init_logging_with_level, LogFormat, LogLevel, LoggingError, LoggingGuard,
};
pub use tracing::{debug, error, info, trace, warn};
