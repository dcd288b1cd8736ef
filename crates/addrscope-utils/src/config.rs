//! # Configuration
//!
//! Module lists and resolver settings loaded from TOML.
//!
//! ```toml
//! symbol_store = "C:/symbols"
//! max_command_len = 8192
//!
//! [[module]]
//! path = "/opt/app/bin/app.exe"
//! base = 0x140000000
//! size = "0x200000"
//!
//! [module.toolchain]
//! kind = "native"
//! ```
//!
//! Addresses and sizes may be TOML integers (hex literals included) or strings, which
//! allows values above `i64::MAX`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Errors raised while reading a configuration file
#[derive(Error, Debug)]
pub enum ConfigError
{
    /// The file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML or does not match the schema
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The file parsed but describes an unusable setup
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Toolchain family as written in configuration files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolchainName
{
    #[serde(alias = "msvc", alias = "pdb")]
    Native,
    #[serde(alias = "gcc", alias = "clang", alias = "mingw")]
    Gnu,
    #[serde(alias = "ps3", alias = "snc")]
    Console,
    #[default]
    #[serde(alias = "none")]
    Unknown,
}

/// How a module's symbols are resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolchainConfig
{
    pub kind: ToolchainName,
    /// Directory holding the tool binaries.
    pub root: Option<PathBuf>,
    /// Tool name prefix, e.g. `x86_64-w64-mingw32-`.
    pub prefix: Option<String>,
    /// Replacement symbolize command, with `{module}` and `{address}` placeholders.
    pub symbolize: Option<String>,
    /// Replacement symbol-map command, with a `{module}` placeholder.
    pub symbol_map: Option<String>,
    /// Replacement demangle command, with a `{symbol}` placeholder.
    pub demangle: Option<String>,
}

/// One loaded module.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleConfig
{
    pub path: PathBuf,
    #[serde(deserialize_with = "deserialize_u64")]
    pub base: u64,
    #[serde(deserialize_with = "deserialize_u64")]
    pub size: u64,
    #[serde(default)]
    pub toolchain: ToolchainConfig,
}

/// Top-level resolver configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverConfig
{
    /// Symbol path for PDB lookup; `_NT_SYMBOL_PATH` applies when absent.
    pub symbol_store: Option<String>,
    /// Longest external command line, in bytes.
    pub max_command_len: Option<usize>,
    #[serde(rename = "module", default)]
    pub modules: Vec<ModuleConfig>,
}

impl ResolverConfig
{
    /// Read and validate a configuration file.
    ///
    /// ## Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as [`Self::from_toml_str`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError>
    {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration text.
    ///
    /// ## Errors
    ///
    /// [`ConfigError::Parse`] for malformed TOML, [`ConfigError::Invalid`] for an empty
    /// module list, a zero-sized module or a zero command-length limit.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError>
    {
        let config: ResolverConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError>
    {
        if self.modules.is_empty() {
            return Err(ConfigError::Invalid("no [[module]] entries".to_string()));
        }
        if let Some(module) = self.modules.iter().find(|module| module.size == 0) {
            return Err(ConfigError::Invalid(format!("module {} has zero size", module.path.display())));
        }
        if self.max_command_len == Some(0) {
            return Err(ConfigError::Invalid("max_command_len must be positive".to_string()));
        }
        Ok(())
    }
}

/// Parse `0x`-prefixed hex or decimal.
pub fn parse_u64(text: &str) -> Result<u64, String>
{
    let text = text.trim().replace('_', "");
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|e| format!("invalid number '{text}': {e}"))
}

fn deserialize_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw
    {
        Int(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(value) => Ok(value),
        Raw::Text(text) => parse_u64(&text).map_err(D::Error::custom),
    }
}
