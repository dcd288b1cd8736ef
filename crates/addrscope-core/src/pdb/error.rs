//! Errors raised while loading a debug database.

use thiserror::Error;

/// Why a debug database could not be loaded
///
/// Every variant is a hard failure for that one database: the load aborts, the mapping
/// is released and no partial index survives. The resolver treats any of these as
/// "this module has no native symbols".
#[derive(Error, Debug)]
pub enum PdbError
{
    /// The file could not be opened or mapped
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file does not start with the MSF 7.00 signature
    #[error("Not an MSF 7.00 container")]
    InvalidMagic,

    /// The container parser rejected a stream
    #[error("Malformed debug database: {0}")]
    Format(#[source] pdb::Error),

    /// A stream the index needs is absent or empty
    #[error("Missing required stream: {0}")]
    MissingStream(&'static str),

    /// The database was produced with `/DEBUG:FASTLINK` and holds no full symbols
    #[error("Fast-link (minimal debug info) databases are not supported")]
    FastLinkUnsupported,

    /// Ingestion finished without a single function symbol
    #[error("Debug database contains no function symbols")]
    NoFunctionSymbols,
}

impl From<pdb::Error> for PdbError
{
    fn from(error: pdb::Error) -> Self
    {
        match error {
            pdb::Error::UnrecognizedFileFormat => PdbError::InvalidMagic,
            pdb::Error::IoError(error) => PdbError::Io(error),
            other => PdbError::Format(other),
        }
    }
}

/// Convenience type alias for `Result<T, PdbError>`
pub type PdbResult<T> = std::result::Result<T, PdbError>;
