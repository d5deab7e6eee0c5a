//! Error types for ERP archive operations.

use std::io;

use thiserror::Error;

/// Failure modes of the archive and entry codecs.
///
/// Decode failures ([`Error::InvalidFormat`], [`Error::TruncatedEntry`])
/// abort the whole load; no partial archive is ever returned. Mutation
/// failures leave the archive untouched so the caller can decide how to
/// proceed.
#[derive(Debug, Error)]
pub enum Error {
    /// The signature block or a fixed header field doesn't match the format.
    #[error("invalid ERP archive: {0}")]
    InvalidFormat(String),
    /// An entry record extends past the end of its buffer, or its
    /// sub-record tail isn't a whole number of records.
    #[error("truncated entry record: {0}")]
    TruncatedEntry(String),
    /// An entry with the same name already exists and overwriting wasn't
    /// authorized.
    #[error("entry '{0}' already exists")]
    DuplicateName(String),
    /// No entry with the given name exists.
    #[error("entry '{0}' not found")]
    NotFound(String),
    /// The entry is not a surface resource with a complete mip set.
    #[error("entry '{0}' has no removable mip set")]
    NoRemovableMips(String),
    /// A rename produced a name whose length doesn't fit the 16-bit
    /// length field.
    #[error("entry name too long ({0} bytes)")]
    NameTooLong(usize),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<binrw::Error> for Error {
    fn from(err: binrw::Error) -> Self {
        match err {
            binrw::Error::Io(e) => Error::Io(e),
            e => Error::InvalidFormat(e.to_string()),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
