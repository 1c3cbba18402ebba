//! Error types.
//!
//! Every failure in this crate is scoped: a [`HostError`] aborts one metadata
//! read or write, an [`EmitError`] drops one replacement for one module, an
//! [`IlError`] leaves one method body untouched. Nothing here is fatal to the
//! host process.

use std::path::PathBuf;

use thiserror::Error;

use crate::metadata::Token;
use crate::sys::cor::{self, HRESULT};

/// The host's metadata or profiler API rejected a call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed for token {token} (hr={hr:#010x})")]
pub struct HostError {
    pub operation: &'static str,
    pub token: Token,
    pub hr: HRESULT,
}

impl HostError {
    pub fn new(operation: &'static str, token: Token, hr: HRESULT) -> Self {
        Self { operation, token, hr }
    }

    /// A lookup of a row that does not exist.
    pub fn not_found(operation: &'static str, token: Token) -> Self {
        Self::new(operation, token, cor::CLDB_E_RECORD_NOTFOUND)
    }
}

/// A wrapper reference could not be materialized in a module's metadata.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmitError {
    #[error("failed to emit assembly reference to {assembly}: {source}")]
    AssemblyRef { assembly: String, source: HostError },

    #[error("failed to emit type reference to {type_name}: {source}")]
    TypeRef { type_name: String, source: HostError },

    #[error("failed to emit member reference to {type_name}::{method}: {source}")]
    MemberRef {
        type_name: String,
        method: String,
        source: HostError,
    },
}

impl EmitError {
    pub fn host_error(&self) -> &HostError {
        match self {
            EmitError::AssemblyRef { source, .. }
            | EmitError::TypeRef { source, .. }
            | EmitError::MemberRef { source, .. } => source,
        }
    }
}

/// A method body could not be decoded or re-encoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IlError {
    #[error("unexpected end of method body at offset {0}")]
    UnexpectedEof(usize),

    #[error("invalid method header byte {0:#04x}")]
    InvalidHeader(u8),

    #[error("invalid opcode {opcode:#06x} at offset {offset}")]
    InvalidOpcode { opcode: u16, offset: usize },

    #[error("code size {0} does not fit the method header")]
    CodeTooLarge(usize),
}

/// Loading configuration or integration definitions failed.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read integrations from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse integrations from {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid integration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid assembly name {name:?}: {reason}")]
    AssemblyName { name: String, reason: &'static str },

    #[error("wrapper method is missing its {0}")]
    IncompleteWrapper(&'static str),
}

/// Umbrella error for the engine's entry points.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Emit(#[from] EmitError),

    #[error(transparent)]
    Il(#[from] IlError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// HRESULT to report across the profiler boundary.
    pub fn hresult(&self) -> HRESULT {
        match self {
            Error::Host(e) => e.hr,
            Error::Emit(e) => e.host_error().hr,
            Error::Il(_) => cor::E_INVALIDARG,
            Error::Config(_) => cor::E_FAIL,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
