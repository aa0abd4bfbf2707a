//! External project interchange (spec §6): the native JSON project file
//! format and MS Project XML (MSPDI) import/export. Re-exports
//! `pls_host`'s command/response types as this crate's wire-type surface,
//! since anything driving import/export against a live project talks to
//! the worker host the same way the in-process controller does.

mod error;
mod mspdi;
mod project;

pub use error::{IoError, Result};
pub use mspdi::{export_mspdi, import_mspdi};
pub use project::{from_json, to_json, ProjectFile, FORMAT_VERSION};

pub use pls_host::{Command, Response};
