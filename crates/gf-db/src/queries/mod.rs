//! Database query modules.

pub mod jobs;
pub mod logs;

use gf_core::Error;

pub(crate) fn db_err(e: rusqlite::Error) -> Error {
    Error::persistence(e.to_string())
}
