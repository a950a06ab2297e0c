//! A library for reading IMG archives

mod archive;
mod directory;

pub use crate::archive::{Archive, Version};
pub use crate::directory::{Entry, RECORD_SIZE, SECTOR_SIZE};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("The archive is violating the expected format, because: {reason}")]
    Corrupt { reason: String },

    #[error("The archive does not contain a file named {0}")]
    FileNotFound(String),

    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests;
