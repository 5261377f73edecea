//! Error type shared by every structure in the crate.

use core::fmt;

/// Failure of a point operation or of an iteration step.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Error {
    /// `peek`/`pop`/`modify_top` on an empty heap.
    EmptyCollection,
    /// The handle, key or slot does not address a live entry.
    InvalidHandle,
    /// A structural mutation happened after the cursor was created.
    CollectionModified,
    /// Insert-only entry point called with a key that is already present.
    DuplicateKey,
    /// `set_key_at` was given a key that is not equal to the stored one.
    KeyMismatch,
}

pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::EmptyCollection => "collection is empty",
            Error::InvalidHandle => "handle does not address a live entry",
            Error::CollectionModified => "collection was modified during iteration",
            Error::DuplicateKey => "key is already present",
            Error::KeyMismatch => "replacement key is not equal to the stored key",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for Error {}
