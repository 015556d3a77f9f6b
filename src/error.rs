use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::io::Error as IoError;

/// The common result type between most library functions.
pub type Result<T> = std::result::Result<T, Error>;

/// A common error enum returned by most of the crate's functionality.
#[derive(Debug)]
pub enum Error {
    /// The entity id extracted or supplied for routing was empty.
    EmptyEntityId,
    /// The shard's total buffered message count would exceed `buffer_size`.
    BufferFull {
        /// The id the overflowing message was addressed to.
        entity_id: String,
    },
    /// A `HandOff` was requested while a hand-off was already in progress.
    HandOffInProgress,
    /// A `HandOff` named a shard id other than this Shard's own.
    ForeignShard {
        /// The shard id named in the request.
        requested: String,
        /// This Shard's own id.
        owned: String,
    },
    /// The journal failed to append or replay an event.
    Journal(String),
    /// The snapshot store failed to save or load a snapshot.
    Snapshot(String),
    /// An `std::io` error, typically surfaced by a `Journal`/`SnapshotStore` backend.
    Io(IoError),
    /// An error from the `serde_json` crate, typically surfaced while
    /// (de)serializing a snapshot body.
    Json(serde_json::Error),
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyEntityId => f.write_str("entity id must not be empty"),
            Error::BufferFull { entity_id } => {
                write!(f, "message buffer is full, dropping message for entity {entity_id}")
            },
            Error::HandOffInProgress => f.write_str("hand-off already in progress"),
            Error::ForeignShard { requested, owned } => {
                write!(f, "hand-off requested for shard {requested}, but this Shard owns {owned}")
            },
            Error::Journal(msg) => write!(f, "journal error: {msg}"),
            Error::Snapshot(msg) => write!(f, "snapshot error: {msg}"),
            Error::Io(inner) => write!(f, "io error: {inner}"),
            Error::Json(inner) => write!(f, "json error: {inner}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Io(inner) => Some(inner),
            Error::Json(inner) => Some(inner),
            _ => None,
        }
    }
}

impl From<IoError> for Error {
    fn from(e: IoError) -> Error {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Error {
        Error::Json(e)
    }
}
