//! Error types for Flowlink.

use thiserror::Error;

/// Result type alias using Flowlink's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Flowlink operations.
///
/// Lookups and removals that find no match return `false`/`None` instead of
/// an error; these variants cover structural misuse during wiring.
#[derive(Error, Debug)]
pub enum Error {
    /// A single-successor element already has a different successor.
    #[error("output slot of '{element}' is already occupied")]
    SlotOccupied {
        /// Label of the element whose slot was occupied.
        element: String,
    },

    /// Two ports cannot be wired in the requested direction.
    #[error("cannot connect '{from}' to '{to}': direction mismatch")]
    DirectionMismatch {
        /// Qualified name of the originating port.
        from: String,
        /// Qualified name of the destination port.
        to: String,
    },
}
