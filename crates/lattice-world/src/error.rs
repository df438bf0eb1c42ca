//! Terrain errors.

/// Errors raised while generating terrain or placing structures.
///
/// Generation never aborts on these: the chunk keeps whatever was written
/// before the failure and the error is logged.
#[derive(Debug, thiserror::Error)]
pub enum TerrainError {
    /// A structure referenced a block name missing from the block table.
    #[error("unknown block '{0}'")]
    UnknownBlock(String),
    /// The height function returned NaN or infinity.
    #[error("non-finite height at column ({x}, {z})")]
    NonFiniteHeight {
        /// World X.
        x: i32,
        /// World Z.
        z: i32,
    },
    /// Structure data was malformed.
    #[error("malformed structure: {0}")]
    Structure(String),
}
