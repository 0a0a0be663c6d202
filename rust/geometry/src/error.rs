// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for geometry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during geometry processing
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Need at least 3 distinct points, got {0}")]
    InsufficientPoints(usize),

    #[error("Degenerate triangle (zero area)")]
    DegenerateTriangle,

    #[error("Vertex index {index} out of range for {len} vertices")]
    IndexOutOfRange { index: u32, len: usize },

    #[error("Zero-length vector")]
    ZeroLengthVector,
}
