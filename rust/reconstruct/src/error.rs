// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for reconstruction operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by configuration loading and the demo tooling.
///
/// Pipeline operations themselves never fail: malformed geometry is skipped,
/// uncalibrated state no-ops and insufficient topology yields empty output.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Geometry error: {0}")]
    Geometry(#[from] roomscan_geometry::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read configuration: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}
