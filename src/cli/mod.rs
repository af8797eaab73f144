// Copyright 2024-2026 Station Gateway Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI subcommands.
//!
//! ## Usage
//!
//! ```bash
//! station-gateway discover        # Find a station and persist it
//! station-gateway status [--json] # Show the station's status
//! station-gateway config show     # Print effective configuration
//! ```

pub mod config_cmd;
pub mod station_cmd;

pub use station_cmd::{run_discover, run_status};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CONFIG: i32 = 2;
pub const EXIT_CONNECTION: i32 = 3;
