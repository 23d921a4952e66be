// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Subcommand handlers.

pub mod detect;
pub mod rectify;
pub mod replay;

use std::path::Path;

use docscan_core::ScannerConfig;

use crate::CliResult;

/// Save `config` to `out`, or print it.
pub fn write_config(config: &ScannerConfig, out: Option<&Path>) -> CliResult<()> {
    match out {
        Some(path) => {
            config.save(path)?;
            tracing::info!(path = %path.display(), "Config written");
        }
        None => println!("{}", serde_json::to_string_pretty(config)?),
    }
    Ok(())
}
