#![warn(missing_docs)]
//! # hairlytic-contract-tests
//!
//! Locates the frozen backend contracts under the workspace `contracts/`
//! directory. The validation suite lives in `tests/`.

use std::path::PathBuf;

/// Workspace `contracts/` directory.
pub fn contracts_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../contracts")
}

/// Path of `contracts/<name>.schema.json`.
pub fn schema_path(name: &str) -> PathBuf {
    contracts_dir().join(format!("{name}.schema.json"))
}

/// Path of `contracts/fixtures/<name>.valid.json`.
pub fn fixture_path(name: &str) -> PathBuf {
    contracts_dir().join("fixtures").join(format!("{name}.valid.json"))
}
