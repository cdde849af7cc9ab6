//! Convert a Microsoft SRUM artifact store and its companion SOFTWARE hive
//! into a SQLite database, then render YAML-templated reports from it.
//!
//! The binary parsing of both source formats stays behind the reader ports
//! in [`core::source`]; deployments wire their typed-record and registry
//! readers into [`convert_sources`], which runs the whole pipeline: extension
//! enumeration, the WLAN profile walk, then the table-by-table conversion of
//! the artifact store.

/// The conversion engine and its per-table passes.
pub mod convert;
/// Core value model, binary decoders, and the external-reader ports.
pub mod core;
/// YAML-templated report projection.
pub mod report;
/// The SQLite relational sink.
pub mod store;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::warn;

use crate::convert::wlan;
use crate::convert::TableAliases;
use crate::core::source::{ArtifactReader, RegistryReader};
use crate::store::SqliteStore;
pub use crate::core::{ColumnKind, DecodedRow, ScalarValue, SourceColumn, StorageClass};

/// Counts reported by one conversion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertSummary {
    pub tables_converted: usize,
    pub rows_inserted: usize,
    pub wlan_profiles: usize,
}

/// Run a full conversion into `output_db`, replacing any previous output.
///
/// When a registry reader is supplied, its SRUM extension registrations
/// replace the built-in table aliases and the WLAN profile table is
/// converted first, matching the order the report queries expect.
pub fn convert_sources(
    artifact: &mut dyn ArtifactReader,
    registry: Option<&dyn RegistryReader>,
    output_db: &Path,
) -> Result<ConvertSummary> {
    if output_db.exists() {
        fs::remove_file(output_db).with_context(|| {
            format!("failed to remove previous output {}", output_db.display())
        })?;
    }
    let mut store = SqliteStore::create(output_db)?;

    let mut aliases = TableAliases::builtin();
    let mut wlan_profiles = 0usize;
    if let Some(registry) = registry {
        match wlan::enumerate_extensions(registry)? {
            Some(names) => aliases = TableAliases::from_extension_names(&names),
            None => warn!(
                "no extension registrations under {}; using built-in table names",
                wlan::EXTENSIONS_KEY_PATH
            ),
        }
        wlan_profiles = wlan::convert_wlan_profiles(registry, &mut store)?;
    }

    let (tables_converted, rows_inserted) =
        convert::convert_artifact_store(artifact, &mut store, &aliases)?;

    Ok(ConvertSummary {
        tables_converted,
        rows_inserted,
        wlan_profiles,
    })
}
