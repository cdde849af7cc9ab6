//! Destination schema resolution: table naming through the GUID alias table
//! and column-set derivation for both the static (artifact store) and
//! dynamic (registry walk) policies.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::types::{DecodedRow, SourceColumn, StorageClass};

/// Well-known SRUM extension identifiers and their destination table names,
/// used when the hive carries no extension registrations to enumerate.
pub const DEFAULT_GUID_TABLES: &[(&str, &str)] = &[
    ("{DD6636C4-8929-4683-974E-22C046A43763}", "NetworkConnectivityData"),
    ("{D10CA2FE-6FCF-4F6D-848E-B2E99266FA89}", "ApplicationResourceUsageData"),
    ("{973F5D5C-1D90-4944-BE8E-24B94231A174}", "NetworkUsageData"),
    ("{D10CA2FE-6FCF-4F6D-848E-B2E99266FA86}", "EnergyUsageData"),
    ("{FEE4E14F-02A9-4550-B5CE-5FA2DA202E37}", "WindowsPushNotificationData"),
    ("{FEE4E14F-02A9-4550-B5CE-5FA2DA202E37}LT", "WindowsPushNotificationDataLT"),
];

static GUID_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\{[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}\}")
        .expect("static pattern")
});

/// Naming seam for tables that keep their raw bracketed identifier. Kept as
/// the identity; stripping the braces and dashes is an operator policy that
/// has never been turned on.
fn normalize_guid_table_name(raw: &str) -> String {
    raw.to_string()
}

/// Per-run alias table from upper-cased bracketed identifiers to
/// human-readable destination names.
#[derive(Debug, Clone)]
pub struct TableAliases {
    map: HashMap<String, String>,
}

impl TableAliases {
    /// The built-in alias table.
    pub fn builtin() -> Self {
        let map = DEFAULT_GUID_TABLES
            .iter()
            .map(|(guid, name)| (guid.to_uppercase(), (*name).to_string()))
            .collect();
        Self { map }
    }

    /// Build the alias table from enumerated extension registrations. Each
    /// identifier contributes its live entry and the `LT` (long-term
    /// history) variant.
    pub fn from_extension_names(names: &HashMap<String, String>) -> Self {
        let mut map = HashMap::new();
        for (guid, table) in names {
            map.insert(guid.to_uppercase(), table.clone());
            map.insert(format!("{}LT", guid.to_uppercase()), format!("{table}LT"));
        }
        Self { map }
    }

    /// Resolve a raw source table name to its destination name: alias hit
    /// first (case-insensitive), then the normalization seam for anything
    /// shaped like a bracketed identifier, else the raw name unchanged.
    pub fn resolve(&self, raw: &str) -> String {
        if let Some(mapped) = self.map.get(&raw.to_uppercase()) {
            return mapped.clone();
        }
        if GUID_SHAPE.is_match(raw) {
            return normalize_guid_table_name(raw);
        }
        raw.to_string()
    }
}

/// Finalized destination table shape. `order` and `types` cover the same
/// column set; inserts bind in `order`.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub name: String,
    pub order: Vec<String>,
    pub types: HashMap<String, StorageClass>,
}

impl TableSchema {
    /// Static derivation: exactly the declared columns, in declared order.
    pub fn from_columns(name: impl Into<String>, columns: &[SourceColumn]) -> Self {
        let order: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        let types = columns
            .iter()
            .map(|c| (c.name.clone(), c.kind.storage_class()))
            .collect();
        Self {
            name: name.into(),
            order,
            types,
        }
    }
}

/// Dynamic derivation for registry-derived tables: a fixed baseline widened
/// by every key observed during the pre-scan, then finalized.
///
/// Finalization consumes the builder, so the schema handed to the sink can
/// no longer grow once DDL is on its way.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    name: String,
    order: Vec<String>,
    types: HashMap<String, StorageClass>,
    widened: Vec<String>,
}

impl SchemaBuilder {
    pub fn with_baseline(name: impl Into<String>, baseline: &[(&str, StorageClass)]) -> Self {
        let order: Vec<String> = baseline.iter().map(|(n, _)| (*n).to_string()).collect();
        let types = baseline
            .iter()
            .map(|(n, class)| ((*n).to_string(), *class))
            .collect();
        Self {
            name: name.into(),
            order,
            types,
            widened: Vec::new(),
        }
    }

    /// Record one pre-scanned row: keys outside the current column set are
    /// appended, typed BLOB.
    pub fn observe(&mut self, row: &DecodedRow) {
        for key in row.keys() {
            if !self.types.contains_key(key) {
                self.types.insert(key.clone(), StorageClass::Blob);
                self.order.push(key.clone());
                self.widened.push(key.clone());
            }
        }
    }

    /// Columns appended beyond the baseline, in discovery order.
    pub fn widened(&self) -> &[String] {
        &self.widened
    }

    pub fn finish(self) -> TableSchema {
        TableSchema {
            name: self.name,
            order: self.order,
            types: self.types,
        }
    }
}
