//! Registry-side conversion: the WLAN interface/profile walk and the SRUM
//! extension enumeration that supplies the GUID alias table.

use std::collections::HashMap;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::convert::mapping::{DecodedField, FieldOverrides};
use crate::convert::schema::SchemaBuilder;
use crate::core::source::{RegData, RegistryReader, RegValue};
use crate::core::types::{DecodedRow, ScalarValue, StorageClass};
use crate::store::SqliteStore;

pub const WLAN_PROFILE_TABLE: &str = "WlanSvcInterfaceProfiles";
pub const INTERFACES_KEY_PATH: &str = "Microsoft\\WlanSvc\\Interfaces";
pub const EXTENSIONS_KEY_PATH: &str = "Microsoft\\Windows NT\\CurrentVersion\\SRUM\\Extensions";

/// Baseline schema of the profile table; keys discovered during the walk
/// append after these.
const PROFILE_BASELINE: &[(&str, StorageClass)] = &[
    ("ProfileIndex", StorageClass::Integer),
    ("succeeded", StorageClass::Blob),
    ("ProfileGuid", StorageClass::Text),
    ("Flags", StorageClass::Integer),
    ("All User Profile Security Descriptor", StorageClass::Text),
    ("CreatorSid", StorageClass::Blob),
    ("InterfaceGuid", StorageClass::Text),
    ("SSID", StorageClass::Text),
    ("Nla", StorageClass::Blob),
    ("NameLength", StorageClass::Integer),
    ("Name", StorageClass::Text),
];

/// Walk the WLAN interface profiles into the profile table.
///
/// Every interface subkey contributes `InterfaceGuid`; every profile subkey
/// contributes `ProfileGuid`, its own values verbatim, and its `MetaData`
/// values through the registry decoder overrides. The full row set is
/// pre-scanned for undeclared keys before any DDL is emitted. An absent
/// interfaces subtree is non-fatal: the baseline table is created empty.
///
/// Returns the number of profile rows inserted.
pub fn convert_wlan_profiles(
    registry: &dyn RegistryReader,
    store: &mut SqliteStore,
) -> Result<usize> {
    let Some(interfaces) = registry
        .open_key(INTERFACES_KEY_PATH)
        .with_context(|| format!("failed to read {INTERFACES_KEY_PATH}"))?
    else {
        warn!("no WLAN interfaces under {INTERFACES_KEY_PATH}; emitting the baseline table empty");
        let schema = SchemaBuilder::with_baseline(WLAN_PROFILE_TABLE, PROFILE_BASELINE).finish();
        store.create_table(&schema)?;
        return Ok(0);
    };

    let overrides = FieldOverrides::registry_defaults();
    let mut rows = Vec::new();

    for interface in &interfaces.subkeys {
        let Some(profiles) = interface.subkey("Profiles") else {
            continue;
        };
        for profile in &profiles.subkeys {
            let mut row = DecodedRow::new();
            row.insert(
                "InterfaceGuid".to_string(),
                ScalarValue::Text(interface.name.clone()),
            );
            row.insert(
                "ProfileGuid".to_string(),
                ScalarValue::Text(profile.name.clone()),
            );

            for value in &profile.values {
                insert_value(&mut row, value, None)
                    .with_context(|| format!("profile {:?}", profile.name))?;
            }
            if let Some(metadata) = profile.subkey("MetaData") {
                for value in &metadata.values {
                    insert_value(&mut row, value, Some(&overrides))
                        .with_context(|| format!("profile {:?} metadata", profile.name))?;
                }
            }

            rows.push(row);
        }
    }

    let mut builder = SchemaBuilder::with_baseline(WLAN_PROFILE_TABLE, PROFILE_BASELINE);
    for row in &rows {
        builder.observe(row);
    }
    if !builder.widened().is_empty() {
        info!(
            "profile walk discovered {} undeclared column(s): {}",
            builder.widened().len(),
            builder.widened().join(", ")
        );
    }
    let schema = builder.finish();
    store.create_table(&schema)?;
    store.insert_batch(&schema, &rows)
}

/// Enumerate the SRUM extension registrations: each subkey's default value,
/// whitespace stripped, names the destination table for that identifier.
/// `None` when the hive carries no extensions key.
pub fn enumerate_extensions(
    registry: &dyn RegistryReader,
) -> Result<Option<HashMap<String, String>>> {
    let Some(extensions) = registry
        .open_key(EXTENSIONS_KEY_PATH)
        .with_context(|| format!("failed to read {EXTENSIONS_KEY_PATH}"))?
    else {
        return Ok(None);
    };

    let mut names = HashMap::new();
    for extension in &extensions.subkeys {
        let description = match extension.default_value().map(|v| &v.data) {
            Some(RegData::Str(s)) | Some(RegData::ExpandStr(s)) => s,
            _ => {
                warn!(
                    "extension {:?} has no textual default value; keeping its identifier",
                    extension.name
                );
                continue;
            }
        };
        let table: String = description.chars().filter(|c| !c.is_whitespace()).collect();
        names.insert(extension.name.to_uppercase(), table);
    }
    Ok(Some(names))
}

fn insert_value(
    row: &mut DecodedRow,
    value: &RegValue,
    overrides: Option<&FieldOverrides>,
) -> Result<()> {
    if let (Some(overrides), RegData::Binary(data)) = (overrides, &value.data) {
        if let Some(decoder) = overrides.lookup(WLAN_PROFILE_TABLE, &value.name) {
            match decoder.apply(&value.name, data, row)? {
                DecodedField::Value(decoded) => {
                    row.insert(value.name.clone(), decoded);
                }
                DecodedField::Expanded(fields) => {
                    for (name, decoded) in fields {
                        row.insert(name, decoded);
                    }
                }
            }
            return Ok(());
        }
    }

    row.insert(value.name.clone(), scalar_from_reg(&value.data));
    Ok(())
}

fn scalar_from_reg(data: &RegData) -> ScalarValue {
    match data {
        RegData::None => ScalarValue::Null,
        RegData::Str(s) | RegData::ExpandStr(s) => ScalarValue::Text(s.clone()),
        RegData::MultiStr(parts) => ScalarValue::Text(parts.join("\n")),
        RegData::Dword(v) => ScalarValue::Integer(i64::from(*v)),
        RegData::Qword(v) => ScalarValue::Integer(*v as i64),
        RegData::Binary(b) => ScalarValue::Blob(b.clone()),
    }
}
