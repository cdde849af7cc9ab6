//! Record materialization: walk one raw record column by column and produce
//! the destination row.

use anyhow::{Context, Result};

use crate::convert::mapping::{decode_cell, DecodedField, FieldOverrides};
use crate::core::types::{DecodedRow, ScalarValue, SourceColumn};

/// Materialize one record against its table's declared columns.
///
/// Columns decode in declared ordinal order so a decoder may consult the
/// values decoded before it (the identifier-blob discriminant). An absent
/// cell materializes as null with no decoding attempted. Any decode failure
/// aborts the record; later cells may depend on the broken one, so there is
/// no per-cell recovery.
pub fn materialize_record(
    table: &str,
    columns: &[SourceColumn],
    cells: &[Option<Vec<u8>>],
    overrides: &FieldOverrides,
) -> Result<DecodedRow> {
    let mut row = DecodedRow::new();

    for (ordinal, column) in columns.iter().enumerate() {
        let data = match cells.get(ordinal) {
            Some(Some(data)) => data,
            _ => {
                row.insert(column.name.clone(), ScalarValue::Null);
                continue;
            }
        };

        let decoded = match overrides.lookup(table, &column.name) {
            Some(decoder) => decoder.apply(&column.name, data, &row),
            None => decode_cell(column.kind, data)
                .map(DecodedField::Value)
                .map_err(Into::into),
        }
        .with_context(|| {
            format!(
                "decoding table {table:?} column {:?} (ordinal {ordinal})",
                column.name
            )
        })?;

        match decoded {
            DecodedField::Value(value) => {
                row.insert(column.name.clone(), value);
            }
            DecodedField::Expanded(fields) => {
                for (name, value) in fields {
                    row.insert(name, value);
                }
            }
        }
    }

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ColumnKind;

    fn utf16(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(u16::to_le_bytes).collect()
    }

    fn id_map_columns() -> Vec<SourceColumn> {
        vec![
            SourceColumn::new("IdType", ColumnKind::U8),
            SourceColumn::new("IdIndex", ColumnKind::I32),
            SourceColumn::new("IdBlob", ColumnKind::LargeBinary),
        ]
    }

    #[test]
    fn discriminant_selects_the_blob_decoder() -> Result<()> {
        let overrides = FieldOverrides::srum_defaults();

        let row = materialize_record(
            "SruDbIdMapTable",
            &id_map_columns(),
            &vec![
                Some(vec![0]),
                Some(1i32.to_le_bytes().to_vec()),
                Some(utf16("C:\\bin\\tool.exe")),
            ],
            &overrides,
        )?;
        assert_eq!(
            row.get("IdBlob"),
            Some(&ScalarValue::Text("C:\\bin\\tool.exe".to_string()))
        );

        let sid = {
            let mut raw = vec![1u8, 2];
            raw.extend_from_slice(&[0, 0, 0, 0, 0, 5]);
            raw.extend_from_slice(&21u32.to_le_bytes());
            raw.extend_from_slice(&1001u32.to_le_bytes());
            raw
        };
        let row = materialize_record(
            "SruDbIdMapTable",
            &id_map_columns(),
            &vec![Some(vec![3]), Some(2i32.to_le_bytes().to_vec()), Some(sid)],
            &overrides,
        )?;
        assert_eq!(
            row.get("IdBlob"),
            Some(&ScalarValue::Text("S-1-5-21-1001".to_string()))
        );
        Ok(())
    }

    #[test]
    fn absent_cells_materialize_as_null() -> Result<()> {
        let row = materialize_record(
            "SruDbIdMapTable",
            &id_map_columns(),
            &vec![Some(vec![0]), None, None],
            &FieldOverrides::srum_defaults(),
        )?;
        assert_eq!(row.get("IdIndex"), Some(&ScalarValue::Null));
        assert_eq!(row.get("IdBlob"), Some(&ScalarValue::Null));
        Ok(())
    }

    #[test]
    fn decode_failures_name_the_location() {
        let err = materialize_record(
            "NetworkUsageData",
            &[SourceColumn::new("BytesSent", ColumnKind::I64)],
            &vec![Some(vec![1, 2, 3])],
            &FieldOverrides::srum_defaults(),
        )
        .unwrap_err();

        let chain = format!("{err:#}");
        assert!(chain.contains("NetworkUsageData"));
        assert!(chain.contains("BytesSent"));
        assert!(chain.contains("ordinal 0"));
    }

    #[test]
    fn timestamp_override_beats_the_declared_kind() -> Result<()> {
        // EventTimestamp arrives in a plain binary column; the override
        // decodes it as a Windows tick count.
        let row = materialize_record(
            "EnergyUsageData",
            &[SourceColumn::new("EventTimestamp", ColumnKind::Binary)],
            &vec![Some(131_000_000_000_000_000i64.to_le_bytes().to_vec())],
            &FieldOverrides::srum_defaults(),
        )?;
        assert!(matches!(
            row.get("EventTimestamp"),
            Some(ScalarValue::DateTime(_))
        ));
        Ok(())
    }
}
