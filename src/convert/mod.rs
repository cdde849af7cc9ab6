//! The conversion engine: type mapping, record materialization, schema
//! resolution, and the per-table conversion passes.

pub mod mapping;
pub mod materialize;
pub mod schema;
pub mod wlan;

use anyhow::{Context, Result};
use log::info;

use crate::core::source::ArtifactReader;
use crate::store::SqliteStore;

pub use mapping::{decode_cell, DecodedField, FieldDecoder, FieldOverrides, ID_TYPE_COLUMN};
pub use materialize::materialize_record;
pub use schema::{SchemaBuilder, TableAliases, TableSchema};

/// Convert every table of the artifact store into the destination database.
///
/// Per table: resolve the destination name, derive the static schema from
/// the declared columns, emit DDL, materialize every record, insert the
/// batch. Tables convert one at a time, each batch committing before the
/// next table is read.
///
/// Returns `(tables converted, rows inserted)`.
pub fn convert_artifact_store(
    reader: &mut dyn ArtifactReader,
    store: &mut SqliteStore,
    aliases: &TableAliases,
) -> Result<(usize, usize)> {
    let overrides = FieldOverrides::srum_defaults();
    let mut tables = 0usize;
    let mut rows_inserted = 0usize;

    reader.for_each_table(&mut |meta, cursor| {
        let destination = aliases.resolve(&meta.name);
        info!("converting table {} as {}", meta.name, destination);

        let schema = TableSchema::from_columns(destination.clone(), &meta.columns);
        store.create_table(&schema)?;

        let mut rows = Vec::new();
        while let Some(cells) = cursor
            .next_record()
            .with_context(|| format!("reading table {:?}", meta.name))?
        {
            rows.push(materialize_record(
                &destination,
                &meta.columns,
                &cells,
                &overrides,
            )?);
        }

        rows_inserted += store
            .insert_batch(&schema, &rows)
            .with_context(|| format!("inserting into {destination:?}"))?;
        tables += 1;
        Ok(())
    })?;

    Ok((tables, rows_inserted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory::{MemoryArtifactReader, MemoryTable};
    use crate::core::source::TableMeta;
    use crate::core::types::{ColumnKind, ScalarValue, SourceColumn};

    #[test]
    fn guid_named_tables_land_under_their_alias() -> Result<()> {
        let meta = TableMeta::new(
            "{973F5D5C-1D90-4944-BE8E-24B94231A174}",
            vec![
                SourceColumn::new("AutoIncId", ColumnKind::I32),
                SourceColumn::new("BytesSent", ColumnKind::I64),
            ],
        );
        let records = vec![
            vec![
                Some(1i32.to_le_bytes().to_vec()),
                Some(512i64.to_le_bytes().to_vec()),
            ],
            vec![Some(2i32.to_le_bytes().to_vec()), None],
        ];
        let mut reader =
            MemoryArtifactReader::new(vec![MemoryTable::new(meta, records)]);
        let mut store = SqliteStore::in_memory()?;

        let (tables, rows) =
            convert_artifact_store(&mut reader, &mut store, &TableAliases::builtin())?;
        assert_eq!((tables, rows), (1, 2));

        let mut seen = Vec::new();
        store.query_into(
            "SELECT AutoIncId, BytesSent FROM 'NetworkUsageData' ORDER BY AutoIncId",
            &mut |_, values| {
                seen.push(values);
                Ok(())
            },
        )?;
        assert_eq!(
            seen,
            vec![
                vec![ScalarValue::Integer(1), ScalarValue::Integer(512)],
                vec![ScalarValue::Integer(2), ScalarValue::Null],
            ]
        );
        Ok(())
    }

    #[test]
    fn record_decode_failures_abort_the_run() {
        let meta = TableMeta::new(
            "SruDbIdMapTable",
            vec![SourceColumn::new("IdIndex", ColumnKind::I32)],
        );
        let records = vec![vec![Some(vec![1, 2])]];
        let mut reader =
            MemoryArtifactReader::new(vec![MemoryTable::new(meta, records)]);
        let mut store = SqliteStore::in_memory().unwrap();

        let err = convert_artifact_store(&mut reader, &mut store, &TableAliases::builtin())
            .unwrap_err();
        assert!(format!("{err:#}").contains("SruDbIdMapTable"));
    }
}
