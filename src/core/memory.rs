//! In-memory implementations of the reader ports.
//!
//! These back the test suite and give adapter authors a reference shape: an
//! adapter only has to materialize [`TableMeta`]/[`RawRecord`] cells or a
//! [`RegKey`] subtree and the engine does the rest.

use anyhow::Result;

use crate::core::source::{
    ArtifactReader, RawRecord, RecordCursor, RegKey, RegistryReader, TableMeta,
};

/// One fully-materialized source table.
#[derive(Debug, Clone)]
pub struct MemoryTable {
    pub meta: TableMeta,
    pub records: Vec<RawRecord>,
}

impl MemoryTable {
    pub fn new(meta: TableMeta, records: Vec<RawRecord>) -> Self {
        Self { meta, records }
    }
}

/// An artifact reader serving tables straight from memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryArtifactReader {
    tables: Vec<MemoryTable>,
}

impl MemoryArtifactReader {
    pub fn new(tables: Vec<MemoryTable>) -> Self {
        Self { tables }
    }
}

struct SliceCursor<'a> {
    records: &'a [RawRecord],
    next: usize,
}

impl RecordCursor for SliceCursor<'_> {
    fn next_record(&mut self) -> Result<Option<RawRecord>> {
        let record = self.records.get(self.next).cloned();
        if record.is_some() {
            self.next += 1;
        }
        Ok(record)
    }
}

impl ArtifactReader for MemoryArtifactReader {
    fn for_each_table(
        &mut self,
        f: &mut dyn FnMut(&TableMeta, &mut dyn RecordCursor) -> Result<()>,
    ) -> Result<()> {
        for table in &self.tables {
            let mut cursor = SliceCursor {
                records: &table.records,
                next: 0,
            };
            f(&table.meta, &mut cursor)?;
        }
        Ok(())
    }
}

/// A registry reader over an owned key tree.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    root: RegKey,
}

impl MemoryRegistry {
    pub fn new(root: RegKey) -> Self {
        Self { root }
    }
}

impl RegistryReader for MemoryRegistry {
    fn open_key(&self, path: &str) -> Result<Option<RegKey>> {
        let mut current = &self.root;
        for part in path.split('\\').filter(|p| !p.is_empty()) {
            match current.subkey(part) {
                Some(key) => current = key,
                None => return Ok(None),
            }
        }
        Ok(Some(current.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::source::{RegData, RegValue};
    use crate::core::types::{ColumnKind, SourceColumn};

    #[test]
    fn cursor_streams_records_in_order() -> Result<()> {
        let meta = TableMeta::new(
            "T",
            vec![SourceColumn::new("A", ColumnKind::U8)],
        );
        let mut reader = MemoryArtifactReader::new(vec![MemoryTable::new(
            meta,
            vec![vec![Some(vec![1])], vec![None]],
        )]);

        let mut seen = Vec::new();
        reader.for_each_table(&mut |_, cursor| {
            while let Some(record) = cursor.next_record()? {
                seen.push(record);
            }
            Ok(())
        })?;

        assert_eq!(seen, vec![vec![Some(vec![1])], vec![None]]);
        Ok(())
    }

    #[test]
    fn registry_paths_walk_the_tree() -> Result<()> {
        let mut profiles = RegKey::new("Profiles");
        profiles.values.push(RegValue::new("", RegData::Str("default".into())));
        let mut wlansvc = RegKey::new("WlanSvc");
        wlansvc.subkeys.push(profiles);
        let mut microsoft = RegKey::new("Microsoft");
        microsoft.subkeys.push(wlansvc);
        let mut root = RegKey::new("");
        root.subkeys.push(microsoft);

        let registry = MemoryRegistry::new(root);
        let key = registry.open_key("Microsoft\\WlanSvc\\Profiles")?.unwrap();
        assert_eq!(key.default_value().map(|v| &v.data), Some(&RegData::Str("default".into())));
        assert_eq!(registry.open_key("Microsoft\\Missing")?, None);
        Ok(())
    }
}
