//! Report projection: YAML templates executed against the converted store
//! and rendered as CSV.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::types::{ScalarValue, SQL_DATETIME_FORMAT};
use crate::store::SqliteStore;

/// One report definition.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportTemplate {
    /// Display name of the report.
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// The SQL executed against the converted store.
    pub query: String,
    /// Output file stem; defaults to the name with spaces replaced.
    #[serde(default)]
    pub output: Option<String>,
}

impl ReportTemplate {
    fn output_stem(&self) -> String {
        self.output
            .clone()
            .unwrap_or_else(|| self.name.replace(' ', "_"))
    }
}

/// Load every `.yml`/`.yaml` template in `folder`, sorted by file name.
pub fn load_templates(folder: &Path) -> Result<Vec<ReportTemplate>> {
    let entries = fs::read_dir(folder)
        .with_context(|| format!("failed to read template folder {}", folder.display()))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yml") | Some("yaml")
            )
        })
        .collect();
    paths.sort();

    let mut templates = Vec::with_capacity(paths.len());
    for path in paths {
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read template {}", path.display()))?;
        let template: ReportTemplate = serde_yaml::from_str(&text)
            .with_context(|| format!("invalid report template {}", path.display()))?;
        templates.push(template);
    }
    Ok(templates)
}

/// Run one report and write it as CSV under `out_dir`; returns the path.
pub fn run_report(
    store: &SqliteStore,
    template: &ReportTemplate,
    out_dir: &Path,
) -> Result<PathBuf> {
    let path = out_dir.join(format!("{}.csv", template.output_stem()));
    let file = File::create(&path)
        .with_context(|| format!("failed to create report file {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    let mut wrote_header = false;
    let names = store
        .query_into(&template.query, &mut |columns, values| {
            if !wrote_header {
                write_record(&mut writer, columns.iter().map(String::as_str))?;
                wrote_header = true;
            }
            let rendered: Vec<String> = values.iter().map(csv_field).collect();
            write_record(&mut writer, rendered.iter().map(String::as_str))?;
            Ok(())
        })
        .with_context(|| format!("report {:?} failed", template.name))?;

    // A report with zero rows still gets its header line.
    if !wrote_header {
        write_record(&mut writer, names.iter().map(String::as_str))?;
    }

    writer
        .flush()
        .with_context(|| format!("failed to flush report file {}", path.display()))?;
    Ok(path)
}

/// Load all templates from `folder` and run each against the store.
pub fn run_all(store: &SqliteStore, folder: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
    store.register_report_functions()?;
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create output folder {}", out_dir.display()))?;

    let mut written = Vec::new();
    for template in load_templates(folder)? {
        written.push(run_report(store, &template, out_dir)?);
    }
    Ok(written)
}

fn write_record<'a>(
    writer: &mut dyn Write,
    fields: impl Iterator<Item = &'a str>,
) -> Result<()> {
    let line = fields.map(escape_csv).collect::<Vec<_>>().join(",");
    writeln!(writer, "{line}").context("failed to write report row")?;
    Ok(())
}

fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn csv_field(value: &ScalarValue) -> String {
    match value {
        ScalarValue::Null => String::new(),
        ScalarValue::Integer(v) => v.to_string(),
        ScalarValue::Real(v) => v.to_string(),
        ScalarValue::Text(s) => s.clone(),
        ScalarValue::Blob(b) => hex::encode(b),
        ScalarValue::DateTime(ts) => ts.format(SQL_DATETIME_FORMAT).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::schema::TableSchema;
    use crate::core::types::{DecodedRow, StorageClass};

    fn samples_store() -> Result<SqliteStore> {
        let mut store = SqliteStore::in_memory()?;
        let schema = TableSchema {
            name: "Samples".to_string(),
            order: vec!["Id".to_string(), "Label".to_string()],
            types: [
                ("Id".to_string(), StorageClass::Integer),
                ("Label".to_string(), StorageClass::Text),
            ]
            .into_iter()
            .collect(),
        };
        store.create_table(&schema)?;

        let mut first = DecodedRow::new();
        first.insert("Id".to_string(), ScalarValue::Integer(1));
        first.insert("Label".to_string(), ScalarValue::Text("a,b".to_string()));
        let mut second = DecodedRow::new();
        second.insert("Id".to_string(), ScalarValue::Integer(2));
        store.insert_batch(&schema, &[first, second])?;
        Ok(store)
    }

    #[test]
    fn csv_escaping_quotes_only_when_needed() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn blob_fields_render_as_hex() {
        assert_eq!(csv_field(&ScalarValue::Blob(vec![0xDE, 0xAD])), "dead");
        assert_eq!(csv_field(&ScalarValue::Null), "");
    }

    #[test]
    fn templates_load_sorted_and_reports_render() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let templates = dir.path().join("templates");
        fs::create_dir(&templates)?;
        fs::write(
            templates.join("10_totals.yml"),
            "name: Totals\nquery: SELECT COUNT(*) AS N FROM Samples\n",
        )?;
        fs::write(
            templates.join("00_listing.yml"),
            "name: Listing\ndescription: every sample\nquery: SELECT Id, Label FROM Samples ORDER BY Id\noutput: samples\n",
        )?;
        fs::write(templates.join("notes.txt"), "not a template")?;

        let store = samples_store()?;
        let out = dir.path().join("reports");
        let written = run_all(&store, &templates, &out)?;
        assert_eq!(written.len(), 2);
        assert!(written[0].ends_with("samples.csv"));
        assert!(written[1].ends_with("Totals.csv"));

        let listing = fs::read_to_string(&written[0])?;
        assert_eq!(listing, "Id,Label\n1,\"a,b\"\n2,\n");
        let totals = fs::read_to_string(&written[1])?;
        assert_eq!(totals, "N\n2\n");
        Ok(())
    }

    #[test]
    fn empty_result_sets_still_write_the_header() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = samples_store()?;

        let template = ReportTemplate {
            name: "Empty".to_string(),
            description: None,
            query: "SELECT Id, Label FROM Samples WHERE Id > 100".to_string(),
            output: None,
        };
        let path = run_report(&store, &template, dir.path())?;
        assert_eq!(fs::read_to_string(path)?, "Id,Label\n");
        Ok(())
    }
}
