use std::fs::File;
use std::io::Write;
use std::path::Path;
use ::csv::{Writer, WriterBuilder};
use super::IssueTable;
use crate::error::ApsResult;

fn write_table<W: Write>(table: &IssueTable, writer: &mut Writer<W>) -> ApsResult<()> {
    if table.columns.is_empty() {
        return Ok(());
    }
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Grava a tabela em CSV (UTF-8), truncando o arquivo existente
pub fn write_path(table: &IssueTable, destination: &Path) -> ApsResult<()> {
    let file = File::create(destination)?;
    let mut writer = WriterBuilder::new().from_writer(file);
    write_table(table, &mut writer)
}

pub fn to_bytes(table: &IssueTable) -> ApsResult<Vec<u8>> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    write_table(table, &mut writer)?;
    writer
        .into_inner()
        .map_err(|e| crate::error::ApsError::export_error(format!("CSV: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::types::Issue;
    use crate::export::{export, ExportFormat};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> Vec<Issue> {
        vec![
            Issue::new("i-1")
                .with_field("title", json!("Porta, \"danificada\""))
                .with_field("status", json!("open"))
                .with_field("linkedDocuments", json!([{"urn": "x"}])),
            Issue::new("i-2")
                .with_field("title", json!("Vazamento\nno 3o andar"))
                .with_field("dueDate", json!(null))
                .with_field("published", json!(true)),
        ]
    }

    #[test]
    fn test_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("issues.csv");
        let issues = sample();

        export(&issues, ExportFormat::Csv, &destination).unwrap();

        let mut reader = ::csv::Reader::from_path(&destination).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
        let records: Vec<Vec<String>> = reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect();

        let table = IssueTable::from_issues(&issues);
        assert_eq!(headers, table.columns);
        assert_eq!(records, table.rows);
        assert_eq!(records[0][headers.iter().position(|h| h == "title").unwrap()], "Porta, \"danificada\"");
    }

    #[test]
    fn test_csv_overwrites_destination() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("issues.csv");
        std::fs::write(&destination, "conteúdo antigo que é bem maior do que o novo arquivo\n".repeat(50)).unwrap();

        export(&[Issue::new("only")], ExportFormat::Csv, &destination).unwrap();

        let content = std::fs::read_to_string(&destination).unwrap();
        assert_eq!(content, "id\nonly\n");
    }

    #[test]
    fn test_to_bytes_matches_file_output() {
        let table = IssueTable::from_issues(&sample());
        let bytes = to_bytes(&table).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("issues.csv");
        write_path(&table, &destination).unwrap();
        assert_eq!(bytes, std::fs::read(&destination).unwrap());
    }
}
