//! Exportação de issues para CSV e planilha XLSX.
//!
//! As colunas são a união dos campos presentes no lote: campos conhecidos
//! primeiro, em ordem fixa, e os demais em ordem alfabética. O destino é
//! sempre sobrescrito.

pub mod csv;
pub mod xlsx;

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use crate::client::types::Issue;
use crate::error::{ApsError, ApsResult};

/// Campos conhecidos, na ordem em que aparecem no arquivo
const PREFERRED_COLUMNS: [&str; 14] = [
    "id",
    "displayId",
    "title",
    "description",
    "issueTypeId",
    "issueSubtypeId",
    "status",
    "assignedTo",
    "assignedToType",
    "dueDate",
    "locationDescription",
    "createdBy",
    "createdAt",
    "updatedAt",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    #[serde(alias = "xlsx", alias = "excel")]
    Spreadsheet,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Spreadsheet => "xlsx",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Spreadsheet => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "xlsx" | "excel" | "spreadsheet" => Ok(ExportFormat::Spreadsheet),
            _ => Err(format!("Formato desconhecido: {}", s)),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Tabela retangular derivada de um lote de issues
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl IssueTable {
    pub fn from_issues(issues: &[Issue]) -> Self {
        let observed: BTreeSet<&str> = issues.iter().flat_map(Issue::field_names).collect();

        let mut columns: Vec<String> = PREFERRED_COLUMNS
            .iter()
            .filter(|c| observed.contains(*c))
            .map(|c| c.to_string())
            .collect();
        columns.extend(
            observed
                .iter()
                .filter(|c| !PREFERRED_COLUMNS.contains(*c))
                .map(|c| c.to_string()),
        );

        let rows = issues
            .iter()
            .map(|issue| {
                columns
                    .iter()
                    .map(|column| issue.field(column).map(|v| cell_text(&v)).unwrap_or_default())
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }
}

/// Texto de uma célula: strings como estão, null vazio, objetos em JSON compacto
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Exporta o lote para o destino, sobrescrevendo o arquivo existente
pub fn export(issues: &[Issue], format: ExportFormat, destination: &Path) -> ApsResult<()> {
    log::info!("💾 Exportando {} issues para {} ({})", issues.len(), destination.display(), format);

    let table = IssueTable::from_issues(issues);
    match format {
        ExportFormat::Csv => csv::write_path(&table, destination),
        ExportFormat::Spreadsheet => xlsx::write_path(&table, destination),
    }
    .map_err(|e| match e {
        ApsError::Export(msg) => ApsError::export_error(format!("{}: {}", destination.display(), msg)),
        other => other,
    })?;

    log::info!("✅ Exportação concluída: {}", destination.display());
    Ok(())
}

/// Serializa o lote em memória (downloads pelo navegador)
pub fn export_to_bytes(issues: &[Issue], format: ExportFormat) -> ApsResult<Vec<u8>> {
    let table = IssueTable::from_issues(issues);
    match format {
        ExportFormat::Csv => csv::to_bytes(&table),
        ExportFormat::Spreadsheet => xlsx::to_bytes(&table),
    }
}

/// Nome sugerido: `issues_<projeto>_<AAAAmmdd_HHMMSS>.<ext>`
pub fn default_file_name(project: &str, format: ExportFormat, now: DateTime<Utc>) -> String {
    let project: String = project
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("issues_{}_{}.{}", project, now.format("%Y%m%d_%H%M%S"), format.extension())
}
