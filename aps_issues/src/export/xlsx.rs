use std::path::Path;
use rust_xlsxwriter::{Format, Workbook};
use super::IssueTable;
use crate::error::{ApsError, ApsResult};

pub const SHEET_NAME: &str = "Issues";

fn build_workbook(table: &IssueTable) -> ApsResult<Workbook> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    let header = Format::new().set_bold();
    for (col, name) in table.columns.iter().enumerate() {
        worksheet.write_string_with_format(0, col_num(col)?, name, &header)?;
    }

    for (row_index, row) in table.rows.iter().enumerate() {
        let row_num = u32::try_from(row_index + 1)
            .map_err(|_| ApsError::export_error("linhas demais para a planilha"))?;
        for (col, value) in row.iter().enumerate() {
            // células vazias ficam em branco
            if !value.is_empty() {
                worksheet.write_string(row_num, col_num(col)?, value)?;
            }
        }
    }

    Ok(workbook)
}

fn col_num(index: usize) -> ApsResult<u16> {
    u16::try_from(index).map_err(|_| ApsError::export_error("colunas demais para a planilha"))
}

/// Grava a tabela em XLSX, substituindo o arquivo existente
pub fn write_path(table: &IssueTable, destination: &Path) -> ApsResult<()> {
    let mut workbook = build_workbook(table)?;
    workbook.save(destination)?;
    Ok(())
}

pub fn to_bytes(table: &IssueTable) -> ApsResult<Vec<u8>> {
    let mut workbook = build_workbook(table)?;
    Ok(workbook.save_to_buffer()?)
}
