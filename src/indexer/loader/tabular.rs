use super::Section;
use anyhow::{Context, Result};

/// One section per CSV record, rendered as `header: value` lines
///
/// Records carry their zero-based index as `row` metadata. Empty cells are
/// skipped; rows with more cells than headers name the extras `column_N`.
pub(super) fn load_csv(bytes: &[u8]) -> Result<Vec<Section>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read CSV header")?
        .iter()
        .map(str::to_string)
        .collect();

    let mut sections = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Malformed CSV record {}", row))?;

        let lines: Vec<String> = record
            .iter()
            .enumerate()
            .filter(|(_, value)| !value.is_empty())
            .map(|(i, value)| {
                let header = headers
                    .get(i)
                    .filter(|h| !h.is_empty())
                    .cloned()
                    .unwrap_or_else(|| format!("column_{}", i + 1));
                format!("{}: {}", header, value)
            })
            .collect();

        if !lines.is_empty() {
            sections.push(Section::new(lines.join("\n")).with_metadata("row", row));
        }
    }

    Ok(sections)
}
