use super::Section;
use anyhow::{Context, Result};
use std::path::Path;

pub(super) fn load(path: &Path) -> Result<Vec<Section>> {
    let markdown = extract_pdf_to_markdown(path)?;
    Ok(vec![Section::new(markdown)])
}

/// Extract text from a PDF file and convert to Markdown format
pub fn extract_pdf_to_markdown(path: &Path) -> Result<String> {
    let text = pdf_extract::extract_text(path).context("Failed to extract text from PDF")?;
    Ok(format_as_markdown(&text))
}

/// Give raw PDF text some structure: headings, tables, paragraph breaks
fn format_as_markdown(text: &str) -> String {
    let mut markdown = String::new();
    let mut in_table = false;

    for line in text.lines() {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            in_table = false;
            markdown.push('\n');
            continue;
        }

        if is_likely_table_row(trimmed) {
            if !in_table {
                markdown.push_str(&format_table_row(trimmed));
                markdown.push('\n');
                markdown.push_str(&create_table_separator(trimmed));
                markdown.push('\n');
                in_table = true;
            } else {
                markdown.push_str(&format_table_row(trimmed));
                markdown.push('\n');
            }
            continue;
        }

        if in_table {
            markdown.push('\n');
            in_table = false;
        }

        if is_likely_heading(trimmed) {
            let level = if trimmed.chars().count() < 30 { "##" } else { "###" };
            markdown.push_str(&format!(
                "\n{} {}\n\n",
                level,
                trimmed.trim_end_matches(':')
            ));
        } else {
            markdown.push_str(trimmed);
            markdown.push('\n');
        }
    }

    markdown
}

/// Three or more columns separated by tabs or runs of spaces
fn is_likely_table_row(line: &str) -> bool {
    if line.split_whitespace().count() < 3 {
        return false;
    }
    line.contains('\t') || column_cells(line).len() >= 3
}

fn column_cells(line: &str) -> Vec<&str> {
    if line.contains('\t') {
        line.split('\t').map(str::trim).collect()
    } else {
        line.split("  ")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

fn format_table_row(line: &str) -> String {
    format!("| {} |", column_cells(line).join(" | "))
}

fn create_table_separator(header: &str) -> String {
    let separators = vec!["---"; column_cells(header).len()];
    format!("| {} |", separators.join(" | "))
}

/// Mostly-uppercase short lines, or short lines ending with a colon
fn is_likely_heading(line: &str) -> bool {
    let alpha_count = line.chars().filter(|c| c.is_alphabetic()).count();
    if alpha_count > 0 {
        let uppercase_count = line.chars().filter(|c| c.is_uppercase()).count();
        let ratio = uppercase_count as f64 / alpha_count as f64;
        if ratio > 0.8 && line.chars().count() < 100 {
            return true;
        }
    }

    line.ends_with(':') && line.chars().count() < 80 && !line.contains("://")
}
