use netconfig_core::OutcomeRecord;
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    // Calculate column widths
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let header_row: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
        .collect();
    println!("{}", header_row.join("  "));

    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep.join("  "));

    for row in &rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:width$}", cell, width = w)
            })
            .collect();
        println!("{}", cells.join("  ").trim_end());
    }
}

pub fn result_label(succeeded: Option<bool>) -> &'static str {
    match succeeded {
        Some(true) => "true",
        Some(false) => "false",
        None => "null",
    }
}

/// Human-readable rendering of an outcome, optionally under a resource id.
pub fn print_outcome(id: Option<&str>, outcome: &OutcomeRecord) {
    if let Some(id) = id {
        println!("ID: {id}");
    }
    println!("Result: {}", result_label(outcome.succeeded));
    let mut lines = outcome.message.lines();
    println!("Comment: {}", lines.next().unwrap_or(""));
    for line in lines {
        println!("         {line}");
    }
    if !outcome.diff().is_empty() {
        println!("Changes:");
        for line in outcome.diff().lines() {
            println!("    {line}");
        }
    }
    if let Some(rendered) = &outcome.rendered_config {
        println!("Loaded config:");
        for line in rendered.lines() {
            println!("    {line}");
        }
    }
}
