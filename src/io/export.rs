use anyhow::{Context, Result};
use std::io::Write;

use crate::domain::{ServiceReport, Transaction, format_cents};

/// Encode a report as `service_id;total` lines joined by `\n`, without a trailing newline.
/// Totals use two decimals, e.g. `2;40.00`.
pub fn encode_report(report: &ServiceReport) -> Result<Vec<u8>> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    for (service_id, total) in &report.totals {
        csv_writer
            .write_record([service_id.to_string(), format_cents(*total)])
            .context("Failed to encode report line")?;
    }

    let mut bytes = csv_writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush report: {}", e.error()))?;
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
    }
    Ok(bytes)
}

/// Write an encoded report to `writer`. Returns the number of service lines.
pub fn write_report<W: Write>(report: &ServiceReport, mut writer: W) -> Result<usize> {
    let bytes = encode_report(report)?;
    writer.write_all(&bytes).context("Failed to write report")?;
    writer.flush().context("Failed to flush report")?;
    Ok(report.totals.len())
}

/// Write transaction entries as a pretty-printed JSON array.
pub fn write_transactions_json<W: Write>(entries: &[Transaction], mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, entries)
        .context("Failed to serialize transactions")?;
    writeln!(writer).context("Failed to write transactions")?;
    Ok(())
}
