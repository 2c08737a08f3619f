//! Plain-text backend, used when HTML rendering is unavailable

use super::{
    COVER_TITLE, ITEM_COLUMNS, REPORT_TITLE, RenderBackend, SIGNATURE_FIELDS, SIGNATURE_HEADING,
    STANDING_NOTICE, cover_name, locked_label, or_not_available,
};
use crate::error::RenderError;
use crate::record::EventRecord;
use crate::types::DocumentFormat;
use chrono::{DateTime, Local};
use std::fmt::Write;

const WIDTH: usize = 78;
const PAGE_BREAK: char = '\u{000C}';

/// Renders a fixed-width text document; sections are separated by form feeds
#[derive(Debug, Default, Clone, Copy)]
pub struct TextBackend;

impl RenderBackend for TextBackend {
    fn name(&self) -> &'static str {
        "text"
    }

    fn extension(&self) -> &'static str {
        "txt"
    }

    fn render(
        &self,
        records: &[EventRecord],
        format: DocumentFormat,
        generated_at: DateTime<Local>,
    ) -> Result<Vec<u8>, RenderError> {
        let mut out = String::new();
        write_document(&mut out, records, format, generated_at).map_err(|e| {
            RenderError::Backend {
                backend: "text",
                reason: e.to_string(),
            }
        })?;
        Ok(out.into_bytes())
    }
}

fn write_document(
    out: &mut String,
    records: &[EventRecord],
    format: DocumentFormat,
    generated_at: DateTime<Local>,
) -> std::fmt::Result {
    if format == DocumentFormat::Consolidated {
        centered(out, COVER_TITLE)?;
        run_stamp(out, generated_at)?;
        writeln!(out, "Total Events: {}", records.len())?;
        writeln!(out)?;
        writeln!(
            out,
            "{:<12} {:<34} {:<20} {}",
            "Event ID", "Event Name", "Type", "Status"
        )?;
        writeln!(out, "{}", "-".repeat(WIDTH))?;
        for record in records {
            writeln!(
                out,
                "{:<12} {:<34} {:<20} {}",
                record.event_id.as_str(),
                cover_name(&record.name),
                record.type_label(),
                record.status_label()
            )?;
        }
    }

    for (index, record) in records.iter().enumerate() {
        if index > 0 || format == DocumentFormat::Consolidated {
            writeln!(out, "{PAGE_BREAK}")?;
        }
        write_section(out, record, generated_at)?;
    }
    Ok(())
}

fn centered(out: &mut String, text: &str) -> std::fmt::Result {
    writeln!(out, "{text:^width$}", width = WIDTH)
}

fn run_stamp(out: &mut String, generated_at: DateTime<Local>) -> std::fmt::Result {
    writeln!(
        out,
        "RUN ON {} AT {}",
        generated_at.format("%Y-%m-%d"),
        generated_at.format("%H:%M:%S")
    )
}

fn write_section(
    out: &mut String,
    record: &EventRecord,
    generated_at: DateTime<Local>,
) -> std::fmt::Result {
    let rule = "=".repeat(WIDTH);

    centered(out, REPORT_TITLE)?;
    run_stamp(out, generated_at)?;
    writeln!(out, "{rule}")?;
    for line in STANDING_NOTICE {
        writeln!(out, "{line}")?;
    }
    writeln!(out, "{rule}")?;

    writeln!(out, "Event Number: {}", record.event_id)?;
    writeln!(out, "Event Type:   {}", record.type_label())?;
    writeln!(out, "Event Locked: {}", locked_label(record.locked))?;
    writeln!(out, "Event Status: {}", record.status_label())?;
    writeln!(out, "Event Date:   {}", record.date_label())?;
    writeln!(out, "Event Name:   {}", record.name)?;
    writeln!(out)?;

    writeln!(out, "{}", ITEM_COLUMNS.join(" | "))?;
    for item in &record.items {
        writeln!(
            out,
            "{} | {} | {} | {} | {}",
            item.item_number,
            item.primary_item_number,
            item.description,
            item.vendor,
            item.category
        )?;
    }
    writeln!(out)?;

    writeln!(out, "Instructions:")?;
    writeln!(
        out,
        "Event Preparation: {}",
        or_not_available(record.instructions.preparation.as_deref())
    )?;
    writeln!(
        out,
        "Event Portion: {}",
        or_not_available(record.instructions.portion.as_deref())
    )?;
    writeln!(out)?;

    centered(out, SIGNATURE_HEADING)?;
    for field in SIGNATURE_FIELDS {
        writeln!(out, "{field} {}", "_".repeat(40))?;
    }
    Ok(())
}
