//! Print-styled HTML backend

use super::{
    COVER_TITLE, ITEM_COLUMNS, REPORT_TITLE, RenderBackend, SIGNATURE_FIELDS, SIGNATURE_HEADING,
    STANDING_NOTICE, cover_name, locked_label, or_not_available,
};
use crate::error::RenderError;
use crate::record::EventRecord;
use crate::types::DocumentFormat;
use chrono::{DateTime, Local};
use std::fmt::Write;

const STYLE: &str = r#"
body { font-family: Arial, sans-serif; margin: 0; padding: 20px; }
.report-title, .cover-title { text-align: center; font-size: 20px; font-weight: bold; padding: 10px; }
.run-stamp { font-weight: bold; padding: 4px 0; }
.notice { font-size: 12px; padding: 4px 0; }
.fields { display: grid; grid-template-columns: repeat(3, 1fr); gap: 6px 18px; margin: 10px 0; }
.field-label { font-weight: bold; }
table { border-collapse: collapse; width: 100%; margin: 10px 0; }
th, td { border: 1px solid #333; padding: 4px 6px; font-size: 12px; text-align: left; }
th { background: #eee; }
.signature-block { margin-top: 24px; }
.signature-heading { text-align: center; font-weight: bold; }
.signature-line { display: flex; margin: 14px 0; }
.signature-line .rule { flex: 1; border-bottom: 1px solid #000; margin-left: 8px; }
.event-section + .event-section, .cover + .event-section { page-break-before: always; }
@media print { body { padding: 0; } }
"#;

/// Renders a standalone HTML page with print styling
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlBackend;

impl RenderBackend for HtmlBackend {
    fn name(&self) -> &'static str {
        "html"
    }

    fn extension(&self) -> &'static str {
        "html"
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
                backend: "html",
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
    let title = match format {
        DocumentFormat::Consolidated => COVER_TITLE,
        DocumentFormat::Single => REPORT_TITLE,
    };

    writeln!(out, "<!DOCTYPE html>")?;
    writeln!(out, "<html>\n<head>\n<meta charset=\"utf-8\">")?;
    writeln!(out, "<title>{}</title>", escape(title))?;
    writeln!(out, "<style>{STYLE}</style>\n</head>\n<body>")?;

    if format == DocumentFormat::Consolidated {
        write_cover(out, records, generated_at)?;
    }
    for record in records {
        write_section(out, record, generated_at)?;
    }

    writeln!(out, "</body>\n</html>")
}

fn write_cover(
    out: &mut String,
    records: &[EventRecord],
    generated_at: DateTime<Local>,
) -> std::fmt::Result {
    writeln!(out, "<div class=\"cover\">")?;
    writeln!(out, "<div class=\"cover-title\">{}</div>", escape(COVER_TITLE))?;
    write_run_stamp(out, generated_at)?;
    writeln!(
        out,
        "<div class=\"cover-total\">Total Events: {}</div>",
        records.len()
    )?;
    writeln!(out, "<table class=\"cover-table\">")?;
    writeln!(
        out,
        "<thead><tr><th>Event ID</th><th>Event Name</th><th>Type</th><th>Status</th></tr></thead>\n<tbody>"
    )?;
    for record in records {
        writeln!(
            out,
            "<tr class=\"cover-entry\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(record.event_id.as_str()),
            escape(&cover_name(&record.name)),
            escape(&record.type_label()),
            escape(&record.status_label()),
        )?;
    }
    writeln!(out, "</tbody>\n</table>\n</div>")
}

fn write_run_stamp(out: &mut String, generated_at: DateTime<Local>) -> std::fmt::Result {
    writeln!(
        out,
        "<div class=\"run-stamp\">RUN ON {} AT {}</div>",
        generated_at.format("%Y-%m-%d"),
        generated_at.format("%H:%M:%S")
    )
}

fn write_field(out: &mut String, label: &str, value: &str) -> std::fmt::Result {
    writeln!(
        out,
        "<div><span class=\"field-label\">{}</span> <span class=\"field-value\">{}</span></div>",
        escape(label),
        escape(value)
    )
}

fn write_section(
    out: &mut String,
    record: &EventRecord,
    generated_at: DateTime<Local>,
) -> std::fmt::Result {
    writeln!(
        out,
        "<div class=\"event-section\" data-event-id=\"{}\">",
        escape(record.event_id.as_str())
    )?;
    writeln!(out, "<div class=\"report-title\">{}</div>", escape(REPORT_TITLE))?;
    write_run_stamp(out, generated_at)?;
    writeln!(out, "<hr>\n<div class=\"notice\">")?;
    for line in STANDING_NOTICE {
        writeln!(out, "<div>{}</div>", escape(line))?;
    }
    writeln!(out, "</div>\n<hr>")?;

    writeln!(out, "<div class=\"fields\">")?;
    write_field(out, "Event Number", record.event_id.as_str())?;
    write_field(out, "Event Type", &record.type_label())?;
    write_field(out, "Event Locked", locked_label(record.locked))?;
    write_field(out, "Event Status", &record.status_label())?;
    write_field(out, "Event Date", &record.date_label())?;
    write_field(out, "Event Name", &record.name)?;
    writeln!(out, "</div>")?;

    writeln!(out, "<table class=\"items\">\n<thead><tr>")?;
    for column in ITEM_COLUMNS {
        write!(out, "<th>{}</th>", escape(column))?;
    }
    writeln!(out, "</tr></thead>\n<tbody>")?;
    for item in &record.items {
        writeln!(
            out,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&item.item_number),
            escape(&item.primary_item_number),
            escape(&item.description),
            escape(&item.vendor),
            escape(&item.category),
        )?;
    }
    writeln!(out, "</tbody>\n</table>")?;

    writeln!(out, "<h4>Instructions:</h4>")?;
    write_field(
        out,
        "Event Preparation:",
        or_not_available(record.instructions.preparation.as_deref()),
    )?;
    write_field(
        out,
        "Event Portion:",
        or_not_available(record.instructions.portion.as_deref()),
    )?;

    writeln!(out, "<div class=\"signature-block\">")?;
    writeln!(
        out,
        "<div class=\"signature-heading\">{}</div>",
        escape(SIGNATURE_HEADING)
    )?;
    for field in SIGNATURE_FIELDS {
        writeln!(
            out,
            "<div class=\"signature-line\"><span>{}</span><span class=\"rule\"></span></div>",
            escape(field)
        )?;
    }
    writeln!(out, "</div>\n</div>")
}

/// Escape text for HTML element content and attribute values
pub(crate) fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
