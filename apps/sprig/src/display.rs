//! Command results and their rendering

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use serde::Serialize;
use sprig_errors::UserFacingError;
use sprig_guard::RecordVerdict;
use sprig_install::FetchReport;
use std::io;

/// Result of one command, rendered as a table or as JSON
#[derive(Debug, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum CommandResult {
    Fetch(FetchSummary),
    Verify(VerifySummary),
    Inspect(InspectSummary),
}

impl CommandResult {
    /// Whether the process should exit successfully
    pub fn is_success(&self) -> bool {
        match self {
            Self::Fetch(summary) => !summary.cancelled && summary.failed == 0,
            Self::Verify(summary) => summary.corrupted == summary.repaired.len(),
            Self::Inspect(_) => true,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FetchSummary {
    pub packages: Vec<PackageLine>,
    pub fetched: usize,
    pub cached: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct PackageLine {
    pub package: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl From<&FetchReport> for FetchSummary {
    fn from(report: &FetchReport) -> Self {
        let mut packages: Vec<PackageLine> = report
            .results
            .iter()
            .map(|result| match &result.outcome {
                Ok(outcome) => PackageLine {
                    package: result.package.clone(),
                    status: if outcome.cached { "cached" } else { "fetched" },
                    dir: Some(outcome.entry.dir.display().to_string()),
                    provenance: Some(outcome.provenance.clone()),
                    error: None,
                    code: None,
                },
                Err(error) => PackageLine {
                    package: result.package.clone(),
                    status: if matches!(error, sprig_errors::Error::Cancelled) {
                        "cancelled"
                    } else {
                        "failed"
                    },
                    dir: None,
                    provenance: None,
                    error: Some(error.user_message().into_owned()),
                    code: error.user_code(),
                },
            })
            .collect();
        packages.extend(report.skipped.iter().map(|package| PackageLine {
            package: package.clone(),
            status: "skipped",
            dir: None,
            provenance: None,
            error: None,
            code: None,
        }));

        Self {
            packages,
            fetched: report.fetched(),
            cached: report.cached(),
            failed: report.failed(),
            cancelled: report.cancelled,
            duration_ms: u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VerifySummary {
    pub entries: Vec<EntryLine>,
    pub healthy: usize,
    pub corrupted: usize,
    pub missing: usize,
    pub unreadable: usize,
    /// Entries whose records were rebuilt
    pub repaired: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct EntryLine {
    pub basename: String,
    pub verdict: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl EntryLine {
    pub fn new(basename: String, verdict: &RecordVerdict) -> Self {
        let (label, detail) = verdict_label(verdict);
        Self {
            basename,
            verdict: label,
            detail,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InspectSummary {
    pub dir: String,
    pub verdict: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Provenance a rebuild from this record would carry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<String>,
    pub manifest: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<serde_json::Value>,
}

/// Short label and optional detail for a verdict
pub fn verdict_label(verdict: &RecordVerdict) -> (&'static str, Option<String>) {
    match verdict {
        RecordVerdict::Healthy(_) => ("healthy", None),
        RecordVerdict::Corrupted(record) => (
            "corrupted",
            sprig_guard::corruption_signature(record).map(|signature| signature.to_string()),
        ),
        RecordVerdict::Missing => ("missing", None),
        RecordVerdict::Unreadable(reason) => ("unreadable", Some(reason.clone())),
    }
}

/// Output renderer for CLI results
#[derive(Clone)]
pub struct OutputRenderer {
    /// Use JSON output format
    json_output: bool,
}

impl OutputRenderer {
    pub fn new(json_output: bool) -> Self {
        Self { json_output }
    }

    /// Render command result
    pub fn render_result(&self, result: &CommandResult) -> io::Result<()> {
        if self.json_output {
            let json = serde_json::to_string_pretty(result).map_err(io::Error::other)?;
            println!("{json}");
            return Ok(());
        }

        match result {
            CommandResult::Fetch(summary) => Self::render_fetch(summary),
            CommandResult::Verify(summary) => Self::render_verify(summary),
            CommandResult::Inspect(summary) => Self::render_inspect(summary),
        }
        Ok(())
    }

    fn render_fetch(summary: &FetchSummary) {
        let mut table = new_table(&["Package", "Status", "Provenance", "Location"]);
        for line in &summary.packages {
            let location = line
                .dir
                .as_deref()
                .or(line.error.as_deref())
                .unwrap_or("-");
            table.add_row(vec![
                Cell::new(&line.package),
                status_cell(line.status),
                Cell::new(line.provenance.as_deref().unwrap_or("-")),
                Cell::new(location),
            ]);
        }
        println!("{table}");
        println!(
            "{} fetched, {} cached, {} failed in {}ms{}",
            summary.fetched,
            summary.cached,
            summary.failed,
            summary.duration_ms,
            if summary.cancelled { " (interrupted)" } else { "" }
        );
    }

    fn render_verify(summary: &VerifySummary) {
        if summary.entries.is_empty() {
            println!("Package cache is empty.");
            return;
        }

        let mut table = new_table(&["Entry", "Verdict", "Detail"]);
        for entry in &summary.entries {
            let verdict = if summary.repaired.contains(&entry.basename) {
                "repaired"
            } else {
                entry.verdict
            };
            table.add_row(vec![
                Cell::new(&entry.basename),
                status_cell(verdict),
                Cell::new(entry.detail.as_deref().unwrap_or("")),
            ]);
        }
        println!("{table}");
        println!(
            "{} healthy, {} corrupted, {} missing, {} unreadable",
            summary.healthy, summary.corrupted, summary.missing, summary.unreadable
        );
        if summary.corrupted > summary.repaired.len() {
            println!("Run `sprig verify --repair` to rebuild corrupted records.");
        }
    }

    fn render_inspect(summary: &InspectSummary) {
        let mut table = new_table(&["Field", "Value"]);
        table.add_row(vec![Cell::new("Directory"), Cell::new(&summary.dir)]);
        table.add_row(vec![Cell::new("Record"), status_cell(summary.verdict)]);
        if let Some(detail) = &summary.detail {
            table.add_row(vec![Cell::new("Detail"), Cell::new(detail)]);
        }
        if let Some(provenance) = &summary.provenance {
            table.add_row(vec![Cell::new("Provenance"), Cell::new(provenance)]);
        }
        table.add_row(vec![Cell::new("Manifest"), Cell::new(summary.manifest)]);
        if let Some(record) = &summary.record {
            for key in ["name", "version", "build", "url", "md5", "sha256", "size"] {
                if let Some(value) = record.get(key) {
                    let text = value
                        .as_str()
                        .map_or_else(|| value.to_string(), ToString::to_string);
                    table.add_row(vec![Cell::new(key), Cell::new(text)]);
                }
            }
        }
        println!("{table}");
    }
}

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        headers
            .iter()
            .map(|header| Cell::new(header).add_attribute(Attribute::Bold))
            .collect::<Vec<_>>(),
    );
    table
}

fn status_cell(status: &str) -> Cell {
    let color = match status {
        "fetched" | "healthy" | "repaired" => Color::Green,
        "cached" => Color::Cyan,
        "failed" | "corrupted" | "unreadable" => Color::Red,
        _ => Color::Yellow,
    };
    Cell::new(status).fg(color)
}
