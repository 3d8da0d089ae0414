/// Rendering of a scan result: the text report, JSON and CSV exports.
///
/// All sizes are `u64` bytes; floating point is only used when formatting
/// them for people.
use chrono::{DateTime, Local};
use dupfinder_core::{DuplicateClass, ScanResult};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

/// Format a byte count with a binary unit (1 KB = 1024 B).
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    const TB: f64 = GB * 1024.0;

    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < MB {
        format!("{:.1} KB", b / KB)
    } else if b < GB {
        format!("{:.1} MB", b / MB)
    } else if b < TB {
        format!("{:.2} GB", b / GB)
    } else {
        format!("{:.2} TB", b / TB)
    }
}

/// One block per class, largest reclaimable size first, then a summary.
pub fn write_text<W: Write>(out: &mut W, result: &ScanResult) -> io::Result<()> {
    if result.is_empty() {
        writeln!(
            out,
            "No duplicate files found ({} files hashed).",
            result.files_hashed
        )?;
        return Ok(());
    }

    for class in result.sorted_classes() {
        writeln!(out, "Duplicate files (Hash: {}):", class.digest)?;
        for path in &class.paths {
            writeln!(out, "  {}", path.display())?;
        }
        writeln!(
            out,
            "  {} each, {} reclaimable",
            format_size(class.size),
            format_size(class.reclaimable_bytes())
        )?;
        writeln!(out)?;
    }

    writeln!(
        out,
        "{} duplicate classes, {} files, {} reclaimable ({} files hashed, {} skipped).",
        result.len(),
        result.path_count(),
        format_size(result.reclaimable_bytes()),
        result.files_hashed,
        result.errors
    )
}

#[derive(Serialize)]
struct JsonReport<'a> {
    root: &'a Path,
    scanned_at: DateTime<Local>,
    files_hashed: u64,
    errors: u64,
    reclaimable_bytes: u64,
    classes: Vec<&'a DuplicateClass>,
}

pub fn write_json<W: Write>(
    out: W,
    root: &Path,
    result: &ScanResult,
    scanned_at: DateTime<Local>,
) -> serde_json::Result<()> {
    let report = JsonReport {
        root,
        scanned_at,
        files_hashed: result.files_hashed,
        errors: result.errors,
        reclaimable_bytes: result.reclaimable_bytes(),
        classes: result.sorted_classes(),
    };
    serde_json::to_writer_pretty(out, &report)
}

#[derive(Serialize)]
struct CsvRow {
    digest: String,
    size: u64,
    path: String,
}

/// One row per duplicate path, grouped by class.
pub fn write_csv<W: Write>(out: W, result: &ScanResult) -> csv::Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for class in result.sorted_classes() {
        for path in &class.paths {
            writer.serialize(CsvRow {
                digest: class.digest.to_hex(),
                size: class.size,
                path: path.display().to_string(),
            })?;
        }
    }
    writer.flush()?;
    Ok(())
}
