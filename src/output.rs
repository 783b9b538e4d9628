//! CLI output formatting for extraction and patching.
//!
//! # Output Format
//!
//! ## Extract
//!
//! ```text
//! Found 7 embedded images in newbayit_final (4).html
//!
//! 001 logo.jpg
//!     Format: jpg
//!     Dimensions: 240x80
//!     Encoded: 16,384 bytes (16.00 KB)
//!     Decoded: 12,288 bytes (12.00 KB)
//!     Saved: 4,096 bytes (4.00 KB)
//! Error: image 004 skipped: Invalid symbol 61, offset 2.
//!
//! Summary
//!     Images extracted: 6
//!     ...
//!     Ratio: 75.00%
//!
//! Verify images/
//!     ✓ logo.jpg - 12,288 bytes
//!
//! SUCCESS: all 6 images extracted and verified
//! ```
//!
//! ## Patch
//!
//! ```text
//! index.html
//!     Size: 180,402 → 24,611 bytes (-155,791)
//!     image tags: applied (7)
//!     background fallback: no match
//!     og:image: already present
//!
//! Patched 2 documents
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::extract::{ExtractRun, ExtractWarning};
use crate::patch::{DocumentReport, RuleOutcome};
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Group digits in threes: `1234567` → `1,234,567`. Keeps a leading `-`.
fn with_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if n < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// `12,345 bytes (12.06 KB)`
fn format_bytes(n: i64) -> String {
    format!("{} bytes ({:.2} KB)", with_thousands(n), n as f64 / 1024.0)
}

/// Show `path` relative to `root` when it lives under it.
fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn format_outcome(outcome: RuleOutcome) -> String {
    match outcome {
        RuleOutcome::Applied(n) => format!("applied ({n})"),
        RuleOutcome::AlreadyPresent => "already present".to_string(),
        RuleOutcome::AnchorMissing => "anchor missing".to_string(),
        RuleOutcome::NoMatch => "no match".to_string(),
        RuleOutcome::Disabled => "disabled".to_string(),
    }
}

// ============================================================================
// Extract output
// ============================================================================

/// Format an extraction run: per-image lines, problems, summary, verification.
pub fn format_extract_run(run: &ExtractRun, root: &Path) -> Vec<String> {
    let report = &run.report;
    let mut lines = vec![
        format!(
            "Found {} embedded images in {}",
            report.found,
            display_path(&run.input, root)
        ),
        String::new(),
    ];

    for image in &report.extracted {
        lines.push(format!("{} {}", format_index(image.position + 1), image.name));
        match (&image.detected, image.format_mismatch) {
            (Some(detected), true) => lines.push(format!(
                "    Format: {} (content looks like {})",
                image.format, detected
            )),
            _ => lines.push(format!("    Format: {}", image.format)),
        }
        if let Some((w, h)) = image.dimensions {
            lines.push(format!("    Dimensions: {w}x{h}"));
        }
        lines.push(format!(
            "    Encoded: {}",
            format_bytes(image.encoded_size as i64)
        ));
        lines.push(format!(
            "    Decoded: {}",
            format_bytes(image.decoded_size as i64)
        ));
        lines.push(format!("    Saved: {}", format_bytes(image.savings())));
    }

    for failure in &report.failures {
        lines.push(format!(
            "Error: image {} skipped: {}",
            format_index(failure.position + 1),
            failure.message
        ));
    }

    for warning in &report.warnings {
        match warning {
            ExtractWarning::Overflow { found, capacity } => lines.push(format!(
                "Warning: found {} embedded images but only {} names; {} ignored",
                found,
                capacity,
                found.saturating_sub(*capacity)
            )),
            ExtractWarning::Unassigned { position, alt } => {
                let alt = match alt {
                    Some(alt) => format!("alt \"{alt}\""),
                    None => "no alt".to_string(),
                };
                lines.push(format!(
                    "Warning: image {} ({}) has no matching name",
                    format_index(position + 1),
                    alt
                ));
            }
        }
    }

    lines.push(String::new());
    lines.push("Summary".to_string());
    lines.push(format!("    Images extracted: {}", report.extracted.len()));
    lines.push(format!(
        "    Encoded total: {}",
        format_bytes(report.total_encoded() as i64)
    ));
    lines.push(format!(
        "    Decoded total: {}",
        format_bytes(report.total_decoded() as i64)
    ));
    lines.push(format!("    Saved: {}", format_bytes(report.total_savings())));
    lines.push(format!("    Ratio: {:.2}%", report.ratio()));

    lines.push(String::new());
    lines.push(format!("Verify {}/", display_path(&run.output_dir, root)));
    for check in &run.checks {
        let line = if !check.exists {
            format!("    \u{2717} {} - missing", check.name)
        } else if !check.digest_matches {
            format!(
                "    \u{2717} {} - {} bytes, content differs",
                check.name,
                with_thousands(check.size as i64)
            )
        } else {
            format!(
                "    \u{2713} {} - {} bytes",
                check.name,
                with_thousands(check.size as i64)
            )
        };
        lines.push(line);
    }

    lines.push(String::new());
    let clean = run.all_verified() && report.failures.is_empty() && report.warnings.is_empty();
    if clean {
        lines.push(format!(
            "SUCCESS: all {} images extracted and verified",
            report.extracted.len()
        ));
    } else {
        lines.push("WARNING: some images were not extracted successfully".to_string());
    }

    lines
}

/// Print extraction output to stdout.
pub fn print_extract_run(run: &ExtractRun, root: &Path) {
    for line in format_extract_run(run, root) {
        println!("{}", line);
    }
}

// ============================================================================
// Patch output
// ============================================================================

/// Format patch reports: size change and every rule's outcome per document.
pub fn format_patch_reports(reports: &[DocumentReport], root: &Path) -> Vec<String> {
    let mut lines = Vec::new();

    for report in reports {
        lines.push(display_path(&report.path, root));
        let delta = report.size_delta();
        let sign = if delta > 0 { "+" } else { "" };
        lines.push(format!(
            "    Size: {} \u{2192} {} bytes ({}{})",
            with_thousands(report.original_size as i64),
            with_thousands(report.new_size as i64),
            sign,
            with_thousands(delta)
        ));
        for result in &report.rules {
            lines.push(format!(
                "    {}: {}",
                result.rule,
                format_outcome(result.outcome)
            ));
        }
        lines.push(String::new());
    }

    let written = reports.iter().all(|r| r.written);
    if written {
        lines.push(format!("Patched {} documents", reports.len()));
    } else {
        lines.push(format!(
            "Checked {} documents (dry run, nothing written)",
            reports.len()
        ));
    }

    lines
}

/// Print patch output to stdout.
pub fn print_patch_reports(reports: &[DocumentReport], root: &Path) {
    for line in format_patch_reports(reports, root) {
        println!("{}", line);
    }
}
