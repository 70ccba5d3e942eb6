//! CLI output formatting for every command.
//!
//! # Information-First Display
//!
//! Each entity (gallery, photo, spec) leads with its identity: a positional
//! index and title. Storage details (archive member names, blob keys, cache
//! status) follow as indented context lines.
//!
//! # Output Format
//!
//! ## Import
//!
//! ```text
//! Trip (2 photos)
//!     001 Trip 1
//!         Source: beach.jpg
//!     002 Trip 2
//!         Source: dunes/sunset.png
//! Skipped
//!     __MACOSX/._beach.jpg: archive metadata
//!     notes.txt: unsupported image format
//!
//! Imported 2 photos into trip, skipped 2 entries
//! ```
//!
//! ## Specs
//!
//! ```text
//! 001 display → display (jpg q70, counted)
//!     resize 600x*
//! 002 thumbnail → thumbnail (jpg q70, pre-cached)
//!     resize 100x75 crop
//!     adjust contrast 1.2 sharpness 1.1
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::cache::CacheSummary;
use crate::import::{EntryReport, EntryVerdict, ImportOutcome};
use crate::pipeline::{CacheOutcome, DerivedImage, PrewarmReport};
use crate::specs::{ImageSpec, SpecRegistry};
use crate::types::Gallery;
use std::path::Path;

// ============================================================================
// Shared entity display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Format an entity header: positional index + title, with optional detail.
///
/// ```text
/// 001 Trip (5 photos)
/// 001 Trip
/// ```
fn entity_header(index: usize, title: &str, count: Option<usize>) -> String {
    match count {
        Some(n) => format!("{} {} ({})", format_index(index), title, photos(n)),
        None => format!("{} {}", format_index(index), title),
    }
}

fn count(n: usize, singular: &str, plural: &str) -> String {
    if n == 1 {
        format!("1 {singular}")
    } else {
        format!("{n} {plural}")
    }
}

fn photos(n: usize) -> String {
    count(n, "photo", "photos")
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_desc(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut.trim_end())
    }
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

// ============================================================================
// Import / check
// ============================================================================

/// Format the result of an archive import.
pub fn format_import_output(outcome: &ImportOutcome) -> Vec<String> {
    let mut lines = vec![format!(
        "{} ({})",
        outcome.gallery.title,
        photos(outcome.photos.len())
    )];
    for (i, photo) in outcome.photos.iter().enumerate() {
        lines.push(format!("{}{}", indent(1), entity_header(i + 1, &photo.title, None)));
        lines.push(format!("{}Source: {}", indent(2), photo.original.filename));
    }

    if !outcome.skipped.is_empty() {
        lines.push("Skipped".to_string());
        for entry in &outcome.skipped {
            lines.push(format!("{}{}: {}", indent(1), entry.name, entry.reason));
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "Imported {} into {}, skipped {}",
        photos(outcome.photos.len()),
        outcome.gallery.slug,
        count(outcome.skipped.len(), "entry", "entries")
    ));
    lines
}

pub fn print_import_output(outcome: &ImportOutcome) {
    print_lines(&format_import_output(outcome));
}

/// Format a dry-run archive check.
pub fn format_check_output(reports: &[EntryReport]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut importable = 0;
    for report in reports {
        match &report.verdict {
            EntryVerdict::Image { format, dimensions } => {
                importable += 1;
                lines.push(format!(
                    "{} {:?} {}x{}",
                    report.name, format, dimensions.width, dimensions.height
                ));
            }
            EntryVerdict::Skipped(reason) => {
                lines.push(format!("{} skipped: {}", report.name, reason));
            }
        }
    }
    lines.push(String::new());
    lines.push(format!(
        "{} of {} entries importable",
        importable,
        reports.len()
    ));
    lines
}

pub fn print_check_output(reports: &[EntryReport]) {
    print_lines(&format_check_output(reports));
}

// ============================================================================
// Render / prewarm
// ============================================================================

fn cache_label(outcome: CacheOutcome) -> &'static str {
    match outcome {
        CacheOutcome::Hit => "cached",
        CacheOutcome::Stored => "rendered",
        CacheOutcome::Uncached => "rendered, not cached",
    }
}

/// Format a single render result, with the file it was written to if any.
pub fn format_render_output(image: &DerivedImage, written_to: Option<&Path>) -> Vec<String> {
    let mut lines = vec![format!(
        "{} ({}): {}x{} {}, {} bytes [{}]",
        image.spec,
        image.access_as,
        image.dimensions.width,
        image.dimensions.height,
        image.format.extension(),
        image.bytes.len(),
        cache_label(image.cache)
    )];
    if let Some(path) = written_to {
        lines.push(format!("{}Output: {}", indent(1), path.display()));
    }
    lines
}

pub fn print_render_output(image: &DerivedImage, written_to: Option<&Path>) {
    print_lines(&format_render_output(image, written_to));
}

/// Format pre-warm results: failures per photo, then cache totals.
pub fn format_prewarm_output(reports: &[PrewarmReport], summary: &CacheSummary) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, report) in reports.iter().enumerate() {
        let status = if !report.failed.is_empty() {
            format!("{} failed", report.failed.len())
        } else if report.rendered.is_empty() {
            "nothing to render".to_string()
        } else {
            format!("{} ok", report.rendered.join(", "))
        };
        lines.push(format!("{} {}: {}", format_index(i + 1), report.photo, status));
        for (spec, err) in &report.failed {
            lines.push(format!("{}{}: {}", indent(1), spec, err));
        }
    }
    lines.push(String::new());
    lines.push(format!("Pre-warmed {}: {}", photos(reports.len()), summary));
    lines
}

pub fn print_prewarm_output(reports: &[PrewarmReport], summary: &CacheSummary) {
    print_lines(&format_prewarm_output(reports, summary));
}

// ============================================================================
// Listings
// ============================================================================

fn spec_flags(spec: &ImageSpec) -> String {
    let mut parts = vec![format!("{} q{}", spec.format.extension(), spec.quality.value())];
    if spec.increment_count {
        parts.push("counted".into());
    }
    if spec.pre_cache {
        parts.push("pre-cached".into());
    }
    if !spec.cache {
        parts.push("uncached".into());
    }
    parts.join(", ")
}

/// Format the spec registry, one entry per spec with its stage chain.
pub fn format_specs_output(registry: &SpecRegistry) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, spec) in registry.iter().enumerate() {
        lines.push(format!(
            "{} {} → {} ({})",
            format_index(i + 1),
            spec.name,
            spec.access_as,
            spec_flags(spec)
        ));
        if spec.stages.is_empty() {
            lines.push(format!("{}(original, re-encoded)", indent(1)));
        }
        for stage in &spec.stages {
            lines.push(format!("{}{}", indent(1), stage.describe()));
        }
    }
    lines
}

pub fn print_specs_output(registry: &SpecRegistry) {
    print_lines(&format_specs_output(registry));
}

/// Format the gallery listing, newest first as given.
pub fn format_galleries_output(galleries: &[Gallery]) -> Vec<String> {
    if galleries.is_empty() {
        return vec!["No galleries".to_string()];
    }
    let mut lines = Vec::new();
    for (i, gallery) in galleries.iter().enumerate() {
        lines.push(entity_header(i + 1, &gallery.title, Some(gallery.photos.len())));
        let visibility = if gallery.is_public { "public" } else { "private" };
        lines.push(format!(
            "{}Slug: {} ({}, added {})",
            indent(1),
            gallery.slug,
            visibility,
            gallery.date_added.format("%Y-%m-%d")
        ));
        if !gallery.description.is_empty() {
            lines.push(format!(
                "{}Description: {}",
                indent(1),
                truncate_desc(&gallery.description, 40)
            ));
        }
    }
    lines
}

pub fn print_galleries_output(galleries: &[Gallery]) {
    print_lines(&format_galleries_output(galleries));
}
