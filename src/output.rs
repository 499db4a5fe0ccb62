use crate::generation::{HashAction, HashEntry, PathRecord};
use crate::hashing::HashFormat;
use crate::session::{Failure, FailureCategory, FailureKind, Outcome, SessionReport};
use std::collections::BTreeMap;

/// Prints one line per failure, most severe category first, ties in walk
/// order.
pub fn print_failures(report: &SessionReport) {
    let mut failures: Vec<&Failure> = report.failures.iter().collect();
    failures.sort_by_key(|f| f.kind.category());
    for failure in failures {
        println!("{}", format_failure(failure));
    }
}

/// Prints every decided observation.
pub fn print_outcomes(report: &SessionReport) {
    for outcome in &report.outcomes {
        println!("{}", format_outcome(outcome));
    }
}

/// Prints every committed record of `path`, oldest generation first.
pub fn print_path_history(path: &str, records: &[(u32, &PathRecord)]) {
    println!("{path}");
    for (number, record) in records {
        for line in format_record(*number, record) {
            println!("{line}");
        }
    }
}

/// Newest directory digest per format, from entries given oldest first.
pub fn print_latest_directory_hashes(entries: &[(u32, &HashEntry)]) {
    for line in format_latest_directory_hashes(entries) {
        println!("{line}");
    }
}

/// Failure counts per category, e.g. "1 content mismatch, 2 missing".
pub fn failure_summary(report: &SessionReport) -> String {
    FailureCategory::ALL
        .iter()
        .map(|&category| (category, report.count_failures(category)))
        .filter(|(_, count)| *count > 0)
        .map(|(category, count)| format!("{count} {}", category.label()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_latest_directory_hashes(entries: &[(u32, &HashEntry)]) -> Vec<String> {
    let latest: BTreeMap<HashFormat, (u32, &HashEntry)> = entries
        .iter()
        .map(|&(number, entry)| (entry.format, (number, entry)))
        .collect();
    latest
        .values()
        .map(|(number, entry)| {
            format!(
                "  latest {} as of generation {}: {}",
                entry.format,
                number,
                truncate_digest(&entry.digest)
            )
        })
        .collect()
}

fn failure_code(kind: &FailureKind) -> &'static str {
    match kind {
        FailureKind::ContentMismatch(_) => "M",
        FailureKind::DirectoryMismatch(_) => "D",
        FailureKind::Unreadable(_) => "!",
        FailureKind::Missing => "R",
        FailureKind::UnexpectedNew => "A",
    }
}

fn format_failure(failure: &Failure) -> String {
    match &failure.kind {
        FailureKind::Missing | FailureKind::UnexpectedNew => {
            format!("{:<2} {}", failure_code(&failure.kind), failure.path)
        }
        kind => format!("{:<2} {} ({})", failure_code(kind), failure.path, kind),
    }
}

fn action_label(action: HashAction) -> &'static str {
    match action {
        HashAction::Original => "original",
        HashAction::New => "new",
        HashAction::Verified => "verified",
        HashAction::Failed => "failed",
    }
}

fn format_outcome(outcome: &Outcome) -> String {
    format!(
        "{:<8} {:<8} {}",
        action_label(outcome.action),
        outcome.format,
        outcome.path
    )
}

fn format_record(number: u32, record: &PathRecord) -> Vec<String> {
    let mut header = format!("  generation {number}: ");
    if record.is_directory {
        header.push_str("directory");
    } else {
        header.push_str("file");
        if let Some(size) = record.size {
            header.push_str(&format!(", {}", format_size(size)));
        }
        if let Some(mtime) = record.mtime_nanos {
            header.push_str(&format!(", mtime {}", format_mtime(mtime)));
        }
    }
    if record.hashes.is_empty() {
        header.push_str(", no hashes");
    }

    let mut lines = vec![header];
    lines.extend(record.hashes.iter().map(format_entry));
    lines
}

fn format_entry(entry: &HashEntry) -> String {
    let mut line = format!(
        "    {:<8} {:<8} {}",
        entry.format,
        action_label(entry.action),
        truncate_digest(&entry.digest)
    );
    if let Some(structure) = &entry.structure {
        line.push_str(&format!(" structure {}", truncate_digest(structure)));
    }
    line.push_str(&format!(" at {}", entry.timestamp.format("%Y-%m-%d %H:%M:%S")));
    line
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    const GB: u64 = 1024 * 1024 * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

fn format_mtime(nanos: u64) -> String {
    use std::time::{Duration, UNIX_EPOCH};

    let system_time = UNIX_EPOCH + Duration::from_nanos(nanos);
    let datetime: chrono::DateTime<chrono::Local> = system_time.into();
    datetime.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

fn truncate_digest(digest: &str) -> String {
    if digest.len() > 16 {
        format!("{}...", &digest[..16])
    } else {
        digest.to_string()
    }
}
