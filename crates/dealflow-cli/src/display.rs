//! Vertical card display for analysis reports and stored records.

use chrono::{DateTime, Utc};
use dealflow_ai::AnalysisReport;
use dealflow_core::{AggregateAnalysisRecord, DataSources, IndividualAnalysisRecord, StepResults, Stored};

const MAX_SUMMARY_CHARS: usize = 100;

/// Print the outcome of a fresh run followed by its transcript.
pub fn print_report(report: &AnalysisReport) {
    println!("=== {} ===", report.subject_id);
    println!(
        "{} of {} steps completed ({})",
        report.completed_count(),
        report.results.len(),
        if report.created { "created" } else { "updated" }
    );
    println!();

    print_steps(&report.results);
    print_sources(&report.data_sources);

    println!("Record");
    println!("  {:<26} {}", "id", report.record_id);
    println!();
    println!("{}", report.transcript);
}

/// Print a stored aggregate record as a card.
pub fn print_aggregate(stored: &Stored<AggregateAnalysisRecord>) {
    let record = &stored.record;
    println!("=== {} ===", record.subject_id);
    println!();

    println!("Record");
    println!("  {:<26} {}", "id", stored.id);
    println!("  {:<26} {}", "analysis_type", record.analysis_type);
    println!("  {:<26} {}", "status", record.status.as_str());
    println!("  {:<26} {}", "word_count", record.word_count);
    println!("  {:<26} {}", "character_count", record.character_count);
    println!("  {:<26} {}", "created_at", timestamp(&record.created_at));
    println!("  {:<26} {}", "updated_at", timestamp(&record.updated_at));
    println!();

    print_steps(&record.analysis_data);
    print_sources(&record.data_sources);
}

/// Print every individual step record for a subject, oldest first.
pub fn print_history(subject_id: &str, history: &[Stored<IndividualAnalysisRecord>]) {
    if history.is_empty() {
        println!("No individual analyses stored for {subject_id}");
        return;
    }
    println!("=== {subject_id} ({} records) ===", history.len());
    for entry in history {
        let r = &entry.record;
        println!(
            "  {}  {:<26} {:<9} {}",
            timestamp(&r.created_at),
            r.analysis_type,
            r.status.as_str(),
            truncate(r.analysis_data.summary(), MAX_SUMMARY_CHARS)
        );
    }
}

fn print_steps(results: &StepResults) {
    println!("Steps");
    for (key, result) in results {
        let marker = match result.backend_status() {
            Some(status) => format!("{} [{}]", result.status(), status),
            None => result.status().to_string(),
        };
        println!(
            "  {:<26} {:<22} {}",
            key,
            marker,
            truncate(result.summary(), MAX_SUMMARY_CHARS)
        );
    }
    println!();
}

fn print_sources(sources: &DataSources) {
    println!("Data Sources");
    for (name, used) in [
        ("profile", sources.profile),
        ("email_transcript", sources.email_transcript),
        ("call_transcript", sources.call_transcript),
        ("pitch_deck", sources.pitch_deck),
    ] {
        println!("  {:<26} {}", name, if used { "yes" } else { "no" });
    }
    println!();
}

fn timestamp(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// First line of `s`, cut to `max` characters.
fn truncate(s: &str, max: usize) -> String {
    let line = s.lines().next().unwrap_or_default();
    if line.chars().count() <= max {
        return line.to_string();
    }
    let cut: String = line.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}
