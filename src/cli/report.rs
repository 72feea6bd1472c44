//! Human-readable summaries printed at the end of each command

use crate::consolidation::{ConsolidationReport, MonthlySummary};
use crate::models::AcquisitionReport;
use colored::*;
use std::time::Duration;

pub fn print_acquisition(report: &AcquisitionReport, listing: bool, elapsed: Duration) {
    let summary = &report.summary;
    println!("\n{}", "Acquisition Summary".bright_green().bold());
    println!(
        "  {} {}",
        "Dates requested:".bright_cyan(),
        summary.total().to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Fetched:".bright_cyan(),
        summary.fetched.to_string().bright_white().bold()
    );
    println!(
        "  {} {}",
        "Already present:".bright_cyan(),
        summary.skipped.to_string().bright_white()
    );
    if summary.failed > 0 {
        println!(
            "  {} {}",
            "Failed:".bright_red(),
            summary.failed.to_string().bright_red().bold()
        );
    }
    println!(
        "  {} {:.1}s",
        "Time elapsed:".bright_cyan(),
        elapsed.as_secs_f64()
    );

    if listing {
        print_dates("Fetched", &report.dates_with("fetched"));
        print_dates("Skipped", &report.dates_with("skipped"));
        if summary.failed > 0 {
            println!("  {}", "Failed:".bright_red());
            for (date, error) in report.failed() {
                println!("    {} {}", date.to_string().bright_white(), error);
            }
        }
    }
}

fn print_dates(label: &str, dates: &[chrono::NaiveDate]) {
    if dates.is_empty() {
        return;
    }
    let joined = dates
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    println!("  {} {}", format!("{}:", label).bright_cyan(), joined);
}

pub fn print_consolidation(report: &ConsolidationReport, elapsed: Duration) {
    let totals = report.totals();
    println!("\n{}", "Consolidation Summary".bright_green().bold());
    for month in report.months.values() {
        println!(
            "  {} {} merged, {} already merged, {} missing -> {}",
            format!("{}:", month.month).bright_cyan(),
            month.count("merged"),
            month.count("already-merged"),
            month.count("missing"),
            month.dataset_path.display()
        );
        if month.malformed_lines > 0 {
            println!(
                "    {} {}",
                "Malformed lines skipped:".yellow(),
                month.malformed_lines
            );
        }
    }
    println!(
        "  {} {}",
        "Records inserted:".bright_cyan(),
        totals.inserted.to_string().bright_white().bold()
    );
    println!(
        "  {} {}",
        "Records replaced:".bright_cyan(),
        totals.replaced.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Records unchanged:".bright_cyan(),
        totals.unchanged.to_string().bright_white()
    );

    let failures: Vec<_> = report.failures().collect();
    if !failures.is_empty() {
        println!(
            "  {} {}",
            "Files rejected:".bright_red(),
            failures.len().to_string().bright_red().bold()
        );
        for (path, reason) in failures {
            println!("    {} {}", path.display(), reason);
        }
    }
    println!(
        "  {} {:.1}s",
        "Time elapsed:".bright_cyan(),
        elapsed.as_secs_f64()
    );
}

pub fn print_summary(summary: &MonthlySummary, daily: bool) {
    println!(
        "\n{} {}",
        "Monthly Summary".bright_green().bold(),
        summary.month.to_string().bright_white().bold()
    );
    println!(
        "  {} {}",
        "Total BEV registrations:".bright_cyan(),
        summary.total_records.to_string().bright_white().bold()
    );
    println!(
        "  {} {}",
        "Unique makes:".bright_cyan(),
        summary.unique_makes.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Unique models:".bright_cyan(),
        summary.unique_models.to_string().bright_white()
    );

    println!("  {}", "Top makes:".bright_cyan());
    for (rank, (make, count)) in summary.top_makes.iter().enumerate() {
        println!("    {}. {} ({})", rank + 1, make, count);
    }

    println!("  {}", "Top models:".bright_cyan());
    for (rank, (make, model, count)) in summary.top_models.iter().enumerate() {
        println!("    {}. {} {} ({})", rank + 1, make, model, count);
    }

    if daily {
        println!("  {}", "Registrations per day:".bright_cyan());
        for (day, count) in &summary.per_day {
            println!("    {} {}", day, count);
        }
    }
}
