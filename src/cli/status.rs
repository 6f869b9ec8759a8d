use super::ui;
use crate::core::error::ErrorInfo;
use crate::core::fetcher::FetchStatus;

/// Human readable summary of where the CPI data came from.
pub fn status_lines(status: &FetchStatus) -> Vec<String> {
    let mut lines = Vec::new();

    let primary_failed = status
        .error
        .as_ref()
        .is_some_and(|e| e.code != "primary_stale" && e.code != "cache_error");
    let origin = match (status.used_cache, status.used_backup) {
        (true, false) => "local cache",
        (true, true) => "local cache and backup source",
        (false, true) if primary_failed => "backup source",
        (false, true) => "primary and backup sources",
        (false, false) => "primary source",
    };
    lines.push(format!("CPI data from {origin}"));

    if let Some(fetched_at) = status.fetched_at {
        lines.push(format!(
            "Last updated {}",
            fetched_at.format("%Y-%m-%d %H:%M UTC")
        ));
    }
    if !status.unofficial_months.is_empty() {
        let months: Vec<String> = status
            .unofficial_months
            .iter()
            .map(ToString::to_string)
            .collect();
        lines.push(format!("Unofficial CPI months: {}", months.join(", ")));
    }
    if status.stale {
        lines.push("The latest published CPI month is missing".to_string());
    }
    lines
}

pub fn error_line(error: &ErrorInfo) -> String {
    format!("{}: {}", error.origin_label, error.message)
}

pub fn print_status(status: &FetchStatus, error: Option<&ErrorInfo>) {
    println!();
    for line in status_lines(status) {
        println!("{}", ui::style_text(&line, ui::StyleType::Subtle));
    }
    if let Some(error) = error {
        println!(
            "{}",
            ui::style_text(&error_line(error), ui::StyleType::Warning)
        );
    }
}
