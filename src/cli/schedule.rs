use super::{status, ui};
use crate::core::config::AppConfig;
use crate::core::fetcher::CpiFetcher;
use crate::core::report::get_rent_schedule;
use crate::core::schedule::RentScheduleEntry;
use anyhow::Result;
use chrono::Utc;
use comfy_table::{Attribute, Cell, CellAlignment, Color};
use tracing::debug;

pub async fn run(fetcher: &CpiFetcher, config: &AppConfig, months: Option<u32>) -> Result<()> {
    let mut contract = config.contract.clone();
    if months.is_some() {
        contract.horizon_months = months;
    }
    debug!(?contract, "Generating rent schedule");

    let pb = ui::new_spinner("Fetching CPI series...");
    let report = get_rent_schedule(fetcher, &contract, &config.schedule, Utc::now()).await;
    pb.finish_and_clear();

    if report.schedule.is_empty() {
        if let Some(error) = &report.error {
            anyhow::bail!("{}", status::error_line(error));
        }
        println!("No months to display.");
        return Ok(());
    }

    println!(
        "\n{}",
        ui::style_text("Rent schedule", ui::StyleType::Title)
    );
    display_schedule(&report.schedule);

    if let Some(current) = report.schedule.iter().rev().find_map(|e| e.value) {
        println!(
            "\n{} {}",
            ui::style_text("Current rent:", ui::StyleType::TotalLabel),
            ui::style_text(&ui::format_amount(current), ui::StyleType::TotalValue)
        );
    }

    match &report.status {
        Some(fetch_status) => status::print_status(fetch_status, report.error.as_ref()),
        None => {
            if let Some(error) = &report.error {
                println!(
                    "{}",
                    ui::style_text(&status::error_line(error), ui::StyleType::Warning)
                );
            }
        }
    }
    Ok(())
}

fn notes(entry: &RentScheduleEntry) -> String {
    let mut notes = Vec::new();
    if entry.is_provisional {
        notes.push("provisional");
    }
    if entry.cpi_is_unofficial {
        notes.push("unofficial CPI");
    }
    if entry.is_future {
        notes.push("future");
    }
    notes.join(", ")
}

fn display_schedule(entries: &[RentScheduleEntry]) {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Month"),
        ui::header_cell("Period"),
        ui::header_cell("Rent"),
        ui::header_cell("Adjustment"),
        ui::header_cell("CPI %"),
        ui::header_cell("Notes"),
    ]);

    for entry in entries {
        let mut month_cell = Cell::new(&entry.display_label);
        if entry.adjustment_delta.is_some() {
            month_cell = month_cell.add_attribute(Attribute::Bold);
        }

        let rent_cell = match entry.value {
            Some(value) if entry.is_provisional => Cell::new(ui::format_amount(value))
                .fg(Color::Yellow)
                .set_alignment(CellAlignment::Right),
            Some(value) => Cell::new(ui::format_amount(value)).set_alignment(CellAlignment::Right),
            None => Cell::new("-")
                .fg(Color::DarkGrey)
                .set_alignment(CellAlignment::Right),
        };

        let adjustment_cell = match entry.adjustment_delta {
            Some(delta) => ui::delta_cell(delta),
            None => Cell::new(""),
        };

        table.add_row(vec![
            month_cell,
            Cell::new(entry.period_index + 1).set_alignment(CellAlignment::Right),
            rent_cell,
            adjustment_cell,
            ui::format_optional_cell(entry.cpi_percent, "-", |p| format!("{p:.1}%")),
            Cell::new(notes(entry)).fg(Color::DarkGrey),
        ]);
    }

    println!("{table}");
}
