use super::{status, ui};
use crate::core::fetcher::CpiFetcher;
use crate::core::series::{MonthlyRate, Provenance};
use anyhow::{Context, Result};
use chrono::Utc;
use comfy_table::{Cell, Color};
use rust_decimal::{Decimal, RoundingStrategy};

/// Lists the last `count` monthly CPI figures.
pub async fn run(fetcher: &CpiFetcher, count: usize) -> Result<()> {
    let pb = ui::new_spinner("Fetching CPI series...");
    let result = fetcher.fetch_series(Utc::now()).await;
    pb.finish_and_clear();
    let (series, fetch_status) = result.context("Failed to fetch CPI series")?;

    println!(
        "\n{}",
        ui::style_text("Monthly CPI", ui::StyleType::Title)
    );

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Month"),
        ui::header_cell("CPI %"),
        ui::header_cell("Source"),
    ]);
    for rate in series.latest(count) {
        table.add_row(vec![
            Cell::new(rate.month),
            ui::format_optional_cell(monthly_percent(rate), "-", |p| format!("{p:.1}%")),
            provenance_cell(&rate.provenance),
        ]);
    }
    println!("{table}");

    status::print_status(&fetch_status, fetch_status.error.as_ref());
    Ok(())
}

/// Monthly change in percent, one decimal, halves rounded up.
fn monthly_percent(rate: &MonthlyRate) -> Option<Decimal> {
    rate.proportion
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|p| p.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero))
}

fn provenance_cell(provenance: &Provenance) -> Cell {
    match provenance {
        Provenance::Official => Cell::new("official"),
        Provenance::Unofficial { recorded_at, .. } => Cell::new(format!(
            "unofficial (since {})",
            recorded_at.format("%Y-%m-%d")
        ))
        .fg(Color::Yellow),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_monthly_percent_rounds_half_up() {
        let rate = |value: &str| {
            MonthlyRate::official("2024-06".parse().unwrap(), Decimal::from_str(value).unwrap())
        };
        assert_eq!(monthly_percent(&rate("0.046")), Some(Decimal::from_str("4.6").unwrap()));
        assert_eq!(monthly_percent(&rate("0.01625")), Some(Decimal::from_str("1.6").unwrap()));
        assert_eq!(monthly_percent(&rate("0.01650")), Some(Decimal::from_str("1.7").unwrap()));
        assert_eq!(monthly_percent(&rate("0.00049")), Some(Decimal::from_str("0.0").unwrap()));
    }
}
