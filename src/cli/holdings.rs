use super::ui::{self, StyleType};
use crate::core::holding::normalize_symbol;
use crate::core::valuation::Breakdown;
use crate::core::{HoldingsStore, ValuationEngine};
use anyhow::Result;
use comfy_table::{Cell, Table};
use tracing::info;

/// Whether a holdings mutation adds to or removes from the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Add,
    Remove,
}

/// Adds or removes `amount` of `symbol`, provided the market snapshot knows it.
pub async fn change(
    store: &dyn HoldingsStore,
    engine: &ValuationEngine,
    kind: Change,
    symbol: &str,
    amount: f64,
) -> Result<()> {
    let symbol = normalize_symbol(symbol);

    let pb = ui::new_spinner("Fetching market data...");
    let loaded = engine.quotes().ensure_loaded().await;
    pb.finish_and_clear();
    if let Err(e) = loaded {
        ui::report_failure(&e);
        return Ok(());
    }

    if !engine.quotes().is_known(&symbol) {
        println!(
            "{}",
            ui::style_text(&format!("{symbol} is not supported"), StyleType::Error)
        );
        return Ok(());
    }

    let balance = match kind {
        Change::Add => store.add(&symbol, amount)?,
        Change::Remove => store.remove(&symbol, amount)?,
    };
    info!(%symbol, amount, balance, ?kind, "Holdings updated");

    let verb = match kind {
        Change::Add => "Added",
        Change::Remove => "Removed",
    };
    println!(
        "{verb} {amount} {symbol}. {} {balance} {symbol}",
        ui::style_text("Balance:", StyleType::TotalLabel)
    );
    Ok(())
}

/// Prints every held asset with its price, value and weight.
pub async fn list(
    store: &dyn HoldingsStore,
    engine: &ValuationEngine,
    preferred_currency: &str,
) -> Result<()> {
    let held = store.held()?;
    if held.is_empty() {
        println!("No holdings yet. Add one with `coinfolio add <SYMBOL> <AMOUNT>`.");
        return Ok(());
    }

    let pb = ui::new_spinner("Valuing holdings...");
    let result = async {
        let currency = engine.resolve_currency(preferred_currency).await?;
        engine.breakdown(&held, &currency).await
    }
    .await;
    pb.finish_and_clear();

    match result {
        Ok(breakdown) => {
            println!("{}", ui::style_text("Holdings", StyleType::Title));
            println!("{}", holdings_table(&breakdown));
            print_skipped(&breakdown);
            println!(
                "{} {}",
                ui::style_text("Total:", StyleType::TotalLabel),
                ui::style_text(
                    &format!("{:.2} {}", breakdown.total, breakdown.currency),
                    StyleType::TotalValue
                )
            );
        }
        Err(e) => ui::report_failure(&e),
    }
    Ok(())
}

fn holdings_table(breakdown: &Breakdown) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Symbol"),
        ui::header_cell("Amount"),
        ui::header_cell("Price (USD)"),
        ui::header_cell(&format!("Value ({})", breakdown.currency)),
        ui::header_cell("Weight"),
    ]);

    for line in &breakdown.lines {
        let weight = breakdown.weight_pct(line).unwrap_or(0.0);
        table.add_row(vec![
            Cell::new(&line.symbol),
            ui::amount_cell(line.amount, 4),
            ui::amount_cell(line.price_usd, 2),
            ui::amount_cell(line.value_in_target, 2),
            ui::percentage_cell(weight),
        ]);
    }
    table
}

fn print_skipped(breakdown: &Breakdown) {
    for skipped in &breakdown.skipped {
        println!(
            "{}",
            ui::style_text(
                &format!("Skipped {} ({})", skipped.symbol, skipped.reason),
                StyleType::Subtle
            )
        );
    }
}
