use super::ui::{self, StyleType};
use crate::core::slices::{Aggregation, SliceInput};
use crate::core::{HoldingsStore, SliceAggregator, ValuationEngine};
use anyhow::Result;
use comfy_table::{Cell, Table};

/// Prints the allocation of the held assets as chart slices.
pub async fn run(
    store: &dyn HoldingsStore,
    engine: &ValuationEngine,
    aggregator: &SliceAggregator,
    preferred_currency: &str,
) -> Result<()> {
    let held = store.held()?;

    let pb = ui::new_spinner("Calculating allocation...");
    let result = async {
        let currency = engine.resolve_currency(preferred_currency).await?;
        engine.breakdown(&held, &currency).await
    }
    .await;
    pb.finish_and_clear();

    let breakdown = match result {
        Ok(breakdown) => breakdown,
        Err(e) => {
            ui::report_failure(&e);
            return Ok(());
        }
    };

    let inputs: Vec<SliceInput> = breakdown.lines.iter().map(SliceInput::from).collect();
    let aggregation = aggregator.aggregate(&inputs);
    if aggregation.slices.is_empty() {
        println!("Nothing to allocate yet.");
        return Ok(());
    }

    println!(
        "{}",
        ui::style_text(
            &format!("Allocation ({})", breakdown.currency),
            StyleType::Title
        )
    );
    println!("{}", allocation_table(&aggregation));
    if !aggregation.other_members.is_empty() {
        println!(
            "{}",
            ui::style_text(
                &format!("Includes: {}", aggregation.other_members.join(", ")),
                StyleType::Subtle
            )
        );
    }
    Ok(())
}

fn allocation_table(aggregation: &Aggregation) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Asset"),
        ui::header_cell("Value"),
        ui::header_cell("Share"),
        ui::header_cell("Color"),
        ui::header_cell(""),
    ]);

    for slice in &aggregation.slices {
        let pct = aggregation.share_pct(slice);
        table.add_row(vec![
            Cell::new(&slice.label),
            ui::amount_cell(slice.value, 2),
            ui::percentage_cell(pct),
            Cell::new(&slice.color),
            Cell::new(ui::share_bar(pct)),
        ]);
    }
    table
}
