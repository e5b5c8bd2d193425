use super::ui::{self, StyleType};
use crate::core::holding::normalize_symbol;
use crate::core::{HoldingsStore, ValuationEngine, ValuationError};
use anyhow::Result;

/// Prints the total value of the held assets.
///
/// `currency` overrides the preferred display currency; an explicit code must
/// be supported, the preferred one falls back to USD.
pub async fn run(
    store: &dyn HoldingsStore,
    engine: &ValuationEngine,
    preferred_currency: &str,
    currency: Option<&str>,
) -> Result<()> {
    let held = store.held()?;

    let pb = ui::new_spinner("Valuing holdings...");
    let result = async {
        let target = match currency {
            Some(code) => normalize_symbol(code),
            None => engine.resolve_currency(preferred_currency).await?,
        };
        let total = engine.total_value(&held, &target).await?;
        Ok::<_, ValuationError>((total, target))
    }
    .await;
    pb.finish_and_clear();

    match result {
        Ok((total, target)) => println!(
            "{} {}",
            ui::style_text("Total:", StyleType::TotalLabel),
            ui::style_text(&format!("{total:.2} {target}"), StyleType::TotalValue)
        ),
        Err(e) => ui::report_failure(&e),
    }
    Ok(())
}
