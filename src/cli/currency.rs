use super::ui::{self, StyleType};
use crate::core::holding::normalize_symbol;
use crate::core::{SettingsStore, ValuationEngine};
use anyhow::Result;
use tracing::info;

const BASE_CURRENCY: &str = "USD";

/// Outcome of choosing a preferred currency.
#[derive(Debug, Clone, PartialEq)]
pub enum Choice {
    Unchanged,
    Unsupported(String),
    Unavailable,
    Changed(String),
}

/// Validates `code` against the supported fiat rates and stores it as the
/// preferred currency. An empty code selects USD, which is always accepted.
pub async fn choose(
    settings: &dyn SettingsStore,
    engine: &ValuationEngine,
    current: &str,
    code: &str,
) -> Result<Choice> {
    let current = normalize_or_base(current);
    let next = normalize_or_base(code);

    if next == current {
        println!("The currency didn't change");
        return Ok(Choice::Unchanged);
    }

    if next != BASE_CURRENCY {
        let pb = ui::new_spinner("Checking currency...");
        let rate = engine.rates().rate_for(&next).await;
        pb.finish_and_clear();

        match rate {
            Ok(Some(_)) => {}
            Ok(None) => {
                println!("The currency {next} is not supported");
                return Ok(Choice::Unsupported(next));
            }
            Err(e) => {
                ui::report_failure(&e);
                return Ok(Choice::Unavailable);
            }
        }
    }

    settings.set_preferred_currency(&next)?;
    info!(from = %current, to = %next, "Preferred currency changed");
    println!(
        "{} {}",
        ui::style_text("Preferred currency:", StyleType::TotalLabel),
        ui::style_text(&next, StyleType::TotalValue)
    );
    Ok(Choice::Changed(next))
}

fn normalize_or_base(code: &str) -> String {
    let code = normalize_symbol(code);
    if code.is_empty() {
        BASE_CURRENCY.to_string()
    } else {
        code
    }
}
