use super::ui::{self, StyleType};
use crate::core::ValuationEngine;
use anyhow::Result;

/// Upper bound on suggestions printed per search.
pub const SUGGESTION_LIMIT: usize = 50;

/// Prints crypto symbols, or fiat currency codes when `fiat` is set, that
/// start with `prefix`.
pub async fn run(engine: &ValuationEngine, prefix: &str, fiat: bool) -> Result<()> {
    let pb = ui::new_spinner("Loading suggestions...");
    let result = if fiat {
        engine
            .rates()
            .ensure_fresh()
            .await
            .map(|_| engine.rates().codes_with_prefix(prefix, SUGGESTION_LIMIT))
    } else {
        engine
            .quotes()
            .ensure_loaded()
            .await
            .map(|_| engine.quotes().symbols_with_prefix(prefix, SUGGESTION_LIMIT))
    };
    pb.finish_and_clear();

    match result {
        Ok(matches) if matches.is_empty() => println!(
            "{}",
            ui::style_text(&format!("No matches for '{prefix}'"), StyleType::Subtle)
        ),
        Ok(matches) => {
            for symbol in matches {
                println!("{symbol}");
            }
        }
        Err(e) => ui::report_failure(&e),
    }
    Ok(())
}
