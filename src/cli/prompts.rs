//! Interactive prompts used by the menu loop.

use crate::error::Result;
use crate::models::Station;
use dialoguer::{theme::ColorfulTheme, FuzzySelect, Input};

/// Asks for one station of the registry; the first entry means all stations.
/// Returns the selected ids, empty for all.
pub fn prompt_stations(stations: &[Station]) -> Result<Vec<String>> {
    let mut items = vec!["All stations".to_string()];
    items.extend(stations.iter().map(Station::display_name));

    let selection = FuzzySelect::with_theme(&ColorfulTheme::default())
        .with_prompt("Which station?")
        .items(&items)
        .default(0)
        .interact()?;

    Ok(match selection {
        0 => Vec::new(),
        i => vec![stations[i - 1].id.clone()],
    })
}

pub fn prompt_coordinate(name: &str) -> Result<f64> {
    let value = Input::<f64>::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Enter {} in degrees", name))
        .validate_with(|v: &f64| -> std::result::Result<(), &str> {
            if v.is_finite() {
                Ok(())
            } else {
                Err("Please enter a finite number")
            }
        })
        .interact_text()?;
    Ok(value)
}

pub fn prompt_seed() -> Result<u64> {
    let seed = Input::<u64>::with_theme(&ColorfulTheme::default())
        .with_prompt("Seed for the synthetic feed")
        .default(42)
        .interact_text()?;
    Ok(seed)
}
