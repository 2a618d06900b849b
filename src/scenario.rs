use std::fs;
use std::path::Path;

use serde::Deserialize;
use url::Url;

use crate::models::Filter;
use crate::utils::error::{CheckError, Result};

/// One check scenario: where to go and which filters to verify.
///
/// Loaded from a TOML file so a scenario stays reviewable next to the code.
/// Navigation fields are optional; a scenario may point straight at a search
/// results URL instead of walking the catalog menu.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Entry URL, usually the marketplace landing page.
    pub url: String,
    /// Catalog section to hover in the catalog popup (e.g. "Электроника").
    pub catalog_section: Option<String>,
    /// Subsection item to click under the hovered section (e.g. "Смартфоны").
    pub catalog_item: Option<String>,
    /// Query to type into the header search box after navigation.
    pub search: Option<String>,
    /// Filters to apply and then verify across all result pages.
    pub filters: Vec<Filter>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let scenario: Scenario = toml::from_str(&text).map_err(|e| {
            CheckError::Config(format!("scenario file '{}': {e}", path.display()))
        })?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Fails before any UI interaction: a broken scenario must never reach
    /// the browser.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.url)
            .map_err(|e| CheckError::Config(format!("scenario url '{}': {e}", self.url)))?;

        if self.catalog_section.is_some() != self.catalog_item.is_some() {
            return Err(CheckError::Config(
                "catalog_section and catalog_item must be set together".to_string(),
            ));
        }

        if self.filters.is_empty() {
            return Err(CheckError::Config(
                "scenario has no filters to verify".to_string(),
            ));
        }
        for filter in &self.filters {
            filter.validate()?;
        }
        Ok(())
    }
}
