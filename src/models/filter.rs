use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::Product;
use crate::utils::error::{CheckError, Result};

/// Numeric product field a range filter reads.
///
/// Field tags replace opaque accessor closures so a filter can be loaded from
/// a scenario file and printed back in failure messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericField {
    Price,
}

impl NumericField {
    pub fn value_of(&self, product: &Product) -> Option<i64> {
        match self {
            NumericField::Price => product.price(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NumericField::Price => "price",
        }
    }
}

/// Text product field a checkbox filter reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextField {
    Title,
    Link,
}

impl TextField {
    pub fn value_of<'a>(&self, product: &'a Product) -> &'a str {
        match self {
            TextField::Title => product.title(),
            TextField::Link => product.link(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TextField::Title => "title",
            TextField::Link => "link",
        }
    }
}

/// Range filter: matches when the field value lies in `[min, max]`, both ends
/// inclusive. A product with no value for the field never matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeFilter {
    pub name: String,
    pub field: NumericField,
    pub min: i64,
    pub max: i64,
}

impl RangeFilter {
    pub fn new(name: impl Into<String>, field: NumericField, min: i64, max: i64) -> Self {
        Self {
            name: name.into(),
            field,
            min,
            max,
        }
    }

    pub fn matches(&self, product: &Product) -> bool {
        match self.field.value_of(product) {
            Some(value) => value >= self.min && value <= self.max,
            None => false,
        }
    }
}

/// Checkbox filter: matches when any configured value is a case-insensitive
/// substring of the field value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckboxFilter {
    pub name: String,
    pub field: TextField,
    pub values: Vec<String>,
}

impl CheckboxFilter {
    /// An empty value list would make the filter unsatisfiable, so it is
    /// rejected at construction rather than silently matching nothing.
    pub fn new(
        name: impl Into<String>,
        field: TextField,
        values: Vec<String>,
    ) -> Result<Self> {
        let filter = Self {
            name: name.into(),
            field,
            values,
        };
        filter.validate()?;
        Ok(filter)
    }

    pub fn matches(&self, product: &Product) -> bool {
        let haystack = self.field.value_of(product).to_lowercase();
        self.values
            .iter()
            .any(|value| haystack.contains(&value.to_lowercase()))
    }

    fn validate(&self) -> Result<()> {
        if self.values.is_empty() {
            return Err(CheckError::Config(format!(
                "checkbox filter '{}' has no values",
                self.name
            )));
        }
        if self.values.iter().any(|v| v.trim().is_empty()) {
            return Err(CheckError::Config(format!(
                "checkbox filter '{}' has a blank value",
                self.name
            )));
        }
        Ok(())
    }
}

/// A catalog filter, one of two kinds. The enum is the single dispatch point
/// for UI application and serialization; adding a third kind is a one-place
/// change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Filter {
    Range(RangeFilter),
    Checkbox(CheckboxFilter),
}

impl Filter {
    /// Human-readable label, used both for UI lookup and reporting.
    pub fn name(&self) -> &str {
        match self {
            Filter::Range(f) => &f.name,
            Filter::Checkbox(f) => &f.name,
        }
    }

    /// Pure predicate over a product. Never mutates either side and is safe
    /// to evaluate repeatedly.
    pub fn matches(&self, product: &Product) -> bool {
        match self {
            Filter::Range(f) => f.matches(product),
            Filter::Checkbox(f) => f.matches(product),
        }
    }

    /// Re-checks construction invariants. Needed for filters that arrive via
    /// deserialization and therefore bypass the constructors.
    pub fn validate(&self) -> Result<()> {
        match self {
            Filter::Range(_) => Ok(()),
            Filter::Checkbox(f) => f.validate(),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Range(r) => write!(
                f,
                "filter '{}' ({} from {} to {})",
                r.name,
                r.field.as_str(),
                r.min,
                r.max
            ),
            Filter::Checkbox(c) => write!(
                f,
                "filter '{}' ({} one of: {})",
                c.name,
                c.field.as_str(),
                c.values.join(", ")
            ),
        }
    }
}
