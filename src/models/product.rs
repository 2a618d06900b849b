use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use crate::utils::error::{CheckError, Result};

/// Immutable snapshot of one catalog entry, built from live page state.
///
/// Two products are considered the same listing when their titles match and
/// their links match after the query string is stripped. Catalog pages append
/// session and tracking parameters to product links, so the raw link is kept
/// for display only and never takes part in equality or hashing. Price is a
/// display attribute and is excluded from identity as well.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    title: String,
    link: String,
    price: Option<i64>,
}

impl Product {
    /// Builds a product snapshot. A missing price is `None`: the page either
    /// did not render one or it did not parse as a plain integer.
    ///
    /// An empty link is a scrape-time precondition violation and fails here,
    /// before the product can take part in any comparison.
    pub fn new(title: impl Into<String>, link: impl Into<String>, price: Option<i64>) -> Result<Self> {
        let title = title.into();
        let link = link.into();
        if link.is_empty() {
            return Err(CheckError::Config(format!(
                "product '{title}' has an empty link"
            )));
        }
        Ok(Self { title, link, price })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Raw link as scraped, query string included.
    pub fn link(&self) -> &str {
        &self.link
    }

    pub fn price(&self) -> Option<i64> {
        self.price
    }

    /// Link with any trailing query string stripped. Used for equality and
    /// hashing only; never for display or navigation.
    pub fn canonical_link(&self) -> &str {
        self.link
            .split_once('?')
            .map_or(self.link.as_str(), |(base, _)| base)
    }
}

impl PartialEq for Product {
    fn eq(&self, other: &Self) -> bool {
        self.title == other.title && self.canonical_link() == other.canonical_link()
    }
}

impl Eq for Product {}

impl Hash for Product {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.title.hash(state);
        self.canonical_link().hash(state);
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.price {
            Some(price) => write!(
                f,
                "Product {{ title: '{}', link: '{}', price: {} }}",
                self.title, self.link, price
            ),
            None => write!(
                f,
                "Product {{ title: '{}', link: '{}', price: n/a }}",
                self.title, self.link
            ),
        }
    }
}
