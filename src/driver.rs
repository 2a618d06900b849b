use async_trait::async_trait;

use crate::models::Product;
use crate::utils::error::Result;

/// Handle to a located filter block, valid until the next page mutation.
///
/// The index is the block's position in document order; drivers re-resolve it
/// on every interaction because catalog pages re-render the filter column
/// after each applied value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterHandle {
    pub index: usize,
    pub label: String,
}

/// Capability object for the catalog page under test.
///
/// The matching algorithm only ever talks to this trait, which keeps it
/// runnable against a scripted fake. Every method blocks until the resulting
/// UI state settles and fails instead of retrying; a flaky page surfaces as a
/// check failure by design.
#[async_trait]
pub trait CatalogDriver: Send {
    /// Returns a freshly scraped product per rendered item on the current
    /// results page, in page order. Blocks until the page's load marker is
    /// present and scrolls the virtualized list so lazy items materialize.
    async fn fetch_current_page_products(&mut self) -> Result<Vec<Product>>;

    /// Finds a filter block whose rendered label contains `name`,
    /// case-insensitively. `None` means no block matched.
    async fn locate_filter_block(&mut self, name: &str) -> Result<Option<FilterHandle>>;

    /// Types both bounds into a range filter block and waits for the result
    /// list to finish reloading.
    async fn set_range_values(&mut self, handle: &FilterHandle, min: i64, max: i64) -> Result<()>;

    /// Selects each value in a checkbox filter block, expanding the block and
    /// using its search box where present, waiting for a reload after every
    /// click. A value with no matching option is a fatal lookup failure.
    async fn select_checkbox_values(&mut self, handle: &FilterHandle, values: &[String])
        -> Result<()>;

    /// Activates the next-page control if one exists. Returns whether the
    /// control existed; this is the only point where page state advances.
    async fn advance_to_next_page(&mut self) -> Result<bool>;

    /// Captures the current viewport as a PNG, for failure reporting.
    async fn screenshot(&mut self) -> Result<Vec<u8>>;
}
