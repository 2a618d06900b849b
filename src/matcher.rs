use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::driver::CatalogDriver;
use crate::models::{Filter, Product};
use crate::utils::error::{CheckError, Result};

/// Why the traversal stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// No next-page control on the last scanned page.
    LastPage,
    /// The wall-clock pagination budget ran out before the catalog did.
    BudgetExhausted,
}

/// Summary of a completed traversal. Only produced when every product on
/// every visited page matched every filter.
#[derive(Debug, Clone)]
pub struct TraversalReport {
    pub pages_scanned: usize,
    pub products_checked: usize,
    pub stop: StopReason,
}

/// Walks a filtered results listing page by page and verifies that every
/// rendered product satisfies every active filter.
///
/// The traversal is strictly sequential: scan the current page, try to
/// advance, repeat. The pagination budget is a safety net against endless
/// listings on a live site, checked once per loop iteration; a slow page can
/// overshoot it by that page's load time.
pub struct PaginatedMatcher<D> {
    driver: D,
    budget: Duration,
}

impl<D: CatalogDriver> PaginatedMatcher<D> {
    pub fn new(driver: D, budget: Duration) -> Self {
        Self { driver, budget }
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    /// One-time UI setup: applies each filter in list order, dispatching on
    /// its kind. Lookup failures abort before any further filter is touched.
    pub async fn apply_filters(&mut self, filters: &[Filter]) -> Result<()> {
        for filter in filters {
            info!(%filter, "applying filter");
            let handle = self
                .driver
                .locate_filter_block(filter.name())
                .await?
                .ok_or_else(|| CheckError::FilterNotFound(filter.name().to_string()))?;

            match filter {
                Filter::Range(range) => {
                    self.driver
                        .set_range_values(&handle, range.min, range.max)
                        .await?;
                }
                Filter::Checkbox(checkbox) => {
                    self.driver
                        .select_checkbox_values(&handle, &checkbox.values)
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Scans every results page, asserting each product against each filter,
    /// until the last page or the budget is reached.
    ///
    /// Fails fast: the first mismatching product/filter pair aborts the whole
    /// run with both named in the error. Matching order across filters is
    /// irrelevant; each predicate is evaluated independently.
    pub async fn verify_all_pages(&mut self, filters: &[Filter]) -> Result<TraversalReport> {
        let started = Instant::now();
        let mut pages_scanned = 0;
        let mut products_checked = 0;

        let stop = loop {
            let products = self.driver.fetch_current_page_products().await?;
            debug!(
                page = pages_scanned + 1,
                products = products.len(),
                "scanning results page"
            );

            for product in &products {
                for filter in filters {
                    if !filter.matches(product) {
                        return Err(CheckError::Mismatch {
                            product: product.title().to_string(),
                            filter: filter.to_string(),
                        });
                    }
                }
                products_checked += 1;
            }
            pages_scanned += 1;

            // Advance is attempted unconditionally; the budget only gates
            // whether the freshly opened page gets scanned.
            if !self.driver.advance_to_next_page().await? {
                break StopReason::LastPage;
            }
            if started.elapsed() >= self.budget {
                warn!(
                    pages_scanned,
                    budget_secs = self.budget.as_secs(),
                    "pagination budget exhausted, stopping traversal"
                );
                break StopReason::BudgetExhausted;
            }
        };

        info!(pages_scanned, products_checked, ?stop, "traversal finished");
        Ok(TraversalReport {
            pages_scanned,
            products_checked,
            stop,
        })
    }

    /// Asserts that the current page renders strictly more than `expected`
    /// products.
    pub async fn require_more_than(&mut self, expected: usize) -> Result<()> {
        let actual = self.driver.fetch_current_page_products().await?.len();
        if actual > expected {
            Ok(())
        } else {
            Err(CheckError::TooFewProducts { expected, actual })
        }
    }

    /// Fetches the 1-based `index`-th product on the current page.
    pub async fn nth_product(&mut self, index: usize) -> Result<Product> {
        let mut products = self.driver.fetch_current_page_products().await?;
        if index == 0 || products.len() < index {
            return Err(CheckError::TooFewProducts {
                expected: index,
                actual: products.len(),
            });
        }
        Ok(products.swap_remove(index - 1))
    }

    /// Asserts that a product with the same title is rendered on the current
    /// page.
    pub async fn contains_on_page(&mut self, product: &Product) -> Result<()> {
        let products = self.driver.fetch_current_page_products().await?;
        if products.iter().any(|p| p.title() == product.title()) {
            Ok(())
        } else {
            Err(CheckError::LookupFailed {
                entity: "Product",
                name: product.title().to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::FilterHandle;
    use crate::models::{CheckboxFilter, NumericField, RangeFilter, TextField};
    use async_trait::async_trait;

    /// Scripted driver: pre-baked pages, recorded interactions, no browser.
    struct ScriptedCatalog {
        pages: Vec<Vec<Product>>,
        current: usize,
        advances: usize,
        endless: bool,
        filter_blocks: Vec<String>,
        applied_ranges: Vec<(String, i64, i64)>,
        applied_values: Vec<(String, Vec<String>)>,
    }

    impl ScriptedCatalog {
        fn new(pages: Vec<Vec<Product>>) -> Self {
            Self {
                pages,
                current: 0,
                advances: 0,
                endless: false,
                filter_blocks: Vec::new(),
                applied_ranges: Vec::new(),
                applied_values: Vec::new(),
            }
        }

        fn endless(mut self) -> Self {
            self.endless = true;
            self
        }

        fn with_filter_blocks(mut self, labels: &[&str]) -> Self {
            self.filter_blocks = labels.iter().map(|l| l.to_string()).collect();
            self
        }
    }

    #[async_trait]
    impl CatalogDriver for ScriptedCatalog {
        async fn fetch_current_page_products(&mut self) -> Result<Vec<Product>> {
            let index = self.current.min(self.pages.len().saturating_sub(1));
            Ok(self.pages[index].clone())
        }

        async fn locate_filter_block(&mut self, name: &str) -> Result<Option<FilterHandle>> {
            let needle = name.to_uppercase();
            Ok(self
                .filter_blocks
                .iter()
                .position(|label| label.to_uppercase().contains(&needle))
                .map(|index| FilterHandle {
                    index,
                    label: self.filter_blocks[index].clone(),
                }))
        }

        async fn set_range_values(
            &mut self,
            handle: &FilterHandle,
            min: i64,
            max: i64,
        ) -> Result<()> {
            self.applied_ranges.push((handle.label.clone(), min, max));
            Ok(())
        }

        async fn select_checkbox_values(
            &mut self,
            handle: &FilterHandle,
            values: &[String],
        ) -> Result<()> {
            self.applied_values
                .push((handle.label.clone(), values.to_vec()));
            Ok(())
        }

        async fn advance_to_next_page(&mut self) -> Result<bool> {
            if self.endless {
                self.advances += 1;
                return Ok(true);
            }
            if self.current + 1 < self.pages.len() {
                self.current += 1;
                self.advances += 1;
                Ok(true)
            } else {
                Ok(false)
            }
        }

        async fn screenshot(&mut self) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    fn product(title: &str, price: i64) -> Product {
        Product::new(title, format!("https://x/{title}"), Some(price)).unwrap()
    }

    fn brand_filter(value: &str) -> Filter {
        Filter::Checkbox(
            CheckboxFilter::new("Manufacturer", TextField::Title, vec![value.to_string()])
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_traversal_visits_every_page_until_last() {
        let pages = vec![
            vec![product("Apple A", 10), product("Apple B", 20)],
            vec![product("Apple C", 30), product("Apple D", 40)],
            vec![product("Apple E", 50), product("Apple F", 60)],
        ];
        let driver = ScriptedCatalog::new(pages);
        let mut matcher = PaginatedMatcher::new(driver, Duration::from_secs(600));

        let report = matcher
            .verify_all_pages(&[brand_filter("Apple")])
            .await
            .unwrap();

        assert_eq!(report.pages_scanned, 3);
        assert_eq!(report.products_checked, 6);
        assert_eq!(report.stop, StopReason::LastPage);
        assert_eq!(matcher.into_driver().advances, 2);
    }

    #[tokio::test]
    async fn test_zero_budget_stops_after_first_page() {
        let pages = vec![vec![product("Apple A", 10)]];
        let driver = ScriptedCatalog::new(pages).endless();
        let mut matcher = PaginatedMatcher::new(driver, Duration::ZERO);

        let report = matcher
            .verify_all_pages(&[brand_filter("Apple")])
            .await
            .unwrap();

        // Page 1 is scanned, the advance is attempted, and the elapsed-time
        // gate stops the loop before a second scan.
        assert_eq!(report.pages_scanned, 1);
        assert_eq!(report.products_checked, 1);
        assert_eq!(report.stop, StopReason::BudgetExhausted);
        assert_eq!(matcher.into_driver().advances, 1);
    }

    #[tokio::test]
    async fn test_first_mismatch_fails_fast() {
        let pages = vec![vec![
            product("Apple A", 10),
            product("Samsung B", 20),
            product("Apple C", 30),
        ]];
        let driver = ScriptedCatalog::new(pages);
        let mut matcher = PaginatedMatcher::new(driver, Duration::from_secs(600));

        let err = matcher
            .verify_all_pages(&[brand_filter("Apple")])
            .await
            .unwrap_err();

        match err {
            CheckError::Mismatch { product, filter } => {
                assert_eq!(product, "Samsung B");
                assert!(filter.contains("Manufacturer"));
                assert!(filter.contains("Apple"));
            }
            other => panic!("expected Mismatch, got {other}"),
        }
        // The failing page was never left.
        assert_eq!(matcher.into_driver().advances, 0);
    }

    #[tokio::test]
    async fn test_mismatch_on_range_filter_reports_bounds() {
        let pages = vec![vec![product("Apple A", 50_000)]];
        let driver = ScriptedCatalog::new(pages);
        let mut matcher = PaginatedMatcher::new(driver, Duration::from_secs(600));

        let range = Filter::Range(RangeFilter::new("Price", NumericField::Price, 10_000, 20_000));
        let err = matcher.verify_all_pages(&[range]).await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "Product 'Apple A' does not match filter 'Price' (price from 10000 to 20000)"
        );
    }

    #[tokio::test]
    async fn test_apply_filters_dispatches_per_kind() {
        let driver = ScriptedCatalog::new(vec![vec![]])
            .with_filter_blocks(&["Цена", "Производитель"]);
        let mut matcher = PaginatedMatcher::new(driver, Duration::from_secs(600));

        let filters = vec![
            Filter::Range(RangeFilter::new("цена", NumericField::Price, 10_000, 20_000)),
            Filter::Checkbox(
                CheckboxFilter::new(
                    "производитель",
                    TextField::Title,
                    vec!["Apple".to_string()],
                )
                .unwrap(),
            ),
        ];
        matcher.apply_filters(&filters).await.unwrap();

        let driver = matcher.into_driver();
        assert_eq!(driver.applied_ranges, vec![("Цена".to_string(), 10_000, 20_000)]);
        assert_eq!(
            driver.applied_values,
            vec![("Производитель".to_string(), vec!["Apple".to_string()])]
        );
    }

    #[tokio::test]
    async fn test_apply_filters_fails_on_unknown_block() {
        let driver = ScriptedCatalog::new(vec![vec![]]).with_filter_blocks(&["Цена"]);
        let mut matcher = PaginatedMatcher::new(driver, Duration::from_secs(600));

        let err = matcher
            .apply_filters(&[brand_filter("Apple")])
            .await
            .unwrap_err();
        assert!(matches!(err, CheckError::FilterNotFound(name) if name == "Manufacturer"));
    }

    #[tokio::test]
    async fn test_require_more_than() {
        let pages = vec![vec![product("A", 1), product("B", 2)]];
        let mut matcher =
            PaginatedMatcher::new(ScriptedCatalog::new(pages), Duration::from_secs(600));

        matcher.require_more_than(1).await.unwrap();
        let err = matcher.require_more_than(2).await.unwrap_err();
        assert!(matches!(
            err,
            CheckError::TooFewProducts {
                expected: 2,
                actual: 2
            }
        ));
    }

    #[tokio::test]
    async fn test_nth_product_is_one_based() {
        let pages = vec![vec![product("A", 1), product("B", 2)]];
        let mut matcher =
            PaginatedMatcher::new(ScriptedCatalog::new(pages), Duration::from_secs(600));

        assert_eq!(matcher.nth_product(1).await.unwrap().title(), "A");
        assert_eq!(matcher.nth_product(2).await.unwrap().title(), "B");
        assert!(matcher.nth_product(0).await.is_err());
        assert!(matcher.nth_product(3).await.is_err());
    }

    #[tokio::test]
    async fn test_contains_on_page_matches_by_title() {
        let pages = vec![vec![product("Apple iPhone 15", 10)]];
        let mut matcher =
            PaginatedMatcher::new(ScriptedCatalog::new(pages), Duration::from_secs(600));

        let wanted = Product::new("Apple iPhone 15", "https://elsewhere/z?utm=9", None).unwrap();
        matcher.contains_on_page(&wanted).await.unwrap();

        let missing = Product::new("Nokia 3310", "https://elsewhere/n", None).unwrap();
        let err = matcher.contains_on_page(&missing).await.unwrap_err();
        assert!(matches!(err, CheckError::LookupFailed { entity: "Product", .. }));
    }
}
