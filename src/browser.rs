use std::sync::Arc;
use std::time::{Duration, Instant};

use headless_chrome::{Browser, LaunchOptions, Tab};
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::driver::{CatalogDriver, FilterHandle};
use crate::models::Product;
use crate::utils::error::{CheckError, Result};

// Catalog page selectors. Reads go through `Tab::get_content()` and the
// scraper crate; live elements are resolved only to click, type, or hover.
const PAGE_LOAD_MARKER: &str = "#greed";
const PRELOADER: &str = "[data-auto='preloader']";
const PROGRESSBAR: &str = "[role='progressbar']";
const ITEM_LIST: &str = "[data-test-id='virtuoso-item-list']";
const PRODUCT_CARD: &str = "article";
const PRODUCT_TITLE_LINK: &str = "h3[data-zone-name='title'] a[href]";
const PRODUCT_PRICE_SPAN: &str = "[data-zone-name='price'] span";
const FILTER_BLOCK: &str = "[data-grabber='SearchFilters'] [data-filter-id]";
const RANGE_MIN_INPUT: &str = "[data-auto='filter-range-min'] input";
const RANGE_MAX_INPUT: &str = "[data-auto='filter-range-max'] input";
const COLLAPSED_MORE_BUTTON: &str = "button[aria-expanded='false']";
const FILTER_SEARCH_INPUT: &str = "input[type='text']";
const FILTER_VALUE_LABEL: &str = "[data-filter-value-id] label";
const NEXT_PAGE_BUTTON: &str = "[data-auto='pagination-next']";
const CATALOG_BUTTON: &str = "#catalogPopupButton";
const CATALOG_TAB: &str = "li[role='tab'] a";
const CATALOG_SUBITEM: &str = "div[role='tabpanel'] ul[data-autotest-id='subItems'] li";
const SEARCH_INPUT: &str = "#header-search";
const SEARCH_BUTTON: &str = "button[data-r='search-button']";

// Upper bound on scroll steps through the virtualized list; a listing page
// never needs more, and a page that lies about its padding must not hang us.
const MAX_SCROLL_STEPS: usize = 40;

/// Live catalog page driven through a headless Chrome session.
pub struct ChromeCatalog {
    // Kept alive for the lifetime of the driver; dropping it closes Chrome.
    _browser: Browser,
    tab: Arc<Tab>,
    element_wait: Duration,
    poll_interval: Duration,
}

impl ChromeCatalog {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(config.browser.headless)
            .sandbox(false) // Often needed in containerized environments
            .window_size(Some((
                config.browser.window_width,
                config.browser.window_height,
            )))
            .args(vec![
                std::ffi::OsStr::new("--no-sandbox"),
                std::ffi::OsStr::new("--disable-dev-shm-usage"),
                std::ffi::OsStr::new("--disable-gpu"),
                std::ffi::OsStr::new("--disable-extensions"),
                std::ffi::OsStr::new("--disable-blink-features=AutomationControlled"),
                std::ffi::OsStr::new("--incognito"),
            ])
            .build()
            .map_err(CheckError::browser)?;

        if let Some(chrome_path) = &config.browser.chrome_path {
            launch_options.path = Some(std::path::PathBuf::from(chrome_path));
        }

        let browser = Browser::new(launch_options).map_err(CheckError::browser)?;
        let tab = browser.new_tab().map_err(CheckError::browser)?;
        tab.set_user_agent(&config.browser.user_agent, None, None)
            .map_err(CheckError::browser)?;

        Ok(Self {
            _browser: browser,
            tab,
            element_wait: Duration::from_secs(config.check.element_wait_secs),
            poll_interval: Duration::from_millis(config.check.poll_interval_ms),
        })
    }

    /// Navigates to the scenario entry URL.
    pub async fn open(&mut self, url: &str) -> Result<()> {
        info!(url, "opening catalog");
        self.tab.navigate_to(url).map_err(CheckError::browser)?;
        self.tab.wait_until_navigated().map_err(CheckError::browser)?;
        Ok(())
    }

    /// Opens the catalog popup, hovers `section`, and clicks `item` under it.
    /// Both lookups are case-insensitive on the rendered text.
    pub async fn open_catalog_section(&mut self, section: &str, item: &str) -> Result<()> {
        info!(section, item, "navigating catalog");
        self.wait_for(CATALOG_BUTTON)?;
        if !self.catalog_popup_expanded()? {
            self.click_first(CATALOG_BUTTON)?;
        }

        self.wait_for(CATALOG_TAB)?;
        self.hover_matching(CATALOG_TAB, section, "Catalog section")?;
        // Give the hovered tab panel a beat to render its subsections.
        tokio::time::sleep(self.poll_interval).await;

        self.click_matching(CATALOG_SUBITEM, item, "Catalog item")?;
        self.tab.wait_until_navigated().map_err(CheckError::browser)?;
        Ok(())
    }

    /// Types a query into the header search box and submits it.
    pub async fn search(&mut self, query: &str) -> Result<()> {
        info!(query, "searching catalog");
        self.wait_for(SEARCH_INPUT)?;
        self.focus_and_type(SEARCH_INPUT, query)?;
        self.click_first(SEARCH_BUTTON)?;
        self.tab.wait_until_navigated().map_err(CheckError::browser)?;
        Ok(())
    }

    fn content(&self) -> Result<String> {
        self.tab.get_content().map_err(CheckError::browser)
    }

    fn wait_for(&self, selector: &str) -> Result<()> {
        self.tab
            .wait_for_element_with_custom_timeout(selector, self.element_wait)
            .map(|_| ())
            .map_err(|_| CheckError::ElementWait {
                selector: selector.to_string(),
                timeout_secs: self.element_wait.as_secs(),
            })
    }

    /// Polls the DOM until `selector` no longer matches anything.
    async fn wait_gone(&self, selector: &str) -> Result<()> {
        let deadline = Instant::now() + self.element_wait;
        loop {
            let gone = {
                let html = Html::parse_document(&self.content()?);
                !selector_matches(&html, selector)
            };
            if gone {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(CheckError::ElementWait {
                    selector: selector.to_string(),
                    timeout_secs: self.element_wait.as_secs(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Every filter mutation reloads the result list behind a preloader;
    /// nothing may proceed until it clears.
    async fn wait_preloader_cleared(&self) -> Result<()> {
        self.wait_gone(PRELOADER).await
    }

    fn catalog_popup_expanded(&self) -> Result<bool> {
        let html = Html::parse_document(&self.content()?);
        let selector = parse_selector(CATALOG_BUTTON)?;
        Ok(html
            .select(&selector)
            .next()
            .and_then(|el| el.value().attr("aria-expanded"))
            .map(|v| v == "true")
            .unwrap_or(false))
    }

    fn click_first(&self, selector: &str) -> Result<()> {
        let element = self.tab.find_element(selector).map_err(CheckError::browser)?;
        element.scroll_into_view().map_err(CheckError::browser)?;
        element.click().map_err(CheckError::browser)?;
        Ok(())
    }

    fn hover_matching(&self, selector: &str, text: &str, entity: &'static str) -> Result<()> {
        let elements = self.tab.find_elements(selector).map_err(CheckError::browser)?;
        let wanted = text.to_lowercase();
        for element in &elements {
            let label = element.get_inner_text().map_err(CheckError::browser)?;
            if label.trim().to_lowercase() == wanted {
                element.move_mouse_over().map_err(CheckError::browser)?;
                return Ok(());
            }
        }
        Err(CheckError::LookupFailed {
            entity,
            name: text.to_string(),
        })
    }

    fn click_matching(&self, selector: &str, text: &str, entity: &'static str) -> Result<()> {
        let elements = self.tab.find_elements(selector).map_err(CheckError::browser)?;
        let wanted = text.to_lowercase();
        for element in &elements {
            let label = element.get_inner_text().map_err(CheckError::browser)?;
            if label.trim().to_lowercase() == wanted {
                element.scroll_into_view().map_err(CheckError::browser)?;
                element.click().map_err(CheckError::browser)?;
                return Ok(());
            }
        }
        Err(CheckError::LookupFailed {
            entity,
            name: text.to_string(),
        })
    }

    fn focus_and_type(&self, selector: &str, text: &str) -> Result<()> {
        let element = self.tab.find_element(selector).map_err(CheckError::browser)?;
        element.scroll_into_view().map_err(CheckError::browser)?;
        element.click().map_err(CheckError::browser)?;
        element
            .call_js_fn("function() { this.value = ''; }", vec![], false)
            .map_err(CheckError::browser)?;
        self.tab.type_str(text).map_err(CheckError::browser)?;
        Ok(())
    }

    /// Resolves the nth filter block in document order. Blocks are
    /// re-resolved on every interaction because the filter column re-renders
    /// after each applied value.
    fn nth_filter_block(&self, handle: &FilterHandle) -> Result<headless_chrome::Element<'_>> {
        let mut blocks = self
            .tab
            .find_elements(FILTER_BLOCK)
            .map_err(CheckError::browser)?;
        if handle.index >= blocks.len() {
            return Err(CheckError::FilterNotFound(handle.label.clone()));
        }
        Ok(blocks.swap_remove(handle.index))
    }

    fn type_range_bounds(&self, handle: &FilterHandle, min: i64, max: i64) -> Result<()> {
        let block = self.nth_filter_block(handle)?;
        block.scroll_into_view().map_err(CheckError::browser)?;

        for (selector, value) in [(RANGE_MIN_INPUT, min), (RANGE_MAX_INPUT, max)] {
            let input = block.find_element(selector).map_err(|_| {
                CheckError::ElementWait {
                    selector: selector.to_string(),
                    timeout_secs: self.element_wait.as_secs(),
                }
            })?;
            input.click().map_err(CheckError::browser)?;
            input
                .call_js_fn("function() { this.value = ''; }", vec![], false)
                .map_err(CheckError::browser)?;
            self.tab
                .type_str(&value.to_string())
                .map_err(CheckError::browser)?;
        }
        Ok(())
    }

    /// Clicks the block's "show more" control when it is collapsed. Returns
    /// whether anything was clicked.
    fn expand_if_collapsed(&self, handle: &FilterHandle) -> Result<bool> {
        let block = self.nth_filter_block(handle)?;
        block.scroll_into_view().map_err(CheckError::browser)?;
        let buttons = block
            .find_elements(COLLAPSED_MORE_BUTTON)
            .unwrap_or_default();
        match buttons.first() {
            Some(button) => {
                button.click().map_err(CheckError::browser)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Narrows the block's option list through its search box, if it has one.
    fn type_into_block_search(&self, handle: &FilterHandle, value: &str) -> Result<()> {
        let block = self.nth_filter_block(handle)?;
        let inputs = block.find_elements(FILTER_SEARCH_INPUT).unwrap_or_default();
        if let Some(input) = inputs.first() {
            input.click().map_err(CheckError::browser)?;
            input
                .call_js_fn("function() { this.value = ''; }", vec![], false)
                .map_err(CheckError::browser)?;
            self.tab.type_str(value).map_err(CheckError::browser)?;
        }
        Ok(())
    }

    /// Clicks the option whose rendered text equals `value`,
    /// case-insensitively. Returns whether a match was found; the caller owns
    /// the retry loop because options render asynchronously after typing.
    fn try_click_option(&self, handle: &FilterHandle, value: &str) -> Result<bool> {
        let block = self.nth_filter_block(handle)?;
        let options = block.find_elements(FILTER_VALUE_LABEL).unwrap_or_default();
        let wanted = value.to_lowercase();
        for option in &options {
            let label = option.get_inner_text().map_err(CheckError::browser)?;
            if label.trim().to_lowercase() == wanted {
                option.scroll_into_view().map_err(CheckError::browser)?;
                option.click().map_err(CheckError::browser)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Scrolls through the virtualized product list by its remaining bottom
    /// padding until the list reports none, so lazy items materialize.
    async fn scroll_product_list(&self) -> Result<()> {
        for _ in 0..MAX_SCROLL_STEPS {
            let remaining = self.evaluate_i64(&format!(
                "(function() {{ \
                     const el = document.querySelector(\"{ITEM_LIST}\"); \
                     if (!el) return 0; \
                     return parseInt(getComputedStyle(el).paddingBottom) || 0; \
                 }})()"
            ))?;
            if remaining <= 0 {
                break;
            }
            self.evaluate_i64(&format!("window.scrollBy(0, {remaining}); 0"))?;
            tokio::time::sleep(self.poll_interval).await;
        }
        Ok(())
    }

    fn evaluate_i64(&self, js: &str) -> Result<i64> {
        let result = self.tab.evaluate(js, false).map_err(CheckError::browser)?;
        Ok(result.value.and_then(|v| v.as_i64()).unwrap_or(0))
    }
}

#[async_trait::async_trait]
impl CatalogDriver for ChromeCatalog {
    async fn fetch_current_page_products(&mut self) -> Result<Vec<Product>> {
        self.wait_for(PAGE_LOAD_MARKER)?;
        self.scroll_product_list().await?;

        let html = Html::parse_document(&self.content()?);
        let products = extract_products(&html)?;
        debug!(count = products.len(), "scraped products from current page");
        Ok(products)
    }

    async fn locate_filter_block(&mut self, name: &str) -> Result<Option<FilterHandle>> {
        self.wait_for(FILTER_BLOCK)?;

        let html = Html::parse_document(&self.content()?);
        let selector = parse_selector(FILTER_BLOCK)?;
        let needle = name.to_uppercase();
        for (index, block) in html.select(&selector).enumerate() {
            let text = block.text().collect::<Vec<_>>().join(" ");
            if text.to_uppercase().contains(&needle) {
                // The first text node of a filter block is its legend.
                let label = block
                    .text()
                    .map(str::trim)
                    .find(|t| !t.is_empty())
                    .unwrap_or(name)
                    .to_string();
                return Ok(Some(FilterHandle { index, label }));
            }
        }
        Ok(None)
    }

    async fn set_range_values(&mut self, handle: &FilterHandle, min: i64, max: i64) -> Result<()> {
        debug!(filter = %handle.label, min, max, "setting range filter");
        self.type_range_bounds(handle, min, max)?;
        self.wait_preloader_cleared().await
    }

    async fn select_checkbox_values(
        &mut self,
        handle: &FilterHandle,
        values: &[String],
    ) -> Result<()> {
        if self.expand_if_collapsed(handle)? {
            self.wait_gone(PROGRESSBAR).await?;
        }

        for value in values {
            debug!(filter = %handle.label, value, "selecting filter value");
            self.type_into_block_search(handle, value)?;

            // Options render asynchronously after typing; poll until the
            // wanted one shows up or the element wait runs out.
            let deadline = Instant::now() + self.element_wait;
            loop {
                if self.try_click_option(handle, value)? {
                    break;
                }
                if Instant::now() >= deadline {
                    return Err(CheckError::OptionNotFound {
                        filter: handle.label.clone(),
                        value: value.clone(),
                    });
                }
                tokio::time::sleep(self.poll_interval).await;
            }
            self.wait_preloader_cleared().await?;
        }
        Ok(())
    }

    async fn advance_to_next_page(&mut self) -> Result<bool> {
        let present = {
            let html = Html::parse_document(&self.content()?);
            selector_matches(&html, NEXT_PAGE_BUTTON)
        };
        if !present {
            return Ok(false);
        }

        self.click_first(NEXT_PAGE_BUTTON)?;
        Ok(true)
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>> {
        self.tab
            .capture_screenshot(
                headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption::Png,
                None,
                None,
                true,
            )
            .map_err(CheckError::browser)
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| CheckError::Browser(format!("invalid selector '{selector}': {e:?}")))
}

fn selector_matches(html: &Html, selector: &str) -> bool {
    Selector::parse(selector)
        .map(|s| html.select(&s).next().is_some())
        .unwrap_or(false)
}

/// Builds a product per rendered card. A card without a title link is not a
/// product (ad slots render as bare articles) and is skipped; a title link
/// without an href is a scrape precondition violation and fails the page.
fn extract_products(html: &Html) -> Result<Vec<Product>> {
    let card_selector = parse_selector(PRODUCT_CARD)?;
    let title_selector = parse_selector(PRODUCT_TITLE_LINK)?;
    let price_selector = parse_selector(PRODUCT_PRICE_SPAN)?;

    let mut products = Vec::new();
    for card in html.select(&card_selector) {
        let Some(title_link) = card.select(&title_selector).next() else {
            continue;
        };
        let title = title_link
            .text()
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string();
        let link = title_link.value().attr("href").unwrap_or_default();

        let price = card
            .select(&price_selector)
            .find_map(|span| parse_price(&span.text().collect::<String>()));

        products.push(Product::new(title, link, price)?);
    }
    Ok(products)
}

/// Parses a rendered price into an integer. Whitespace (including the
/// non-breaking thousands separators catalog pages use) is stripped first;
/// anything that is not purely digits afterwards is treated as missing.
fn parse_price(text: &str) -> Option<i64> {
    let normalized: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if Regex::new(r"^\d+$").unwrap().is_match(&normalized) {
        normalized.parse().ok()
    } else {
        None
    }
}
