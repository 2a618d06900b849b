use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Config file error: {0}")]
    ConfigFile(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Filter block '{0}' not found among the rendered filters")]
    FilterNotFound(String),

    #[error("Filter '{filter}' has no option '{value}'")]
    OptionNotFound { filter: String, value: String },

    #[error("{entity} '{name}' not found")]
    LookupFailed { entity: &'static str, name: String },

    #[error("Product '{product}' does not match {filter}")]
    Mismatch { product: String, filter: String },

    #[error("Element '{selector}' did not settle within {timeout_secs}s")]
    ElementWait { selector: String, timeout_secs: u64 },

    #[error("Too few products on page: expected more than {expected}, found {actual}")]
    TooFewProducts { expected: usize, actual: usize },

    #[error("Browser error: {0}")]
    Browser(String),
}

impl CheckError {
    /// Wraps a browser-layer failure, keeping only its message.
    pub fn browser(err: impl std::fmt::Display) -> Self {
        CheckError::Browser(err.to_string())
    }
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, CheckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let check_err: CheckError = io_err.into();
        assert!(matches!(check_err, CheckError::Io(_)));
    }

    #[test]
    fn test_mismatch_error_names_product_and_filter() {
        let err = CheckError::Mismatch {
            product: "Apple iPhone 15".to_string(),
            filter: "filter 'Price' (price from 10000 to 20000)".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Product 'Apple iPhone 15' does not match filter 'Price' (price from 10000 to 20000)"
        );
    }

    #[test]
    fn test_filter_not_found_error() {
        let err = CheckError::FilterNotFound("Manufacturer".to_string());
        assert_eq!(
            err.to_string(),
            "Filter block 'Manufacturer' not found among the rendered filters"
        );
    }

    #[test]
    fn test_element_wait_error() {
        let err = CheckError::ElementWait {
            selector: "#searchResults".to_string(),
            timeout_secs: 20,
        };
        assert_eq!(
            err.to_string(),
            "Element '#searchResults' did not settle within 20s"
        );
    }
}
