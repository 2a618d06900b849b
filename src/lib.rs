pub mod browser;
pub mod config;
pub mod driver;
pub mod matcher;
pub mod models;
pub mod scenario;
pub mod screenshot;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use utils::error::CheckError;

pub type Result<T> = std::result::Result<T, CheckError>;
