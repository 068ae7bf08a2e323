pub mod antibot;
pub mod api;
pub mod core;
pub mod scraping;
pub mod tools;

// --- Primary core exports ---
pub use self::core::config;
pub use self::core::error;
pub use self::core::types;
pub use self::core::types::*;
pub use self::core::AppState;

pub use scraping::{browser_manager, sanitize};
pub use tools::{fetch, health, search};
