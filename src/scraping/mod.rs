pub mod browser_manager;
pub mod sanitize;
