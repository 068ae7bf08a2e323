pub mod fetch;
pub mod health;
pub mod search;
