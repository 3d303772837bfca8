// src/portfolio/mod.rs
mod holdings;
mod models;

pub use holdings::{Portfolio, PortfolioError};
pub use models::*;
