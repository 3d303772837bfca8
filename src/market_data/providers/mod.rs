pub mod alpha_vantage;
pub mod yahoo;

pub use alpha_vantage::AlphaVantagePriceSource;
pub use yahoo::YahooPriceSource;
