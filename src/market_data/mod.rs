mod builder;
mod cache;
mod models;
pub mod providers;
mod service;
mod sources;

pub use builder::PriceServiceBuilder;
pub use cache::PriceCache;
pub use models::{BatchPrices, PriceError, PricePoint, PriceQuote};
pub use service::PriceService;
pub use sources::{PriceSource, PriceSourceRouter};
