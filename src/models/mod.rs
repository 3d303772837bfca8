mod holding;
mod input;
mod ticker;

pub use holding::{Holding, RebalanceAction};
pub use input::{validate_allocation, validate_price, validate_quantity, InputError};
pub use ticker::Ticker;
