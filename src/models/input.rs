/// A user-supplied value was rejected before it reached the portfolio.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InputError {
    #[error("ticker must not be empty")]
    EmptyTicker,
    #[error("invalid ticker {0:?}")]
    MalformedTicker(String),
    #[error("quantity must be a non-negative number, got {0}")]
    InvalidQuantity(f64),
    #[error("target allocation must be between 0% and 100%, got {0}%")]
    InvalidAllocation(f64),
    #[error("price must be a non-negative number, got {0}")]
    InvalidPrice(f64),
}

pub fn validate_quantity(quantity: f64) -> Result<f64, InputError> {
    if quantity.is_finite() && quantity >= 0.0 {
        Ok(quantity)
    } else {
        Err(InputError::InvalidQuantity(quantity))
    }
}

pub fn validate_allocation(pct: f64) -> Result<f64, InputError> {
    if pct.is_finite() && (0.0..=100.0).contains(&pct) {
        Ok(pct)
    } else {
        Err(InputError::InvalidAllocation(pct))
    }
}

pub fn validate_price(price: f64) -> Result<f64, InputError> {
    if price.is_finite() && price >= 0.0 {
        Ok(price)
    } else {
        Err(InputError::InvalidPrice(price))
    }
}
