// Pricing Engine
// Pure price breakdown computation plus the quote endpoint

pub mod handlers;
pub mod price_calculator;

pub use handlers::*;
pub use price_calculator::*;
