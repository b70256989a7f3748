// Discount Rule Evaluator
// Loyalty rules keyed on completed rentals, their storage and administration

pub mod evaluator;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;

pub use evaluator::DiscountEvaluator;
pub use handlers::*;
pub use models::*;
pub use repository::{DiscountRuleStore, PgDiscountRuleStore};
pub use service::DiscountRuleService;
