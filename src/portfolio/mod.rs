pub mod correlation;
pub mod selector;

pub use correlation::pairwise_correlation;
pub use selector::{select, Pick, Portfolio, PortfolioMetrics};
