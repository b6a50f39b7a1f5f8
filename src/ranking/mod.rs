pub mod grade;
pub mod kelly;
pub mod ranker;

pub use grade::ValueGrade;
pub use ranker::{evaluate, rank, Opportunity, ScoredCandidate, Side};
