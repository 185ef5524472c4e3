pub mod context;
pub mod evaluator;
pub mod matchers;
pub mod operators;
pub mod service;
pub mod version;

pub use context::VisitorContext;
pub use evaluator::{evaluate, order_rules, EvaluationResult};
pub use operators::MatchOperator;
pub use service::RuleEngine;
