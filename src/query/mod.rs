//! Query module - generic query shapes and the fixed analysis questions

mod engine;
pub mod questions;

pub use engine::{Aggregation, QueryEngine, QueryError, COUNT_COLUMN, PROPORTION_COLUMN};
pub use questions::{run_all, Question, QuestionError, QUESTIONS};
