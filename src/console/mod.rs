//! The fake console: raw line in, canned response out.

pub mod interpreter;
pub mod rules;
pub mod tokenizer;

pub use interpreter::{HistoryEntry, Interpreter, Submission};
pub use rules::{Note, Predicate, Reply, Response, Rule, RuleTable, ShadowedRule, CLEAR_SCREEN};
pub use tokenizer::Command;
