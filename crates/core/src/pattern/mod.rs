pub mod pattern;

pub use pattern::{Pattern, PatternKind, PatternParams};
