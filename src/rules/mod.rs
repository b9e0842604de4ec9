//! The rule language: atoms, rules, the grammar and the formatter.

mod atoms;
mod formatter;
mod iprange;
mod rule;

pub mod parsing;
pub mod rulelang;

pub use atoms::{Atom, RegExp};
pub use formatter::{format, format_atom};
pub use iprange::IpRange;
pub use rule::{rule_text, MatchCache, Rule, Subrules};
pub use rulelang::parse;
