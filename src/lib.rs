//! A small boolean rule language for filtering security events.
//!
//! Rules are written as text such as
//! `host=example.com and (asn=1234 or no ip in 192.0.2.0/24)`, parsed into
//! an immutable expression tree and evaluated against [`Event`]s.
//!
//! ```rust
//! # use rulelang::{Event, Rule};
//! # fn main() -> Result<(), rulelang::RuleError> {
//! let rule = Rule::parse("host=example.com and no ip in 192.0.2.0/24")?;
//!
//! let event = Event::new()
//!     .with("host", "EXAMPLE.com")
//!     .with("ip", "198.51.100.7");
//! assert!(rule.is_match(&event));
//!
//! assert_eq!(Rule::parse(&rule.to_text()?)?, rule);
//! #   Ok(())
//! # }
//! ```
//!
//! Regular expressions come from rule authors. The `regex` crate matches in
//! linear time, but large patterns still cost memory and compile time, so
//! rules from untrusted sources should be size-limited before parsing.
mod error;

pub mod event;
pub mod rules;

#[cfg(feature = "collection")]
pub mod collection;

pub use error::{Result, RuleError};
pub use event::Event;
pub use rules::{format, parse, Atom, IpRange, MatchCache, RegExp, Rule};

#[cfg(feature = "collection")]
pub use collection::{NamedRule, RuleCollection};

#[cfg(test)]
mod tests;
