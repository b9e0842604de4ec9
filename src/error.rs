use thiserror::Error;

/// Errors raised while building, parsing or formatting rules.
#[derive(Debug, Error)]
pub enum RuleError {
    /// The text is not a valid rule. Carries the whole offending input.
    #[error("rule syntax error: could not parse {0:?}")]
    Syntax(String),

    #[error("invalid regular expression: {0}")]
    Regex(#[from] regex::Error),

    #[error("invalid IP address or range {0:?}")]
    InvalidIp(String),

    #[error("{0} requires at least one subrule")]
    EmptyOperands(&'static str),

    /// The rule has no representation in the rule language, e.g. a
    /// `Match` keyed by a regular expression.
    #[error("can not format {0}")]
    Unformattable(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "collection")]
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[cfg(feature = "collection")]
    #[error("invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RuleError>;
