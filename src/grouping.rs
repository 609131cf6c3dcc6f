//! Grouping callable: a pure function `String -> hashable key`.
//!
//! The sandboxed user-expression evaluator itself (a restricted
//! interpreter over a small name whitelist) is an external collaborator
//! — out of scope here. What's in scope is the interface
//! it must present to the core (`Grouper`) and a small whitelist of
//! built-in key functions standing in for it, so the binary has
//! something to dispatch on.

use crate::error::{CrateError, Err};
use std::fmt;

/// A group bucket identity. Keys compare and hash by their string form;
/// two tokens whose key compares equal land in the same bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Text(String),
    Number(i64),
}

impl GroupKey {
    /// The textual form substituted into command templates.
    pub fn as_template_value(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_template_value())
    }
}

/// The grouping callable's interface: `String -> Result<GroupKey>`. May
/// fail, surfacing as `UserExpressionRuntimeError(token)`.
pub trait Grouper {
    fn group(&self, token: &str) -> Result<GroupKey, CrateError>;
}

/// A `Grouper` built from a plain closure, for callers wiring in an
/// externally-compiled expression.
pub struct FnGrouper<F>(pub F)
where
    F: Fn(&str) -> Result<GroupKey, CrateError>;

impl<F> Grouper for FnGrouper<F>
where
    F: Fn(&str) -> Result<GroupKey, CrateError>,
{
    fn group(&self, token: &str) -> Result<GroupKey, CrateError> {
        (self.0)(token)
    }
}

/// The whitelist of built-in key functions the CLI exposes directly,
/// named the way the original's `group_code` argument would otherwise
/// require a Python expression for.
#[derive(Debug, Clone, Copy)]
pub enum BuiltinGrouper {
    /// Group by token length.
    Len,
    /// Group by the token lowercased.
    Lower,
    /// Group by the token unchanged (every distinct token is its own group).
    Identity,
    /// Group by the first `n` characters of the token.
    Prefix(usize),
    /// Group by the substring after the last `.`, or the whole token if
    /// there is none — a filename-extension grouping.
    Extension,
}

impl BuiltinGrouper {
    pub fn parse(name: &str) -> Result<Self, CrateError> {
        if let Some(rest) = name.strip_prefix("prefix:") {
            let n = rest
                .parse::<usize>()
                .map_err(|_| Err::UserExpression(name.to_string()))?;
            return Ok(Self::Prefix(n));
        }
        match name {
            "len" => Ok(Self::Len),
            "lower" => Ok(Self::Lower),
            "identity" => Ok(Self::Identity),
            "ext" | "extension" => Ok(Self::Extension),
            other => Err(Err::UserExpression(other.to_string()).into()),
        }
    }
}

impl Grouper for BuiltinGrouper {
    fn group(&self, token: &str) -> Result<GroupKey, CrateError> {
        let key = match self {
            Self::Len => GroupKey::Number(token.chars().count() as i64),
            Self::Lower => GroupKey::Text(token.to_lowercase()),
            Self::Identity => GroupKey::Text(token.to_string()),
            Self::Prefix(n) => GroupKey::Text(token.chars().take(*n).collect()),
            Self::Extension => GroupKey::Text(
                token
                    .rsplit_once('.')
                    .map(|(_, ext)| ext.to_string())
                    .unwrap_or_else(|| token.to_string()),
            ),
        };
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_groups_equal_length_tokens_together() {
        let g = BuiltinGrouper::Len;
        assert_eq!(g.group("cat").unwrap(), g.group("dog").unwrap());
        assert_ne!(g.group("cat").unwrap(), g.group("horse").unwrap());
    }

    #[test]
    fn lower_is_case_insensitive() {
        let g = BuiltinGrouper::Lower;
        assert_eq!(g.group("AA").unwrap(), g.group("aa").unwrap());
    }

    #[test]
    fn unknown_name_is_a_user_expression_error() {
        let err = BuiltinGrouper::parse("not-a-real-function").unwrap_err();
        assert_eq!(err.categorize().to_string(), "UserExpression");
    }

    #[test]
    fn prefix_parses_its_argument() {
        let g = BuiltinGrouper::parse("prefix:3").unwrap();
        assert_eq!(
            g.group("123456").unwrap(),
            GroupKey::Text("123".to_string())
        );
    }
}
