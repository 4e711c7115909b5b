//! Resource name specifications.
//!
//! Users address resources as `<name>` optionally followed by one version
//! selector:
//!
//! - absolute: `#<int>` for parameters, `#<id>` or `:<label>` for secrets
//! - relative: `~<int>`, shifting back from the current version (both)
//!
//! Commands that require a bare name (`add`, `edit`) call
//! `has_version()` and reject specifiers carrying a selector.

use serde::{Deserialize, Serialize};

/// Parse failures for name specifications.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpecError {
    #[error("empty resource name in '{0}'")]
    EmptyName(String),

    #[error("empty version selector in '{0}'")]
    EmptySelector(String),

    #[error("parameter version must be an integer in '{0}'")]
    InvalidVersion(String),

    #[error("version shift must be a non-negative integer in '{0}'")]
    InvalidShift(String),
}

// ============================================================================
// Parameter specs
// ============================================================================

/// A parsed parameter specification: `name`, `name#3`, or `name~1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    /// Absolute version selected with `#<int>`.
    pub version: Option<i64>,
    /// Versions to shift back from the current one, selected with `~<int>`.
    pub shift: u64,
}

impl ParamSpec {
    pub fn parse(input: &str) -> Result<Self, SpecError> {
        let (name, selector) = split_selector(input, &['#', '~'])?;
        let mut spec = Self {
            name,
            version: None,
            shift: 0,
        };
        match selector {
            None => {}
            Some(('#', body)) => {
                spec.version = Some(
                    body.parse()
                        .map_err(|_| SpecError::InvalidVersion(input.to_string()))?,
                );
            }
            Some(('~', body)) => {
                spec.shift = parse_shift(input, body)?;
            }
            Some(_) => unreachable!("split_selector only yields requested markers"),
        }
        Ok(spec)
    }

    /// True when the spec selects a version other than the current one.
    pub fn has_version(&self) -> bool {
        self.version.is_some() || self.shift > 0
    }
}

// ============================================================================
// Secret specs
// ============================================================================

/// Absolute version selector for a secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecretSelector {
    /// Opaque version ID, selected with `#<id>`.
    Id(String),
    /// Named alias, selected with `:<label>`.
    Label(String),
}

/// A parsed secret specification: `name`, `name#<id>`, `name:<label>`,
/// or `name~1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretSpec {
    pub name: String,
    pub selector: Option<SecretSelector>,
    pub shift: u64,
}

impl SecretSpec {
    pub fn parse(input: &str) -> Result<Self, SpecError> {
        let (name, selector) = split_selector(input, &['#', ':', '~'])?;
        let mut spec = Self {
            name,
            selector: None,
            shift: 0,
        };
        match selector {
            None => {}
            Some(('#', body)) => spec.selector = Some(SecretSelector::Id(body.to_string())),
            Some((':', body)) => spec.selector = Some(SecretSelector::Label(body.to_string())),
            Some(('~', body)) => spec.shift = parse_shift(input, body)?,
            Some(_) => unreachable!("split_selector only yields requested markers"),
        }
        Ok(spec)
    }

    /// True when the spec selects a version other than the current one.
    pub fn has_version(&self) -> bool {
        self.selector.is_some() || self.shift > 0
    }
}

// ============================================================================
// Shared parsing
// ============================================================================

/// Splits `input` at the first selector marker, rejecting empty names and
/// empty selector bodies (`name#`, `name:`).
fn split_selector<'a>(
    input: &'a str,
    markers: &[char],
) -> Result<(String, Option<(char, &'a str)>), SpecError> {
    match input.find(|c| markers.contains(&c)) {
        None => {
            if input.is_empty() {
                return Err(SpecError::EmptyName(input.to_string()));
            }
            Ok((input.to_string(), None))
        }
        Some(idx) => {
            let name = &input[..idx];
            if name.is_empty() {
                return Err(SpecError::EmptyName(input.to_string()));
            }
            let marker = input[idx..].chars().next().unwrap_or_default();
            let body = &input[idx + marker.len_utf8()..];
            if body.is_empty() {
                return Err(SpecError::EmptySelector(input.to_string()));
            }
            Ok((name.to_string(), Some((marker, body))))
        }
    }
}

fn parse_shift(input: &str, body: &str) -> Result<u64, SpecError> {
    body.parse()
        .map_err(|_| SpecError::InvalidShift(input.to_string()))
}
