//! Pulsar timing-model parameters (`.par` files).
//!
//! Each non-comment line is a keyword followed by a value and optional
//! fit flag and uncertainty:
//!
//! ```text
//! PSRJ           J1909-3744
//! F0             339.31568732824  1  0.00000000000018
//! PEPOCH         53631
//! DM             10.3932
//! ```
//!
//! Lines starting with `#` or `C ` are comments. Keywords are matched
//! without regard to case. Order and comments are preserved on output.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors reading or interpreting a parameter file.
#[derive(Debug, Error)]
pub enum ParametersError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: keyword '{key}' has no value")]
    MissingValue { line: usize, key: String },

    #[error("parameter {key}: '{value}' is not a number")]
    InvalidNumber { key: String, value: String },
}

#[derive(Debug, Clone)]
enum Line {
    Comment(String),
    Entry {
        key: String,
        value: String,
        extra: Vec<String>,
    },
}

/// An ordered set of timing-model parameters.
#[derive(Debug, Clone, Default)]
pub struct Parameters {
    lines: Vec<Line>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse parameter text.
    pub fn parse(text: &str) -> Result<Self, ParametersError> {
        let mut lines = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('#') || trimmed.starts_with("C ") {
                lines.push(Line::Comment(raw.to_string()));
                continue;
            }

            let mut fields = trimmed.split_whitespace();
            let key = fields.next().unwrap_or_default().to_string();
            let value = fields
                .next()
                .ok_or_else(|| ParametersError::MissingValue {
                    line: index + 1,
                    key: key.clone(),
                })?
                .to_string();
            let extra = fields.map(str::to_string).collect();
            lines.push(Line::Entry { key, value, extra });
        }
        Ok(Self { lines })
    }

    /// Read a parameter file.
    pub fn load(path: &Path) -> Result<Self, ParametersError> {
        let text = fs::read_to_string(path).map_err(|source| ParametersError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Write a parameter file.
    pub fn unload(&self, path: &Path) -> Result<(), ParametersError> {
        fs::write(path, self.to_string()).map_err(|source| ParametersError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.lines.iter().filter_map(|line| match line {
            Line::Entry { key, value, .. } => Some((key.as_str(), value.as_str())),
            Line::Comment(_) => None,
        })
    }

    /// Raw value of `key`.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.entries()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    /// Numeric value of `key`, accepting Fortran `D` exponents.
    pub fn number(&self, key: &str) -> Result<Option<f64>, ParametersError> {
        self.value(key)
            .map(|v| {
                v.replace(['D', 'd'], "E")
                    .parse()
                    .map_err(|_| ParametersError::InvalidNumber {
                        key: key.to_string(),
                        value: v.to_string(),
                    })
            })
            .transpose()
    }

    /// Set `key`, replacing an existing value or appending a new line.
    pub fn set(&mut self, key: &str, new_value: impl Into<String>) {
        let new_value = new_value.into();
        for line in &mut self.lines {
            if let Line::Entry { key: k, value, .. } = line {
                if k.eq_ignore_ascii_case(key) {
                    *value = new_value;
                    return;
                }
            }
        }
        self.lines.push(Line::Entry {
            key: key.to_string(),
            value: new_value,
            extra: Vec::new(),
        });
    }

    /// Source name from PSRJ, PSR, or PSRB, in that order of preference.
    pub fn name(&self) -> Option<&str> {
        ["PSRJ", "PSR", "PSRB"]
            .iter()
            .find_map(|key| self.value(key))
    }

    /// Number of keyword lines.
    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            match line {
                Line::Comment(text) => writeln!(f, "{}", text)?,
                Line::Entry { key, value, extra } => {
                    write!(f, "{:<15}{}", key, value)?;
                    for field in extra {
                        write!(f, " {}", field)?;
                    }
                    writeln!(f)?;
                }
            }
        }
        Ok(())
    }
}

/// Two parameter sets are equal when they hold the same keywords with the
/// same values, ignoring comments, layout, and keyword case.
impl PartialEq for Parameters {
    fn eq(&self, other: &Self) -> bool {
        let normalize = |p: &Parameters| {
            let mut entries: Vec<(String, String)> = p
                .entries()
                .map(|(k, v)| (k.to_ascii_uppercase(), v.to_string()))
                .collect();
            entries.sort();
            entries
        };
        normalize(self) == normalize(other)
    }
}
