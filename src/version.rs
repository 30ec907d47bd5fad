//! Engine version parsing.
//!
//! Plugins sometimes branch on the version of the host engine. The version
//! string is split into `major.minor.patch` plus any trailing parts
//! (`2.10.0.dev1`, `2.9.10rc1`).

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Parsed engine version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    /// Parts after the patch number, e.g. `rc1` or `dev1`
    pub extra: Vec<String>,
}

/// Split `"10rc1"` into `(10, Some("rc1"))`
fn split_numeric(part: &str) -> Option<(u32, Option<String>)> {
    let digits_end = part
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(part.len());
    let number = part[..digits_end].parse().ok()?;
    let rest = &part[digits_end..];
    Some((number, (!rest.is_empty()).then(|| rest.to_string())))
}

impl EngineVersion {
    pub fn parse(version: &str) -> Result<Self, Error> {
        let invalid = || Error::InvalidVersion(version.to_string());
        let mut parts = version.trim().split('.');
        let mut extra = Vec::new();
        let mut numbers = [0u32; 3];

        for (index, slot) in numbers.iter_mut().enumerate() {
            match parts.next() {
                Some(part) => {
                    let (number, suffix) = split_numeric(part).ok_or_else(invalid)?;
                    *slot = number;
                    if let Some(suffix) = suffix {
                        extra.push(suffix);
                        break;
                    }
                }
                // major and minor are mandatory
                None if index < 2 => return Err(invalid()),
                None => {}
            }
        }

        extra.extend(parts.map(String::from));

        Ok(Self {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers[2],
            extra,
        })
    }

    /// `major.minor`
    pub fn short_version(&self) -> String {
        format!("{}.{}", self.major, self.minor)
    }

    /// `major.minor` as a float, e.g. `2.9`
    pub fn short_version_float(&self) -> f64 {
        self.short_version().parse().unwrap_or(f64::from(self.major))
    }
}

impl FromStr for EngineVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for EngineVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        for part in &self.extra {
            write!(f, ".{}", part)?;
        }
        Ok(())
    }
}
