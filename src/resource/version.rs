//! Redmine API version numbers

use crate::error::Error;
use serde::Deserialize;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Dotted numeric version such as `1.0` or `2.4.1`
///
/// Missing trailing components compare as zero, so `2.4` == `2.4.0`.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "String")]
pub struct ApiVersion(Vec<u32>);

impl ApiVersion {
    pub fn new(parts: &[u32]) -> Self {
        Self(parts.to_vec())
    }

    fn component(&self, idx: usize) -> u32 {
        self.0.get(idx).copied().unwrap_or(0)
    }
}

impl FromStr for ApiVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidVersion(s.to_string()));
        }

        trimmed
            .split('.')
            .map(|part| part.parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
            .map_err(|_| Error::InvalidVersion(s.to_string()))
    }
}

impl TryFrom<String> for ApiVersion {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|p| p.to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}

impl Ord for ApiVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for ApiVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ApiVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ApiVersion {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let v: ApiVersion = "2.4.1".parse().unwrap();
        assert_eq!(v.to_string(), "2.4.1");
    }

    #[test]
    fn test_trailing_zeros_are_equal() {
        let a: ApiVersion = "2.4".parse().unwrap();
        let b: ApiVersion = "2.4.0".parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_ordering_is_numeric() {
        let old: ApiVersion = "1.9".parse().unwrap();
        let new: ApiVersion = "1.10".parse().unwrap();
        assert!(old < new);
        assert!(ApiVersion::new(&[0, 0, 1]) < ApiVersion::new(&[1, 0]));
    }

    #[test]
    fn test_invalid_versions_are_rejected() {
        assert!("".parse::<ApiVersion>().is_err());
        assert!("1.x".parse::<ApiVersion>().is_err());
        assert!("1..2".parse::<ApiVersion>().is_err());
    }

    #[test]
    fn test_deserialize_from_string() {
        let v: ApiVersion = serde_json::from_str("\"1.3\"").unwrap();
        assert_eq!(v, ApiVersion::new(&[1, 3]));
    }
}
