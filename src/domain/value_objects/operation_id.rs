use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Queue-wide identifier of a pending operation. Strictly increasing in
/// enqueue order, so it doubles as the replay ordering key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct OperationId(u64);

impl OperationId {
    pub fn new(value: u64) -> Result<Self, String> {
        if value == 0 {
            return Err("Operation id must be positive".to_string());
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<OperationId> for u64 {
    fn from(id: OperationId) -> Self {
        id.0
    }
}

impl TryFrom<u64> for OperationId {
    type Error = String;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl FromStr for OperationId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<u64>()
            .map_err(|e| format!("Invalid operation id `{s}`: {e}"))?;
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_rejected() {
        assert!(OperationId::new(0).is_err());
        assert!(serde_json::from_str::<OperationId>("0").is_err());
    }

    #[test]
    fn test_parse_and_order() {
        let first: OperationId = "7".parse().unwrap();
        let second = first.next();
        assert!(first < second);
        assert_eq!(second.value(), 8);
        assert_eq!(serde_json::to_string(&second).unwrap(), "8");
    }
}
