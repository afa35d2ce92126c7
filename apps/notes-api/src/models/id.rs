//! Identifiers that clients may send either as JSON numbers or strings.

use serde::{Deserialize, Deserializer, Serialize};

/// A numeric entity id as it appeared on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlexibleId {
    Number(i64),
    Text(String),
}

impl FlexibleId {
    /// The numeric value, if the id is (or parses as) an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    /// The id exactly as the client sent it, for error reporting.
    pub fn raw(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

impl From<i64> for FlexibleId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

/// `deserialize_with` helper for fields that must resolve to an integer id.
pub fn deserialize_numeric<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let id = FlexibleId::deserialize(deserializer)?;
    id.as_i64()
        .ok_or_else(|| serde::de::Error::custom(format!("`{}` is not a numeric id", id.raw())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_numbers_and_numeric_strings() {
        let a: FlexibleId = serde_json::from_value(serde_json::json!(42)).unwrap();
        let b: FlexibleId = serde_json::from_value(serde_json::json!("42")).unwrap();
        assert_eq!(a.as_i64(), Some(42));
        assert_eq!(b.as_i64(), Some(42));
    }

    #[test]
    fn non_numeric_string_has_no_value() {
        let id: FlexibleId = serde_json::from_value(serde_json::json!("abc")).unwrap();
        assert_eq!(id.as_i64(), None);
        assert_eq!(id.raw(), "abc");
    }
}
