use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Customer classification, used for filtered lookups.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerType {
    Individual,
    Company,
}

impl fmt::Display for CustomerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustomerType::Individual => write!(f, "INDIVIDUAL"),
            CustomerType::Company => write!(f, "COMPANY"),
        }
    }
}

impl FromStr for CustomerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INDIVIDUAL" => Ok(CustomerType::Individual),
            "COMPANY" => Ok(CustomerType::Company),
            other => Err(format!("unknown customer type: {other}")),
        }
    }
}

/// A registered customer. Contact fields are optional; only the name and
/// the classification are required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub customer_type: CustomerType,
}

impl Customer {
    pub fn new(name: impl Into<String>, customer_type: CustomerType) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: None,
            phone: None,
            address: None,
            customer_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_type_round_trips_through_str() {
        assert_eq!("INDIVIDUAL".parse::<CustomerType>().unwrap(), CustomerType::Individual);
        assert_eq!("company".parse::<CustomerType>().unwrap(), CustomerType::Company);
        assert_eq!(CustomerType::Company.to_string(), "COMPANY");
    }

    #[test]
    fn test_unknown_customer_type_is_rejected() {
        assert!("GOVERNMENT".parse::<CustomerType>().is_err());
    }
}
