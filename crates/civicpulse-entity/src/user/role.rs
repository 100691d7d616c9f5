//! User role enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Roles issued by the auth service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// A member of the public who files reports.
    Citizen,
    /// Government staff who triage and respond to reports.
    Government,
    /// Platform administrator.
    Admin,
}

impl UserRole {
    /// Whether this is the staff role targeted by department deliveries.
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Government)
    }

    /// Return the role as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Citizen => "citizen",
            Self::Government => "government",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = civicpulse_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "citizen" => Ok(Self::Citizen),
            "government" => Ok(Self::Government),
            "admin" => Ok(Self::Admin),
            _ => Err(civicpulse_core::AppError::validation(format!(
                "Invalid user role: '{s}'. Expected one of: citizen, government, admin"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_government_is_staff() {
        assert!(UserRole::Government.is_staff());
        assert!(!UserRole::Citizen.is_staff());
        assert!(!UserRole::Admin.is_staff());
    }

    #[test]
    fn test_from_str() {
        assert_eq!("citizen".parse::<UserRole>().unwrap(), UserRole::Citizen);
        assert_eq!("GOVERNMENT".parse::<UserRole>().unwrap(), UserRole::Government);
        assert!("viewer".parse::<UserRole>().is_err());
    }
}
