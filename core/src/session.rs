use serde::{Deserialize, Serialize};

use crate::error::{require, DomainError, DomainResult};
use crate::types::{Profile, Role};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Identity creation plus the profile fields captured at sign-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub block: Option<String>,
}

impl SignUpRequest {
    pub fn validate(&self) -> DomainResult<()> {
        require("email", &self.email)?;
        require("full_name", &self.full_name)?;
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(DomainError::PasswordTooShort(MIN_PASSWORD_LEN));
        }
        Ok(())
    }

    /// Unit/block persisted by the follow-up profile update, if any was given.
    pub fn location(&self) -> Option<(String, String)> {
        let unit = self.unit.clone().unwrap_or_default();
        let block = self.block.clone().unwrap_or_default();
        if unit.trim().is_empty() && block.trim().is_empty() {
            None
        } else {
            Some((unit, block))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthTokens {
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub email: String,
    pub refresh_token: String,
}

/// Authenticated identity with its resolved profile and role.
///
/// Either lookup may come back empty (profile row not created yet, role
/// missing); consumers treat a missing role as "no access".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub profile: Option<Profile>,
    pub role: Option<Role>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup(password: &str, unit: Option<&str>) -> SignUpRequest {
        SignUpRequest {
            email: "ana@example.com".into(),
            password: password.into(),
            full_name: "Ana".into(),
            role: Role::Resident,
            unit: unit.map(String::from),
            block: None,
        }
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert_eq!(
            signup("12345", None).validate(),
            Err(DomainError::PasswordTooShort(MIN_PASSWORD_LEN))
        );
        assert!(signup("123456", None).validate().is_ok());
    }

    #[test]
    fn location_only_when_unit_or_block_given() {
        assert_eq!(signup("123456", None).location(), None);
        assert_eq!(
            signup("123456", Some("101")).location(),
            Some(("101".to_string(), String::new()))
        );
    }
}
