use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Currency, CurrencyFormatter, Locale, ValidationError};

pub type UserId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(ValidationError::UnknownRole(other.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: &str, role: Role) -> Result<Self, ValidationError> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(ValidationError::MissingField("email"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            email,
            role,
            created_at: Utc::now(),
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlag {
    pub name: String,
    pub enabled: bool,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl FeatureFlag {
    pub fn new(name: &str, enabled: bool, description: Option<String>) -> Self {
        Self {
            name: name.trim().to_lowercase(),
            enabled,
            description,
            updated_at: Utc::now(),
        }
    }
}

/// The signed-in user and their display preferences, passed explicitly
/// to every operation instead of living in a global store.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub user: User,
    pub locale: Locale,
    pub currency: Currency,
}

impl SessionContext {
    pub fn new(user: User, locale: Locale, currency: Currency) -> Self {
        Self {
            user,
            locale,
            currency,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user.id
    }

    pub fn is_admin(&self) -> bool {
        self.user.is_admin()
    }

    pub fn formatter(&self) -> CurrencyFormatter {
        CurrencyFormatter::new(self.currency.clone(), self.locale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip() {
        for role in [Role::User, Role::Admin] {
            assert_eq!(Role::parse(role.as_str()), Ok(role));
        }
        assert!(Role::parse("owner").is_err());
    }

    #[test]
    fn test_user_email_normalized() {
        let user = User::new(" Ana@Example.COM ", Role::User).unwrap();
        assert_eq!(user.email, "ana@example.com");
        assert!(!user.is_admin());
    }

    #[test]
    fn test_user_requires_email() {
        assert_eq!(
            User::new("nobody", Role::User),
            Err(ValidationError::MissingField("email"))
        );
    }

    #[test]
    fn test_session_admin_guard() {
        let admin = User::new("root@example.com", Role::Admin).unwrap();
        let ctx = SessionContext::new(admin, Locale::IdId, Currency::idr());
        assert!(ctx.is_admin());
        assert_eq!(ctx.formatter().format(50000), "Rp50.000");
    }
}
