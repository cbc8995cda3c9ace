//! Company (tenant) models

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A company registered on the platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    /// Fixed-length numeric tax identifier, unique across the platform
    pub tax_id: String,
    pub street: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl Company {
    /// Whether an unverified company has outlived its grace period
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        !self.is_verified && self.created_at + ttl < now
    }
}

/// Role of a user inside their company
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompanyRole {
    Owner,
    Member,
}

impl CompanyRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompanyRole::Owner => "owner",
            CompanyRole::Member => "member",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "owner" => Some(CompanyRole::Owner),
            "member" => Some(CompanyRole::Member),
            _ => None,
        }
    }
}

/// A user as listed among a company's members
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyMember {
    pub user_id: Uuid,
    pub user_name: String,
    pub email: String,
    pub role: CompanyRole,
}

/// Input for registering a company
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCompanyRequest {
    #[validate(length(min = 1, max = 200, message = "Company name must be 1-200 characters"))]
    pub name: String,
    pub tax_id: String,
    #[validate(length(max = 200))]
    pub street: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 20))]
    pub postal_code: Option<String>,
    #[validate(length(max = 100))]
    pub country: Option<String>,
}

/// Input for updating the acting user's company
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateCompanyRequest {
    #[validate(length(min = 1, max = 200, message = "Company name must be 1-200 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 200))]
    pub street: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 20))]
    pub postal_code: Option<String>,
    #[validate(length(max = 100))]
    pub country: Option<String>,
}

/// Input for adding an existing user to the acting user's company
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddMemberRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company(verified: bool, age_hours: i64) -> Company {
        Company {
            id: Uuid::new_v4(),
            name: "ACME".into(),
            tax_id: "5260250995".into(),
            street: None,
            city: None,
            postal_code: None,
            country: None,
            is_verified: verified,
            created_at: Utc::now() - Duration::hours(age_hours),
        }
    }

    #[test]
    fn unverified_company_expires_after_ttl() {
        let ttl = Duration::hours(48);
        assert!(company(false, 49).is_expired(Utc::now(), ttl));
        assert!(!company(false, 47).is_expired(Utc::now(), ttl));
    }

    #[test]
    fn verified_company_never_expires() {
        assert!(!company(true, 10_000).is_expired(Utc::now(), Duration::hours(48)));
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in [CompanyRole::Owner, CompanyRole::Member] {
            assert_eq!(CompanyRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(CompanyRole::parse("admin"), None);
    }
}
