/*
[INPUT]:  Backend user schema definitions and serde requirements
[OUTPUT]: User model with partial-update merge and permission helpers
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{UserProvider, UserRole};
use super::requests::UserPatch;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub provider: UserProvider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn is_social(&self) -> bool {
        self.provider != UserProvider::Local
    }

    /// Admins may edit anyone; other users only themselves
    pub fn can_edit_profile(&self, target_user_id: &str) -> bool {
        self.is_admin() || self.id == target_user_id
    }

    /// Apply the fields present in `patch`, leaving the rest untouched
    pub fn apply(&mut self, patch: &UserPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(phone) = &patch.phone {
            self.phone = Some(phone.clone());
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(provider) = patch.provider {
            self.provider = provider;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: "u-1".to_string(),
            name: "Kim".to_string(),
            email: "kim@example.com".to_string(),
            phone: None,
            role: UserRole::User,
            provider: UserProvider::Local,
            provider_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_user_deserializes_backend_payload() {
        let json = r#"{
            "id": "9f1c",
            "name": "Lee",
            "email": "lee@example.com",
            "phone": null,
            "role": "admin",
            "provider": "kakao",
            "providerId": "k-77",
            "createdAt": "2025-01-01T00:00:00Z",
            "updatedAt": "2025-01-02T00:00:00Z"
        }"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert!(user.is_admin());
        assert!(user.is_social());
        assert_eq!(user.provider_id.as_deref(), Some("k-77"));
        assert!(user.created_at.is_some());
    }

    #[test]
    fn test_apply_patch_only_touches_present_fields() {
        let mut user = sample_user();
        user.apply(&UserPatch {
            name: Some("Park".to_string()),
            ..UserPatch::default()
        });
        assert_eq!(user.name, "Park");
        assert_eq!(user.email, "kim@example.com");
        assert_eq!(user.role, UserRole::User);
    }

    #[test]
    fn test_can_edit_profile() {
        let user = sample_user();
        assert!(user.can_edit_profile("u-1"));
        assert!(!user.can_edit_profile("u-2"));

        let admin = User {
            role: UserRole::Admin,
            ..sample_user()
        };
        assert!(admin.can_edit_profile("u-2"));
    }
}
