use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::model::{AuditInfo, Entity, Id, Identity, IncludePaths, Navigation, Optional};

/// Application user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(flatten)]
    pub identity: Identity,
    #[serde(skip)]
    pub audit: AuditInfo,
    pub user_name: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub profile: Option<UserProfile>,
    #[serde(default)]
    pub permissions: Vec<String>,
    /// `;`-separated tag list
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub addresses: Vec<Address>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub display_name: String,
    #[serde(default)]
    pub bio: Option<String>,
}

/// Postal address owned by a user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(flatten)]
    pub identity: Identity,
    pub label: String,
    pub street: String,
    pub city: String,
    #[serde(default)]
    pub postal_code: Option<String>,
}

impl Entity for User {
    const ENTITY_TYPE: &'static str = "User";

    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.identity
    }

    fn audit(&self) -> Option<&AuditInfo> {
        Some(&self.audit)
    }

    fn audit_mut(&mut self) -> Option<&mut AuditInfo> {
        Some(&mut self.audit)
    }

    fn navigations() -> Vec<Navigation> {
        vec![Navigation::to::<Address>("addresses")]
    }

    fn retain_navigations(&mut self, include: &IncludePaths) {
        if !include.includes("addresses") {
            self.addresses.clear();
            return;
        }
        let nested = include.nested("addresses");
        for address in &mut self.addresses {
            address.retain_navigations(&nested);
        }
    }

    fn assign_identities(&mut self) {
        self.identity.ensure_assigned();
        for address in &mut self.addresses {
            address.assign_identities();
        }
    }
}

impl Entity for Address {
    const ENTITY_TYPE: &'static str = "Address";

    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.identity
    }
}

impl User {
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags.split(';').filter(|tag| !tag.is_empty()).collect()
    }
}

/// Create/update payload for a user. Every field except `id` is tri-state so a
/// partial update only touches what the caller sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCommand {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Optional::is_unset")]
    pub user_name: Optional<String>,
    #[serde(
        default,
        skip_serializing_if = "Optional::is_unset",
        serialize_with = "redact"
    )]
    pub password: Optional<String>,
    #[serde(default, skip_serializing_if = "Optional::is_unset")]
    pub email: Optional<String>,
    #[serde(default, skip_serializing_if = "Optional::is_unset")]
    pub profile: Optional<ProfileCommand>,
    #[serde(default, skip_serializing_if = "Optional::is_unset")]
    pub permissions: Optional<Vec<String>>,
    #[serde(default, skip_serializing_if = "Optional::is_unset")]
    pub tags: Optional<Vec<String>>,
    #[serde(default, skip_serializing_if = "Optional::is_unset")]
    pub addresses: Optional<Vec<AddressCommand>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileCommand {
    #[serde(default, skip_serializing_if = "Optional::is_unset")]
    pub display_name: Optional<String>,
    #[serde(default, skip_serializing_if = "Optional::is_unset")]
    pub bio: Optional<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressCommand {
    /// Empty for a new address, the existing address id otherwise
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Optional::is_unset")]
    pub label: Optional<String>,
    #[serde(default, skip_serializing_if = "Optional::is_unset")]
    pub street: Optional<String>,
    #[serde(default, skip_serializing_if = "Optional::is_unset")]
    pub city: Optional<String>,
    #[serde(default, skip_serializing_if = "Optional::is_unset")]
    pub postal_code: Optional<String>,
}

fn redact<S: Serializer>(password: &Optional<String>, serializer: S) -> Result<S::Ok, S::Error> {
    match password {
        Optional::Value(_) => serializer.serialize_str("***"),
        Optional::Unset | Optional::Null => serializer.serialize_none(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Id,
    pub user_name: String,
    pub password: String,
    pub email: Option<String>,
    pub profile: Option<ProfileResponse>,
    pub permissions: Vec<String>,
    pub tags: String,
    pub addresses: Vec<AddressResponse>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_modified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub display_name: String,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressResponse {
    pub id: Id,
    pub label: String,
    pub street: String,
    pub city: String,
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateUserResponse {
    pub data: UserResponse,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_distinguishes_missing_and_null_fields() {
        let command: UserCommand = serde_json::from_value(json!({
            "id": "",
            "userName": "alice",
            "email": null,
            "addresses": [{ "label": "home" }]
        }))
        .unwrap();

        assert_eq!(command.user_name, Optional::Value("alice".to_string()));
        assert_eq!(command.email, Optional::Null);
        assert!(command.password.is_unset());
        assert!(command.profile.is_unset());
        let addresses = command.addresses.value();
        assert_eq!(addresses.len(), 1);
        assert_eq!(addresses[0].id, "");
        assert_eq!(addresses[0].label, Optional::Value("home".to_string()));
    }

    #[test]
    fn test_command_log_payload_redacts_password() {
        let command = UserCommand {
            user_name: Optional::new("alice".to_string()),
            password: Optional::new("secret".to_string()),
            ..Default::default()
        };
        let payload = serde_json::to_value(&command).unwrap();
        assert_eq!(payload["password"], json!("***"));
        assert_eq!(payload["userName"], json!("alice"));
        assert!(payload.get("email").is_none());
    }

    #[test]
    fn test_command_log_payload_keeps_null_password_null() {
        let command = UserCommand {
            password: Optional::Null,
            ..Default::default()
        };
        let payload = serde_json::to_value(&command).unwrap();
        assert_eq!(payload["password"], json!(null));
        assert!(payload.get("password").is_some());
    }

    #[test]
    fn test_entity_json_keeps_audit_out_of_document() {
        let user = User {
            identity: Identity::new(),
            user_name: "alice".to_string(),
            password: "pw".to_string(),
            tags: "a;b".to_string(),
            ..Default::default()
        };
        let document = serde_json::to_value(&user).unwrap();
        assert_eq!(document["id"], json!(user.identity.id));
        assert!(document.get("audit").is_none());

        let restored: User = serde_json::from_value(document).unwrap();
        assert_eq!(restored, user);
        assert_eq!(restored.tag_list(), vec!["a", "b"]);
    }

    #[test]
    fn test_retain_navigations_drops_unincluded_addresses() {
        let mut user = User {
            addresses: vec![Address::default()],
            ..Default::default()
        };
        user.retain_navigations(&IncludePaths::all_for::<User>());
        assert_eq!(user.addresses.len(), 1);

        user.retain_navigations(&IncludePaths::parse("profile"));
        assert!(user.addresses.is_empty());
    }

    #[test]
    fn test_assign_identities_covers_children() {
        let mut user = User {
            addresses: vec![Address::default(), Address::default()],
            ..Default::default()
        };
        user.assign_identities();
        assert!(user.identity.is_assigned());
        assert!(user.addresses.iter().all(|a| a.identity.is_assigned()));
        assert_ne!(user.addresses[0].identity, user.addresses[1].identity);
    }
}
