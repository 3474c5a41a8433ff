//! Field rules and response projections for the user aggregate.

use crate::logic::mapping::{CommandId, FieldRules, FromCommand};
use crate::model::{
    Address, AddressCommand, AddressResponse, ProfileCommand, ProfileResponse, User, UserCommand,
    UserProfile, UserResponse,
};

impl FromCommand<UserCommand> for User {
    fn field_rules() -> FieldRules<UserCommand, Self> {
        FieldRules::<UserCommand, Self>::new()
            .value("userName", |c| &c.user_name, |e| &mut e.user_name)
            .value("password", |c| &c.password, |e| &mut e.password)
            .nullable("email", |c| &c.email, |e| &mut e.email)
            .nested("profile", |c| &c.profile, |e| &mut e.profile)
            .list("permissions", |c| &c.permissions, |e| &mut e.permissions)
            .joined("tags", |c| &c.tags, |e| &mut e.tags)
            .children("addresses", |c| &c.addresses, |e| &mut e.addresses)
    }
}

impl FromCommand<ProfileCommand> for UserProfile {
    fn field_rules() -> FieldRules<ProfileCommand, Self> {
        FieldRules::<ProfileCommand, Self>::new()
            .value("displayName", |c| &c.display_name, |e| &mut e.display_name)
            .nullable("bio", |c| &c.bio, |e| &mut e.bio)
    }
}

impl FromCommand<AddressCommand> for Address {
    fn field_rules() -> FieldRules<AddressCommand, Self> {
        FieldRules::<AddressCommand, Self>::new()
            .value("label", |c| &c.label, |e| &mut e.label)
            .value("street", |c| &c.street, |e| &mut e.street)
            .value("city", |c| &c.city, |e| &mut e.city)
            .nullable("postalCode", |c| &c.postal_code, |e| &mut e.postal_code)
    }
}

impl CommandId for AddressCommand {
    fn command_id(&self) -> &str {
        &self.id
    }
}

impl From<&UserProfile> for ProfileResponse {
    fn from(profile: &UserProfile) -> Self {
        Self {
            display_name: profile.display_name.clone(),
            bio: profile.bio.clone(),
        }
    }
}

impl From<&Address> for AddressResponse {
    fn from(address: &Address) -> Self {
        Self {
            id: address.identity.id,
            label: address.label.clone(),
            street: address.street.clone(),
            city: address.city.clone(),
            postal_code: address.postal_code.clone(),
        }
    }
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.identity.id,
            user_name: user.user_name.clone(),
            password: user.password.clone(),
            email: user.email.clone(),
            profile: user.profile.as_ref().map(ProfileResponse::from),
            permissions: user.permissions.clone(),
            tags: user.tags.clone(),
            addresses: user.addresses.iter().map(AddressResponse::from).collect(),
            created_at: user.audit.created_at(),
            last_modified_at: user.audit.last_modified_at(),
        }
    }
}
