use serde::{Deserialize, Serialize};

/// Caller identity extracted from request headers, used to tag log scopes.
///
/// The bearer token is carried as-is; verifying it is left to the edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
    #[serde(skip_serializing)]
    pub bearer_token: Option<String>,
}

impl UserContext {
    pub fn new(user_id: String) -> Self {
        Self {
            user_id,
            user_email: None,
            user_name: None,
            bearer_token: None,
        }
    }

    pub fn with_details(user_id: String, email: Option<String>, name: Option<String>) -> Self {
        Self {
            user_id,
            user_email: email,
            user_name: name,
            bearer_token: None,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token;
        self
    }

    /// Context for calls that carry no caller information
    pub fn anonymous() -> Self {
        Self::new("anonymous".to_string())
    }

    pub fn system() -> Self {
        Self::with_details(
            "system".to_string(),
            None,
            Some("System".to_string()),
        )
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id == "anonymous" && self.bearer_token.is_none()
    }

    pub fn is_authenticated(&self) -> bool {
        self.bearer_token.is_some()
    }
}

impl Default for UserContext {
    fn default() -> Self {
        Self::anonymous()
    }
}
