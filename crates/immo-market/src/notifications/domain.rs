use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Inbound body of the notify endpoint, field names as sent by the web client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
    /// Provider-side external ids, i.e. marketplace user ids.
    #[serde(default)]
    pub included_external_user_ids: Option<Vec<String>>,
    /// Named provider segments such as `All`.
    #[serde(default)]
    pub included_segments: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotificationRequestError {
    #[error("Missing message")]
    MissingMessage,
    #[error("Specify includedExternalUserIds or includedSegments")]
    MissingAudience,
}

/// Who receives a push. At least one list is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Audience {
    pub external_user_ids: Vec<String>,
    pub segments: Vec<String>,
}

/// Validated push ready for a gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationDispatch {
    pub title: Option<String>,
    pub message: String,
    pub url: Option<String>,
    pub data: Option<Map<String, Value>>,
    pub audience: Audience,
}

impl NotificationRequest {
    pub fn validate(self) -> Result<NotificationDispatch, NotificationRequestError> {
        let message = self
            .message
            .filter(|message| !message.trim().is_empty())
            .ok_or(NotificationRequestError::MissingMessage)?;

        let audience = Audience {
            external_user_ids: non_blank(self.included_external_user_ids),
            segments: non_blank(self.included_segments),
        };
        if audience.external_user_ids.is_empty() && audience.segments.is_empty() {
            return Err(NotificationRequestError::MissingAudience);
        }

        Ok(NotificationDispatch {
            title: self.title.filter(|title| !title.trim().is_empty()),
            message,
            url: self.url.filter(|url| !url.trim().is_empty()),
            data: self.data,
            audience,
        })
    }
}

fn non_blank(values: Option<Vec<String>>) -> Vec<String> {
    values
        .unwrap_or_default()
        .into_iter()
        .filter(|value| !value.trim().is_empty())
        .collect()
}

impl NotificationDispatch {
    /// Direct push to marketplace users.
    pub fn to_users(user_ids: Vec<String>, title: &str, message: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            message: message.to_string(),
            url: None,
            data: None,
            audience: Audience {
                external_user_ids: user_ids,
                segments: Vec::new(),
            },
        }
    }
}
