use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};

use super::domain::NotificationDispatch;

pub const ONESIGNAL_NOTIFICATIONS_URL: &str = "https://onesignal.com/api/v1/notifications";

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("push provider unreachable: {0}")]
    Transport(String),
    #[error("push provider rejected the notification with status {status}")]
    Provider { status: u16, details: Value },
    #[error("push provider returned an unreadable response: {0}")]
    InvalidResponse(String),
}

/// Outbound push transport.
#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Returns the provider's response body on success.
    async fn send(&self, dispatch: &NotificationDispatch) -> Result<Value, PushError>;
}

#[derive(Debug, Serialize)]
struct LocalizedText<'a> {
    en: &'a str,
}

#[derive(Debug, Serialize)]
struct OneSignalPayload<'a> {
    app_id: &'a str,
    contents: LocalizedText<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    headings: Option<LocalizedText<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    include_external_user_ids: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    included_segments: Option<&'a [String]>,
}

/// OneSignal REST client.
#[derive(Debug, Clone)]
pub struct OneSignalClient {
    app_id: String,
    rest_api_key: String,
    endpoint: String,
    client: Client,
}

impl OneSignalClient {
    pub fn new(
        app_id: impl Into<String>,
        rest_api_key: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("immo-market/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            app_id: app_id.into(),
            rest_api_key: rest_api_key.into(),
            endpoint: ONESIGNAL_NOTIFICATIONS_URL.to_string(),
            client,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn payload<'a>(&'a self, dispatch: &'a NotificationDispatch) -> OneSignalPayload<'a> {
        let audience = &dispatch.audience;
        OneSignalPayload {
            app_id: &self.app_id,
            contents: LocalizedText {
                en: &dispatch.message,
            },
            headings: dispatch
                .title
                .as_deref()
                .map(|title| LocalizedText { en: title }),
            url: dispatch.url.as_deref(),
            data: dispatch.data.as_ref(),
            include_external_user_ids: (!audience.external_user_ids.is_empty())
                .then_some(audience.external_user_ids.as_slice()),
            included_segments: (!audience.segments.is_empty())
                .then_some(audience.segments.as_slice()),
        }
    }
}

#[async_trait]
impl PushGateway for OneSignalClient {
    async fn send(&self, dispatch: &NotificationDispatch) -> Result<Value, PushError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Basic {}", self.rest_api_key),
            )
            .json(&self.payload(dispatch))
            .send()
            .await
            .map_err(|err| PushError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| PushError::InvalidResponse(err.to_string()))?;
        let details: Value = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body).map_err(|err| PushError::InvalidResponse(err.to_string()))?
        };

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "onesignal rejected notification");
            return Err(PushError::Provider {
                status: status.as_u16(),
                details,
            });
        }

        tracing::info!(
            users = dispatch.audience.external_user_ids.len(),
            segments = dispatch.audience.segments.len(),
            "push notification dispatched"
        );
        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::domain::Audience;
    use serde_json::json;

    #[test]
    fn payload_omits_absent_fields() {
        let client = OneSignalClient::new("app-1", "key").expect("client builds");
        let dispatch = NotificationDispatch {
            title: None,
            message: "Lease signed".to_string(),
            url: None,
            data: None,
            audience: Audience {
                external_user_ids: vec!["user-7".to_string()],
                segments: Vec::new(),
            },
        };

        let value = serde_json::to_value(client.payload(&dispatch)).expect("serializes");
        assert_eq!(
            value,
            json!({
                "app_id": "app-1",
                "contents": { "en": "Lease signed" },
                "include_external_user_ids": ["user-7"],
            })
        );
    }

    #[test]
    fn payload_carries_headings_and_segments() {
        let client = OneSignalClient::new("app-1", "key").expect("client builds");
        let mut data = Map::new();
        data.insert("leaseId".to_string(), json!("l-1"));
        let dispatch = NotificationDispatch {
            title: Some("Rent due".to_string()),
            message: "Your rent is due tomorrow".to_string(),
            url: Some("https://immoo.example/leases/l-1".to_string()),
            data: Some(data),
            audience: Audience {
                external_user_ids: Vec::new(),
                segments: vec!["Tenants".to_string()],
            },
        };

        let value = serde_json::to_value(client.payload(&dispatch)).expect("serializes");
        assert_eq!(value["headings"]["en"], "Rent due");
        assert_eq!(value["included_segments"], json!(["Tenants"]));
        assert_eq!(value["data"]["leaseId"], "l-1");
        assert!(value.get("include_external_user_ids").is_none());
    }
}
