//! Cloud Firestore REST client.
//!
//! Documents live in one collection (default `dayTimes`) and carry a
//! `userId` field; reads use a `runQuery` filtered on it.

use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use url::Url;

use super::{RemoteMirror, RemoteScheduleWindow};
use crate::error::RemoteError;
use crate::schedule::{day_name, format_time, parse_time, parse_weekday};
use crate::storage::RemoteConfig;

pub struct FirestoreMirror {
    client: Client,
    documents_url: String,
    collection: String,
    api_key: String,
    bearer_token: String,
}

impl FirestoreMirror {
    /// # Errors
    /// Returns `NotConfigured` when the project id is missing or the base
    /// URL does not parse.
    pub fn from_config(config: &RemoteConfig) -> Result<Self, RemoteError> {
        if config.project_id.trim().is_empty() {
            return Err(RemoteError::NotConfigured("remote.project_id is empty".into()));
        }
        let base = Url::parse(&config.base_url)
            .map_err(|e| RemoteError::NotConfigured(format!("remote.base_url: {e}")))?;
        let documents_url = format!(
            "{}/projects/{}/databases/(default)/documents",
            base.as_str().trim_end_matches('/'),
            config.project_id
        );
        Ok(Self {
            client: Client::new(),
            documents_url,
            collection: config.collection.clone(),
            api_key: config.api_key.clone(),
            bearer_token: config.bearer_token.clone(),
        })
    }

    fn document_url(&self, document_id: &str) -> String {
        format!("{}/{}/{}", self.documents_url, self.collection, document_id)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = if self.api_key.is_empty() {
            request
        } else {
            request.query(&[("key", self.api_key.as_str())])
        };
        if self.bearer_token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.bearer_token)
        }
    }

    async fn check(response: Response, document_id: &str) -> Result<Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND && !document_id.is_empty() {
            return Err(RemoteError::NotFound(document_id.to_string()));
        }
        let message = response.text().await.unwrap_or_default();
        Err(RemoteError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait::async_trait]
impl RemoteMirror for FirestoreMirror {
    async fn fetch_all(&self, user_id: &str) -> Result<Vec<RemoteScheduleWindow>, RemoteError> {
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": self.collection }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": "userId" },
                        "op": "EQUAL",
                        "value": { "stringValue": user_id }
                    }
                }
            }
        });
        let request = self
            .client
            .post(format!("{}:runQuery", self.documents_url))
            .json(&body);
        let response = Self::check(self.authorize(request).send().await?, "").await?;
        let rows: Vec<Value> = response.json().await?;

        // rows without a "document" only carry a read time
        rows.iter()
            .filter_map(|row| row.get("document"))
            .map(decode_document)
            .collect()
    }

    async fn create(&self, window: &RemoteScheduleWindow) -> Result<String, RemoteError> {
        let request = self
            .client
            .post(format!("{}/{}", self.documents_url, self.collection))
            .json(&json!({ "fields": encode_fields(window) }));
        let response = Self::check(self.authorize(request).send().await?, "").await?;
        let doc: Value = response.json().await?;
        document_id_of(&doc)
    }

    async fn update(
        &self,
        document_id: &str,
        window: &RemoteScheduleWindow,
    ) -> Result<(), RemoteError> {
        let request = self
            .client
            .patch(self.document_url(document_id))
            .json(&json!({ "fields": encode_fields(window) }));
        Self::check(self.authorize(request).send().await?, document_id).await?;
        Ok(())
    }

    async fn delete(&self, document_id: &str) -> Result<(), RemoteError> {
        let request = self.client.delete(self.document_url(document_id));
        Self::check(self.authorize(request).send().await?, document_id).await?;
        Ok(())
    }
}

/// Firestore typed-value encoding of a document body.
pub(crate) fn encode_fields(window: &RemoteScheduleWindow) -> Value {
    json!({
        "userId": { "stringValue": window.user_id },
        "id": { "integerValue": window.id.to_string() },
        "startDay": { "stringValue": day_name(window.start_day) },
        "endDay": { "stringValue": day_name(window.end_day) },
        "sleepTime": { "stringValue": format_time(window.sleep_time) },
        "wakeUpTime": { "stringValue": format_time(window.wake_time) },
        "enabled": { "booleanValue": window.enabled },
    })
}

fn document_id_of(doc: &Value) -> Result<String, RemoteError> {
    doc["name"]
        .as_str()
        .and_then(|name| name.rsplit('/').next())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| RemoteError::Malformed("document without a name".into()))
}

fn string_field<'a>(fields: &'a Value, name: &str) -> Result<&'a str, RemoteError> {
    fields[name]["stringValue"]
        .as_str()
        .ok_or_else(|| RemoteError::Malformed(format!("missing string field '{name}'")))
}

pub(crate) fn decode_document(doc: &Value) -> Result<RemoteScheduleWindow, RemoteError> {
    let fields = &doc["fields"];
    let malformed = |e: crate::error::ValidationError| RemoteError::Malformed(e.to_string());

    let id = match &fields["id"]["integerValue"] {
        Value::String(raw) => raw
            .parse::<i64>()
            .map_err(|e| RemoteError::Malformed(format!("id: {e}")))?,
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| RemoteError::Malformed("id out of range".into()))?,
        _ => return Err(RemoteError::Malformed("missing integer field 'id'".into())),
    };

    Ok(RemoteScheduleWindow {
        user_id: string_field(fields, "userId")?.to_string(),
        id,
        start_day: parse_weekday(string_field(fields, "startDay")?).map_err(malformed)?,
        end_day: parse_weekday(string_field(fields, "endDay")?).map_err(malformed)?,
        sleep_time: parse_time(string_field(fields, "sleepTime")?).map_err(malformed)?,
        wake_time: parse_time(string_field(fields, "wakeUpTime")?).map_err(malformed)?,
        enabled: fields["enabled"]["booleanValue"].as_bool().unwrap_or(false),
        document_id: document_id_of(doc)?,
    })
}
