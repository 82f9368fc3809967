use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use cove_types::api::{NewMessage, NewReply, StoredObject};
use cove_types::models::{Channel, Message, Profile, Reply};

use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::gateway::Gateway;

/// Tables on the row store.
const MESSAGES_TABLE: &str = "messages";
const REPLIES_TABLE: &str = "replies";
const PROFILES_TABLE: &str = "profiles";
const CHANNELS_TABLE: &str = "channels";

/// Related-row expansion joining sender profile fields onto message and
/// reply reads.
const SENDER_EXPANSION: &str = "*,profiles(id,full_name,avatar)";

/// HTTP gateway to the hosted backend's REST surface.
///
/// Row operations speak the PostgREST dialect: equality filters as
/// `column=eq.value` query parameters, `Prefer: return=representation` to
/// get mutated rows back, `select` for the profile expansion. Blob
/// operations use the storage API under the configured bucket.
pub struct RemoteClient {
    pub(crate) http: Client,
    config: RemoteConfig,
}

impl RemoteClient {
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base(), table)
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base(), self.config.bucket, path)
    }

    fn bucket_url(&self) -> String {
        format!("{}/storage/v1/object/{}", self.base(), self.config.bucket)
    }

    pub(crate) fn auth_url(&self, endpoint: &str) -> String {
        format!("{}/auth/v1/{}", self.base(), endpoint)
    }

    /// Every request carries the project key plus the bearer token.
    pub(crate) fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.access_token)
    }

    /// Map non-2xx responses to [`Error::Backend`], capturing the body.
    pub(crate) async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Error::Backend {
                status: status.as_u16(),
                body,
            })
        }
    }

    async fn rows<T: DeserializeOwned>(response: Response) -> Result<Vec<T>> {
        Ok(Self::check(response).await?.json().await?)
    }

    /// Inserts and patches ask for the mutated row back; the backend answers
    /// with a one-element array.
    async fn single_row<T: DeserializeOwned>(response: Response) -> Result<T> {
        let rows: Vec<T> = Self::rows(response).await?;
        rows.into_iter().next().ok_or(Error::MissingRecord)
    }

    async fn insert_row<T: DeserializeOwned>(
        &self,
        table: &str,
        payload: &impl serde::Serialize,
    ) -> Result<T> {
        let response = self
            .authed(self.http.post(self.table_url(table)))
            .header("Prefer", "return=representation")
            .json(payload)
            .send()
            .await?;
        Self::single_row(response).await
    }

    async fn patch_attachments<T: DeserializeOwned>(
        &self,
        table: &str,
        id: Uuid,
        attachments: &[String],
    ) -> Result<T> {
        let filter = format!("eq.{id}");
        let response = self
            .authed(self.http.patch(self.table_url(table)))
            .query(&[("id", filter.as_str())])
            .header("Prefer", "return=representation")
            .json(&serde_json::json!({ "attachments": attachments }))
            .send()
            .await?;
        Self::single_row(response).await
    }

    async fn delete_row(&self, table: &str, id: Uuid) -> Result<()> {
        let filter = format!("eq.{id}");
        let response = self
            .authed(self.http.delete(self.table_url(table)))
            .query(&[("id", filter.as_str())])
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Scoped read with the sender expansion, oldest first.
    async fn list_scoped<T: DeserializeOwned>(
        &self,
        table: &str,
        scope_column: &str,
        scope: Uuid,
    ) -> Result<Vec<T>> {
        let filter = format!("eq.{scope}");
        let response = self
            .authed(self.http.get(self.table_url(table)))
            .query(&[
                ("select", SENDER_EXPANSION),
                (scope_column, filter.as_str()),
                ("order", "created_at.asc"),
            ])
            .send()
            .await?;
        Self::rows(response).await
    }

    async fn list_all<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>> {
        let response = self
            .authed(self.http.get(self.table_url(table)))
            .query(&[("select", "*")])
            .send()
            .await?;
        Self::rows(response).await
    }
}

impl Gateway for RemoteClient {
    async fn insert_message(&self, new: NewMessage) -> Result<Message> {
        self.insert_row(MESSAGES_TABLE, &new).await
    }

    async fn set_message_attachments(&self, id: Uuid, attachments: &[String]) -> Result<Message> {
        self.patch_attachments(MESSAGES_TABLE, id, attachments).await
    }

    async fn delete_message(&self, id: Uuid) -> Result<()> {
        self.delete_row(MESSAGES_TABLE, id).await
    }

    async fn list_messages(&self, channel_id: Uuid) -> Result<Vec<Message>> {
        self.list_scoped(MESSAGES_TABLE, "channel_id", channel_id).await
    }

    async fn insert_reply(&self, new: NewReply) -> Result<Reply> {
        self.insert_row(REPLIES_TABLE, &new).await
    }

    async fn set_reply_attachments(&self, id: Uuid, attachments: &[String]) -> Result<Reply> {
        self.patch_attachments(REPLIES_TABLE, id, attachments).await
    }

    async fn delete_reply(&self, id: Uuid) -> Result<()> {
        self.delete_row(REPLIES_TABLE, id).await
    }

    async fn list_replies(&self, message_id: Uuid) -> Result<Vec<Reply>> {
        self.list_scoped(REPLIES_TABLE, "message_id", message_id).await
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        self.list_all(PROFILES_TABLE).await
    }

    async fn list_channels(&self) -> Result<Vec<Channel>> {
        self.list_all(CHANNELS_TABLE).await
    }

    async fn get_channel(&self, id: Uuid) -> Result<Channel> {
        let filter = format!("eq.{id}");
        let response = self
            .authed(self.http.get(self.table_url(CHANNELS_TABLE)))
            .query(&[("select", "*"), ("id", filter.as_str())])
            .send()
            .await?;
        Self::single_row(response).await
    }

    async fn upload_object(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<String> {
        let response = self
            .authed(self.http.post(self.object_url(path)))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        let stored: StoredObject = Self::check(response).await?.json().await?;
        Ok(stored.path)
    }

    async fn remove_objects(&self, paths: &[String]) -> Result<()> {
        let response = self
            .authed(self.http.delete(self.bucket_url()))
            .json(&serde_json::json!({ "prefixes": paths }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
