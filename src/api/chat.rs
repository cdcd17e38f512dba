use crate::api::client::ApiClient;
use crate::api::models::{Conversation, Message, ReadReceipt};
use crate::config::Session;
use crate::error::{ApiError, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::RequestBuilder;
use serde_json::{json, Value};
use std::path::Path;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 50;

/// Chat intents the page controller needs from the backend.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Most recent first, as the backend orders them.
    async fn list_conversations(&self) -> Result<Vec<Conversation>>;
    async fn get_or_create_conversation(&self, user_id: &str) -> Result<Conversation>;
    async fn get_messages(&self, conversation_id: &str, page: u32, limit: u32) -> Result<Vec<Message>>;
    async fn send_message(&self, conversation_id: &str, outgoing: OutgoingMessage) -> Result<Message>;
    async fn mark_read(&self, conversation_id: &str) -> Result<ReadReceipt>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileUpload {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime = guess_mime(&file_name).to_string();
        Self { file_name, mime, bytes }
    }

    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        Ok(Self::new(name, bytes))
    }

    fn into_part(self) -> Result<Part> {
        Ok(Part::bytes(self.bytes).file_name(self.file_name).mime_str(&self.mime)?)
    }
}

fn guess_mime(file_name: &str) -> &'static str {
    let ext = file_name.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    pub text: String,
    pub receiver_id: String,
    pub file: Option<FileUpload>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormField {
    Text(String),
    File(FileUpload),
}

/// Request body for a send: JSON unless a file rides along.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    Json(Value),
    Multipart(Vec<(&'static str, FormField)>),
}

impl OutgoingMessage {
    pub fn text(receiver_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { text: text.into(), receiver_id: receiver_id.into(), file: None }
    }

    pub fn into_body(self) -> MessageBody {
        match self.file {
            Some(file) => MessageBody::Multipart(vec![
                ("receiverId", FormField::Text(self.receiver_id)),
                ("text", FormField::Text(self.text)),
                ("attachment", FormField::File(file)),
            ]),
            None => MessageBody::Json(json!({
                "receiverId": self.receiver_id,
                "text": self.text,
            })),
        }
    }
}

impl MessageBody {
    pub fn apply(self, req: RequestBuilder) -> Result<RequestBuilder> {
        match self {
            MessageBody::Json(body) => Ok(req.json(&body)),
            MessageBody::Multipart(fields) => {
                let mut form = Form::new();
                for (name, field) in fields {
                    form = match field {
                        FormField::Text(value) => form.text(name, value),
                        FormField::File(file) => form.part(name, file.into_part()?),
                    };
                }
                Ok(req.multipart(form))
            }
        }
    }
}

/// `ChatApi` over the authenticated REST client.
#[derive(Clone)]
pub struct HttpChatApi {
    client: ApiClient,
    session: Session,
}

impl HttpChatApi {
    pub fn new(client: ApiClient, session: Session) -> Self {
        Self { client, session }
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let req = self.client.get("/chat/conversations", &self.session);
        self.client.send(req, &self.session).await
    }

    async fn get_or_create_conversation(&self, user_id: &str) -> Result<Conversation> {
        let req = self
            .client
            .post("/chat/conversations", &self.session)
            .json(&json!({ "userId": user_id }));
        self.client.send(req, &self.session).await
    }

    async fn get_messages(&self, conversation_id: &str, page: u32, limit: u32) -> Result<Vec<Message>> {
        let req = self
            .client
            .get(&format!("/chat/messages/{conversation_id}"), &self.session)
            .query(&[("page", page), ("limit", limit)]);
        self.client.send(req, &self.session).await
    }

    async fn send_message(&self, conversation_id: &str, outgoing: OutgoingMessage) -> Result<Message> {
        let req = self
            .client
            .post(&format!("/chat/messages/{conversation_id}"), &self.session);
        let req = outgoing.into_body().apply(req)?;
        // the controller answers with an array; only the first entry is the new message
        let sent: Vec<Message> = self.client.send(req, &self.session).await?;
        sent.into_iter().next().ok_or(ApiError::Empty("send returned no message"))
    }

    async fn mark_read(&self, conversation_id: &str) -> Result<ReadReceipt> {
        let req = self
            .client
            .post(&format!("/chat/messages/{conversation_id}/read"), &self.session);
        self.client.send(req, &self.session).await
    }
}
