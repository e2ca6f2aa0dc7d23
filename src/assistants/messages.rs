use crate::{
    client::{ListOrder, OpenAiClient},
    ApiResponseOrError,
};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Message {
    pub id: String,
    pub object: String,
    pub created_at: u64,
    /// The thread ID that this message belongs to.
    pub thread_id: String,
    /// One of `in_progress`, `incomplete` or `completed`.
    pub status: Option<Status>,
    pub incomplete_details: Option<IncompleteDetails>,
    pub completed_at: Option<u64>,
    pub incomplete_at: Option<u64>,
    /// The entity that produced the message.
    pub role: Role,
    pub content: Vec<Content>,
    /// The assistant that produced the message.
    pub assistant_id: Option<String>,
    /// Null when the message was created manually rather than by a run.
    pub run_id: Option<String>,
    pub attachments: Option<Vec<Attachment>>,
    pub metadata: Option<HashMap<String, String>>,
}

impl Message {
    /// The text values of this message's content, in order. Non-text items
    /// are skipped.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(Content::as_text)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    InProgress,
    Incomplete,
    Completed,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IncompleteDetails {
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Assistant,
}

/// Each variant carries its payload under a key named like its `type`.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
pub enum Content {
    Text { text: Text },
    ImageFile { image_file: ImageFile },
    ImageUrl { image_url: ImageUrl },
    Refusal { refusal: String },
}

impl Content {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text { text } => Some(text.value.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Text {
    pub value: String,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Annotation {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    pub start_index: u32,
    pub end_index: u32,
    pub file_citation: Option<FileCitation>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FileCitation {
    pub file_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ImageFile {
    pub file_id: String,
    pub detail: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ImageUrl {
    pub url: String,
    pub detail: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Attachment {
    pub file_id: String,
    #[serde(default)]
    pub tools: Vec<AttachmentTool>,
}

/// Tools a file is attached for. Unlike [`Tool`](crate::assistants::Tool)
/// these never carry settings.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
pub enum AttachmentTool {
    CodeInterpreter,
    FileSearch,
}

#[derive(Serialize, Builder, Debug, Clone)]
#[builder(pattern = "owned")]
#[builder(name = "CreateMessageBuilder")]
#[builder(setter(strip_option, into))]
pub struct CreateMessageRequest {
    #[builder(default)]
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub metadata: Option<HashMap<String, String>>,
}

impl OpenAiClient {
    pub async fn create_message(
        &self,
        thread_id: &str,
        request: &CreateMessageRequest,
    ) -> ApiResponseOrError<Message> {
        self.post(format!("threads/{thread_id}/messages"), request)
            .await
    }

    pub async fn list_messages(
        &self,
        thread_id: &str,
        order: ListOrder,
    ) -> ApiResponseOrError<Vec<Message>> {
        self.list(format!("threads/{thread_id}/messages"), order, None)
            .await
    }
}
