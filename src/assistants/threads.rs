use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{
    assistants::messages::CreateMessageRequest,
    client::{Deleted, OpenAiClient},
    ApiResponseOrError,
};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Thread {
    pub id: String,
    pub object: String,
    pub created_at: u64,
    /// Set of 16 key-value pairs that can be attached to an object.
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Serialize, Builder, Debug, Clone, Default)]
#[builder(pattern = "owned")]
#[builder(name = "CreateThreadBuilder")]
#[builder(setter(strip_option, into))]
pub struct CreateThreadRequest {
    /// Messages to start the thread with. Usually left empty and appended
    /// afterwards with [`OpenAiClient::create_message`].
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[builder(default)]
    pub messages: Vec<CreateMessageRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default)]
    pub metadata: Option<HashMap<String, String>>,
}

impl OpenAiClient {
    pub async fn create_thread(&self, request: &CreateThreadRequest) -> ApiResponseOrError<Thread> {
        self.post("threads", request).await
    }

    pub async fn get_thread(&self, thread_id: &str) -> ApiResponseOrError<Thread> {
        self.get(format!("threads/{thread_id}")).await
    }

    pub async fn delete_thread(&self, thread_id: &str) -> ApiResponseOrError<Deleted> {
        self.delete(format!("threads/{thread_id}")).await
    }
}
