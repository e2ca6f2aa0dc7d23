use std::collections::HashMap;

use schemars::{r#gen::SchemaSettings, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    client::{Deleted, OpenAiClient},
    ApiResponseOrError,
};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Assistant {
    pub id: String,
    pub object: String,
    pub created_at: u64,
    /// The name of the assistant. The maximum length is 256 characters.
    pub name: Option<String>,
    pub description: Option<String>,
    /// On Azure this is the deployment name rather than a model family.
    pub model: String,
    /// The system instructions that the assistant uses. The maximum length is 256,000 characters.
    pub instructions: Option<String>,
    #[serde(default)]
    pub tools: Vec<Tool>,
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    CodeInterpreter,
    Function {
        function: Function,
    },
    FileSearch {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_search: Option<FileSearch>,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema of the arguments object the model must produce.
    pub parameters: Value,
}

impl Function {
    /// Builds a function declaration whose parameters are the JSON Schema of
    /// `T`. The doc comment on `T` becomes the function description and the
    /// doc comments on its fields become property descriptions.
    pub fn from_schema<T: JsonSchema>(name: &str) -> Result<Self, serde_json::Error> {
        let settings = SchemaSettings::draft07().with(|settings| {
            settings.inline_subschemas = true;
            settings.meta_schema = None;
        });
        let root = settings.into_generator().into_root_schema_for::<T>();
        let description = root
            .schema
            .metadata
            .as_ref()
            .and_then(|metadata| metadata.description.clone());

        let mut parameters = serde_json::to_value(&root.schema)?;
        if let Value::Object(object) = &mut parameters {
            object.remove("title");
            object.remove("description");
        }

        Ok(Function {
            name: name.to_string(),
            description,
            parameters,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FileSearch {
    pub max_num_results: Option<usize>,
}

#[derive(Serialize, Default, Debug, Clone)]
pub struct CreateAssistantRequest {
    /// Deployment name of the model to use.
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// A set of tools that the assistant can use.
    pub tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

impl OpenAiClient {
    pub async fn create_assistant(
        &self,
        request: &CreateAssistantRequest,
    ) -> ApiResponseOrError<Assistant> {
        self.post("assistants", request).await
    }

    pub async fn get_assistant(&self, assistant_id: &str) -> ApiResponseOrError<Assistant> {
        self.get(format!("assistants/{assistant_id}")).await
    }

    pub async fn delete_assistant(&self, assistant_id: &str) -> ApiResponseOrError<Deleted> {
        self.delete(format!("assistants/{assistant_id}")).await
    }
}
