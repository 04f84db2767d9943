//! OpenAI Chat Completions provider.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::api::openai::{OpenAiCompatibleClient, OpenAiCompatibleModel};
use crate::options::{ModelOptions, TransportOptions};
use crate::providers::Provider;

pub const OPENAI_API_BASE: &str = "https://api.openai.com";

/// OpenAI-only request fields.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OpenAiModel {
    /// Let the model request several tools in one turn.
    pub parallel_tool_calls: Option<bool>,
    /// End-user identifier forwarded for abuse monitoring.
    pub user: Option<String>,
}

impl OpenAiCompatibleModel for OpenAiModel {}

pub type OpenAiClient = OpenAiCompatibleClient<OpenAiModel>;

pub struct OpenAi;

impl Provider for OpenAi {
    type Model = OpenAiModel;
    type Client = OpenAiClient;

    fn create_with_options(
        api_key: String,
        model_options: ModelOptions<OpenAiModel>,
        transport_options: TransportOptions,
    ) -> Self::Client {
        OpenAiClient::new(
            Some(api_key),
            OPENAI_API_BASE.to_string(),
            model_options,
            transport_options,
        )
    }
}
