//! Ollama provider, through its OpenAI-compatible endpoint.

use serde::{Deserialize, Serialize};

use crate::api::openai::{OpenAiCompatibleClient, OpenAiCompatibleModel};
use crate::options::{ModelOptions, TransportOptions};
use crate::providers::Provider;

pub const OLLAMA_DEFAULT_BASE: &str = "http://localhost:11434";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OllamaModel;

impl OpenAiCompatibleModel for OllamaModel {}

pub type OllamaClient = OpenAiCompatibleClient<OllamaModel>;

pub struct Ollama;

impl Provider for Ollama {
    type Model = OllamaModel;
    type Client = OllamaClient;

    /// `base_url` may be empty to use the local default.
    fn create_with_options(
        base_url: String,
        model_options: ModelOptions<OllamaModel>,
        transport_options: TransportOptions,
    ) -> Self::Client {
        let base_url = if base_url.is_empty() {
            OLLAMA_DEFAULT_BASE.to_string()
        } else {
            base_url
        };
        OllamaClient::new(None, base_url, model_options, transport_options)
    }
}
