//! Model providers.

use crate::client::Client;
use crate::options::{ModelOptions, TransportOptions};

/// Factory for configured model clients.
pub trait Provider {
    /// Provider-specific model options.
    type Model: Default;

    /// The client type produced by this provider.
    type Client: Client;

    /// Create a client for `model` with default options.
    ///
    /// `credential` is the API key for hosted providers and the base URL for local ones.
    fn create(credential: String, model: String) -> Self::Client {
        Self::create_with_options(credential, ModelOptions::new(model), TransportOptions::default())
    }

    fn create_with_options(
        credential: String,
        model_options: ModelOptions<Self::Model>,
        transport_options: TransportOptions,
    ) -> Self::Client;
}

pub mod ollama;
pub mod openai;

pub use ollama::{Ollama, OllamaClient, OllamaModel};
pub use openai::{OpenAi, OpenAiClient, OpenAiModel};
