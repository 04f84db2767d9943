//! Wire-format clients for model endpoints.

pub mod openai;
