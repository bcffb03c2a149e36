pub mod catalog;
pub mod controller;
pub mod markdown;
pub mod session;
pub mod transcript;

pub mod api {
    use serde::{Deserialize, Serialize};
    use thiserror::Error;

    pub const MODELS_PATH: &str = "/api/models";
    pub const CHAT_PATH: &str = "/api/chat";

    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
    pub struct ModelsRequest {
        #[serde(rename = "apiKey")]
        pub api_key: String,
    }

    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
    pub struct ModelsResponse {
        pub models: Vec<String>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
    pub struct ChatRequest {
        pub message: String,
        #[serde(rename = "apiKey")]
        pub api_key: String,
        pub model: String,
    }

    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
    pub struct ChatReply {
        pub response: String,
    }

    /// Error payload returned by the backend on non-2xx responses.
    #[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
    pub struct ErrorBody {
        #[serde(default)]
        pub detail: Option<String>,
    }

    impl ErrorBody {
        /// Best-effort extraction of `detail` from an arbitrary body.
        pub fn detail_from(body: Option<&str>) -> Option<String> {
            let body = body?;
            serde_json::from_str::<ErrorBody>(body)
                .ok()
                .and_then(|b| b.detail)
                .filter(|d| !d.trim().is_empty())
        }
    }

    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum ClientError {
        #[error("Please enter an API Key first")]
        MissingCredential,
        #[error("{0}")]
        CatalogFetch(String),
        #[error("{0}")]
        ChatRequest(String),
        #[error("{0}")]
        Transport(String),
    }

    impl ClientError {
        /// Credential and catalog failures interrupt the user; chat failures stay inline.
        pub fn is_blocking(&self) -> bool {
            matches!(self, ClientError::MissingCredential | ClientError::CatalogFetch(_))
        }
    }

    #[allow(async_fn_in_trait)]
    pub trait ChatBackend {
        async fn list_models(&self, api_key: &str) -> Result<Vec<String>, ClientError>;
        async fn chat(&self, req: &ChatRequest) -> Result<String, ClientError>;
    }
}

pub use api::{ChatBackend, ClientError};
pub use controller::{Command, Controller, Event, Phase};
pub use markdown::{render, Fragment, Markup};
pub use session::{KeyStore, MemoryKeyStore, Session};
pub use transcript::{EntryBody, EntryId, EntryKind, Transcript, TranscriptEntry};
