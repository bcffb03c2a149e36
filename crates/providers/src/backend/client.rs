use crate::backend::config::BackendConfig;
use gemchat_core::api::{
    ChatBackend, ChatReply, ChatRequest, ClientError, ErrorBody, ModelsRequest, ModelsResponse,
    CHAT_PATH, MODELS_PATH,
};
use reqwest::{Client, StatusCode};
use tokio::time::Duration;
use tracing::{debug, error, info};
use url::Url;

pub const CATALOG_FALLBACK: &str = "Failed to fetch models";
pub const CHAT_FALLBACK: &str = "Failed to send message";

#[derive(Clone)]
pub struct HttpBackend {
    http: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(cfg: BackendConfig) -> anyhow::Result<Self> {
        let parsed = Url::parse(cfg.base_url.trim())?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("unsupported scheme in base url: {}", parsed.scheme());
        }
        let mut builder = Client::builder()
            .use_rustls_tls()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(2);
        if let Some(t) = cfg.timeout {
            builder = builder.timeout(t);
        }
        if let Some(p) = &cfg.proxy {
            builder = builder.proxy(reqwest::Proxy::all(p)?);
        }
        let http = builder.build()?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl ChatBackend for HttpBackend {
    async fn list_models(&self, api_key: &str) -> Result<Vec<String>, ClientError> {
        let url = self.endpoint(MODELS_PATH);
        info!(target: "providers::backend", "list models url={}", url);
        let body = ModelsRequest {
            api_key: api_key.to_string(),
        };
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_err)?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.ok();
            error!(target: "providers::backend", "models non-2xx status={} body={:?}", status, text);
            return Err(ClientError::CatalogFetch(status_detail(
                status,
                text.as_deref(),
                CATALOG_FALLBACK,
            )));
        }
        let v: ModelsResponse = resp.json().await.map_err(map_decode_err)?;
        debug!(target: "providers::backend", "models received count={}", v.models.len());
        Ok(v.models)
    }

    async fn chat(&self, req: &ChatRequest) -> Result<String, ClientError> {
        let url = self.endpoint(CHAT_PATH);
        info!(
            target: "providers::backend",
            "chat model={} url={} len={}",
            req.model,
            url,
            req.message.len()
        );
        let resp = self
            .http
            .post(&url)
            .json(req)
            .send()
            .await
            .map_err(map_reqwest_err)?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.ok();
            error!(target: "providers::backend", "chat non-2xx status={} body={:?}", status, text);
            return Err(ClientError::ChatRequest(status_detail(
                status,
                text.as_deref(),
                CHAT_FALLBACK,
            )));
        }
        let reply: ChatReply = resp.json().await.map_err(map_decode_err)?;
        Ok(reply.response)
    }
}

fn status_detail(status: StatusCode, body: Option<&str>, fallback: &str) -> String {
    match ErrorBody::detail_from(body) {
        Some(d) => d,
        None => {
            debug!(target: "providers::backend", "no detail in {} body, using fallback", status.as_u16());
            fallback.to_string()
        }
    }
}

fn map_reqwest_err(e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::Transport(format!("timeout: {}", e))
    } else if e.is_connect() || e.is_request() {
        ClientError::Transport(format!("network: {}", e))
    } else {
        ClientError::Transport(e.to_string())
    }
}

fn map_decode_err(e: reqwest::Error) -> ClientError {
    ClientError::Transport(format!("decode: {}", e))
}
