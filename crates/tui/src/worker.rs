use std::sync::{
    mpsc::{self, Receiver, Sender, TryRecvError},
    Arc,
};

use gemchat_core::api::{ChatBackend, ClientError};
use gemchat_core::controller::{RefreshTicket, Request, SendTicket};
use providers::HttpBackend;
use tracing::{error, info};

pub enum Outcome {
    Chat(SendTicket, Result<String, ClientError>),
    Catalog(RefreshTicket, Result<Vec<String>, ClientError>),
}

impl Outcome {
    fn failed(req: Request, msg: String) -> Self {
        match req {
            Request::Chat(t) => Outcome::Chat(t, Err(ClientError::Transport(msg))),
            Request::Catalog(t) => Outcome::Catalog(t, Err(ClientError::Transport(msg))),
        }
    }
}

type Launch = Arc<dyn Fn(Request, Sender<Outcome>) + Send + Sync>;

/// Runs requests off the UI thread; outcomes are collected on the next tick.
pub struct Worker {
    launch: Launch,
    tx: Sender<Outcome>,
    rx: Receiver<Outcome>,
}

impl Worker {
    pub fn http(backend: HttpBackend) -> Self {
        Self::with_launch(Arc::new(move |req, tx| {
            let backend = backend.clone();
            std::thread::spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        error!(target: "tui", "worker runtime error: {}", e);
                        let _ = tx.send(Outcome::failed(req, format!("runtime: {}", e)));
                        return;
                    }
                };
                let outcome = rt.block_on(execute(&backend, req));
                let _ = tx.send(outcome);
            });
        }))
    }

    /// Resolves every request synchronously with `f`.
    #[cfg(test)]
    pub fn from_fn(f: impl Fn(Request) -> Outcome + Send + Sync + 'static) -> Self {
        Self::with_launch(Arc::new(move |req, tx| {
            let _ = tx.send(f(req));
        }))
    }

    fn with_launch(launch: Launch) -> Self {
        let (tx, rx) = mpsc::channel();
        Self { launch, tx, rx }
    }

    pub fn submit(&self, req: Request) {
        match &req {
            Request::Chat(t) => {
                info!(target: "tui", "submit chat pending={}", t.pending.get())
            }
            Request::Catalog(_) => info!(target: "tui", "submit catalog refresh"),
        }
        (self.launch)(req, self.tx.clone());
    }

    pub fn try_recv(&self) -> Option<Outcome> {
        match self.rx.try_recv() {
            Ok(o) => Some(o),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

async fn execute<B: ChatBackend>(backend: &B, req: Request) -> Outcome {
    match req {
        Request::Chat(t) => {
            let res = backend.chat(&t.request).await;
            Outcome::Chat(t, res)
        }
        Request::Catalog(t) => {
            let res = backend.list_models(&t.api_key).await;
            Outcome::Catalog(t, res)
        }
    }
}
