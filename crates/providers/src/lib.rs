pub mod backend;

pub use backend::{config::BackendConfig, HttpBackend};
