mod error;
pub use error::ApiError;

mod handler;
pub use handler::ApiHandler;

mod adapter;
pub use adapter::SecretStoreAdapter;

mod http;
pub use http::{HttpApi, StatusResponse};

pub use axum;
