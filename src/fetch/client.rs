use async_trait::async_trait;
use reqwest::{Request, Response};

/// Sends a prepared request. Wrappers in [`crate::fetch::auth`] decorate the
/// request and delegate to an inner client.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
