use crate::shared::error::AppError;
use async_trait::async_trait;

#[async_trait]
pub trait BackendProbe: Send + Sync {
    /// `Ok` only when the backend answered the liveness check successfully.
    async fn probe(&self) -> Result<(), AppError>;
}
