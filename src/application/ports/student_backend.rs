use crate::domain::entities::Student;
use crate::shared::error::AppError;
use async_trait::async_trait;

/// Remote roster service the synchronizer replays against.
#[async_trait]
pub trait StudentBackend: Send + Sync {
    /// Returns the created record carrying its server id.
    async fn create_student(&self, student: &Student) -> Result<Student, AppError>;
    async fn update_student(&self, id: &str, student: &Student) -> Result<(), AppError>;
    async fn delete_student(&self, id: &str) -> Result<(), AppError>;
}
