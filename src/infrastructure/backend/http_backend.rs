use super::error::BackendError;
use crate::application::ports::{BackendProbe, StudentBackend};
use crate::domain::entities::Student;
use crate::shared::config::AppConfig;
use crate::shared::error::AppError;
use async_trait::async_trait;
use reqwest::header::CACHE_CONTROL;
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Wire shape of a student. Ids travel in the URL, never in the body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StudentBody<'a> {
    name: &'a str,
    age: u32,
    gender: &'a str,
    grade: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    photo: Option<&'a str>,
}

impl<'a> From<&'a Student> for StudentBody<'a> {
    fn from(student: &'a Student) -> Self {
        Self {
            name: &student.name,
            age: student.age,
            gender: &student.gender,
            grade: &student.grade,
            email: student.email.as_deref(),
            subject: student.subject.as_deref(),
            photo: student.photo.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResourceId {
    Number(i64),
    Text(String),
}

impl ResourceId {
    fn into_string(self) -> String {
        match self {
            ResourceId::Number(n) => n.to_string(),
            ResourceId::Text(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StudentResource {
    id: Option<ResourceId>,
    name: Option<String>,
    age: Option<u32>,
    gender: Option<String>,
    grade: Option<String>,
    email: Option<String>,
    subject: Option<String>,
    photo: Option<String>,
}

impl StudentResource {
    /// Overlays the returned fields on the record that was sent.
    fn into_student(self, sent: &Student) -> Result<Student, BackendError> {
        let id = self
            .id
            .map(ResourceId::into_string)
            .filter(|id| !id.trim().is_empty())
            .ok_or(BackendError::MissingId)?;
        Ok(Student {
            server_id: Some(id),
            local_id: sent.local_id.clone(),
            name: self.name.unwrap_or_else(|| sent.name.clone()),
            age: self.age.unwrap_or(sent.age),
            gender: self.gender.unwrap_or_else(|| sent.gender.clone()),
            grade: self.grade.unwrap_or_else(|| sent.grade.clone()),
            email: self.email.or_else(|| sent.email.clone()),
            subject: self.subject.or_else(|| sent.subject.clone()),
            photo: self.photo.or_else(|| sent.photo.clone()),
        })
    }
}

fn build_client(timeout: Duration) -> Result<Client, BackendError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

fn join_url(base_url: &str, path: &str) -> Result<Url, BackendError> {
    let joined = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| BackendError::InvalidUrl(format!("{joined}: {e}")))
}

async fn ensure_success(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        body,
    })
}

/// REST client for the roster service.
#[derive(Clone)]
pub struct HttpStudentBackend {
    client: Client,
    base_url: String,
}

impl HttpStudentBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        join_url(base_url, "students")?;
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        Self::new(&config.backend.base_url, config.backend.request_timeout())
    }

    fn student_url(&self, id: Option<&str>) -> Result<Url, BackendError> {
        let mut url = join_url(&self.base_url, "students")?;
        if let Some(id) = id {
            url.path_segments_mut()
                .map_err(|_| BackendError::InvalidUrl(self.base_url.clone()))?
                .push(id);
        }
        Ok(url)
    }
}

#[async_trait]
impl StudentBackend for HttpStudentBackend {
    async fn create_student(&self, student: &Student) -> Result<Student, AppError> {
        let url = self.student_url(None)?;
        debug!(%url, "POST student");
        let response = self
            .client
            .post(url)
            .json(&StudentBody::from(student))
            .send()
            .await
            .map_err(BackendError::from)?;
        let resource: StudentResource = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(BackendError::from)?;
        Ok(resource.into_student(student)?)
    }

    async fn update_student(&self, id: &str, student: &Student) -> Result<(), AppError> {
        let url = self.student_url(Some(id))?;
        debug!(%url, "PUT student");
        let response = self
            .client
            .put(url)
            .json(&StudentBody::from(student))
            .send()
            .await
            .map_err(BackendError::from)?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn delete_student(&self, id: &str) -> Result<(), AppError> {
        let url = self.student_url(Some(id))?;
        debug!(%url, "DELETE student");
        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(BackendError::from)?;
        ensure_success(response).await?;
        Ok(())
    }
}

/// Liveness check: `HEAD {base}/{health_path}`, uncached.
#[derive(Clone)]
pub struct HttpBackendProbe {
    client: Client,
    url: Url,
}

impl HttpBackendProbe {
    pub fn new(base_url: &str, health_path: &str, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            client: build_client(timeout)?,
            url: join_url(base_url, health_path)?,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        Self::new(
            &config.backend.base_url,
            &config.connectivity.health_path,
            config.connectivity.probe_timeout(),
        )
    }
}

#[async_trait]
impl BackendProbe for HttpBackendProbe {
    async fn probe(&self) -> Result<(), AppError> {
        let response = self
            .client
            .head(self.url.clone())
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(BackendError::from)?;
        ensure_success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::StudentDraft;

    fn sent() -> Student {
        let mut student = Student::from_draft(StudentDraft {
            name: "Aris".into(),
            age: 15,
            gender: "Male".into(),
            grade: "10th".into(),
            email: None,
            subject: None,
            photo: None,
        });
        student.local_id = Some("local-1".into());
        student
    }

    #[test]
    fn test_numeric_and_text_ids_are_accepted() {
        let numeric: StudentResource = serde_json::from_str(r#"{"id": 42}"#).unwrap();
        let created = numeric.into_student(&sent()).unwrap();
        assert_eq!(created.server_id.as_deref(), Some("42"));
        assert_eq!(created.local_id.as_deref(), Some("local-1"));
        assert_eq!(created.name, "Aris");

        let text: StudentResource =
            serde_json::from_str(r#"{"id": "abc", "grade": "11th"}"#).unwrap();
        let created = text.into_student(&sent()).unwrap();
        assert_eq!(created.server_id.as_deref(), Some("abc"));
        assert_eq!(created.grade, "11th");
    }

    #[test]
    fn test_missing_id_is_an_error() {
        let resource: StudentResource = serde_json::from_str(r#"{"name": "Aris"}"#).unwrap();
        assert!(matches!(
            resource.into_student(&sent()),
            Err(BackendError::MissingId)
        ));
    }

    #[test]
    fn test_body_omits_ids() {
        let mut student = sent();
        student.server_id = Some("9".into());
        let json = serde_json::to_value(StudentBody::from(&student)).unwrap();
        assert!(json.get("id").is_none());
        assert!(json.get("localId").is_none());
        assert_eq!(json["grade"], "10th");
    }

    #[test]
    fn test_urls_are_joined_and_escaped() {
        let backend =
            HttpStudentBackend::new("http://localhost:8080/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            backend.student_url(None).unwrap().as_str(),
            "http://localhost:8080/api/students"
        );
        assert_eq!(
            backend.student_url(Some("a b")).unwrap().as_str(),
            "http://localhost:8080/api/students/a%20b"
        );
        assert!(HttpStudentBackend::new("not a url", Duration::from_secs(1)).is_err());
    }
}
