use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A roster entry. Records created offline carry only a `local_id` until the
/// backend assigns a `server_id`; lookups accept either.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_id: Option<String>,
    pub name: String,
    pub age: u32,
    pub gender: String,
    pub grade: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDraft {
    pub name: String,
    pub age: u32,
    pub gender: String,
    pub grade: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
}

/// Partial update; present fields overwrite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
}

impl Student {
    pub fn from_draft(draft: StudentDraft) -> Self {
        Self {
            server_id: None,
            local_id: None,
            name: draft.name,
            age: draft.age,
            gender: draft.gender,
            grade: draft.grade,
            email: draft.email,
            subject: draft.subject,
            photo: draft.photo,
        }
    }

    pub fn new_local_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Server id once reconciled, the local id before that.
    pub fn authoritative_id(&self) -> Option<&str> {
        self.server_id.as_deref().or(self.local_id.as_deref())
    }

    pub fn matches_id(&self, id: &str) -> bool {
        self.server_id.as_deref() == Some(id) || self.local_id.as_deref() == Some(id)
    }

    pub fn is_synced(&self) -> bool {
        self.server_id.is_some()
    }

    pub fn ensure_local_id(&mut self) -> &str {
        self.local_id.get_or_insert_with(Self::new_local_id)
    }

    pub fn apply_patch(&mut self, patch: &StudentPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(age) = patch.age {
            self.age = age;
        }
        if let Some(gender) = &patch.gender {
            self.gender = gender.clone();
        }
        if let Some(grade) = &patch.grade {
            self.grade = grade.clone();
        }
        if let Some(email) = &patch.email {
            self.email = Some(email.clone());
        }
        if let Some(subject) = &patch.subject {
            self.subject = Some(subject.clone());
        }
        if let Some(photo) = &patch.photo {
            self.photo = Some(photo.clone());
        }
    }

    pub fn patched(&self, patch: &StudentPatch) -> Self {
        let mut next = self.clone();
        next.apply_patch(patch);
        next
    }
}

impl StudentPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
