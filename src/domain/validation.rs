use crate::domain::entities::student::{Student, StudentDraft};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const MIN_AGE: u32 = 5;
pub const MAX_AGE: u32 = 30;

/// Field name to message. Empty means the input is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn insert(&mut self, field: &str, message: &str) {
        self.0.insert(field.to_string(), message.to_string());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.0
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

/// Raw form input as typed by the user; every field is text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentForm {
    pub name: String,
    pub age: String,
    pub gender: String,
    pub grade: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
}

impl StudentForm {
    pub fn parse(self) -> Result<StudentDraft, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        check_text(&mut errors, "name", &self.name, "Name is required");
        let age = match self.age.trim().parse::<i64>() {
            Ok(age) => {
                check_age(&mut errors, age);
                u32::try_from(age).ok()
            }
            Err(_) => {
                errors.insert("age", "Age must be a number");
                None
            }
        };
        check_text(&mut errors, "gender", &self.gender, "Gender is required");
        check_text(&mut errors, "grade", &self.grade, "Grade is required");
        errors.into_result()?;

        Ok(StudentDraft {
            name: self.name.trim().to_string(),
            age: age.unwrap_or_default(),
            gender: self.gender.trim().to_string(),
            grade: self.grade.trim().to_string(),
            email: non_blank(self.email),
            subject: non_blank(self.subject),
            photo: non_blank(self.photo),
        })
    }
}

pub fn validate_draft(draft: &StudentDraft) -> Result<(), ValidationErrors> {
    check_fields(&draft.name, draft.age, &draft.gender, &draft.grade)
}

pub fn validate_record(student: &Student) -> Result<(), ValidationErrors> {
    check_fields(&student.name, student.age, &student.gender, &student.grade)
}

fn check_fields(name: &str, age: u32, gender: &str, grade: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    check_text(&mut errors, "name", name, "Name is required");
    check_age(&mut errors, i64::from(age));
    check_text(&mut errors, "gender", gender, "Gender is required");
    check_text(&mut errors, "grade", grade, "Grade is required");
    errors.into_result()
}

fn check_text(errors: &mut ValidationErrors, field: &str, value: &str, message: &str) {
    if value.trim().is_empty() {
        errors.insert(field, message);
    }
}

fn check_age(errors: &mut ValidationErrors, age: i64) {
    if age < i64::from(MIN_AGE) || age > i64::from(MAX_AGE) {
        errors.insert("age", "Age must be between 5 and 30");
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, age: &str, gender: &str, grade: &str) -> StudentForm {
        StudentForm {
            name: name.into(),
            age: age.into(),
            gender: gender.into(),
            grade: grade.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_form_parses_into_draft() {
        let draft = form(" Alice ", "14", "Female", "8th").parse().unwrap();
        assert_eq!(draft.name, "Alice");
        assert_eq!(draft.age, 14);
        assert_eq!(draft.grade, "8th");
    }

    #[test]
    fn test_empty_name_is_reported() {
        let errors = form("", "14", "Female", "8th").parse().unwrap_err();
        assert!(errors.get("name").is_some());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_age_bounds_and_non_numeric() {
        for age in ["4", "40", "abc", "-3"] {
            let errors = form("A", age, "Male", "6th").parse().unwrap_err();
            assert!(errors.get("age").is_some(), "age {age} should be rejected");
        }
        assert!(form("A", "5", "Male", "6th").parse().is_ok());
        assert!(form("A", "30", "Male", "6th").parse().is_ok());
    }

    #[test]
    fn test_missing_gender_and_grade() {
        let errors = form("Aris", "14", "", " ").parse().unwrap_err();
        assert!(errors.get("gender").is_some());
        assert!(errors.get("grade").is_some());
    }

    #[test]
    fn test_blank_optional_fields_are_dropped() {
        let mut input = form("Aris", "15", "Male", "10th");
        input.email = Some("  ".into());
        input.subject = Some("Math".into());
        let draft = input.parse().unwrap();
        assert_eq!(draft.email, None);
        assert_eq!(draft.subject.as_deref(), Some("Math"));
    }

    #[test]
    fn test_errors_serialize_as_field_map() {
        let errors = form("", "1", "", "").parse().unwrap_err();
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["name"], "Name is required");
        assert_eq!(json["age"], "Age must be between 5 and 30");
    }
}
