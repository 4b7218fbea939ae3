use super::student::{Student, StudentPatch};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roster {
    students: Vec<Student>,
}

impl Roster {
    pub fn new(students: Vec<Student>) -> Self {
        Self { students }
    }

    pub fn as_slice(&self) -> &[Student] {
        &self.students
    }

    pub fn into_inner(self) -> Vec<Student> {
        self.students
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Student> {
        self.students.iter()
    }

    pub fn find(&self, id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.matches_id(id))
    }

    /// Appends the record, assigning a local id when it has none.
    pub fn insert(&mut self, mut student: Student) -> Student {
        student.ensure_local_id();
        self.students.push(student.clone());
        student
    }

    pub fn update(&mut self, id: &str, patch: &StudentPatch) -> Option<Student> {
        let student = self.students.iter_mut().find(|s| s.matches_id(id))?;
        student.apply_patch(patch);
        Some(student.clone())
    }

    pub fn remove(&mut self, id: &str) -> Option<Student> {
        let index = self.students.iter().position(|s| s.matches_id(id))?;
        Some(self.students.remove(index))
    }

    /// Records the server id for the entry created under `local_id`.
    pub fn reconcile(&mut self, local_id: &str, server_id: &str) -> bool {
        match self
            .students
            .iter_mut()
            .find(|s| s.local_id.as_deref() == Some(local_id))
        {
            Some(student) => {
                student.server_id = Some(server_id.to_string());
                true
            }
            None => false,
        }
    }
}

impl From<Vec<Student>> for Roster {
    fn from(students: Vec<Student>) -> Self {
        Self::new(students)
    }
}

impl IntoIterator for Roster {
    type Item = Student;
    type IntoIter = std::vec::IntoIter<Student>;

    fn into_iter(self) -> Self::IntoIter {
        self.students.into_iter()
    }
}
