use crate::domain::entities::Student;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterFilter {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub grade: Option<String>,
}

impl RosterFilter {
    pub fn matches(&self, student: &Student) -> bool {
        if let Some(name) = non_blank(&self.name) {
            if !student.name.to_lowercase().contains(&name.to_lowercase()) {
                return false;
            }
        }
        if let Some(age) = self.age {
            if student.age != age {
                return false;
            }
        }
        if let Some(gender) = non_blank(&self.gender) {
            if student.gender != gender {
                return false;
            }
        }
        if let Some(grade) = non_blank(&self.grade) {
            if student.grade != grade {
                return false;
            }
        }
        true
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    Name,
    Age,
    Gender,
    Grade,
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(SortField::Name),
            "age" => Ok(SortField::Age),
            "gender" => Ok(SortField::Gender),
            "grade" => Ok(SortField::Grade),
            other => Err(format!("Unknown sort field: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    /// 1-based.
    pub page: usize,
    pub per_page: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterQuery {
    #[serde(default)]
    pub filter: RosterFilter,
    pub sort: Option<(SortField, SortDirection)>,
    pub page: Option<PageRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterPage {
    pub items: Vec<Student>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeCount {
    pub grade: String,
    pub count: usize,
}

impl RosterQuery {
    /// Filters, sorts and paginates. Without a page request every match is
    /// returned as a single page.
    pub fn run(&self, students: &[Student]) -> Result<RosterPage, String> {
        let mut items: Vec<Student> = students
            .iter()
            .filter(|s| self.filter.matches(s))
            .cloned()
            .collect();

        if let Some((field, direction)) = self.sort {
            sort_students(&mut items, field, direction);
        }

        let total = items.len();
        match self.page {
            Some(request) => paginate(items, total, request),
            None => Ok(RosterPage {
                items,
                total,
                page: 1,
                per_page: total.max(1),
                total_pages: usize::from(total > 0),
            }),
        }
    }
}

pub fn sort_students(students: &mut [Student], field: SortField, direction: SortDirection) {
    students.sort_by(|a, b| {
        let ordering = match field {
            SortField::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SortField::Age => a.age.cmp(&b.age),
            SortField::Gender => a.gender.to_lowercase().cmp(&b.gender.to_lowercase()),
            SortField::Grade => compare_grades(&a.grade, &b.grade),
        };
        match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

fn paginate(items: Vec<Student>, total: usize, request: PageRequest) -> Result<RosterPage, String> {
    if request.page == 0 {
        return Err("Page numbers start at 1".to_string());
    }
    if request.per_page == 0 {
        return Err("Page size must be at least 1".to_string());
    }

    let total_pages = total.div_ceil(request.per_page);
    let start = (request.page - 1).saturating_mul(request.per_page);
    let items = items
        .into_iter()
        .skip(start)
        .take(request.per_page)
        .collect();

    Ok(RosterPage {
        items,
        total,
        page: request.page,
        per_page: request.per_page,
        total_pages,
    })
}

/// Leading integer first (`"9th" < "10th"`), then the full text.
pub fn compare_grades(a: &str, b: &str) -> Ordering {
    match (leading_number(a), leading_number(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

fn leading_number(grade: &str) -> Option<u64> {
    let digits: String = grade
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

pub fn grade_distribution(students: &[Student]) -> Vec<GradeCount> {
    let mut counts: Vec<GradeCount> = Vec::new();
    for student in students {
        match counts.iter_mut().find(|c| c.grade == student.grade) {
            Some(entry) => entry.count += 1,
            None => counts.push(GradeCount {
                grade: student.grade.clone(),
                count: 1,
            }),
        }
    }
    counts.sort_by(|a, b| compare_grades(&a.grade, &b.grade));
    counts
}
