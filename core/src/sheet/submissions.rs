use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
};

use serde::{Deserialize, Serialize};

use super::{error::*, StudentName};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionSheet {
    #[serde(default)]
    pub students: Vec<SubmissionRow>,
}

/// One student with a repository URL per workshop column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRow {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub repos: BTreeMap<String, Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub student: StudentName,
    pub repo_url: Option<String>,
}

impl SubmissionRecord {
    /// The URL, unless it is missing or blank.
    pub fn repo_url(&self) -> Option<&str> {
        self.repo_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// Records ready for grading, plus the rows that had to be left out.
#[derive(Debug, Default)]
pub struct Roster {
    pub records: Vec<SubmissionRecord>,
    pub issues: Vec<SheetError>,
}

impl SubmissionSheet {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(fsutil::read_json_with_deserialize(path)?)
    }

    /// Selects the column of `workshop`.
    ///
    /// Rows with a blank name are skipped. When a name repeats, the first row is kept
    /// and every later one is reported.
    pub fn roster(&self, workshop: &str) -> Roster {
        let workshop = workshop.trim();
        let mut roster = Roster::default();
        let mut seen: HashMap<StudentName, usize> = HashMap::new();

        for (i, row) in self.students.iter().enumerate() {
            let row_no = i + 1;
            let Some(student) = StudentName::parse(&row.name) else {
                roster.issues.push(SheetError::BlankName { row: row_no });
                continue;
            };
            if let Some(&first) = seen.get(&student) {
                roster.issues.push(SheetError::DuplicateName {
                    name: student.to_string(),
                    first,
                    second: row_no,
                });
                continue;
            }
            seen.insert(student.clone(), row_no);

            let repo_url = row.repos.get(workshop).cloned().flatten();
            roster.records.push(SubmissionRecord { student, repo_url });
        }
        roster
    }
}
