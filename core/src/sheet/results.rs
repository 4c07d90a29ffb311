use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::{error::*, StudentName};
use crate::status::DisplayStatus;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSheet {
    #[serde(default)]
    pub students: Vec<ResultRow>,
}

/// One student, one cell per graded workshop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub workshops: BTreeMap<String, ResultCell>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultCell {
    pub status: DisplayStatus,
    #[serde(default)]
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graded_at: Option<DateTime<Local>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub added: usize,
    pub updated: usize,
}

/// Indexes rows by validated name, rejecting blank and repeated names.
fn index_by_name<'a, I>(names: I) -> Result<HashMap<StudentName, usize>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut index = HashMap::new();
    for (i, raw) in names.into_iter().enumerate() {
        let name = StudentName::parse(raw).ok_or(SheetError::BlankName { row: i + 1 })?;
        if let Some(&first) = index.get(&name) {
            return Err(SheetError::DuplicateName {
                name: name.to_string(),
                first: first + 1,
                second: i + 1,
            });
        }
        index.insert(name, i);
    }
    Ok(index)
}

impl ResultSheet {
    /// A missing file is an empty table; anything unreadable is an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("No results file at {:?} yet, starting a new one", path);
            return Ok(Self::default());
        }
        Ok(fsutil::read_json_with_deserialize(path)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        Ok(fsutil::write_json_atomically(path, self)?)
    }

    /// Fails on the first blank or repeated student name.
    pub fn validate(&self) -> Result<()> {
        index_by_name(self.students.iter().map(|r| r.name.as_str())).map(|_| ())
    }

    pub fn cell(&self, student: &str, workshop: &str) -> Option<&ResultCell> {
        let student = StudentName::parse(student)?;
        self.students
            .iter()
            .find(|r| StudentName::parse(&r.name).as_ref() == Some(&student))
            .and_then(|r| r.workshops.get(workshop.trim()))
    }

    /// Outer join on the student name: cells of `workshop` are replaced for students
    /// already present, new students are appended, everyone else is left untouched.
    ///
    /// Both sides are validated before anything changes, so a blank or repeated name
    /// leaves the table as it was.
    pub fn merge(
        &mut self,
        workshop: &str,
        incoming: Vec<(StudentName, ResultCell)>,
    ) -> Result<MergeSummary> {
        let workshop = workshop.trim();
        let existing = index_by_name(self.students.iter().map(|r| r.name.as_str()))?;
        index_by_name(incoming.iter().map(|(name, _)| name.as_str()))?;

        let mut summary = MergeSummary::default();
        for (name, cell) in incoming {
            match existing.get(&name) {
                Some(&i) => {
                    self.students[i].workshops.insert(workshop.to_owned(), cell);
                    summary.updated += 1;
                }
                None => {
                    self.students.push(ResultRow {
                        name: name.to_string(),
                        workshops: BTreeMap::from([(workshop.to_owned(), cell)]),
                    });
                    summary.added += 1;
                }
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn cell(status: DisplayStatus, details: &str) -> ResultCell {
        ResultCell {
            status,
            details: details.into(),
            graded_at: None,
        }
    }

    fn name(s: &str) -> StudentName {
        StudentName::parse(s).unwrap()
    }

    fn sheet_with(rows: &[(&str, &str, ResultCell)]) -> ResultSheet {
        ResultSheet {
            students: rows
                .iter()
                .map(|(n, w, c)| ResultRow {
                    name: (*n).into(),
                    workshops: BTreeMap::from([((*w).to_owned(), c.clone())]),
                })
                .collect(),
        }
    }

    #[test]
    fn merge_is_an_outer_join() {
        use DisplayStatus::*;
        let mut sheet = sheet_with(&[
            ("Alice", "1", cell(Complete, "w1")),
            ("Bob", "1", cell(Absent, "w1")),
        ]);

        let summary = sheet
            .merge(
                "2",
                vec![
                    (name("Bob"), cell(PartialComplete, "w2")),
                    (name("Dave"), cell(RuntimeError, "w2")),
                ],
            )
            .unwrap();
        assert_eq!(summary, MergeSummary { added: 1, updated: 1 });

        // Alice only exists on the old side and keeps her row.
        assert_eq!(sheet.cell("Alice", "1"), Some(&cell(Complete, "w1")));
        assert_eq!(sheet.cell("Alice", "2"), None);
        // Bob exists on both sides: workshop 1 untouched, workshop 2 added.
        assert_eq!(sheet.cell("Bob", "1"), Some(&cell(Absent, "w1")));
        assert_eq!(sheet.cell("Bob", "2"), Some(&cell(PartialComplete, "w2")));
        // Dave only exists on the new side and is appended.
        assert_eq!(sheet.students.last().unwrap().name, "Dave");
        assert_eq!(sheet.cell(" Dave ", "2"), Some(&cell(RuntimeError, "w2")));
    }

    #[test]
    fn regrading_replaces_the_cell() {
        use DisplayStatus::*;
        let mut sheet = sheet_with(&[("Alice", "1", cell(Incomplete, "old"))]);
        let summary = sheet
            .merge("1", vec![(name("Alice"), cell(Complete, "new"))])
            .unwrap();
        assert_eq!(summary, MergeSummary { added: 0, updated: 1 });
        assert_eq!(sheet.students.len(), 1);
        assert_eq!(sheet.cell("Alice", "1"), Some(&cell(Complete, "new")));
    }

    #[test]
    fn duplicate_incoming_names_are_rejected_without_changes() {
        use DisplayStatus::*;
        let mut sheet = sheet_with(&[("Alice", "1", cell(Complete, ""))]);
        let before = sheet.clone();
        let err = sheet
            .merge(
                "1",
                vec![
                    (name("Bob"), cell(Complete, "")),
                    (name("Bob"), cell(Absent, "")),
                ],
            )
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Student 'Bob' appears more than once (rows 1 and 2)"
        );
        assert_eq!(sheet, before);
    }

    #[test]
    fn corrupt_existing_keys_are_reported() {
        use DisplayStatus::*;
        let mut sheet = sheet_with(&[
            ("Alice", "1", cell(Complete, "")),
            ("", "1", cell(Complete, "")),
        ]);
        let err = sheet.merge("1", vec![]).unwrap_err();
        assert!(matches!(err, SheetError::BlankName { row: 2 }));

        let mut sheet = sheet_with(&[
            ("Alice", "1", cell(Complete, "")),
            ("Alice ", "1", cell(Complete, "")),
        ]);
        let err = sheet.merge("1", vec![]).unwrap_err();
        assert!(matches!(err, SheetError::DuplicateName { first: 1, second: 2, .. }));
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");

        let empty = ResultSheet::load_or_default(&path).unwrap();
        assert_eq!(empty, ResultSheet::default());

        let mut sheet = ResultSheet::default();
        sheet
            .merge(
                "1",
                vec![(name("Alice"), cell(DisplayStatus::PartialComplete, "1/2"))],
            )
            .unwrap();
        sheet.save(&path).unwrap();

        let loaded = ResultSheet::load_or_default(&path).unwrap();
        assert_eq!(loaded, sheet);
        let raw = fsutil::read_to_string(&path).unwrap();
        assert!(raw.contains(r#""status": "Partial Complete""#));
    }

    #[test]
    fn hand_edited_status_becomes_unknown_error() {
        let sheet: ResultSheet = serde_json::from_str(
            r#"{ "students": [ { "name": "Alice",
                "workshops": { "1": { "status": "looks fine to me" } } } ] }"#,
        )
        .unwrap();
        assert_eq!(
            sheet.cell("Alice", "1").unwrap().status,
            DisplayStatus::UnknownError
        );
    }
}
