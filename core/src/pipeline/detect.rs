//! Entry class detection.
//!
//! This is a textual heuristic, not a Java parser: the first source file (in walk
//! order) that declares `public static void main(String[] ...)` wins. When several
//! files qualify the choice is reported as ambiguous instead of being hidden.

use std::path::{Path, PathBuf};

use lazy_regex::{regex_captures, regex_is_match};

use super::{Grade, StageResult};
use crate::status::Status;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    /// Fully qualified, e.g. `app.Main`.
    pub class_name: String,
    /// Relative to the repository root.
    pub source: PathBuf,
    pub other_candidates: Vec<PathBuf>,
}

impl EntryPoint {
    pub fn ambiguity_note(&self) -> Option<String> {
        if self.other_candidates.is_empty() {
            return None;
        }
        let others: Vec<_> = self
            .other_candidates
            .iter()
            .map(|p| p.to_string_lossy())
            .collect();
        Some(format!(
            "Note: several classes declare main; used {} (also found: {}).",
            self.source.display(),
            others.join(", ")
        ))
    }
}

pub fn has_entry_method(src: &str) -> bool {
    regex_is_match!(
        r"\b(?:public\s+static|static\s+public)\s+void\s+main\s*\(\s*(?:final\s+)?String\s*(?:\[\s*\]\s*\w+|\.\.\.\s*\w+|\w+\s*\[\s*\])\s*\)",
        src
    )
}

pub fn package_name(src: &str) -> Option<&str> {
    regex_captures!(r"(?m)^\s*package\s+([\w.]+)\s*;", src).map(|(_, pkg)| pkg)
}

/// Collects `*.java` files below `root` as paths relative to it.
pub fn find_sources(root: &Path) -> StageResult<Vec<PathBuf>> {
    let files = fsutil::find_files_with_extension(root, "java").map_err(Grade::unknown)?;
    if files.is_empty() {
        return Err(Grade::new(
            Status::Incomplete,
            "No .java files found in the repository.",
        ));
    }
    Ok(files
        .into_iter()
        .map(|p| match p.strip_prefix(root) {
            Ok(rel) => rel.to_owned(),
            Err(_) => p,
        })
        .collect())
}

pub fn detect_entry_point(root: &Path, sources: &[PathBuf]) -> StageResult<EntryPoint> {
    let mut found: Option<(String, PathBuf)> = None;
    let mut others = Vec::new();

    for rel in sources {
        let text = match std::fs::read(root.join(rel)) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                log::warn!("Skipping unreadable source {:?}: {}", rel, e);
                continue;
            }
        };
        if !has_entry_method(&text) {
            continue;
        }
        if found.is_some() {
            others.push(rel.clone());
            continue;
        }

        let Some(stem) = rel.file_stem() else {
            continue;
        };
        let stem = stem.to_string_lossy();
        let class_name = match package_name(&text) {
            Some(pkg) => format!("{}.{}", pkg, stem),
            None => stem.into_owned(),
        };
        found = Some((class_name, rel.clone()));
    }

    let Some((class_name, source)) = found else {
        return Err(Grade::new(
            Status::Incomplete,
            "Could not find a class with a main method.",
        ));
    };
    let entry = EntryPoint {
        class_name,
        source,
        other_candidates: others,
    };
    if let Some(note) = entry.ambiguity_note() {
        log::warn!("{}", note);
    }
    Ok(entry)
}
