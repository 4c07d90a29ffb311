pub mod error {
    #[allow(unused_imports)]
    pub(crate) use anyhow::{anyhow, bail, ensure, Context as _};
    pub use anyhow::{Error, Result};
}
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use colored::Colorize;
use error::*;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;

use crate::config::Config;
use crate::pipeline::{Grade, Pipeline};
use crate::sheet::{ResultCell, ResultSheet, StudentName, SubmissionRecord, SubmissionSheet};
use crate::status::DisplayStatus;
use crate::style;
use crate::testing::TestCase;

#[derive(Debug, Clone, Default)]
pub struct GradeOptions {
    pub workshop: String,
    /// Only these students; everyone when empty.
    pub students: Vec<String>,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct GradedSubmission {
    pub record: SubmissionRecord,
    pub grade: Grade,
    pub graded_at: DateTime<Local>,
}

impl GradedSubmission {
    pub fn display_status(&self) -> DisplayStatus {
        self.grade.display_status()
    }

    pub fn to_cell(&self) -> ResultCell {
        ResultCell {
            status: self.display_status(),
            details: self.grade.details.clone(),
            graded_at: Some(self.graded_at),
        }
    }
}

pub fn init_wsgrade_dir(dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    if let Ok(config_filepath) = Config::find_file_in_ancestors(dir) {
        bail!(
            "Already in a wsgrade dir.\nIf it's intentional, remove {:?} and then try again.",
            config_filepath
        );
    }

    fsutil::write_with_mkdir(dir.join(Config::FILENAME), Config::example_toml())
        .context("Failed to write example config")?;

    let submissions = dir.join("submissions.json");
    if submissions.exists() {
        log::info!("Keeping existing {:?}", submissions);
    } else {
        fsutil::write(&submissions, Config::example_submissions_json())
            .context("Failed to write example submissions table")?;
    }
    Ok(())
}

/// Narrows `records` to the requested students, keeping roster order.
pub fn select_records(
    records: Vec<SubmissionRecord>,
    students: &[String],
) -> Result<Vec<SubmissionRecord>> {
    if students.is_empty() {
        return Ok(records);
    }
    let wanted: Vec<StudentName> = students.iter().filter_map(|s| StudentName::parse(s)).collect();
    for name in &wanted {
        if !records.iter().any(|r| &r.student == name) {
            log::warn!("Student '{}' is not in the submissions table", name);
        }
    }

    let selected: Vec<_> = records
        .into_iter()
        .filter(|r| wanted.contains(&r.student))
        .collect();
    ensure!(
        !selected.is_empty(),
        "None of the requested students are in the submissions table"
    );
    Ok(selected)
}

/// Grades every record, at most `jobs` at a time. Results keep the order of `records`.
pub async fn grade_submissions(
    pipeline: Pipeline,
    records: Vec<SubmissionRecord>,
    cases: Vec<TestCase>,
    jobs: usize,
) -> Vec<GradedSubmission> {
    let pipeline = Arc::new(pipeline);
    let cases: Arc<[TestCase]> = cases.into();
    let permits = Arc::new(Semaphore::new(jobs.max(1)));

    let style = ProgressStyle::default_spinner()
        .template("{spinner} {msg}")
        .unwrap();
    let progress_bar_container = MultiProgress::new();

    let mut handles = Vec::with_capacity(records.len());
    for record in &records {
        let bar = progress_bar_container
            .add(ProgressBar::new_spinner())
            .with_style(style.clone())
            .with_message(format!("{} ... waiting", record.student));
        bar.enable_steady_tick(Duration::from_millis(80));

        let pipeline = pipeline.clone();
        let cases = cases.clone();
        let permits = permits.clone();
        let record = record.clone();

        handles.push(tokio::spawn(async move {
            let grade = match permits.acquire_owned().await {
                Ok(_permit) => {
                    bar.set_message(format!("{} ... grading", record.student));
                    pipeline.grade(&record, &cases).await
                }
                Err(e) => Grade::unknown(e),
            };
            bar.finish_with_message(format!(
                "{} ... {}",
                record.student,
                style::status_badge(grade.display_status())
            ));
            (grade, Local::now())
        }));
    }

    let mut graded = Vec::with_capacity(records.len());
    for (record, handle) in records.into_iter().zip(handles) {
        let (grade, graded_at) = handle.await.unwrap_or_else(|e| {
            log::error!("[{}] Grading task failed: {}", record.student, e);
            (Grade::unknown(format!("Grading task failed: {}", e)), Local::now())
        });
        graded.push(GradedSubmission {
            record,
            grade,
            graded_at,
        });
    }
    graded
}

pub async fn grade_workshop(cfg: &Config, opts: &GradeOptions) -> Result<Vec<GradedSubmission>> {
    let workshop = opts.workshop.trim();
    let cases = cfg.workshop_cases(workshop)?.to_vec();

    let submissions_path = &cfg.roster.submissions;
    let sheet = SubmissionSheet::load(submissions_path)
        .with_context(|| format!("Failed to load submissions from {:?}", submissions_path))?;
    let roster = sheet.roster(workshop);
    for issue in &roster.issues {
        log::warn!("Skipping submission row: {}", issue);
    }
    ensure!(
        !roster.records.is_empty(),
        "No students to grade in {:?}",
        submissions_path
    );
    let records = select_records(roster.records, &opts.students)?;

    // A broken results table must surface before any student is graded.
    let results = if opts.dry_run {
        None
    } else {
        Some(load_results(&cfg.roster.results)?)
    };

    log::info!(
        "Grading workshop {} for {} student(s) with {} test case(s) (jobs={}, timeout={}s)",
        workshop,
        records.len(),
        cases.len(),
        cfg.grader.jobs,
        cfg.grader.timeout_secs
    );
    let graded = grade_submissions(Pipeline::new(cfg), records, cases, cfg.grader.jobs).await;
    println!();

    graded
        .iter()
        .filter(|g| !g.display_status().is_success())
        .for_each(|g| style::print_grade_detail(g.record.student.as_str(), g.display_status(), &g.grade.details));

    let statuses: Vec<_> = graded.iter().map(GradedSubmission::display_status).collect();
    style::print_grade_summary(&statuses);

    match results {
        Some(sheet) => merge_and_save(sheet, &cfg.roster.results, workshop, &graded)?,
        None => log::info!("Dry run: {:?} was not modified", cfg.roster.results),
    }
    Ok(graded)
}

/// Loads the results table and rejects blank or repeated student names.
pub fn load_results(path: &Path) -> Result<ResultSheet> {
    let sheet = ResultSheet::load_or_default(path)
        .with_context(|| format!("Failed to load results from {:?}", path))?;
    sheet
        .validate()
        .with_context(|| format!("Invalid results table {:?}", path))?;
    Ok(sheet)
}

pub fn save_results(path: &Path, workshop: &str, graded: &[GradedSubmission]) -> Result<()> {
    let sheet = load_results(path)?;
    merge_and_save(sheet, path, workshop, graded)
}

fn merge_and_save(
    mut sheet: ResultSheet,
    path: &Path,
    workshop: &str,
    graded: &[GradedSubmission],
) -> Result<()> {
    let incoming = graded
        .iter()
        .map(|g| (g.record.student.clone(), g.to_cell()))
        .collect();
    let summary = sheet
        .merge(workshop, incoming)
        .with_context(|| format!("Cannot merge results into {:?}", path))?;

    sheet
        .save(path)
        .with_context(|| format!("Failed to save results to {:?}", path))?;
    log::info!(
        "Saved results to {:?} ({} updated, {} added)",
        path,
        summary.updated,
        summary.added
    );
    Ok(())
}

/// Validates the config and both tables, printing what it finds.
pub fn check_wsgrade_dir(cfg: &Config, workshop: Option<&str>) -> Result<()> {
    if let Some(path) = &cfg.source_config_file {
        println!("{} {}", "Config:".bold(), path.to_string_lossy());
    }

    let workshops: Vec<&str> = match workshop {
        Some(w) => {
            cfg.workshop_cases(w)?;
            vec![w.trim()]
        }
        None => cfg.workshops.keys().map(String::as_str).collect(),
    };
    if workshops.is_empty() {
        log::warn!("No workshops are configured");
    }

    let mut problems = 0;

    let submissions_path = &cfg.roster.submissions;
    let sheet = SubmissionSheet::load(submissions_path)
        .with_context(|| format!("Failed to load submissions from {:?}", submissions_path))?;
    println!(
        "{} {} ({} rows)",
        "Submissions:".bold(),
        submissions_path.to_string_lossy(),
        sheet.students.len()
    );
    // Key problems do not depend on the column.
    for issue in sheet.roster("").issues {
        println!("  {} {}", "✗".bright_red(), issue);
        problems += 1;
    }

    for w in &workshops {
        let roster = sheet.roster(w);
        let absent = roster.records.iter().filter(|r| r.repo_url().is_none()).count();
        println!(
            "  Workshop {}: {} test case(s), {} student(s), {} without a repository URL",
            w,
            cfg.workshops.get(*w).map_or(0, |c| c.cases.len()),
            roster.records.len(),
            absent
        );
    }

    let results_path = &cfg.roster.results;
    match ResultSheet::load_or_default(results_path).and_then(|s| s.validate().map(|_| s)) {
        Ok(results) => println!(
            "{} {} ({} rows)",
            "Results:".bold(),
            results_path.to_string_lossy(),
            results.students.len()
        ),
        Err(e) => {
            println!(
                "{} {}\n  {} {}",
                "Results:".bold(),
                results_path.to_string_lossy(),
                "✗".bright_red(),
                e
            );
            problems += 1;
        }
    }

    ensure!(problems == 0, "Found {} problem(s)", problems);
    crate::print_success!("{}", "Everything looks fine.");
    Ok(())
}

pub fn show_results(cfg: &Config, workshop: &str) -> Result<()> {
    let workshop = workshop.trim();
    let path = &cfg.roster.results;
    let sheet = ResultSheet::load_or_default(path)
        .with_context(|| format!("Failed to load results from {:?}", path))?;

    let rows: Vec<(&str, &ResultCell)> = sheet
        .students
        .iter()
        .filter_map(|r| r.workshops.get(workshop).map(|c| (r.name.as_str(), c)))
        .collect();
    ensure!(
        !rows.is_empty(),
        "No results recorded for workshop '{}' in {:?}",
        workshop,
        path
    );

    let width = rows.iter().map(|(name, _)| name.chars().count()).max().unwrap_or(0);
    for (name, cell) in &rows {
        let when = cell
            .graded_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "{:width$}  {}  {}  {}",
            name,
            style::status_badge(cell.status),
            when.dimmed(),
            cell.details.lines().next().unwrap_or(""),
            width = width
        );
    }

    let statuses: Vec<_> = rows.iter().map(|(_, c)| c.status).collect();
    println!();
    style::print_grade_summary(&statuses);
    Ok(())
}
