use std::collections::BTreeMap;

use colored::{Color, ColoredString, Colorize};
use crossterm::terminal;

use crate::status::DisplayStatus;

#[macro_export]
macro_rules! print_success {
    ($fmt:literal, $($e:tt)*) => {
        use ::colored::Colorize as _;
        println!("{}", format!($fmt, $($e)*).green())
    }
}

pub fn is_truecolor_supported() -> bool {
    let Ok(v) = std::env::var("COLORTERM") else {
        return false
    };
    match v.as_str() {
        "truecolor" | "24bit" => true,
        _ => false,
    }
}

pub trait ColorTheme {
    fn color(&self) -> Color;
}

impl ColorTheme for log::Level {
    fn color(&self) -> Color {
        use log::Level::*;
        match self {
            Error => Color::BrightRed,
            Warn => Color::BrightYellow,
            Info => Color::Cyan,
            Debug => Color::Magenta,
            Trace => Color::Blue,
        }
    }
}

impl ColorTheme for DisplayStatus {
    fn color(&self) -> Color {
        use DisplayStatus::*;
        if !self::is_truecolor_supported() {
            return match self {
                Complete => Color::Green,
                PartialComplete => Color::Yellow,
                RuntimeError => Color::Magenta,
                Incomplete => Color::Red,
                Absent => Color::BrightBlack,
                UnknownError => Color::BrightRed,
            };
        }

        match self {
            Complete => Color::TrueColor {
                r: 30,
                g: 180,
                b: 40,
            },
            PartialComplete => Color::TrueColor {
                r: 210,
                g: 138,
                b: 4,
            },
            RuntimeError => Color::TrueColor {
                r: 171,
                g: 40,
                b: 200,
            },
            Incomplete => Color::TrueColor {
                r: 220,
                g: 42,
                b: 42,
            },
            Absent => Color::TrueColor {
                r: 110,
                g: 110,
                b: 110,
            },
            UnknownError => Color::TrueColor {
                r: 255,
                g: 80,
                b: 80,
            },
        }
    }
}

pub fn status_badge(status: DisplayStatus) -> ColoredString {
    let fg = if is_truecolor_supported() {
        Color::TrueColor {
            r: 255,
            g: 255,
            b: 255,
        }
    } else {
        Color::BrightWhite
    };
    format!(" {} ", status)
        .on_color(status.color())
        .bold()
        .color(fg)
}

/// Counts per status, in the order of the display vocabulary.
pub fn count_statuses(statuses: &[DisplayStatus]) -> BTreeMap<DisplayStatus, usize> {
    statuses.iter().fold(BTreeMap::new(), |mut count, &s| {
        *count.entry(s).or_default() += 1;
        count
    })
}

pub fn print_grade_summary(statuses: &[DisplayStatus]) {
    let bar = "-".repeat(5);
    print!("{} ", bar);

    let count = count_statuses(statuses);
    let num_total = statuses.len();
    let num_complete = *count.get(&DisplayStatus::Complete).unwrap_or(&0);

    if num_total == 0 {
        print!("{}", "Nothing graded".dimmed());
    } else if num_complete == num_total {
        let msg = format!("All {} submissions complete ✨", num_total);
        print!("{}", msg.green());
    } else {
        let summary_msg = format!("{}/{} complete", num_complete, num_total);
        let detail_msg = count
            .iter()
            .filter(|(&status, _)| status != DisplayStatus::Complete)
            .map(|(&status, &cnt)| {
                format!(
                    "{}{}{}",
                    self::status_badge(status),
                    "x".dimmed(),
                    cnt.to_string().bold().bright_white(),
                )
            })
            .collect::<Vec<String>>()
            .join(", ");

        print!("{} ({})", summary_msg.bright_red(), detail_msg);
    }

    println!(" {}", bar);
}

/// Prints the recorded details of one student between two rules.
pub fn print_grade_detail(student: &str, status: DisplayStatus, details: &str) {
    let (cols, _) = terminal::size().unwrap_or((40, 40));

    const BOLD_LINE: &str = "━";
    let bold_bar = BOLD_LINE.repeat(cols as usize).blue().bold();

    println!(
        "\n{}: {}\n{}",
        student.color(Color::BrightYellow).bold(),
        self::status_badge(status),
        bold_bar,
    );

    if details.trim().is_empty() {
        println!("{}", "<EMPTY>".magenta().dimmed());
    } else {
        println!("{}", details.trim_end());
    }

    println!("{}", bold_bar);
}
