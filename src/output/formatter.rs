use std::io::IsTerminal;
use owo_colors::OwoColorize;
use terminal_size::{Width, terminal_size};

use crate::grade::{GradeValue, RoundingMode};
use crate::record::RecordRow;
use crate::scoring::GradeResult;

/// Check if stdout is a TTY (for auto-detecting color support)
pub fn should_use_colors() -> bool {
    std::io::stdout().is_terminal()
}

/// Get terminal width, defaulting to None for pipes (unlimited)
fn get_terminal_width() -> Option<usize> {
    terminal_size().map(|(Width(w), _)| w as usize)
}

/// Truncate text to fit available width, accounting for Unicode
fn truncate_text(text: &str, max_width: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_width {
        text.to_string()
    } else if max_width > 3 {
        format!("{}...", chars[..max_width - 3].iter().collect::<String>())
    } else {
        chars[..max_width].iter().collect()
    }
}

/// Format a grade as "2.38 (2-3, gut)": exact value, interim mark, verbal grade
pub fn format_grade(grade: &GradeValue) -> String {
    if !grade.is_defined() {
        return "---".to_string();
    }
    let interim = grade.to_display_string(RoundingMode::Interim);
    match grade.verbal_label() {
        Some(label) => format!("{} ({}, {})", grade, interim, label),
        None => format!("{} ({})", grade, interim),
    }
}

fn format_weight(weight: Option<f64>) -> String {
    match weight {
        Some(w) => format!("{:.2}", w),
        None => "-".to_string(),
    }
}

/// Format a calculation result with its breakdown
pub fn format_result(result: &GradeResult, use_colors: bool) -> String {
    let final_grade = format_grade(&result.gesamtnote);
    let mut lines = vec![if use_colors {
        format!("Gesamtnote: {}", final_grade.bold())
    } else {
        format!("Gesamtnote: {}", final_grade)
    }];

    lines.push(format!("  Stand: {}", result.date.format("%d.%m.%Y")));
    lines.push(format!("  schriftlich (m_s1): {}", format_grade(&result.m_s1)));
    lines.push(format!("  schriftlich (m_s):  {}", format_grade(&result.m_s)));
    lines.push(format!("  mündlich (m_m):     {}", format_grade(&result.m_m)));

    let breakdown = &result.breakdown;
    lines.push(format!("  w_s: {:.2}", breakdown.short_test_weight));
    if breakdown.improvement_applied {
        let note = "improvement adjustment applied";
        lines.push(if use_colors {
            format!("  {}", note.yellow())
        } else {
            format!("  {}", note)
        });
    }

    for part in &breakdown.contributions {
        let mean = part.mean.map(|m| m.to_string()).unwrap_or_else(|| "---".to_string());
        let line = format!(
            "    {:<12} {:>6}  x {:>6}  ({} grades)",
            part.label,
            mean,
            format_weight(part.weight),
            part.count
        );
        lines.push(if use_colors {
            line.dimmed().to_string()
        } else {
            line
        });
    }

    lines.join("\n")
}

/// Compare the accumulated grades with the closed-form ones
pub fn format_cross_check(accumulated: &GradeResult, direct: &GradeResult, use_colors: bool) -> String {
    let pairs = [
        ("m_s1", accumulated.m_s1, direct.m_s1),
        ("m_s", accumulated.m_s, direct.m_s),
        ("m_m", accumulated.m_m, direct.m_m),
        ("gesamtnote", accumulated.gesamtnote, direct.gesamtnote),
    ];

    pairs
        .iter()
        .map(|(name, a, b)| {
            let agrees = match (a.value(), b.value()) {
                (Some(x), Some(y)) => (x - y).abs() < 1e-9,
                (x, y) => x == y,
            };
            let verdict = if agrees { "ok" } else { "MISMATCH" };
            let verdict = match (use_colors, agrees) {
                (false, _) => verdict.to_string(),
                (true, true) => verdict.green().to_string(),
                (true, false) => verdict.red().to_string(),
            };
            format!("{:<10} {:>6} {:>6}  {}", name, a.to_string(), b.to_string(), verdict)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format the time series as one line per step
/// Columns: index, date, Gesamtnote, written, oral
pub fn format_timeline(series: &[GradeResult], use_colors: bool) -> String {
    if series.is_empty() {
        return "No grades to show.".to_string();
    }

    series
        .iter()
        .enumerate()
        .map(|(idx, result)| {
            let index_str = format!("{:>2}.", idx + 1);
            let date = result.date.format("%d.%m.%Y").to_string();
            let total = format!(
                "{:>6} {:<4}",
                result.gesamtnote.to_string(),
                result.gesamtnote.to_display_string(RoundingMode::Interim)
            );
            let rest = format!(
                "s {:>6}  m {:>6}",
                result.m_s.to_string(),
                result.m_m.to_string()
            );

            if use_colors {
                format!("{} {}  {}  {}", index_str.dimmed(), date, total.bold(), rest)
            } else {
                format!("{} {}  {}  {}", index_str, date, total, rest)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn period(row: &RecordRow) -> String {
    match (row.from, row.until) {
        (Some(from), Some(until)) if from != until => {
            format!("{} - {}", from.format("%d.%m."), until.format("%d.%m.%Y"))
        }
        _ => String::new(),
    }
}

/// Format records as a table
/// Columns: date, category, number, grade, status, period. The status is
/// shortened to the terminal width.
pub fn format_record_table(rows: &[RecordRow], use_colors: bool) -> String {
    if rows.is_empty() {
        return "No records found.".to_string();
    }

    let term_width = get_terminal_width();
    // date 10, category 4, number 3, grade 6, separators
    let fixed_width = 10 + 2 + 4 + 2 + 3 + 2 + 6 + 2;

    rows.iter()
        .map(|row| {
            let number = row.number.map(|n| n.to_string()).unwrap_or_default();
            let mut status = row.status.clone();
            let period = period(row);
            if !period.is_empty() {
                status = period;
            }
            let status = match term_width {
                Some(width) if width > fixed_width + 10 => truncate_text(&status, width - fixed_width),
                Some(_) => truncate_text(&status, 20),
                None => status,
            };

            let date = row.date.format("%d.%m.%Y").to_string();
            let category = format!("{:<4}", row.category.code());
            let grade = format!("{:>6}", row.grade.to_string());
            if use_colors {
                format!(
                    "{}  {}  {:>3}  {}  {}",
                    date,
                    category.cyan(),
                    number,
                    grade.bold(),
                    status.dimmed()
                )
            } else {
                format!("{}  {}  {:>3}  {}  {}", date, category, number, grade, status)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format records as tab-separated values for scripting
/// Columns: date, category, number, grade, status, from, until, due (no headers, no colors)
pub fn format_tsv(rows: &[RecordRow]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let date = |d: Option<chrono::NaiveDate>| d.map(|d| d.to_string()).unwrap_or_default();
    rows.iter()
        .map(|row| {
            let grade = row.grade.value().map(|v| v.to_string()).unwrap_or_default();
            format!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                row.date,
                row.category.code(),
                row.number.map(|n| n.to_string()).unwrap_or_default(),
                grade,
                row.status,
                date(row.from),
                date(row.until),
                date(row.due)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
