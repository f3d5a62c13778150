use chrono::{Datelike, Month, NaiveDate};
use crate::protocol::{ShellError, ShellResult};

const DAY_WIDTH: usize = 2;
const WEEK_HEADER: &str = "Mo Tu We Th Fr Sa Su";

/// Renders a Monday-first text calendar for one month.
///
/// ```text
///    November 2023
/// Mo Tu We Th Fr Sa Su
///        1  2  3  4  5
///  6  7  8  9 10 11 12
/// ```
///
/// Every line ends with a newline and carries no trailing spaces.
pub fn format_month(year: i32, month: u32) -> ShellResult<String> {
    let invalid = || ShellError::Parse(format!("Invalid month/year: {} {}", month, year));

    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let name = u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .ok_or_else(invalid)?
        .name();

    let line_width = 7 * (DAY_WIDTH + 1) - 1;
    let mut out = String::new();

    out.push_str(center(&format!("{} {}", name, year), line_width).trim_end());
    out.push('\n');
    out.push_str(WEEK_HEADER);
    out.push('\n');

    let leading = first.weekday().num_days_from_monday() as usize;
    let mut cells: Vec<Option<u32>> = vec![None; leading];
    cells.extend((1..=days_in_month(first)).map(Some));
    while cells.len() % 7 != 0 {
        cells.push(None);
    }

    for week in cells.chunks(7) {
        let line = week
            .iter()
            .map(|cell| match cell {
                Some(day) => format!("{:>width$}", day, width = DAY_WIDTH),
                None => " ".repeat(DAY_WIDTH),
            })
            .collect::<Vec<_>>()
            .join(" ");
        out.push_str(line.trim_end());
        out.push('\n');
    }

    Ok(out)
}

fn days_in_month(first: NaiveDate) -> u32 {
    let (year, month) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };

    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|next| next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

/// Centers `text` in `width` columns; with an odd margin the extra space goes
/// to the right unless `width` is odd too.
fn center(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.to_string();
    }

    let margin = width - len;
    let left = margin / 2 + (margin & width & 1);
    let right = margin - left;
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(right))
}
