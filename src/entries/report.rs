use std::fmt::Write;

use time::{macros::format_description, OffsetDateTime, UtcOffset};

use super::repo_types::FoodEntry;

pub const ENTRIES_PER_PAGE: usize = 20;

const TITLE: &str = "Отчет о питании NutriSnap";

/// Plain-text nutrition report, paginated, timestamps rendered in `offset`.
pub fn render_report(entries: &[FoodEntry], offset: UtcOffset) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{TITLE}");

    if entries.is_empty() {
        let _ = writeln!(out, "\nЗаписей нет.");
        return out;
    }

    for (page, chunk) in entries.chunks(ENTRIES_PER_PAGE).enumerate() {
        let _ = writeln!(out, "\n--- Страница {} ---", page + 1);
        for entry in chunk {
            let _ = writeln!(out, "{}: {}", format_timestamp(entry.timestamp, offset), entry.dish_name);
            let _ = writeln!(
                out,
                "    Калории: {} ккал (Б: {}г, Ж: {}г, У: {}г)",
                entry.calories, entry.proteins, entry.fats, entry.carbs
            );
        }
    }
    out
}

fn format_timestamp(millis: i64, offset: UtcOffset) -> String {
    let format = format_description!("[day].[month].[year] [hour]:[minute]");
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .ok()
        .map(|at| at.to_offset(offset))
        .and_then(|at| at.format(format).ok())
        .unwrap_or_else(|| millis.to_string())
}
