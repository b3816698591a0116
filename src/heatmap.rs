//! Calendar heatmap layout.
//!
//! A habit's heatmap is a grid of week columns, Sunday first, covering the
//! habit's window `[start_date, start_date + duration_days)`. Cells before the
//! window start or past its end are still emitted so every column is a full
//! week; they carry `in_range = false` and must not react to clicks.

use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

/// Highest intensity tier, reached once a day's count meets the target.
pub const MAX_INTENSITY: u8 = 4;

/// Upper bound on emitted week columns (~5.5 years).
pub const MAX_GRID_WEEKS: u64 = 285;

/// The legend never shows more than this many non-empty swatches.
pub const LEGEND_MAX_STEPS: u32 = 5;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HeatmapError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DayCell {
    pub date: String,
    pub count: u32,
    /// 0 = Sunday .. 6 = Saturday.
    pub day_of_week: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month_label: Option<String>,
    pub intensity_level: u8,
    pub in_range: bool,
}

/// Seven consecutive cells, Sunday through Saturday.
pub type Week = Vec<DayCell>;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LegendSwatch {
    pub count: u32,
    pub level: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeatmapGrid {
    pub start_date: String,
    /// Exclusive end of the habit window.
    pub end_date: String,
    pub target_value: u32,
    pub weeks: Vec<Week>,
    pub legend: Vec<LegendSwatch>,
}

impl HeatmapGrid {
    pub fn cells(&self) -> impl Iterator<Item = &DayCell> {
        self.weeks.iter().flatten()
    }

    pub fn cell(&self, date: &str) -> Option<&DayCell> {
        self.cells().find(|cell| cell.date == date)
    }
}

/// The half-open date range a habit's heatmap is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HabitWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl HabitWindow {
    pub fn parse(start_date: &str, duration_days: i64) -> Result<Self, HeatmapError> {
        let start = parse_date(start_date)?;
        if duration_days < 1 {
            return Err(HeatmapError::InvalidInput(format!(
                "duration must be at least one day, got {duration_days}"
            )));
        }
        // Windows running past the end of the calendar are open-ended.
        let end = start
            .checked_add_days(Days::new(duration_days as u64))
            .unwrap_or(NaiveDate::MAX);
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }
}

pub fn parse_date(value: &str) -> Result<NaiveDate, HeatmapError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|err| HeatmapError::InvalidInput(format!("bad date {value:?}: {err}")))
}

pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Maps a day's count onto one of five shading tiers.
///
/// Zero is always tier 0 and anything at or above the target is tier 4;
/// partial progress rounds up, so any activity at all is visible.
pub fn intensity_level(count: u32, target_value: u32) -> u8 {
    let target = u64::from(target_value.max(1));
    let count = u64::from(count);
    if count == 0 {
        return 0;
    }
    if count >= target {
        return MAX_INTENSITY;
    }
    (count * u64::from(MAX_INTENSITY)).div_ceil(target) as u8
}

/// Legend swatches from "Less" to "More", one per count `0..=min(target, 5)`.
pub fn legend(target_value: u32) -> Vec<LegendSwatch> {
    let target = target_value.max(1);
    (0..=target.min(LEGEND_MAX_STEPS))
        .map(|count| LegendSwatch {
            count,
            level: intensity_level(count, target),
        })
        .collect()
}

pub fn build_grid(
    logs: &BTreeMap<String, u32>,
    start_date: &str,
    duration_days: i64,
    target_value: u32,
) -> Result<HeatmapGrid, HeatmapError> {
    let window = HabitWindow::parse(start_date, duration_days)?;
    let target = target_value.max(1);

    let day_offset = u64::from(window.start.weekday().num_days_from_sunday());
    let grid_start = window
        .start
        .checked_sub_days(Days::new(day_offset))
        .ok_or_else(|| {
            HeatmapError::InvalidInput(format!("start date {start_date} out of range"))
        })?;
    let week_count = (duration_days as u64)
        .saturating_add(day_offset)
        .div_ceil(7)
        .min(MAX_GRID_WEEKS);

    let mut weeks = Vec::with_capacity(week_count as usize);
    let mut current = Some(grid_start);
    for _ in 0..week_count {
        let mut week = Vec::with_capacity(7);
        for _ in 0..7 {
            let Some(date) = current else { break };
            week.push(day_cell(date, logs, &window, target));
            current = date.succ_opt();
        }
        if week.len() < 7 {
            break;
        }
        weeks.push(week);
    }

    Ok(HeatmapGrid {
        start_date: date_key(window.start),
        end_date: date_key(window.end),
        target_value: target,
        weeks,
        legend: legend(target),
    })
}

/// Forwards a click to `on_click_day` only for cells inside the habit window
/// of an interactive (manual check-in) heatmap. Returns whether it fired.
pub fn click_day<F>(cell: &DayCell, interactive: bool, mut on_click_day: F) -> bool
where
    F: FnMut(&str),
{
    if !(interactive && cell.in_range) {
        return false;
    }
    on_click_day(&cell.date);
    true
}

fn day_cell(
    date: NaiveDate,
    logs: &BTreeMap<String, u32>,
    window: &HabitWindow,
    target: u32,
) -> DayCell {
    let key = date_key(date);
    let count = logs.get(&key).copied().unwrap_or(0);
    let month_label = (date.day() == 1).then(|| date.format("%b").to_string());

    DayCell {
        count,
        day_of_week: date.weekday().num_days_from_sunday() as u8,
        month_label,
        intensity_level: intensity_level(count, target),
        in_range: window.contains(date),
        date: key,
    }
}
