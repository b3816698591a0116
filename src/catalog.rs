//! User-scoped categories, habits and todos.
//!
//! Every operation works on an [`AppData`] document. Handlers pass a working
//! copy that only replaces the shared document once it has been saved.

use crate::heatmap::{self, HabitWindow, HeatmapError};
use crate::models::{
    AppData, Category, CheckInResponse, ColorSpec, Habit, HabitForm, Todo, TodoRequest,
    UserDataResponse,
};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

pub const DEFAULT_CATEGORY: &str = "Default";
pub const MAX_TARGET_VALUE: i64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Invalid(String),
    #[error("habit {0:?} is a manual check-in habit and cannot be linked to todos")]
    ManualHabitLink(String),
    #[error(transparent)]
    Heatmap(#[from] HeatmapError),
}

/// A validated [`HabitForm`].
#[derive(Debug, Clone)]
pub struct HabitDraft {
    pub name: String,
    pub category: String,
    pub color: ColorSpec,
    pub is_manual: bool,
    pub start_date: String,
    pub duration_days: i64,
    pub description: Option<String>,
    pub target_value: u32,
    pub daily_reminder: bool,
}

impl HabitDraft {
    pub fn from_form(form: &HabitForm, today: NaiveDate) -> Result<Self, CatalogError> {
        let name = form.name.trim();
        if name.is_empty() {
            return Err(CatalogError::Invalid("habit name is required".into()));
        }

        let color = ColorSpec::parse(&form.color)
            .ok_or_else(|| CatalogError::Invalid(format!("unknown colour {:?}", form.color)))?;

        let start = match form.start_date.as_deref() {
            Some(raw) if !raw.trim().is_empty() => heatmap::parse_date(raw)?,
            _ => today,
        };

        let duration_days = form
            .duration_value
            .max(1)
            .saturating_mul(form.duration_unit.days());
        HabitWindow::parse(&heatmap::date_key(start), duration_days)?;

        Ok(Self {
            name: name.to_string(),
            category: form.category.clone(),
            color,
            is_manual: form.is_manual,
            start_date: heatmap::date_key(start),
            duration_days,
            description: form
                .description
                .as_deref()
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_string),
            target_value: form.target_value.clamp(1, MAX_TARGET_VALUE) as u32,
            daily_reminder: form.daily_reminder,
        })
    }
}

pub fn user_data(data: &AppData, user_id: &str) -> UserDataResponse {
    UserDataResponse {
        categories: sorted_categories(data, user_id),
        habits: data
            .habits
            .iter()
            .filter(|habit| habit.user_id == user_id)
            .cloned()
            .collect(),
        todos: data
            .todos
            .iter()
            .filter(|todo| todo.user_id == user_id)
            .cloned()
            .collect(),
    }
}

pub fn sorted_categories(data: &AppData, user_id: &str) -> Vec<Category> {
    let mut categories: Vec<Category> = data
        .categories
        .iter()
        .filter(|category| category.user_id == user_id)
        .cloned()
        .collect();
    categories.sort_by_key(|category| category.order);
    categories
}

/// Finds a category by case-insensitive name, creating it when missing.
/// A blank name resolves to the default category.
pub fn resolve_category(data: &mut AppData, user_id: &str, name: &str) -> Category {
    let name = match name.trim() {
        "" => DEFAULT_CATEGORY,
        trimmed => trimmed,
    };
    let wanted = name.to_lowercase();

    if let Some(existing) = data
        .categories
        .iter()
        .find(|category| category.user_id == user_id && category.name.to_lowercase() == wanted)
    {
        return existing.clone();
    }

    let order = data
        .categories
        .iter()
        .filter(|category| category.user_id == user_id)
        .count() as u32;
    let category = Category {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        name: name.to_string(),
        order,
    };
    data.categories.push(category.clone());
    category
}

/// Applies a drag-and-drop result: `ids[i]` gets order `i`.
///
/// `ids` must list every category of the user exactly once.
pub fn reorder_categories(
    data: &mut AppData,
    user_id: &str,
    ids: &[String],
) -> Result<Vec<Category>, CatalogError> {
    let mut seen = BTreeSet::new();
    for id in ids {
        let known = data
            .categories
            .iter()
            .any(|category| category.user_id == user_id && &category.id == id);
        if !known {
            return Err(CatalogError::Invalid(format!("unknown category id {id}")));
        }
        if !seen.insert(id.as_str()) {
            return Err(CatalogError::Invalid(format!("duplicate category id {id}")));
        }
    }

    let owned = data
        .categories
        .iter()
        .filter(|category| category.user_id == user_id)
        .count();
    if seen.len() != owned {
        return Err(CatalogError::Invalid(format!(
            "order lists {} of {owned} categories",
            seen.len()
        )));
    }

    for category in data
        .categories
        .iter_mut()
        .filter(|category| category.user_id == user_id)
    {
        if let Some(position) = ids.iter().position(|id| *id == category.id) {
            category.order = position as u32;
        }
    }
    Ok(sorted_categories(data, user_id))
}

pub fn delete_category(
    data: &mut AppData,
    user_id: &str,
    category_id: &str,
) -> Result<(), CatalogError> {
    let before = data.categories.len();
    data.categories
        .retain(|category| !(category.user_id == user_id && category.id == category_id));
    if data.categories.len() == before {
        return Err(CatalogError::NotFound("category"));
    }

    let removed: Vec<String> = data
        .habits
        .iter()
        .filter(|habit| habit.user_id == user_id && habit.category_id == category_id)
        .map(|habit| habit.id.clone())
        .collect();
    for habit_id in &removed {
        remove_habit(data, user_id, habit_id);
    }
    Ok(())
}

pub fn create_habit(data: &mut AppData, user_id: &str, draft: HabitDraft) -> Habit {
    let category = resolve_category(data, user_id, &draft.category);
    let habit = Habit {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        name: draft.name,
        category_id: category.id,
        color: draft.color,
        is_manual: draft.is_manual,
        logs: BTreeMap::new(),
        description: draft.description,
        start_date: draft.start_date,
        duration_days: draft.duration_days,
        is_visible_on_dashboard: true,
        target_value: draft.target_value,
        daily_reminder: draft.daily_reminder,
    };
    data.habits.push(habit.clone());
    habit
}

pub fn update_habit(
    data: &mut AppData,
    user_id: &str,
    habit_id: &str,
    draft: HabitDraft,
) -> Result<Habit, CatalogError> {
    find_habit(data, user_id, habit_id)?;
    let category = resolve_category(data, user_id, &draft.category);

    let habit = find_habit_mut(data, user_id, habit_id)?;
    habit.name = draft.name;
    habit.category_id = category.id;
    habit.color = draft.color;
    habit.is_manual = draft.is_manual;
    habit.start_date = draft.start_date;
    habit.duration_days = draft.duration_days;
    habit.description = draft.description;
    habit.target_value = draft.target_value;
    habit.daily_reminder = draft.daily_reminder;
    let is_manual = habit.is_manual;

    if !is_manual {
        sync_task_logs(data, user_id);
    }
    find_habit(data, user_id, habit_id).cloned()
}

pub fn delete_habit(
    data: &mut AppData,
    user_id: &str,
    habit_id: &str,
) -> Result<(), CatalogError> {
    find_habit(data, user_id, habit_id)?;
    remove_habit(data, user_id, habit_id);
    Ok(())
}

pub fn set_visibility(
    data: &mut AppData,
    user_id: &str,
    habit_id: &str,
    visible: bool,
) -> Result<Habit, CatalogError> {
    let habit = find_habit_mut(data, user_id, habit_id)?;
    habit.is_visible_on_dashboard = visible;
    Ok(habit.clone())
}

/// Cycles a manual habit's count for `date`: one more check-in, or back to
/// zero once the target has been reached.
pub fn check_in(
    data: &mut AppData,
    user_id: &str,
    habit_id: &str,
    date: &str,
) -> Result<CheckInResponse, CatalogError> {
    let habit = find_habit_mut(data, user_id, habit_id)?;
    if !habit.is_manual {
        return Err(CatalogError::Invalid(
            "task-driven habits are updated by completing todos".into(),
        ));
    }

    let day = heatmap::parse_date(date)?;
    let window = HabitWindow::parse(&habit.start_date, habit.duration_days)?;
    if !window.contains(day) {
        return Err(CatalogError::Invalid(format!(
            "{date} is outside the habit window"
        )));
    }

    let key = heatmap::date_key(day);
    let target = habit.target_value.max(1);
    let current = habit.logs.get(&key).copied().unwrap_or(0);
    let next = if current >= target { 0 } else { current + 1 };
    habit.logs.insert(key.clone(), next);
    Ok(CheckInResponse {
        habit_id: habit.id.clone(),
        date: key,
        count: next,
        intensity_level: heatmap::intensity_level(next, target),
    })
}

/// Rebuilds the logs of the user's task-driven habits from completed todos.
pub fn sync_task_logs(data: &mut AppData, user_id: &str) {
    let mut counts: BTreeMap<&str, BTreeMap<String, u32>> = BTreeMap::new();
    for todo in data
        .todos
        .iter()
        .filter(|todo| todo.user_id == user_id && todo.completed)
    {
        if let Some(habit_id) = todo.habit_id.as_deref() {
            *counts
                .entry(habit_id)
                .or_default()
                .entry(todo.date.clone())
                .or_default() += 1;
        }
    }

    for habit in data
        .habits
        .iter_mut()
        .filter(|habit| habit.user_id == user_id && !habit.is_manual)
    {
        habit.logs = counts.remove(habit.id.as_str()).unwrap_or_default();
    }
}

pub fn add_todo(
    data: &mut AppData,
    user_id: &str,
    request: &TodoRequest,
    today: NaiveDate,
    created_at: i64,
) -> Result<Todo, CatalogError> {
    let text = request.text.trim();
    if text.is_empty() {
        return Err(CatalogError::Invalid("todo text is required".into()));
    }

    let habit_id = match request.habit.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => Some(link_habit(
            data,
            user_id,
            name,
            request.category.as_deref().unwrap_or(""),
            today,
        )?),
        _ => None,
    };

    let todo = Todo {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        text: text.to_string(),
        completed: false,
        habit_id,
        date: heatmap::date_key(today),
        created_at,
    };
    data.todos.push(todo.clone());
    sync_task_logs(data, user_id);
    Ok(todo)
}

pub fn toggle_todo(
    data: &mut AppData,
    user_id: &str,
    todo_id: &str,
) -> Result<Todo, CatalogError> {
    let todo = data
        .todos
        .iter_mut()
        .find(|todo| todo.user_id == user_id && todo.id == todo_id)
        .ok_or(CatalogError::NotFound("todo"))?;
    todo.completed = !todo.completed;
    let toggled = todo.clone();
    sync_task_logs(data, user_id);
    Ok(toggled)
}

pub fn delete_todo(
    data: &mut AppData,
    user_id: &str,
    todo_id: &str,
) -> Result<(), CatalogError> {
    let before = data.todos.len();
    data.todos
        .retain(|todo| !(todo.user_id == user_id && todo.id == todo_id));
    if data.todos.len() == before {
        return Err(CatalogError::NotFound("todo"));
    }
    sync_task_logs(data, user_id);
    Ok(())
}

/// Habits asking for a daily reminder that have not met today's target.
/// The list is handed out once per user per day; later calls that day
/// return nothing.
pub fn take_due_reminders(data: &mut AppData, user_id: &str, today: NaiveDate) -> Vec<Habit> {
    let key = heatmap::date_key(today);
    if data.reminders_seen.get(user_id) == Some(&key) {
        return Vec::new();
    }

    let due: Vec<Habit> = data
        .habits
        .iter()
        .filter(|habit| {
            habit.user_id == user_id
                && habit.daily_reminder
                && habit.logs.get(&key).copied().unwrap_or(0) < habit.target_value
        })
        .cloned()
        .collect();

    if !due.is_empty() {
        data.reminders_seen.insert(user_id.to_string(), key);
    }
    due
}

pub fn find_habit<'a>(
    data: &'a AppData,
    user_id: &str,
    habit_id: &str,
) -> Result<&'a Habit, CatalogError> {
    data.habits
        .iter()
        .find(|habit| habit.user_id == user_id && habit.id == habit_id)
        .ok_or(CatalogError::NotFound("habit"))
}

fn find_habit_mut<'a>(
    data: &'a mut AppData,
    user_id: &str,
    habit_id: &str,
) -> Result<&'a mut Habit, CatalogError> {
    data.habits
        .iter_mut()
        .find(|habit| habit.user_id == user_id && habit.id == habit_id)
        .ok_or(CatalogError::NotFound("habit"))
}

fn remove_habit(data: &mut AppData, user_id: &str, habit_id: &str) {
    data.habits
        .retain(|habit| !(habit.user_id == user_id && habit.id == habit_id));
    for todo in data
        .todos
        .iter_mut()
        .filter(|todo| todo.user_id == user_id && todo.habit_id.as_deref() == Some(habit_id))
    {
        todo.habit_id = None;
    }
}

/// Resolves the habit a new todo links to, creating a task-driven habit
/// when no habit of that name exists yet.
fn link_habit(
    data: &mut AppData,
    user_id: &str,
    name: &str,
    category: &str,
    today: NaiveDate,
) -> Result<String, CatalogError> {
    let wanted = name.to_lowercase();
    if let Some(existing) = data
        .habits
        .iter()
        .find(|habit| habit.user_id == user_id && habit.name.to_lowercase() == wanted)
    {
        if existing.is_manual {
            return Err(CatalogError::ManualHabitLink(existing.name.clone()));
        }
        return Ok(existing.id.clone());
    }

    let habit = create_habit(
        data,
        user_id,
        HabitDraft {
            name: name.to_string(),
            category: category.to_string(),
            color: ColorSpec::default(),
            is_manual: false,
            start_date: heatmap::date_key(today),
            duration_days: 365,
            description: None,
            target_value: 1,
            daily_reminder: false,
        },
    );
    Ok(habit.id)
}
