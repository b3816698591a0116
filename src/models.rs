use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub salt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicUser {
    pub id: String,
    pub username: String,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub order: u32,
}

/// Heatmap colour: either a palette name ("blue") or a `#rrggbb` code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ColorSpec {
    Named { name: String },
    Hex { value: String },
}

impl Default for ColorSpec {
    fn default() -> Self {
        Self::Named {
            name: "blue".to_string(),
        }
    }
}

impl ColorSpec {
    /// Accepts `#abc`, `#aabbcc`, bare palette names and the
    /// `bg-<name>-500` class form older clients send.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Some(Self::default());
        }

        if let Some(digits) = raw.strip_prefix('#') {
            let valid = matches!(digits.len(), 3 | 6)
                && digits.chars().all(|c| c.is_ascii_hexdigit());
            return valid.then(|| Self::Hex {
                value: format!("#{}", digits.to_ascii_lowercase()),
            });
        }

        let name = raw.strip_prefix("bg-").unwrap_or(raw);
        let name = match name.rsplit_once('-') {
            Some((base, shade)) if shade.chars().all(|c| c.is_ascii_digit()) => base,
            _ => name,
        };
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        Some(Self::Named {
            name: name.to_ascii_lowercase(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Habit {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub category_id: String,
    #[serde(default)]
    pub color: ColorSpec,
    pub is_manual: bool,
    #[serde(default)]
    pub logs: BTreeMap<String, u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_date: String,
    pub duration_days: i64,
    pub is_visible_on_dashboard: bool,
    pub target_value: u32,
    #[serde(default)]
    pub daily_reminder: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub user_id: String,
    pub text: String,
    pub completed: bool,
    /// Linked task-driven habit; `None` for standalone todos.
    pub habit_id: Option<String>,
    pub date: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Dark,
    Light,
    Custom,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Zh,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Preferences {
    pub theme: ThemeMode,
    pub custom_color: String,
    pub language: Language,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: ThemeMode::default(),
            custom_color: "#0f172a".to_string(),
            language: Language::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppData {
    pub users: Vec<User>,
    /// Session token -> user id.
    pub sessions: BTreeMap<String, String>,
    pub categories: Vec<Category>,
    pub habits: Vec<Habit>,
    pub todos: Vec<Todo>,
    pub preferences: BTreeMap<String, Preferences>,
    /// User id -> last date the reminder list was shown.
    pub reminders_seen: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct UserDataResponse {
    pub categories: Vec<Category>,
    pub habits: Vec<Habit>,
    pub todos: Vec<Todo>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    Day,
    Week,
    Month,
    #[default]
    Year,
}

impl DurationUnit {
    pub fn days(self) -> i64 {
        match self {
            Self::Day => 1,
            Self::Week => 7,
            Self::Month => 30,
            Self::Year => 365,
        }
    }
}

fn default_one() -> i64 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct HabitForm {
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub is_manual: bool,
    pub start_date: Option<String>,
    #[serde(default = "default_one")]
    pub duration_value: i64,
    #[serde(default)]
    pub duration_unit: DurationUnit,
    pub description: Option<String>,
    #[serde(default = "default_one")]
    pub target_value: i64,
    #[serde(default)]
    pub daily_reminder: bool,
    #[serde(default)]
    pub smart_replan: bool,
}

#[derive(Debug, Deserialize)]
pub struct VisibilityRequest {
    pub visible: bool,
}

#[derive(Debug, Deserialize)]
pub struct CheckInRequest {
    pub date: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckInResponse {
    pub habit_id: String,
    pub date: String,
    pub count: u32,
    pub intensity_level: u8,
}

#[derive(Debug, Deserialize)]
pub struct TodoRequest {
    pub text: String,
    pub habit: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RemindersResponse {
    pub date: String,
    pub habits: Vec<Habit>,
}

#[derive(Debug, Deserialize, Default)]
pub struct AnalyzeRequest {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SmartTodosRequest {
    pub habit_name: String,
}

#[derive(Debug, Serialize)]
pub struct SmartTodosResponse {
    pub suggestions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_spec_accepts_legacy_forms() {
        assert_eq!(
            ColorSpec::parse("bg-emerald-500"),
            Some(ColorSpec::Named {
                name: "emerald".to_string()
            })
        );
        assert_eq!(
            ColorSpec::parse("#A1B2C3"),
            Some(ColorSpec::Hex {
                value: "#a1b2c3".to_string()
            })
        );
        assert_eq!(ColorSpec::parse(""), Some(ColorSpec::default()));
        assert_eq!(ColorSpec::parse("#12345"), None);
        assert_eq!(ColorSpec::parse("red;<script>"), None);
    }

    #[test]
    fn color_spec_serializes_tagged() {
        let value = serde_json::to_value(ColorSpec::Hex {
            value: "#ffffff".to_string(),
        })
        .unwrap();
        assert_eq!(value, serde_json::json!({ "kind": "hex", "value": "#ffffff" }));
    }

    #[test]
    fn app_data_tolerates_missing_sections() {
        let data: AppData = serde_json::from_str(r#"{ "users": [] }"#).unwrap();
        assert!(data.habits.is_empty());
        assert!(data.sessions.is_empty());
    }
}
