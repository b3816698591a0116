//! Generative coaching: habit analysis, todo suggestions and duration
//! replanning backed by a generative-language API.

use crate::heatmap;
use crate::models::{Habit, Todo};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const RECENT_TODO_LIMIT: usize = 20;
const RECENT_LOG_LIMIT: usize = 10;

pub const FALLBACK_TODOS: [&str; 3] = [
    "Just start for 5 minutes",
    "Review your goals",
    "Prepare for tomorrow",
];

#[derive(Debug, thiserror::Error)]
pub enum CoachError {
    #[error("API Key not found")]
    MissingApiKey,
    #[error("coaching request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("coaching service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed coaching response: {0}")]
    MalformedResponse(String),
}

/// Turns a prompt into the model's text reply.
#[async_trait]
pub trait CoachClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, CoachError>;
}

pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[async_trait]
impl CoachClient for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, CoachError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "responseMimeType": "application/json" }
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoachError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: GenerateResponse = response.json().await?;
        let text: String = payload
            .candidates
            .into_iter()
            .next()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(CoachError::MalformedResponse("empty candidate".into()));
        }
        debug!(chars = text.len(), "coach reply received");
        Ok(text)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnalysisPeriod {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HabitActivity {
    pub name: String,
    pub mode: &'static str,
    /// Most recent log entries in the period, newest first.
    pub activity: Vec<(String, u32)>,
    pub total_active_days_in_period: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TaskSample {
    pub task: String,
    pub completed: bool,
    pub date: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnalysisSummary {
    pub analysis_period: AnalysisPeriod,
    pub habits: Vec<HabitActivity>,
    pub tasks_sample: Vec<TaskSample>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CoachReport {
    pub score: u8,
    pub summary: String,
    pub advice: String,
    pub motivational_quote: String,
}

#[derive(Debug, Deserialize)]
struct RawReport {
    score: f64,
    summary: String,
    advice: String,
    #[serde(alias = "motivationalQuote")]
    motivational_quote: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Replan {
    #[serde(alias = "newDurationDays")]
    pub new_duration_days: i64,
    pub reasoning: String,
}

/// Condenses habits and todos within `[start, end]` (inclusive, either side
/// open when `None`) into the payload sent to the coach.
pub fn build_analysis_summary(
    habits: &[Habit],
    todos: &[Todo],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> AnalysisSummary {
    let within = |raw: &str| match heatmap::parse_date(raw) {
        Ok(date) => start.is_none_or(|s| date >= s) && end.is_none_or(|e| date <= e),
        Err(_) => false,
    };

    let habits = habits
        .iter()
        .map(|habit| {
            let mut activity: Vec<(String, u32)> = habit
                .logs
                .iter()
                .filter(|(date, _)| within(date))
                .map(|(date, count)| (date.clone(), *count))
                .collect();
            let total_active_days_in_period =
                activity.iter().filter(|(_, count)| *count > 0).count();
            activity.reverse();
            activity.truncate(RECENT_LOG_LIMIT);

            HabitActivity {
                name: habit.name.clone(),
                mode: if habit.is_manual {
                    "Manual Check-in"
                } else {
                    "Task Driven"
                },
                activity,
                total_active_days_in_period,
            }
        })
        .collect();

    let filtered: Vec<&Todo> = todos.iter().filter(|todo| within(&todo.date)).collect();
    let skip = filtered.len().saturating_sub(RECENT_TODO_LIMIT);
    let tasks_sample = filtered
        .into_iter()
        .skip(skip)
        .map(|todo| TaskSample {
            task: todo.text.clone(),
            completed: todo.completed,
            date: todo.date.clone(),
        })
        .collect();

    AnalysisSummary {
        analysis_period: AnalysisPeriod {
            start: start
                .map(heatmap::date_key)
                .unwrap_or_else(|| "All time".to_string()),
            end: heatmap::date_key(end.unwrap_or(today)),
        },
        habits,
        tasks_sample,
    }
}

pub async fn analyze(
    client: &dyn CoachClient,
    summary: &AnalysisSummary,
) -> Result<CoachReport, CoachError> {
    let data = serde_json::to_string(summary)
        .map_err(|err| CoachError::MalformedResponse(err.to_string()))?;
    let prompt = format!(
        "You are a world-class productivity coach.\n\
         Analyze the following user data (JSON) regarding their habits and to-do list usage.\n\n\
         Data: {data}\n\n\
         Respond with JSON only, in this shape:\n\
         {{\"score\": number (0-100, consistency in the selected period), \
         \"summary\": \"two-sentence summary of their performance\", \
         \"advice\": \"one specific, actionable piece of advice\", \
         \"motivationalQuote\": \"a short relevant quote\"}}"
    );

    let raw: RawReport = parse_reply(&client.generate(&prompt).await?)?;
    Ok(CoachReport {
        score: raw.score.round().clamp(0.0, 100.0) as u8,
        summary: raw.summary,
        advice: raw.advice,
        motivational_quote: raw.motivational_quote,
    })
}

/// Three small todo suggestions for a habit; never fails, falling back to
/// generic suggestions when the coach is unreachable or replies nonsense.
pub async fn smart_todos(client: &dyn CoachClient, habit_name: &str) -> Vec<String> {
    let prompt = format!(
        "Generate 3 specific, actionable, small to-do list items that would help someone \
         achieve progress in the habit category: {habit_name:?}.\n\
         Return ONLY a JSON array of strings."
    );

    let reply = match client.generate(&prompt).await {
        Ok(reply) => reply,
        Err(err) => {
            warn!("todo suggestion failed: {err}");
            return fallback_todos();
        }
    };

    match parse_reply::<Vec<String>>(&reply) {
        Ok(mut items) => {
            items.retain(|item| !item.trim().is_empty());
            items.truncate(FALLBACK_TODOS.len());
            if items.is_empty() {
                fallback_todos()
            } else {
                items
            }
        }
        Err(err) => {
            warn!("todo suggestion unreadable: {err}");
            fallback_todos()
        }
    }
}

pub async fn velocity_replan(
    client: &dyn CoachClient,
    habit: &Habit,
    duration_days: i64,
    today: NaiveDate,
) -> Result<Replan, CoachError> {
    let days_passed = heatmap::parse_date(&habit.start_date)
        .map(|start| (today - start).num_days())
        .unwrap_or(0);
    let active_days = habit.logs.values().filter(|count| **count > 0).count();
    let prompt = format!(
        "The user is tracking a habit: {name:?}.\n\
         - Start Date: {start}\n\
         - Current Target Duration: {duration_days} days\n\
         - Days Passed Since Start: {days_passed}\n\
         - Active Days Logged: {active_days}\n\
         - Current Date: {today}\n\n\
         Estimate their velocity (active rate) and a new realistic total duration in days \
         for the volume of work the original goal implied, extending it significantly if \
         they are far behind. Give a reasoning of at most 15 words.\n\
         Return JSON ONLY: {{\"newDurationDays\": number, \"reasoning\": \"string\"}}",
        name = habit.name,
        start = habit.start_date,
        today = heatmap::date_key(today),
    );

    let replan: Replan = parse_reply(&client.generate(&prompt).await?)?;
    if replan.new_duration_days < 1 {
        return Err(CoachError::MalformedResponse(format!(
            "non-positive duration {}",
            replan.new_duration_days
        )));
    }
    Ok(replan)
}

fn fallback_todos() -> Vec<String> {
    FALLBACK_TODOS.iter().map(|item| item.to_string()).collect()
}

/// Parses a JSON reply, tolerating a surrounding markdown code fence.
fn parse_reply<T: DeserializeOwned>(reply: &str) -> Result<T, CoachError> {
    let mut text = reply.trim();
    if let Some(rest) = text.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        text = rest.strip_suffix("```").unwrap_or(rest).trim();
    }
    serde_json::from_str(text).map_err(|err| CoachError::MalformedResponse(err.to_string()))
}
