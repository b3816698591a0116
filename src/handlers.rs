use crate::auth;
use crate::catalog::{self, HabitDraft};
use crate::coach::{self, CoachReport};
use crate::errors::AppError;
use crate::heatmap::{self, HeatmapGrid};
use crate::models::{
    AnalyzeRequest, Category, CategoryRequest, CheckInRequest, CheckInResponse,
    Credentials, Habit, HabitForm, Preferences, PublicUser, RemindersResponse, ReorderRequest,
    SessionResponse, SmartTodosRequest, SmartTodosResponse, Todo, TodoRequest, UserDataResponse,
    VisibilityRequest,
};
use crate::state::AppState;
use crate::ui::{render_heatmap, render_index};
use axum::{
    extract::{FromRequestParts, Path, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::Html,
    Json,
};
use chrono::{Local, NaiveDate, Utc};
use tracing::{info, warn};

/// The user behind the request's bearer token.
pub struct CurrentUser {
    pub user: PublicUser,
    pub token: String,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::unauthorized("missing bearer token"))?;

        let data = state.data.lock().await;
        let user = auth::session_user(&data, token)
            .ok_or_else(|| AppError::unauthorized("unknown or expired session"))?;
        Ok(Self {
            user,
            token: token.to_string(),
        })
    }
}

pub async fn index() -> Html<String> {
    Html(render_index(&today_string()))
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<Credentials>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state
        .commit(|data| auth::register(data, &payload.username, &payload.password))
        .await?;
    info!(username = %session.user.username, "registered user");
    Ok(Json(session))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<Credentials>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state
        .commit(|data| {
            auth::login(data, &payload.username, &payload.password).inspect_err(|_| {
                warn!(username = %payload.username.trim(), "login rejected");
            })
        })
        .await?;
    info!(username = %session.user.username, "user signed in");
    Ok(Json(session))
}

pub async fn logout(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<StatusCode, AppError> {
    state
        .commit(|data| Ok::<_, AppError>(auth::logout(data, &current.token)))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_data(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Json<UserDataResponse> {
    let data = state.data.lock().await;
    Json(catalog::user_data(&data, &current.user.id))
}

pub async fn create_category(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<CategoryRequest>,
) -> Result<Json<Category>, AppError> {
    let category = state
        .commit(|data| {
            Ok::<_, AppError>(catalog::resolve_category(
                data,
                &current.user.id,
                &payload.name,
            ))
        })
        .await?;
    Ok(Json(category))
}

pub async fn reorder_categories(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<ReorderRequest>,
) -> Result<Json<Vec<Category>>, AppError> {
    let categories = state
        .commit(|data| catalog::reorder_categories(data, &current.user.id, &payload.ids))
        .await?;
    Ok(Json(categories))
}

pub async fn delete_category(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(category_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .commit(|data| catalog::delete_category(data, &current.user.id, &category_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_habit(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(form): Json<HabitForm>,
) -> Result<Json<Habit>, AppError> {
    let draft = HabitDraft::from_form(&form, today())?;
    let habit = state
        .commit(|data| Ok::<_, AppError>(catalog::create_habit(data, &current.user.id, draft)))
        .await?;
    Ok(Json(habit))
}

pub async fn update_habit(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(habit_id): Path<String>,
    Json(form): Json<HabitForm>,
) -> Result<Json<Habit>, AppError> {
    let mut draft = HabitDraft::from_form(&form, today())?;

    if form.smart_replan {
        if let Some(client) = state.coach.as_deref() {
            let existing = {
                let data = state.data.lock().await;
                catalog::find_habit(&data, &current.user.id, &habit_id)?.clone()
            };
            let mut pending = existing;
            pending.name = draft.name.clone();
            pending.start_date = draft.start_date.clone();
            match coach::velocity_replan(client, &pending, draft.duration_days, today()).await {
                Ok(replan) => {
                    info!(
                        habit = %habit_id,
                        days = replan.new_duration_days,
                        reasoning = %replan.reasoning,
                        "duration replanned"
                    );
                    draft.duration_days = replan.new_duration_days;
                }
                Err(err) => warn!("replan failed: {err}"),
            }
        }
    }

    let habit = state
        .commit(|data| catalog::update_habit(data, &current.user.id, &habit_id, draft))
        .await?;
    Ok(Json(habit))
}

pub async fn delete_habit(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(habit_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .commit(|data| catalog::delete_habit(data, &current.user.id, &habit_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_visibility(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(habit_id): Path<String>,
    Json(payload): Json<VisibilityRequest>,
) -> Result<Json<Habit>, AppError> {
    let habit = state
        .commit(|data| {
            catalog::set_visibility(data, &current.user.id, &habit_id, payload.visible)
        })
        .await?;
    Ok(Json(habit))
}

pub async fn check_in(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(habit_id): Path<String>,
    Json(payload): Json<CheckInRequest>,
) -> Result<Json<CheckInResponse>, AppError> {
    let response = state
        .commit(|data| catalog::check_in(data, &current.user.id, &habit_id, &payload.date))
        .await?;
    Ok(Json(response))
}

pub async fn get_heatmap(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(habit_id): Path<String>,
) -> Result<Json<HeatmapGrid>, AppError> {
    let data = state.data.lock().await;
    let habit = catalog::find_habit(&data, &current.user.id, &habit_id)?;
    Ok(Json(habit_grid(habit)?))
}

pub async fn heatmap_fragment(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(habit_id): Path<String>,
) -> Result<Html<String>, AppError> {
    let data = state.data.lock().await;
    let habit = catalog::find_habit(&data, &current.user.id, &habit_id)?;
    let grid = habit_grid(habit)?;
    Ok(Html(render_heatmap(habit, &grid)))
}

pub async fn add_todo(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<TodoRequest>,
) -> Result<Json<Todo>, AppError> {
    let created_at = Utc::now().timestamp_millis();
    let todo = state
        .commit(|data| catalog::add_todo(data, &current.user.id, &payload, today(), created_at))
        .await?;
    Ok(Json(todo))
}

pub async fn toggle_todo(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(todo_id): Path<String>,
) -> Result<Json<Todo>, AppError> {
    let todo = state
        .commit(|data| catalog::toggle_todo(data, &current.user.id, &todo_id))
        .await?;
    Ok(Json(todo))
}

pub async fn delete_todo(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(todo_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .commit(|data| catalog::delete_todo(data, &current.user.id, &todo_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_reminders(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<RemindersResponse>, AppError> {
    let date = today();
    let habits = state
        .commit(|data| {
            Ok::<_, AppError>(catalog::take_due_reminders(data, &current.user.id, date))
        })
        .await?;
    Ok(Json(RemindersResponse {
        date: heatmap::date_key(date),
        habits,
    }))
}

pub async fn get_preferences(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Json<Preferences> {
    let data = state.data.lock().await;
    Json(
        data.preferences
            .get(&current.user.id)
            .cloned()
            .unwrap_or_default(),
    )
}

pub async fn put_preferences(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<Preferences>,
) -> Result<Json<Preferences>, AppError> {
    if !payload.custom_color.starts_with('#') {
        return Err(AppError::bad_request("custom_color must be a #hex colour"));
    }
    state
        .commit(|data| {
            data.preferences
                .insert(current.user.id.clone(), payload.clone());
            Ok::<_, AppError>(())
        })
        .await?;
    Ok(Json(payload))
}

pub async fn analyze(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<AnalyzeRequest>,
) -> Result<Json<CoachReport>, AppError> {
    let client = state.coach()?;
    let start = optional_date(payload.start_date.as_deref())?;
    let end = optional_date(payload.end_date.as_deref())?;

    let summary = {
        let data = state.data.lock().await;
        let scoped = catalog::user_data(&data, &current.user.id);
        coach::build_analysis_summary(&scoped.habits, &scoped.todos, start, end, today())
    };

    match coach::analyze(client, &summary).await {
        Ok(report) => Ok(Json(report)),
        Err(err) => {
            warn!("coach analysis failed: {err}");
            Err(err.into())
        }
    }
}

pub async fn smart_todos(
    State(state): State<AppState>,
    _current: CurrentUser,
    Json(payload): Json<SmartTodosRequest>,
) -> Result<Json<SmartTodosResponse>, AppError> {
    let client = state.coach()?;
    let suggestions = coach::smart_todos(client, payload.habit_name.trim()).await;
    Ok(Json(SmartTodosResponse { suggestions }))
}

fn habit_grid(habit: &Habit) -> Result<HeatmapGrid, AppError> {
    Ok(heatmap::build_grid(
        &habit.logs,
        &habit.start_date,
        habit.duration_days,
        habit.target_value,
    )?)
}

fn optional_date(raw: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    match raw.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(Some(heatmap::parse_date(value)?)),
        _ => Ok(None),
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn today_string() -> String {
    today().to_string()
}
