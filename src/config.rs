use crate::coach::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use std::{env, path::PathBuf};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_path: PathBuf,
    pub api_key: Option<String>,
    pub coach_model: String,
    pub coach_base_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            port: non_empty("PORT")
                .and_then(|value| value.parse::<u16>().ok())
                .unwrap_or(8080),
            data_path: non_empty("APP_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/state.json")),
            api_key: non_empty("API_KEY").or_else(|| non_empty("GEMINI_API_KEY")),
            coach_model: non_empty("COACH_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            coach_base_url: non_empty("COACH_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }
}
