//! Application-level configuration loading, including the question pool sessions are drawn from.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::quiz::{Alternative, Question};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_SPRINT_CONFIG_PATH";

const DEFAULT_QUESTIONS_PER_SESSION: usize = 5;
const DEFAULT_SESSION_ID_ATTEMPTS: u32 = 5;
const DEFAULT_RECENT_SESSIONS_LIMIT: usize = 10;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Number of questions drawn into each new session.
    pub questions_per_session: usize,
    /// How many fresh session ids are tried before giving up on a collision streak.
    pub session_id_attempts: u32,
    /// Upper bound on the recent-sessions listing.
    pub recent_sessions_limit: usize,
    /// Question pool sessions are drawn from.
    pub questions: Vec<Question>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        questions = app_config.questions.len(),
                        "loaded question pool from config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            questions_per_session: DEFAULT_QUESTIONS_PER_SESSION,
            session_id_attempts: DEFAULT_SESSION_ID_ATTEMPTS,
            recent_sessions_limit: DEFAULT_RECENT_SESSIONS_LIMIT,
            questions: default_questions(),
        }
    }
}

fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    questions_per_session: Option<usize>,
    #[serde(default)]
    session_id_attempts: Option<u32>,
    #[serde(default)]
    recent_sessions_limit: Option<usize>,
    #[serde(default)]
    questions: Option<Vec<RawQuestion>>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let questions = match value.questions {
            Some(raw) => {
                let questions: Vec<Question> = raw.into_iter().filter_map(RawQuestion::into_question).collect();
                if questions.is_empty() {
                    warn!("config question pool has no usable question; using built-in pool");
                    default_questions()
                } else {
                    questions
                }
            }
            None => default_questions(),
        };

        Self {
            questions_per_session: value
                .questions_per_session
                .filter(|count| *count > 0)
                .unwrap_or(DEFAULT_QUESTIONS_PER_SESSION),
            session_id_attempts: value
                .session_id_attempts
                .filter(|attempts| *attempts > 0)
                .unwrap_or(DEFAULT_SESSION_ID_ATTEMPTS),
            recent_sessions_limit: value
                .recent_sessions_limit
                .unwrap_or(DEFAULT_RECENT_SESSIONS_LIMIT),
            questions,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
/// JSON representation of a single question inside the configuration file.
struct RawQuestion {
    id: String,
    text: String,
    alternatives: Vec<RawAlternative>,
    correct_answer_id: String,
}

#[derive(Debug, Deserialize)]
struct RawAlternative {
    id: String,
    text: String,
}

impl RawQuestion {
    /// Convert into a [`Question`], dropping entries players could never answer correctly.
    fn into_question(self) -> Option<Question> {
        let question = Question {
            id: self.id,
            text: self.text,
            alternatives: self
                .alternatives
                .into_iter()
                .map(|alt| Alternative {
                    id: alt.id,
                    text: alt.text,
                })
                .collect(),
            correct_answer_id: self.correct_answer_id,
        };

        if question.alternatives.len() < 2 || !question.has_alternative(&question.correct_answer_id) {
            warn!(question_id = %question.id, "skipping malformed question from config");
            return None;
        }
        Some(question)
    }
}

fn question(id: &str, text: &str, alternatives: [&str; 4], correct: usize) -> Question {
    Question {
        id: id.into(),
        text: text.into(),
        alternatives: alternatives
            .iter()
            .enumerate()
            .map(|(index, text)| Alternative {
                id: (index + 1).to_string(),
                text: (*text).into(),
            })
            .collect(),
        correct_answer_id: correct.to_string(),
    }
}

fn default_questions() -> Vec<Question> {
    vec![
        question("1", "What is the capital of France?", ["London", "Paris", "Berlin", "Madrid"], 2),
        question("2", "Which planet is known as the Red Planet?", ["Venus", "Mars", "Jupiter", "Saturn"], 2),
        question(
            "3",
            "What is the largest mammal in the world?",
            ["African Elephant", "Blue Whale", "Giraffe", "Polar Bear"],
            2,
        ),
        question(
            "4",
            "Who painted the Mona Lisa?",
            ["Vincent van Gogh", "Pablo Picasso", "Leonardo da Vinci", "Michelangelo"],
            3,
        ),
        question("5", "What is the chemical symbol for gold?", ["Ag", "Au", "Fe", "Cu"], 2),
        question("6", "How many continents are there?", ["Five", "Six", "Seven", "Eight"], 3),
        question("7", "What is the boiling point of water at sea level in Celsius?", ["90", "100", "110", "120"], 2),
        question(
            "8",
            "Which language has the most native speakers?",
            ["English", "Spanish", "Hindi", "Mandarin Chinese"],
            4,
        ),
        question("9", "What is the smallest prime number?", ["0", "1", "2", "3"], 3),
        question(
            "10",
            "Which ocean is the largest?",
            ["Atlantic", "Indian", "Arctic", "Pacific"],
            4,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pool_is_answerable() {
        let config = AppConfig::default();
        assert_eq!(config.questions_per_session, 5);
        assert!(config.questions.len() >= config.questions_per_session);
        for q in &config.questions {
            assert!(q.has_alternative(&q.correct_answer_id), "question {}", q.id);
        }
    }

    #[test]
    fn raw_config_keeps_valid_questions_and_defaults_missing_fields() {
        let raw: RawConfig = serde_json::from_str(
            r#"{
                "questions_per_session": 1,
                "questions": [
                    {"id": "a", "text": "ok?", "alternatives": [{"id": "y", "text": "yes"}, {"id": "n", "text": "no"}], "correctAnswerId": "y"},
                    {"id": "b", "text": "broken", "alternatives": [{"id": "y", "text": "yes"}], "correctAnswerId": "z"}
                ]
            }"#,
        )
        .unwrap();

        let config: AppConfig = raw.into();
        assert_eq!(config.questions_per_session, 1);
        assert_eq!(config.session_id_attempts, 5);
        assert_eq!(config.recent_sessions_limit, 10);
        assert_eq!(config.questions.len(), 1);
        assert_eq!(config.questions[0].id, "a");
    }
}
