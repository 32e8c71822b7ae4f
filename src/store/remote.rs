//! Supabase-backed data service
//!
//! Tables: `questions`, `topics`, `player_configs`, `custom_levels`. The bundled
//! library stays available as a fallback when the remote has no content.

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::supabase::SupabaseClient;
use super::{DataService, PlayerConfig};
use crate::questions::{ProviderError, Question, QuestionLibrary, QuestionProvider, Topic};

#[derive(Debug, Deserialize)]
struct QuestionRow {
    id: serde_json::Value,
    question_text: String,
    options: Vec<String>,
    correct_index: usize,
    topic_id: String,
}

impl From<QuestionRow> for Question {
    fn from(row: QuestionRow) -> Self {
        let id = match row.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        Question {
            id,
            text: row.question_text,
            options: row.options,
            correct_index: row.correct_index,
            topic_id: row.topic_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CustomLevelRow {
    name: String,
    #[serde(default)]
    questions_json: Vec<Question>,
}

#[derive(Debug, Deserialize)]
struct LevelName {
    name: String,
}

/// Data service backed by Supabase tables
pub struct SupabaseDataService {
    client: SupabaseClient,
    fallback: QuestionLibrary,
    rng: Mutex<ChaCha8Rng>,
}

impl SupabaseDataService {
    pub fn new(client: SupabaseClient, fallback: QuestionLibrary) -> Self {
        Self {
            client,
            fallback,
            rng: Mutex::new(ChaCha8Rng::from_entropy()),
        }
    }

    /// Saved level questions, tagged with the level as their topic
    fn sample_level(&self, level: CustomLevelRow, count: usize) -> Vec<Question> {
        let mut rng = self.rng.lock();
        let name = level.name;
        level
            .questions_json
            .choose_multiple(&mut *rng, count)
            .cloned()
            .map(|mut q| {
                q.topic_id = name.clone();
                q
            })
            .collect()
    }

    fn fallback_questions(&self, topic_id: &str, count: usize) -> Vec<Question> {
        let mut rng = self.rng.lock();
        self.fallback.sample(topic_id, count, &mut *rng)
    }
}

#[async_trait]
impl QuestionProvider for SupabaseDataService {
    async fn get_questions(
        &self,
        topic_id: &str,
        count: usize,
    ) -> Result<Vec<Question>, ProviderError> {
        let rows: Vec<QuestionRow> = self
            .client
            .get("questions", &question_filter(topic_id, count))
            .await?;
        if !rows.is_empty() {
            return Ok(rows.into_iter().map(Question::from).collect());
        }

        let levels: Vec<CustomLevelRow> = self
            .client
            .get("custom_levels", &level_filter(topic_id))
            .await?;
        if let Some(level) = levels.into_iter().next() {
            return Ok(self.sample_level(level, count));
        }

        debug!(topic_id, "No remote questions, using bundled library");
        Ok(self.fallback_questions(topic_id, count))
    }
}

#[async_trait]
impl DataService for SupabaseDataService {
    async fn get_all_topics(&self) -> Result<Vec<Topic>, ProviderError> {
        let mut topics = self.fallback.topics().to_vec();

        let remote = match self
            .client
            .get::<Topic>("topics", &[("select", "*".to_string())])
            .await
        {
            Ok(remote) => remote,
            Err(e) => {
                warn!(error = %e, "Failed to list remote topics");
                Vec::new()
            }
        };
        let levels = match self.get_custom_levels().await {
            Ok(levels) => levels.into_iter().map(custom_level_topic).collect(),
            Err(e) => {
                warn!(error = %e, "Failed to list custom levels");
                Vec::new()
            }
        };

        for topic in remote.into_iter().chain(levels) {
            if !topics.iter().any(|t| t.id == topic.id) {
                topics.push(topic);
            }
        }

        Ok(topics)
    }

    async fn save_player_config(&self, config: &PlayerConfig) -> Result<(), ProviderError> {
        self.client
            .upsert("player_configs", config, "name")
            .await
            .map_err(ProviderError::from)
    }

    async fn get_player_config(&self, name: &str) -> Result<Option<PlayerConfig>, ProviderError> {
        self.client
            .get_one("player_configs", &[("name", format!("eq.{name}"))])
            .await
            .map_err(ProviderError::from)
    }

    async fn save_level(&self, name: &str, questions: Vec<Question>) -> Result<(), ProviderError> {
        let row = CustomLevelRow {
            name: name.to_string(),
            questions_json: questions,
        };
        self.client
            .insert("custom_levels", &row)
            .await
            .map_err(ProviderError::from)
    }

    async fn get_custom_levels(&self) -> Result<Vec<String>, ProviderError> {
        let rows: Vec<LevelName> = self
            .client
            .get("custom_levels", &[("select", "name".to_string())])
            .await?;
        Ok(rows.into_iter().map(|r| r.name).collect())
    }
}

fn question_filter(topic_id: &str, count: usize) -> Vec<(&'static str, String)> {
    vec![
        ("topic_id", format!("eq.{topic_id}")),
        ("limit", count.to_string()),
    ]
}

fn level_filter(name: &str) -> Vec<(&'static str, String)> {
    vec![
        ("name", format!("eq.{name}")),
        ("select", "name,questions_json".to_string()),
        ("limit", "1".to_string()),
    ]
}

fn custom_level_topic(name: String) -> Topic {
    Topic {
        id: name.clone(),
        name,
        description: Some("Custom level".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_rows_map_numeric_and_string_ids() {
        let row: QuestionRow = serde_json::from_str(
            r#"{"id": 42, "question_text": "Symbol for Gold?", "options": ["Ag", "Au"],
                "correct_index": 1, "topic_id": "grade-9-science"}"#,
        )
        .expect("row");
        let q = Question::from(row);
        assert_eq!(q.id, "42");
        assert_eq!(q.text, "Symbol for Gold?");
        assert!(q.is_correct(1));

        let row: QuestionRow = serde_json::from_str(
            r#"{"id": "abc", "question_text": "t", "options": [], "correct_index": 0, "topic_id": "x"}"#,
        )
        .expect("row");
        assert_eq!(Question::from(row).id, "abc");
    }

    #[test]
    fn filters_keep_user_text_in_one_value() {
        let filter = question_filter("math&limit=1000", 3);
        assert_eq!(filter[0], ("topic_id", "eq.math&limit=1000".to_string()));
        assert_eq!(filter[1], ("limit", "3".to_string()));

        let filter = level_filter("Tom&select=secret#x");
        assert_eq!(filter[0], ("name", "eq.Tom&select=secret#x".to_string()));
    }

    #[test]
    fn custom_levels_are_playable_topics() {
        let service = SupabaseDataService::new(
            SupabaseClient::new("https://x.supabase.co", "key"),
            QuestionLibrary::new(),
        );
        let level = CustomLevelRow {
            name: "capitals".to_string(),
            questions_json: vec![Question {
                id: "c1".to_string(),
                text: "Capital of France?".to_string(),
                options: vec!["Paris".to_string(), "Rome".to_string()],
                correct_index: 0,
                topic_id: String::new(),
            }],
        };

        let questions = service.sample_level(level, 5);
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].topic_id, "capitals");

        let topic = custom_level_topic("capitals".to_string());
        assert_eq!(topic.id, "capitals");
    }
}
