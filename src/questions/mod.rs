//! Questions, topics and the provider contract the match consumes

pub mod library;
pub mod template;

pub use library::QuestionLibrary;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::store::SupabaseError;

/// A multiple-choice question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    #[serde(alias = "correctIndex")]
    pub correct_index: usize,
    #[serde(default, alias = "topicId")]
    pub topic_id: String,
}

impl Question {
    pub fn is_correct(&self, option_index: usize) -> bool {
        option_index == self.correct_index
    }

    /// View safe to show before the question is answered
    pub fn view(&self) -> QuestionView {
        QuestionView {
            id: self.id.clone(),
            text: self.text.clone(),
            options: self.options.clone(),
            topic_id: self.topic_id.clone(),
        }
    }
}

/// Question as shown to players, without the answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    pub topic_id: String,
}

/// Question category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Source of questions for a topic.
///
/// May fail or return fewer than `count` questions; callers tolerate both.
#[async_trait]
pub trait QuestionProvider: Send + Sync {
    async fn get_questions(&self, topic_id: &str, count: usize)
        -> Result<Vec<Question>, ProviderError>;
}

/// Question and persistence backend errors
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Supabase error: {0}")]
    Supabase(#[from] SupabaseError),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}
