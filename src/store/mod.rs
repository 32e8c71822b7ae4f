//! Persistence and question backends
//!
//! Two interchangeable data services: a local one backed by the bundled
//! question library and in-memory records, and a Supabase one.

pub mod local;
pub mod remote;
pub mod supabase;

pub use local::LocalDataService;
pub use remote::SupabaseDataService;
pub use supabase::{SupabaseClient, SupabaseError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::questions::{ProviderError, Question, Topic};

/// Saved per-player setup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    pub name: String,
    /// Enabled topic ids
    #[serde(default)]
    pub topics: Vec<String>,
}

/// Setup-time persistence. Never called while a round is running.
#[async_trait]
pub trait DataService: Send + Sync {
    async fn get_all_topics(&self) -> Result<Vec<Topic>, ProviderError>;

    async fn save_player_config(&self, config: &PlayerConfig) -> Result<(), ProviderError>;

    async fn get_player_config(&self, name: &str) -> Result<Option<PlayerConfig>, ProviderError>;

    /// Store a custom question set; it becomes a topic named `name`
    async fn save_level(&self, name: &str, questions: Vec<Question>) -> Result<(), ProviderError>;

    async fn get_custom_levels(&self) -> Result<Vec<String>, ProviderError>;
}
