//! Local data service: bundled library plus in-memory records

use std::collections::BTreeMap;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use super::{DataService, PlayerConfig};
use crate::questions::library::QuestionTemplate;
use crate::questions::{ProviderError, Question, QuestionLibrary, QuestionProvider, Topic};

/// Data service that never leaves the process
pub struct LocalDataService {
    library: RwLock<QuestionLibrary>,
    custom_levels: RwLock<BTreeMap<String, usize>>,
    player_configs: DashMap<String, PlayerConfig>,
    rng: Mutex<ChaCha8Rng>,
}

impl LocalDataService {
    pub fn new(library: QuestionLibrary) -> Self {
        Self::with_rng(library, ChaCha8Rng::from_entropy())
    }

    /// Deterministic question order, for tests
    pub fn with_rng(library: QuestionLibrary, rng: ChaCha8Rng) -> Self {
        Self {
            library: RwLock::new(library),
            custom_levels: RwLock::new(BTreeMap::new()),
            player_configs: DashMap::new(),
            rng: Mutex::new(rng),
        }
    }
}

#[async_trait]
impl QuestionProvider for LocalDataService {
    async fn get_questions(
        &self,
        topic_id: &str,
        count: usize,
    ) -> Result<Vec<Question>, ProviderError> {
        let library = self.library.read();
        let mut rng = self.rng.lock();
        Ok(library.sample(topic_id, count, &mut *rng))
    }
}

#[async_trait]
impl DataService for LocalDataService {
    async fn get_all_topics(&self) -> Result<Vec<Topic>, ProviderError> {
        Ok(self.library.read().topics().to_vec())
    }

    async fn save_player_config(&self, config: &PlayerConfig) -> Result<(), ProviderError> {
        if config.name.trim().is_empty() {
            return Err(ProviderError::InvalidRecord("player name is empty".to_string()));
        }
        self.player_configs
            .insert(config.name.clone(), config.clone());
        Ok(())
    }

    async fn get_player_config(&self, name: &str) -> Result<Option<PlayerConfig>, ProviderError> {
        Ok(self.player_configs.get(name).map(|c| c.value().clone()))
    }

    async fn save_level(&self, name: &str, questions: Vec<Question>) -> Result<(), ProviderError> {
        if name.trim().is_empty() {
            return Err(ProviderError::InvalidRecord("level name is empty".to_string()));
        }

        let bundled = self.library.read().topic(name).is_some()
            && !self.custom_levels.read().contains_key(name);
        if bundled {
            return Err(ProviderError::InvalidRecord(format!("{name} is a bundled topic")));
        }

        let count = questions.len();
        let topic = Topic {
            id: name.to_string(),
            name: name.to_string(),
            description: Some("Custom level".to_string()),
        };
        let templates = questions.into_iter().map(QuestionTemplate::from).collect();

        self.library.write().insert_topic(topic, templates);
        self.custom_levels.write().insert(name.to_string(), count);

        info!(level = name, questions = count, "Saved custom level");
        Ok(())
    }

    async fn get_custom_levels(&self) -> Result<Vec<String>, ProviderError> {
        Ok(self.custom_levels.read().keys().cloned().collect())
    }
}
