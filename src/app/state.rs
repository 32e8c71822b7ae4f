//! Application state shared across routes

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::game::roster::CharacterCatalog;
use crate::game::MatchRegistry;
use crate::questions::{QuestionLibrary, QuestionProvider};
use crate::store::{DataService, LocalDataService, SupabaseClient, SupabaseDataService};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Setup-time persistence (topics, player configs, custom levels)
    pub data_service: Arc<dyn DataService>,
    /// Question source handed to each match
    pub question_provider: Arc<dyn QuestionProvider>,
    pub match_registry: Arc<MatchRegistry>,
    pub catalog: CharacterCatalog,
}

impl AppState {
    pub fn new(config: Config, library: QuestionLibrary) -> Self {
        let config = Arc::new(config);

        // One backend serves both roles
        let (data_service, question_provider): (Arc<dyn DataService>, Arc<dyn QuestionProvider>) =
            match &config.supabase {
                Some(supabase) => {
                    info!(url = %supabase.url, "Using Supabase data service");
                    let client = SupabaseClient::new(&supabase.url, &supabase.service_role_key);
                    let service = Arc::new(SupabaseDataService::new(client, library));
                    (service.clone(), service)
                }
                None => {
                    info!("Using local data service");
                    let service = Arc::new(LocalDataService::new(library));
                    (service.clone(), service)
                }
            };

        Self {
            config,
            data_service,
            question_provider,
            match_registry: Arc::new(MatchRegistry::new()),
            catalog: CharacterCatalog::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_backend_serves_library_topics() {
        let config = Config::from_lookup(|_| None).expect("config");
        let mut library = QuestionLibrary::new();
        library
            .load_str(
                "colors",
                r#"[{"id":"c1","text":"Sky?","options":["Blue","Red"],"correct_index":0}]"#,
            )
            .expect("topic");

        let state = AppState::new(config, library);

        let topics = tokio_test::block_on(state.data_service.get_all_topics()).expect("topics");
        assert_eq!(topics.len(), 1);
        let questions =
            tokio_test::block_on(state.question_provider.get_questions("colors", 5)).expect("questions");
        assert_eq!(questions[0].id, "c1");
        assert_eq!(state.match_registry.active_matches(), 0);
    }
}
