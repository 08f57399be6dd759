mod export;
mod game;
mod participant;
mod room;

pub use export::{StudyExport, EXPORT_SCHEMA_VERSION};

use crate::game::{GameConfig, GameSession};
use crate::llm::{LlmConfig, LlmProvider};
use crate::persona::ReplyGenerator;
use crate::room::{Room, RoomConfig};
use crate::store::{MemoryStore, Store};
use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    /// Live waiting rooms, one per connected participant
    pub rooms: Arc<RwLock<HashMap<ParticipantId, Room>>>,
    /// Word-association sessions keyed by gameplay id
    pub games: Arc<RwLock<HashMap<GameplayId, GameSession>>>,
    /// None when no LLM provider is configured
    pub generator: Option<Arc<ReplyGenerator>>,
    pub llm_config: LlmConfig,
    pub room_config: Arc<RoomConfig>,
    pub game_config: GameConfig,
    /// Pause between attempts to persist a condition assignment
    pub condition_retry_delay: Duration,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            rooms: Arc::new(RwLock::new(HashMap::new())),
            games: Arc::new(RwLock::new(HashMap::new())),
            generator: None,
            llm_config: LlmConfig::default(),
            room_config: Arc::new(RoomConfig::default()),
            game_config: GameConfig::default(),
            condition_retry_delay: Duration::from_secs(2),
        }
    }

    pub fn new_with_llm(provider: Option<Arc<dyn LlmProvider>>, llm_config: LlmConfig) -> Self {
        let generator = provider.map(|p| Arc::new(ReplyGenerator::new(p, &llm_config)));
        Self {
            generator,
            llm_config,
            ..Self::new()
        }
    }

    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = store;
        self
    }

    pub fn with_room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = Arc::new(config);
        self
    }

    pub fn with_game_config(mut self, config: GameConfig) -> Self {
        self.game_config = config;
        self
    }

    pub fn with_condition_retry_delay(mut self, delay: Duration) -> Self {
        self.condition_retry_delay = delay;
        self
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
