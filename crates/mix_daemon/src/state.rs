use mix_core::{Mix, RecipeOwnerId};
use mix_store::Store;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// One open composing session. The mix lives only here until committed.
#[derive(Debug, Clone)]
pub struct Session {
    pub owner: RecipeOwnerId,
    pub mix: Mix,
}

pub type SharedStore = Arc<Mutex<Store>>;
pub type SharedSessions = Arc<Mutex<HashMap<String, Session>>>;

/// Lock order is always `store` before `sessions`.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub sessions: SharedSessions,
}

impl AppState {
    pub fn new(store: Store) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}
