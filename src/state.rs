use std::sync::Arc;

use mongodb::{Collection, Database};

use crate::config::Config;
use crate::database::init_mongo;
use crate::matching::{MATCH_COLLECTION, Match};
use crate::project::{PROJECT_COLLECTION, Project};
use crate::user::{USER_COLLECTION, User};

pub struct AppState {
    pub config: Config,
    pub db: Database,
}

impl AppState {
    pub async fn new() -> Arc<Self> {
        let config = Config::load();
        let db = init_mongo(&config).await;

        Arc::new(Self { config, db })
    }

    pub fn users(&self) -> Collection<User> {
        self.db.collection(USER_COLLECTION)
    }

    pub fn projects(&self) -> Collection<Project> {
        self.db.collection(PROJECT_COLLECTION)
    }

    pub fn matches(&self) -> Collection<Match> {
        self.db.collection(MATCH_COLLECTION)
    }
}
