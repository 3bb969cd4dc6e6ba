//! MongoDB wiring.
//!
//! One database, three collections. Index highlights:
//! - unique `email` on users;
//! - unique `{user1, user2}` on matches, which together with canonical
//!   pair ordering guarantees at most one document per unordered pair
//!   (the loser of a simultaneous-like race sees a duplicate-key error);
//! - TTL on `expiresAt` so expired matches are swept by the server.

use std::time::Duration;

use bson::doc;
use mongodb::{
    Client, Collection, Database, IndexModel,
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
};
use tracing::info;

use crate::config::Config;
use crate::matching::{MATCH_COLLECTION, Match};
use crate::project::{PROJECT_COLLECTION, Project};
use crate::user::{USER_COLLECTION, User};

const DUPLICATE_KEY_CODE: i32 = 11000;

pub async fn init_mongo(config: &Config) -> Database {
    let client = Client::with_uri_str(&config.mongo_url)
        .await
        .expect("Database misconfigured!");
    let db = client.database(&config.db_name);

    create_indexes(&db).await;
    info!("Connected to MongoDB database {}", config.db_name);

    db
}

async fn create_indexes(db: &Database) {
    let unique = IndexOptions::builder().unique(true).build();

    let users: Collection<User> = db.collection(USER_COLLECTION);
    users
        .create_index(
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(unique.clone())
                .build(),
        )
        .await
        .expect("Failed to create user email index");
    users
        .create_index(
            IndexModel::builder()
                .keys(doc! { "userType": 1, "isActive": 1, "lastActive": -1 })
                .build(),
        )
        .await
        .expect("Failed to create user discovery index");
    users
        .create_index(IndexModel::builder().keys(doc! { "categories": 1 }).build())
        .await
        .expect("Failed to create user categories index");

    let matches: Collection<Match> = db.collection(MATCH_COLLECTION);
    matches
        .create_index(
            IndexModel::builder()
                .keys(doc! { "user1": 1, "user2": 1 })
                .options(unique)
                .build(),
        )
        .await
        .expect("Failed to create match pair index");
    matches
        .create_index(
            IndexModel::builder()
                .keys(doc! { "expiresAt": 1 })
                .options(
                    IndexOptions::builder()
                        .expire_after(Duration::from_secs(0))
                        .build(),
                )
                .build(),
        )
        .await
        .expect("Failed to create match TTL index");
    matches
        .create_index(
            IndexModel::builder()
                .keys(doc! { "status": 1, "createdAt": -1 })
                .build(),
        )
        .await
        .expect("Failed to create match status index");

    let projects: Collection<Project> = db.collection(PROJECT_COLLECTION);
    projects
        .create_index(
            IndexModel::builder()
                .keys(doc! { "category": 1, "status": 1 })
                .build(),
        )
        .await
        .expect("Failed to create project category index");
    projects
        .create_index(IndexModel::builder().keys(doc! { "creator": 1 }).build())
        .await
        .expect("Failed to create project creator index");
    projects
        .create_index(
            IndexModel::builder()
                .keys(doc! { "title": "text", "description": "text", "tags": "text" })
                .build(),
        )
        .await
        .expect("Failed to create project text index");
}

/// True when a write failed because a unique index rejected it.
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match &*err.kind {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY_CODE
        }
        _ => false,
    }
}
