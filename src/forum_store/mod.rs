mod models;
mod schema;
mod store;
mod trait_def;

pub use models::*;
pub use schema::FORUM_VERSIONED_SCHEMAS;
pub use store::SqliteForumStore;
pub use trait_def::ForumStore;
