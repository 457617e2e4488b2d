//! SeaORM entities for the relational backend.

pub mod comments;
pub mod posts;
pub mod sessions;
pub mod users;
