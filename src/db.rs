use crate::orm::{comments, posts, sessions, users};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Schema};
use std::time::Duration;

/// Opens a connection pool to `database_url`.
pub async fn init_db(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url.to_owned());
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(8))
        .sqlx_logging(true);

    Database::connect(opt).await
}

/// Creates any missing tables from the entity definitions.
pub async fn create_tables(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut statements = vec![
        schema.create_table_from_entity(users::Entity),
        schema.create_table_from_entity(sessions::Entity),
        schema.create_table_from_entity(posts::Entity),
        schema.create_table_from_entity(comments::Entity),
    ];

    for statement in statements.iter_mut() {
        statement.if_not_exists();
        db.execute(backend.build(&*statement)).await?;
    }

    log::info!("Database schema is ready.");
    Ok(())
}
