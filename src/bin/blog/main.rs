use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::Key;
use actix_web::middleware::Logger;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::{bail, Context};
use env_logger::Env;
use inkpost::backend::orm::DbBackend;
use inkpost::backend::Backend;
use inkpost::config::Config;
use inkpost::db::{create_tables, init_db};
use inkpost::middleware::ClientCtx;
use inkpost::s3::S3Bucket;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_lib_mods();

    let config = Config::from_env()?;
    let secret_key = session_key(&config)?;

    let db = init_db(&config.database_url)
        .await
        .context("Database failed to initialize.")?;
    create_tables(&db).await.context("Could not create tables.")?;

    let db_backend = Arc::new(DbBackend::new(db, config.session_time));
    match db_backend.expire_sessions().await {
        Ok(count) => log::info!("Removed {} expired sessions.", count),
        Err(e) => log::warn!("Could not remove expired sessions: {}", e),
    }

    let bucket = S3Bucket::from_config(&config.s3)?;
    let backend = Backend::new(db_backend.clone(), db_backend, Arc::new(bucket));

    log::info!("Listening on {}", config.bind_address);
    HttpServer::new(move || {
        // Order of middleware IS IMPORTANT and is in REVERSE EXECUTION ORDER.
        App::new()
            .app_data(Data::new(backend.clone()))
            .wrap(inkpost::web::error::error_handlers())
            .wrap(ClientCtx::default())
            .wrap(SessionMiddleware::new(
                CookieSessionStore::default(),
                secret_key.clone(),
            ))
            .wrap(Logger::new("%a %r %s %{User-Agent}i"))
            .configure(inkpost::web::configure)
    })
    .bind(&config.bind_address)?
    .run()
    .await?;

    Ok(())
}

/// Initialize third party crates we rely on but don't have control over.
fn init_lib_mods() {
    // A missing .env is fine; the environment may already be set.
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}

/// Cookie signing key from SECRET_KEY, or a throwaway one.
fn session_key(config: &Config) -> anyhow::Result<Key> {
    match &config.secret_key {
        Some(bytes) if bytes.len() >= 64 => Ok(Key::from(bytes.as_slice())),
        Some(_) => bail!("SECRET_KEY must be at least 64 bytes long."),
        None => {
            log::warn!("SECRET_KEY is not set; sessions will not survive a restart.");
            Ok(Key::generate())
        }
    }
}
