use anyhow::{anyhow, Context, Result};
use url::Url;

/// Runtime settings, read from the environment (and `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: String,
    pub database_url: String,
    /// Session cookie signing key. Generated per process when absent.
    pub secret_key: Option<Vec<u8>>,
    pub session_time: chrono::Duration,
    pub s3: S3Config,
}

#[derive(Clone, Debug)]
pub struct S3Config {
    pub region: String,
    /// Custom endpoint for S3-compatible services.
    pub endpoint: Option<String>,
    pub bucket: String,
    pub public_url: Url,
}

const DEFAULT_BUCKET: &str = "images";
const DEFAULT_SESSION_MINUTES: i64 = 60 * 24 * 7;

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bind_address: var_or("BIND_ADDRESS", "127.0.0.1:8080"),
            database_url: var("DATABASE_URL")?,
            secret_key: std::env::var("SECRET_KEY").ok().map(String::into_bytes),
            session_time: parse_session_time(std::env::var("SESSION_TIME").ok())?,
            s3: S3Config::from_env()?,
        })
    }
}

impl S3Config {
    pub fn from_env() -> Result<Self> {
        let public_url = var("S3_PUBLIC_URL")?;
        let public_url = Url::parse(&public_url)
            .with_context(|| format!("S3_PUBLIC_URL is not a valid URL: {}", public_url))?;

        Ok(Self {
            region: var_or("S3_REGION", "us-east-1"),
            endpoint: std::env::var("S3_ENDPOINT").ok(),
            bucket: var_or("S3_BUCKET", DEFAULT_BUCKET),
            public_url,
        })
    }
}

/// SESSION_TIME is a whole number of minutes.
fn parse_session_time(value: Option<String>) -> Result<chrono::Duration> {
    let minutes = match value {
        Some(value) => value
            .trim()
            .parse::<i64>()
            .context("SESSION_TIME cannot be parsed as an integer")?,
        None => DEFAULT_SESSION_MINUTES,
    };
    if minutes <= 0 {
        return Err(anyhow!("SESSION_TIME must be a positive number of minutes"));
    }
    Ok(chrono::Duration::minutes(minutes))
}

fn var(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing {} environment variable", key))
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}
