use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

use campaign_auth::config::Config;
use campaign_auth::identity::backends::hash_password;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    // `campaign-auth hash-password <password>` prints an Argon2 PHC string for LOCAL_USERS_FILE
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(String::as_str) == Some("hash-password") {
        let Some(password) = args.get(2) else {
            anyhow::bail!("usage: campaign-auth hash-password <password>");
        };
        println!("{}", hash_password(password)?);
        return Ok(());
    }

    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let config = Config::from_env()?;
    info!(
        target: "campaign_auth",
        "campaign-auth starting: RUST_LOG='{}', http_port={}, production={}",
        rust_log, config.http_port, config.production
    );

    campaign_auth::server::run(config).await
}
