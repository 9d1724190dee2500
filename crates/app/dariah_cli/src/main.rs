// Import and re-export the `error` module
pub use self::error::{Error, Result};
mod error;

use clap::Parser;
use cli::{Cli, Commands};
use dariah_core::auth::{PgStore, UserStore, password, session};
use sqlx::postgres::PgPoolOptions;

mod cli;
mod logging;

fn main() -> Result<()> {
    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init()?;

    let args = Cli::parse();

    match &args.command {
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        }
        Commands::HashPassword { password } => {
            println!("{}", password::hash_password(password)?);
        }
        Commands::CreateUser {
            email,
            password,
            name,
        } => {
            let hash = password::hash_password(password)?;
            let user = block_on(async {
                let store = connect(&args.database_url).await?;
                Ok::<_, Error>(store.create_user(email, name.as_deref(), &hash).await?)
            })?;
            log::info!("created user {} <{}>", user.id, user.email);
            println!("{}", user.id);
        }
        Commands::PurgeSessions => {
            let removed = block_on(async {
                let store = connect(&args.database_url).await?;
                Ok::<_, Error>(session::sweep_expired_sessions(&store).await?)
            })?;
            log::info!("purged {removed} expired sessions");
            println!("{removed}");
        }
        Commands::RevokeSessions { email } => {
            let removed = block_on(async {
                let store = connect(&args.database_url).await?;
                let user = store
                    .find_user_by_email(email)
                    .await?
                    .ok_or_else(|| Error::Custom(format!("no user with email {email}")))?;
                Ok::<_, Error>(session::invalidate_user_sessions(&store, &user.user.id).await?)
            })?;
            println!("{removed}");
        }
    }

    Ok(())
}

/// Connect and migrate, returning a store over the pool.
async fn connect(database_url: &str) -> Result<PgStore> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(database_url)
        .await?;
    dariah_core::migrate::migrate(&pool).await?;
    Ok(PgStore::new(pool))
}

fn block_on<T>(fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(fut)
}
