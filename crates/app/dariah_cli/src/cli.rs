use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "dariah_cli", version, about = "DARIAH reporting portal operator tools")]
pub struct Cli {
    /// PostgreSQL connection URL.
    #[arg(
        long,
        global = true,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/dariah"
    )]
    pub database_url: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the version.
    Version,

    /// Print the bcrypt hash of a password.
    HashPassword { password: String },

    /// Create a user account.
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: Option<String>,
    },

    /// Delete every expired session.
    PurgeSessions,

    /// Delete every session of a user, signing them out everywhere.
    RevokeSessions {
        #[arg(long)]
        email: String,
    },
}
