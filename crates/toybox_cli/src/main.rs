//! Command-line front end for the toybox board core.
//!
//! # Responsibility
//! - Map one subcommand to one `BoardService` call against a SQLite store.
//! - Print results as JSON on stdout and errors as `ErrorPayload` on stderr.

use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;
use toybox_core::{
    init_logging, BoardService, CoreConfig, ErrorPayload, PostId, RepoError, RepoResult,
    Registration, SqliteStore, StoreError,
};

/// Toybox board: members, posts and toggle votes.
#[derive(Parser, Debug)]
#[command(name = "toybox")]
#[command(version, about, long_about = None)]
struct Cli {
    /// SQLite database file (overrides TOYBOX_DB_PATH; `:memory:` for a scratch db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Identity the command runs as
    #[arg(long, global = true, default_value = "local")]
    member: String,

    /// Log level (overrides TOYBOX_LOG_LEVEL)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the member's settings and current ETag
    Whoami,

    /// Register the member
    Register {
        #[arg(long)]
        display_name: String,
        #[arg(long, default_value = "")]
        photo_url: String,
        #[arg(long)]
        email: String,
        /// Settings version the change is based on
        #[arg(long)]
        etag: Option<i64>,
    },

    /// Replace the member's profile with a JSON object
    Profile {
        profile: String,
        #[arg(long)]
        etag: Option<i64>,
    },

    /// List members visible to the caller
    Members {
        #[arg(long)]
        admin: bool,
    },

    /// List live posts with the member's votes
    Posts {
        /// Only posts authored by the member
        #[arg(long)]
        mine: bool,
    },

    /// Create a post from a JSON body; the member must already exist (see `whoami`)
    Post { data: String },

    /// Mark one of the member's posts deleted
    Delete { post_id: PostId },

    /// Cast +1 or -1; repeating a vote cancels it
    Vote {
        post_id: PostId,
        #[arg(allow_hyphen_values = true)]
        value: i64,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut config = CoreConfig::from_env();
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(db) = &cli.db {
        config.db_path = (db.as_os_str() != ":memory:").then(|| db.clone());
    }

    if let Err(err) = init_logging(&config.log_level, &config.log_dir) {
        eprintln!("toybox: logging disabled: {err}");
    }

    match run(&cli, &config) {
        Ok(output) => {
            println!("{output:#}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            let payload = ErrorPayload::from_error(&err);
            match serde_json::to_string_pretty(&payload) {
                Ok(text) => eprintln!("{text}"),
                Err(_) => eprintln!("{}: {}", payload.code, payload.message),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, config: &CoreConfig) -> RepoResult<serde_json::Value> {
    let store = match &config.db_path {
        Some(path) => SqliteStore::open(path)?,
        None => SqliteStore::open_in_memory()?,
    };
    let board = BoardService::new(&store);
    let member = cli.member.as_str();

    info!("event=cli_command module=cli status=start command={}", command_name(&cli.command));
    match &cli.command {
        Commands::Whoami => to_json(&board.whoami(member)?),
        Commands::Register {
            display_name,
            photo_url,
            email,
            etag,
        } => {
            let registration = Registration {
                display_name: display_name.clone(),
                photo_url: photo_url.clone(),
                email: email.clone(),
            };
            to_json(&board.register(member, &registration, *etag)?)
        }
        Commands::Profile { profile, etag } => {
            to_json(&board.update_profile(member, profile, *etag)?)
        }
        Commands::Members { admin } => to_json(&board.list_members(*admin)?),
        Commands::Posts { mine: true } => to_json(&board.list_member_posts(member)?),
        Commands::Posts { mine: false } => to_json(&board.list_posts(member)?),
        Commands::Post { data } => to_json(&board.insert_post(member, data)?),
        Commands::Delete { post_id } => {
            board.delete_post(member, *post_id)?;
            Ok(serde_json::json!({ "deleted": post_id }))
        }
        Commands::Vote { post_id, value } => to_json(&board.cast_vote(member, *post_id, *value)?),
    }
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Whoami => "whoami",
        Commands::Register { .. } => "register",
        Commands::Profile { .. } => "profile",
        Commands::Members { .. } => "members",
        Commands::Posts { .. } => "posts",
        Commands::Post { .. } => "post",
        Commands::Delete { .. } => "delete",
        Commands::Vote { .. } => "vote",
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> RepoResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|err| RepoError::Store(StoreError::from(err)))
}
