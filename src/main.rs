use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
mod auth;
use credstore::CredentialStore;
use directories::ProjectDirs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn default_config() -> Result<PathBuf> {
    let project_dirs =
        ProjectDirs::from("", "", "credstore").context("could not determine platform directories")?;

    Ok(project_dirs.config_dir().join("config.json"))
}

fn open_store(path: Option<PathBuf>) -> Result<CredentialStore> {
    let path = match path {
        Some(p) => p,
        None => default_config()?,
    };
    CredentialStore::open(&path).with_context(|| format!("failed to open store {}", path.display()))
}

#[derive(Debug, Parser)]
#[command(name = "credstore")]
#[command(
    version,
    about = "File based credential store with rotatable password hashing contexts."
)]
struct Cli {
    /// Path to the store configuration file
    #[arg(long, global = true, value_name = "PATH", env = "CREDSTORE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Creates the base directory and its first admin
    #[command(arg_required_else_help = true)]
    Init { admin: String },

    /// Checks the base directory for consistency
    Check,

    /// Adds a new user
    #[command(arg_required_else_help = true)]
    Add {
        username: String,
        /// Create the user as admin
        #[arg(long, default_value_t = false)]
        admin: bool,
    },

    /// Changes the password of a user
    #[command(arg_required_else_help = true)]
    Update { username: String },

    /// Grants or revokes admin rights
    #[command(arg_required_else_help = true)]
    SetAdmin {
        username: String,
        #[arg(action = ArgAction::Set)]
        admin: bool,
    },

    /// Removes a user
    #[command(arg_required_else_help = true)]
    Remove { username: String },

    /// Lists all users
    List {
        #[arg(short, long, default_value_t = false)]
        /// Print role and hash format status
        full: bool,
    },

    /// Checks the password of a user
    #[command(arg_required_else_help = true)]
    Authenticate { username: String },
}

fn main() -> Result<()> {
    // RUST_LOG=credstore=debug for verbose output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("credstore=warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Cli::parse();
    let store = open_store(args.config)?;

    match args.command {
        Commands::Init { admin } => {
            let password = auth::read_new_password_with_confirmation()?;
            store.init(&admin, &password)?;
            println!("store initialized with admin '{admin}'");
        }
        Commands::Check => {
            let report = store.check()?;
            println!(
                "store ok: {} users, {} admins, {} unsupported",
                report.users, report.admins, report.unsupported
            );
        }
        Commands::Add { username, admin } => {
            let user = store.user(&username)?;
            let password = auth::read_new_password_with_confirmation()?;
            user.add(&password, admin)?;
            println!("user '{username}' added");
        }
        Commands::Update { username } => {
            let user = store.user(&username)?;
            let password = auth::read_new_password_with_confirmation()?;
            user.update(&password)?;
            println!("password of '{username}' updated");
        }
        Commands::SetAdmin { username, admin } => {
            store.user(&username)?.set_admin(admin)?;
            if admin {
                println!("user '{username}' is now an admin");
            } else {
                println!("user '{username}' is now a regular user");
            }
        }
        Commands::Remove { username } => {
            store.user(&username)?.remove();
            println!("user '{username}' removed");
        }
        Commands::List { full } => {
            let entries = store.list()?;

            if entries.is_empty() {
                println!("No users stored.");
                return Ok(());
            }

            if !full {
                for e in entries {
                    println!("{}", e.username());
                }
                return Ok(());
            }

            let name_width = entries
                .iter()
                .map(|e| e.username().len())
                .chain(std::iter::once("User".len()))
                .max()
                .unwrap_or_default();

            println!("{:<name_width$}  {:<5}  Format", "User", "Role");
            println!("{:-<name_width$}  {:-<5}  {:-<11}", "", "", "");

            for e in entries {
                let role = if e.is_admin() { "admin" } else { "user" };
                let format = if e.is_supported() {
                    "ok"
                } else {
                    "unsupported"
                };
                println!("{:<name_width$}  {:<5}  {}", e.username(), role, format);
            }
        }
        Commands::Authenticate { username } => {
            let user = store.user(&username)?;
            let password = auth::read_password()?;
            let (ok, is_admin) = user.authenticate(&password)?;
            if !ok {
                bail!("authentication failed for '{username}'");
            }
            if is_admin {
                println!("authenticated '{username}' (admin)");
            } else {
                println!("authenticated '{username}'");
            }
        }
    }

    Ok(())
}
