//! ClinicDesk host executable.
//!
//! Boots the plugin host against a configuration file, optionally opens a
//! session, then prints plugin states or the rendered menus.

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use clinicdesk_core::model::user::{NewUser, User};
use clinicdesk_core::plugins::{builtin_catalog, user_session};
use clinicdesk_core::repo::{RepoError, UserRepository};
use clinicdesk_core::security::permission::parse_permission_level;
use clinicdesk_core::{Host, HostConfig, MenuKind};
use log::info;

/// Plugin host for the clinical records desk
#[derive(Parser)]
#[command(name = "clinicdesk")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database file, overriding the configuration
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Absolute log directory, overriding the configuration
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Login to open a session with before running the command
    #[arg(short, long, global = true)]
    login: Option<String>,

    /// Password for --login
    #[arg(short, long, global = true, requires = "login")]
    password: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the rendered application and context menus (default)
    Menu,

    /// Print every discovered plugin and its lifecycle state
    Plugins,

    /// Create a user account; needs an admin session unless no account exists
    AddUser {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long = "new-login")]
        new_login: String,
        #[arg(long = "new-password")]
        new_password: String,
        /// none|read|write|admin
        #[arg(long, default_value = "read")]
        permission: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("clinicdesk: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut config = match cli.config.as_deref() {
        Some(path) => HostConfig::load(path)?,
        None => HostConfig::default(),
    };
    if cli.database.is_some() {
        config.database_path = cli.database;
    }
    if cli.log_dir.is_some() {
        config.log_dir = cli.log_dir;
    }

    let mut host = Host::boot(&config, &builtin_catalog())?;
    if let Some(login) = cli.login.as_deref() {
        let password = cli.password.as_deref().unwrap_or_default();
        let session = user_session::connect(host.services(), login, password)?;
        println!("connected as {} ({})", session.display_name, session.level);
        host.refresh_shell();
    }

    match cli.command.unwrap_or(Commands::Menu) {
        Commands::Menu => print_menus(&host),
        Commands::Plugins => print_plugins(&host),
        Commands::AddUser {
            first_name,
            last_name,
            new_login,
            new_password,
            permission,
        } => {
            let user = NewUser {
                first_name,
                last_name,
                login: new_login,
                password: new_password,
                permission: parse_permission_level(&permission)?,
            };
            add_user(&host, &user)?;
        }
    }

    host.shutdown();
    Ok(())
}

fn print_menus(host: &Host) {
    println!("application menu:");
    for line in host.shell().describe(MenuKind::Application) {
        println!("  {line}");
    }
    println!("context menu:");
    for line in host.shell().describe(MenuKind::Context) {
        println!("  {line}");
    }
}

fn print_plugins(host: &Host) {
    for descriptor in host.kernel().descriptors() {
        match &descriptor.failure {
            Some(failure) => println!(
                "{:<28} {:<12} {} {} ({failure})",
                descriptor.id,
                descriptor.state,
                descriptor.mode.as_str(),
                descriptor.declared_version
            ),
            None => println!(
                "{:<28} {:<12} {} {}",
                descriptor.id,
                descriptor.state,
                descriptor.mode.as_str(),
                descriptor.declared_version
            ),
        }
    }
    for rejected in host.rejected() {
        println!("rejected: {rejected}");
    }
}

/// Creates the first account without a session; later accounts go through
/// the user session plugin, which requires an admin session.
fn add_user(host: &Host, user: &NewUser) -> Result<(), Box<dyn Error>> {
    let services = host.services();
    let users = services.resolve::<dyn UserRepository>()?;
    let bootstrapped = services.data.run(|uow| -> Result<Option<User>, RepoError> {
        if !users.list_users(uow)?.is_empty() {
            return Ok(None);
        }
        users.create_user(uow, user).map(Some)
    })?;

    let created = match bootstrapped {
        Some(created) => {
            info!(
                "event=cli_add_user module=cli status=ok user_id={} permission={} bootstrap=true",
                created.id, created.permission
            );
            created
        }
        None => user_session::add_user(services, user)?,
    };
    println!("user `{}` created ({})", created.login, created.permission);
    Ok(())
}
