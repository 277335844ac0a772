use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::{self, Write};
use tokio::net::TcpListener;
use trusty_rusty_todo_api::cli::{Cli, Commands, ConfigCommand};
use trusty_rusty_todo_api::client::{HttpTodoApi, TodoBoard};
use trusty_rusty_todo_api::config::ConfigManager;
use trusty_rusty_todo_api::logging;
use trusty_rusty_todo_api::server;
use trusty_rusty_todo_api::storage::{create_storage, migrate_store};
use trusty_rusty_todo_api::todo_manager::TodoStore;

fn confirm(prompt: &str) -> bool {
    print!("{} [y/N] ", prompt);
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

async fn open_board(config: &ConfigManager, base_url: Option<String>) -> Result<TodoBoard<HttpTodoApi>> {
    let base_url = base_url.unwrap_or_else(|| config.base_url());
    let api = HttpTodoApi::new(&base_url)?;
    let mut board = TodoBoard::new(api);
    board
        .load()
        .await
        .with_context(|| format!("could not load todos from {}", base_url))?;
    Ok(board)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = match cli.command {
        Commands::Serve { .. } => "info",
        _ => "warn",
    };
    logging::init_tracing(default_level);

    let mut config = ConfigManager::new(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve {
            host,
            port,
            store,
            storage_type,
        } => {
            let storage_type = storage_type.unwrap_or_else(|| config.storage_type());
            let path = store.unwrap_or_else(|| config.storage_path());
            let addr = config.server_addr(host, port);

            if !path.exists() {
                tracing::warn!(
                    store = %path.display(),
                    "store does not exist; requests will answer 404 until `init` creates it"
                );
            }
            let store = TodoStore::new(create_storage(storage_type, &path));
            let listener = TcpListener::bind(&addr)
                .await
                .with_context(|| format!("could not bind {}", addr))?;
            tracing::info!(store = %path.display(), storage = storage_type.as_str(), "store ready");
            server::serve(listener, store, server::wait_for_shutdown_signal()).await?;
        }
        Commands::Init {
            force,
            store,
            storage_type,
        } => {
            let storage_type = storage_type.unwrap_or_else(|| config.storage_type());
            let path = store.unwrap_or_else(|| config.storage_path());
            create_storage(storage_type, &path).init(force)?;
            println!("Created empty {} store at {}", storage_type.as_str(), path.display());
        }
        Commands::Migrate { to, path } => {
            let source = create_storage(config.storage_type(), &config.storage_path());
            let target = create_storage(to, &path);
            let count = migrate_store(source.as_ref(), target.as_ref())?;
            println!("Copied {} todos to {}", count, path.display());
            println!(
                "Run `config set storage.type {}` and `config set storage.path {}` to switch over",
                to.as_str(),
                path.display()
            );
        }
        Commands::List => {
            let board = open_board(&config, cli.base_url).await?;
            print!("{}", board.render());
        }
        Commands::Add { name, description } => {
            let mut board = open_board(&config, cli.base_url).await?;
            board.set_name(name);
            board.set_description(description.unwrap_or_default());
            let todo = board.submit().await?;
            println!("Added [{}] {}", todo.id, todo.name);
        }
        Commands::Edit {
            id,
            name,
            description,
        } => {
            let mut board = open_board(&config, cli.base_url).await?;
            if !board.edit(id) {
                bail!("todo {} not found", id);
            }
            if let Some(name) = name {
                board.set_name(name);
            }
            if let Some(description) = description {
                board.set_description(description);
            }
            let todo = board.submit().await?;
            println!("Updated [{}] {}", todo.id, todo.name);
        }
        Commands::Complete { id } => {
            let mut board = open_board(&config, cli.base_url).await?;
            let todo = board.complete(id).await?;
            println!("Completed [{}] {}", todo.id, todo.name);
        }
        Commands::Delete { id, yes } => {
            let mut board = open_board(&config, cli.base_url).await?;
            let deleted = board
                .delete(id, || yes || confirm("Do you want to delete this todo?"))
                .await?;
            if deleted {
                println!("Deleted successfully");
            } else {
                println!("Operation cancelled");
            }
        }
        Commands::Config { command } => match command {
            ConfigCommand::Get { key } => println!("{}", config.get(&key)?),
            ConfigCommand::Set { key, value } => {
                config.set(&key, &value)?;
                println!("{} = {}", key, config.get(&key)?);
            }
            ConfigCommand::Unset { key } => {
                config.unset(&key)?;
                println!("{} reset to {}", key, config.get(&key)?);
            }
            ConfigCommand::List => {
                for (key, value, is_default) in config.list() {
                    if is_default {
                        println!("{} = {} (default)", key, value);
                    } else {
                        println!("{} = {}", key, value);
                    }
                }
            }
        },
    }

    Ok(())
}
