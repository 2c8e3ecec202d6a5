use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};

use taskdeck::cache::TaskCache;
use taskdeck::cli::{Cli, Commands};
use taskdeck::models::{TaskCreate, TaskPatch};
use taskdeck::remote::{RemoteClient, DEFAULT_REMOTE_URL};
use taskdeck::session::Session;
use taskdeck::store::LocalStore;
use taskdeck::tasks::TaskService;

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    let (store, created) = LocalStore::open_default().context("Failed to open local store")?;
    if created {
        store.seed_guest_defaults()?;
    }

    let base_url = match cli.remote {
        Some(url) => url,
        None => match std::env::var("TASKDECK_REMOTE_URL") {
            Ok(url) => url,
            Err(_) => store
                .get_setting("remote_url")?
                .unwrap_or_else(|| DEFAULT_REMOTE_URL.to_string()),
        },
    };

    match cli.command {
        Some(Commands::Login { email, password }) => {
            let password = match password {
                Some(password) => password,
                None => prompt("Password: ")?,
            };
            let client = RemoteClient::new(&base_url);
            let auth = client.authenticate(&email, &password).await?;
            store.set_setting("auth_token", &auth.token)?;
            store.set_setting("auth_user", &auth.user_id)?;
            println!("Logged in as '{}'", auth.user_id);
        }
        Some(Commands::Logout) => {
            store.unset_setting("auth_token")?;
            store.unset_setting("auth_user")?;
            println!("Logged out; guest mode is active");
        }
        Some(Commands::Boards) => {
            let service = build_service(store, &base_url)?;
            println!("Boards:");
            println!("-------");
            for board in service.boards().await? {
                println!("{} | {}", board.id, board.name);
            }
        }
        Some(Commands::Projects) => {
            let service = build_service(store, &base_url)?;
            println!("Projects:");
            println!("---------");
            for project in service.projects().await? {
                println!("{} | {}", project.id, project.title);
            }
        }
        Some(Commands::Columns { board }) => {
            let service = build_service(store, &base_url)?;
            println!("Columns:");
            println!("--------");
            for column in service.columns(Some(&board)).await? {
                let scope = if column.board.is_empty() {
                    "global".to_string()
                } else {
                    format!("board {}", column.board)
                };
                println!("{} | {} | {}", column.id, column.title, scope);
            }
        }
        Some(Commands::Tasks { board }) => {
            let cache = TaskCache::new(build_service(store, &base_url)?);
            print_tasks(&cache.tasks(&board).await?);
        }
        Some(Commands::Add {
            title,
            column,
            board,
            project,
        }) => {
            let service = build_service(store, &base_url)?;
            let board = match board {
                Some(board) => Some(board),
                None => service.boards().await?.first().map(|b| b.id.clone()),
            };
            let cache = TaskCache::new(service);
            let task = cache
                .create_task(&TaskCreate {
                    title,
                    column,
                    board,
                    project,
                })
                .await?;
            println!("Task '{}' created with id '{}'", task.title, task.id);
        }
        Some(Commands::Move {
            board,
            task,
            column,
        }) => {
            let cache = TaskCache::new(build_service(store, &base_url)?);
            cache
                .update_task(&board, &task, &TaskPatch::column(column.as_str()))
                .await?;
            println!("Task '{}' moved to column '{}'", task, column);
        }
        Some(Commands::Rm { board, task }) => {
            let cache = TaskCache::new(build_service(store, &base_url)?);
            cache.delete_task(&board, &task).await?;
            println!("Task '{}' deleted", task);
        }
        Some(Commands::Set { key, value }) => {
            store.set_setting(&key, &value)?;
            println!("Config '{}' set", key);
        }
        Some(Commands::Get { key }) => match store.get_setting(&key)? {
            Some(value) => println!("{}", value),
            None => println!("Config '{}' is not set", key),
        },
        Some(Commands::ConfigList) => {
            println!("Config:");
            println!("-------");
            for (key, value) in store.list_settings()? {
                println!("{} | {}", key, value);
            }
        }
        Some(Commands::ConfigDelete { key }) => {
            store.unset_setting(&key)?;
            println!("Config '{}' deleted", key);
        }
        Some(Commands::Reset) => {
            store.reset_guest_data()?;
            println!("Local guest data reset");
        }
        Some(Commands::Completions { shell }) => {
            use clap_complete::{generate, Shell};
            let shell_enum = match shell.to_lowercase().as_str() {
                "bash" => Shell::Bash,
                "zsh" => Shell::Zsh,
                "fish" => Shell::Fish,
                "elvish" => Shell::Elvish,
                "powershell" => Shell::PowerShell,
                other => {
                    println!("Unsupported shell: {}", other);
                    return Ok(());
                }
            };
            let mut cmd = Cli::command();
            generate(shell_enum, &mut cmd, "taskdeck", &mut io::stdout());
        }
        None => {
            // Default behavior: show the first board like the app's landing view
            let service = build_service(store, &base_url)?;
            let Some(board) = service.boards().await?.into_iter().next() else {
                println!("No boards yet. Create one remotely or run 'taskdeck reset' to seed guest data.");
                return Ok(());
            };
            println!("Board: {} ({})", board.name, board.id);
            let columns = service.columns(Some(&board.id)).await?;
            let cache = TaskCache::new(service);
            let tasks = cache.tasks(&board.id).await?;
            for column in columns {
                println!("\n[{}]", column.title);
                for task in tasks.iter().filter(|t| t.column == column.id) {
                    let project = task.project.as_deref().unwrap_or("-");
                    println!("  {} | {} | Project: {}", task.id, task.title, project);
                }
            }
        }
    }

    Ok(())
}

fn build_service(store: LocalStore, base_url: &str) -> Result<TaskService> {
    let session = resolve_session(&store)?;
    let remote = match &session {
        Session::Remote { token, .. } => Some(RemoteClient::new(base_url).with_token(token)),
        _ => None,
    };
    log::debug!(
        "session resolved: {}",
        if session.is_remote() { "remote" } else { "guest" }
    );
    Ok(TaskService::new(session, remote, Some(store)))
}

fn resolve_session(store: &LocalStore) -> Result<Session> {
    if let (Some(token), Some(user_id)) = (
        store.get_setting("auth_token")?,
        store.get_setting("auth_user")?,
    ) {
        return Ok(Session::Remote { user_id, token });
    }
    let guest = store.guest_session()?;
    Ok(Session::Guest {
        session_id: guest.id,
    })
}

fn print_tasks(tasks: &[taskdeck::models::Task]) {
    println!("Tasks:");
    println!("------");
    for task in tasks {
        let project = task.project.as_deref().unwrap_or("-");
        println!(
            "{} | {} | Column: {} | Project: {}",
            task.id, task.title, task.column, project
        );
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
