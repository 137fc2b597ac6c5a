#![forbid(unsafe_code)]

use std::io::IsTerminal as _;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{CommandFactory as _, Parser, Subcommand};
use time::OffsetDateTime;
use time::format_description::OwnedFormatItem;

use crate::config::{self, Config};
use crate::error::TodoError;
use crate::logging::{self, LogTarget};
use crate::output::table::Table;
use crate::task::model::{Task, format_date, parse_date_format, parse_day};
use crate::task::row;
use crate::task::storage::FileGateway;
use crate::task::store::TaskStore;
use crate::tui;

#[derive(Debug, Parser)]
#[command(
    name = "todui",
    version,
    about = "Terminal to-do list with swipe-style row actions"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    Add(AddArgs),
    #[command(alias = "ls")]
    List(ListArgs),
    #[command(alias = "done")]
    Toggle(ToggleArgs),
    #[command(alias = "rm")]
    Remove(RemoveArgs),
    /// Switch the default theme between light and dark
    Theme,
    Config(ConfigArgs),
    Completion(CompletionArgs),
    Version,
}

#[derive(Debug, Parser)]
pub struct AddArgs {
    /// Task title
    pub title: String,
    /// Optional description
    #[arg(short = 'd', long = "description", default_value = "")]
    pub description: String,
    /// Due date (YYYY-MM-DD), defaults to now
    #[arg(long = "date")]
    pub date: Option<String>,
}

#[derive(Debug, Parser)]
pub struct ListArgs {
    /// Output in JSON format
    #[arg(long = "json", conflicts_with = "csv")]
    pub json: bool,
    /// Output as CSV
    #[arg(long = "csv")]
    pub csv: bool,
}

#[derive(Debug, Parser)]
pub struct ToggleArgs {
    /// Task id or unique id prefix
    pub id: String,
}

#[derive(Debug, Parser)]
pub struct RemoveArgs {
    /// Skip the confirmation prompt
    #[arg(short = 'y', long = "yes")]
    pub yes: bool,
    /// Task id or unique id prefix
    pub id: String,
}

#[derive(Debug, Parser)]
pub struct CompletionArgs {
    pub shell: clap_complete::Shell,
}

#[derive(Debug, Parser)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub cmd: ConfigCmd,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCmd {
    List,
    Set(ConfigSetArgs),
    Get(ConfigGetArgs),
}

#[derive(Debug, Parser)]
pub struct ConfigSetArgs {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Parser)]
pub struct ConfigGetArgs {
    pub key: String,
}

pub async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.cmd {
        None => cmd_default().await,
        Some(Commands::Completion(args)) => {
            let mut cmd = Cli::command();
            clap_complete::generate(args.shell, &mut cmd, "todui", &mut std::io::stdout());
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Config(args)) => match args.cmd {
            ConfigCmd::List => {
                print!("{}", config::list_resolved_toml()?);
                Ok(ExitCode::SUCCESS)
            }
            ConfigCmd::Set(set) => {
                config::set_value_string(&set.key, &set.value)?;
                println!("Set {} = {}", set.key, set.value);
                Ok(ExitCode::SUCCESS)
            }
            ConfigCmd::Get(get) => {
                let val = config::get_value_string(&get.key)?;
                match val {
                    Some(v) => {
                        println!("{v}");
                        Ok(ExitCode::SUCCESS)
                    }
                    None => anyhow::bail!(
                        "configuration key '{}' not found - use 'todui config list' to see available keys",
                        get.key
                    ),
                }
            }
        },
        Some(Commands::Add(args)) => cmd_add(args).await,
        Some(Commands::List(args)) => cmd_list(args).await,
        Some(Commands::Toggle(args)) => cmd_toggle(args).await,
        Some(Commands::Remove(args)) => cmd_remove(args).await,
        Some(Commands::Theme) => cmd_theme().await,
        Some(Commands::Version) => Ok(cmd_version()),
    }
}

async fn load_cfg() -> anyhow::Result<Config> {
    let cfg = tokio::task::spawn_blocking(|| -> anyhow::Result<Config> {
        let (cfg, _paths) = config::load()?;
        Ok(cfg)
    })
    .await??;
    Ok(cfg)
}

/// Loads config and installs logging for a task command.
async fn setup(target: LogTarget) -> anyhow::Result<Config> {
    let cfg = load_cfg().await?;
    logging::init(&cfg, target)?;
    Ok(cfg)
}

async fn open_store(cfg: &Config) -> anyhow::Result<TaskStore> {
    let gateway = FileGateway::new(cfg.data_dir()?);
    tracing::debug!(path = %gateway.path().display(), "opening task store");
    let mut store = TaskStore::new(Arc::new(gateway));
    store.initialize().await;
    Ok(store)
}

async fn cmd_default() -> anyhow::Result<ExitCode> {
    if tui::is_tty() {
        let cfg = setup(LogTarget::File).await?;
        tui::app::run(cfg).await?;
        return Ok(ExitCode::SUCCESS);
    }

    // Non-TTY fallback: print the list once.
    cmd_list(ListArgs {
        json: false,
        csv: false,
    })
    .await
}

async fn cmd_add(args: AddArgs) -> anyhow::Result<ExitCode> {
    let cfg = setup(LogTarget::Stderr).await?;
    if args.title.trim().is_empty() {
        return Err(TodoError::EmptyTitle.into());
    }
    let date = match args.date.as_deref() {
        Some(day) => parse_day(day)?,
        None => OffsetDateTime::now_utc(),
    };
    let date_format = parse_date_format(&cfg.ui.date_format)?;

    let mut store = open_store(&cfg).await?;
    let id = store
        .add_task(&args.title, &args.description, date)
        .ok_or(TodoError::EmptyTitle)?;
    store.flush().await;

    if let Some(task) = store.get(&id) {
        println!(
            "Added {}  {}  ({})",
            task.short_id(),
            task.title,
            format_date(task.date, &date_format)
        );
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_list(args: ListArgs) -> anyhow::Result<ExitCode> {
    let cfg = setup(LogTarget::Stderr).await?;
    let store = open_store(&cfg).await?;
    let tasks = store.tasks();

    if args.json {
        let mut out = serde_json::to_string_pretty(tasks)?;
        out.push('\n');
        print!("{out}");
        return Ok(ExitCode::SUCCESS);
    }

    let date_format = parse_date_format(&cfg.ui.date_format)?;
    if args.csv {
        task_table(tasks, &date_format, true).write_csv()?;
        return Ok(ExitCode::SUCCESS);
    }

    if tasks.is_empty() {
        println!("No tasks yet. Add one with 'todui add <title>'.");
        return Ok(ExitCode::SUCCESS);
    }
    task_table(tasks, &date_format, false).print()?;
    Ok(ExitCode::SUCCESS)
}

async fn cmd_toggle(args: ToggleArgs) -> anyhow::Result<ExitCode> {
    let cfg = setup(LogTarget::Stderr).await?;
    let mut store = open_store(&cfg).await?;
    let id = resolve_task_id(&store, &args.id)?;

    let completed = store
        .toggle_complete(&id)
        .ok_or_else(|| TodoError::TaskNotFound(args.id.clone()))?;
    store.flush().await;

    let title = store.get(&id).map(|t| t.title.as_str()).unwrap_or_default();
    if completed {
        println!("Marked as done: {title}");
    } else {
        println!("Marked as not done: {title}");
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_remove(args: RemoveArgs) -> anyhow::Result<ExitCode> {
    let cfg = setup(LogTarget::Stderr).await?;
    let mut store = open_store(&cfg).await?;
    let id = resolve_task_id(&store, &args.id)?;
    let title = store
        .get(&id)
        .map(|t| t.title.clone())
        .unwrap_or_default();

    if !args.yes {
        if !std::io::stdin().is_terminal() {
            anyhow::bail!("refusing to delete without confirmation; pass --yes");
        }
        if !confirm_delete(&title)? {
            println!("Kept: {title}");
            return Ok(ExitCode::SUCCESS);
        }
    }

    if !store.delete_task(&id) {
        return Err(TodoError::TaskNotFound(args.id).into());
    }
    store.flush().await;
    println!("Deleted: {title}");
    Ok(ExitCode::SUCCESS)
}

async fn cmd_theme() -> anyhow::Result<ExitCode> {
    let cfg = load_cfg().await?;
    let dark = !cfg.ui.dark_mode;
    config::set_value_string("ui.dark_mode", if dark { "true" } else { "false" })?;
    println!("Default theme: {}", if dark { "dark" } else { "light" });
    Ok(ExitCode::SUCCESS)
}

fn confirm_delete(title: &str) -> anyhow::Result<bool> {
    println!("{}: {title}", row::CONFIRM_TITLE);
    print!(
        "{} ({}/{}) [{}]: ",
        row::CONFIRM_MESSAGE,
        row::CONFIRM_YES.to_lowercase(),
        row::CONFIRM_NO.to_lowercase(),
        row::CONFIRM_NO.to_lowercase()
    );
    std::io::Write::flush(&mut std::io::stdout())?;
    Ok(read_confirmation(std::io::stdin().lock())?)
}

/// Only an explicit "y"/"yes" confirms; end of input counts as "No".
fn read_confirmation(mut input: impl std::io::BufRead) -> std::io::Result<bool> {
    let mut line = String::new();
    let read = input.read_line(&mut line)?;
    if read == 0 {
        return Ok(false);
    }
    let resp = line.trim().to_lowercase();
    Ok(resp == "y" || resp == "yes")
}

/// Accepts a full id or any prefix that matches exactly one task.
fn resolve_task_id(store: &TaskStore, query: &str) -> Result<String, TodoError> {
    let query = query.trim();
    if let Some(task) = store.get(query) {
        return Ok(task.id.clone());
    }
    if query.is_empty() {
        return Err(TodoError::TaskNotFound(query.to_owned()));
    }

    let matches: Vec<&Task> = store
        .tasks()
        .iter()
        .filter(|t| t.id.starts_with(query))
        .collect();
    match matches.as_slice() {
        [task] => Ok(task.id.clone()),
        [] => Err(TodoError::TaskNotFound(query.to_owned())),
        _ => Err(TodoError::AmbiguousTask(query.to_owned())),
    }
}

fn task_table(tasks: &[Task], date_format: &OwnedFormatItem, full: bool) -> Table {
    let mut table = Table::new(["ID", "STATUS", "DATE", "TITLE", "DESCRIPTION"]);
    for t in tasks {
        let (id, description) = if full {
            (t.id.clone(), t.description.clone())
        } else {
            (t.short_id().to_owned(), truncate(&t.description, 40))
        };
        table.row([
            id,
            if t.is_completed { "done" } else { "open" }.to_owned(),
            format_date(t.date, date_format),
            t.title.clone(),
            description,
        ]);
    }
    table
}

fn cmd_version() -> ExitCode {
    println!("todui version {}", env!("CARGO_PKG_VERSION"));
    if let Some(commit) = option_env!("TODUI_GIT_COMMIT") {
        println!("  commit: {commit}");
    }
    println!("  rust: {}", rustc_version_runtime::version());
    println!(
        "  os/arch: {}/{}",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    ExitCode::SUCCESS
}

fn truncate(s: &str, max: usize) -> String {
    let mut out: String = s.chars().take(max).collect();
    if s.chars().count() > max {
        out.push_str("...");
    }
    out
}
