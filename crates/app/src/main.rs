use std::fmt;
use std::sync::Arc;

use services::{AppServices, Clock, LoggingRefresher};
use tracing_subscriber::EnvFilter;
use words_core::model::{NewSheet, SheetRemoteId, WidgetId};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidWidgetId { raw: String },
    InvalidSheetIndex { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidWidgetId { raw } => write!(f, "invalid --widget value: {raw}"),
            ArgsError::InvalidSheetIndex { raw } => write!(f, "invalid --index value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  app add      --widget <id> --spreadsheet <id> [--index <n>] --name <name> [--db <url>]");
    eprintln!("  app sync     --widget <id> [--db <url>]");
    eprintln!("  app sync-all [--db <url>]");
    eprintln!("  app delete   --widget <id> [--db <url>]");
    eprintln!("  app words    --widget <id> [--db <url>]");
    eprintln!("  app widgets  [--db <url>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:words.sqlite3");
    eprintln!("  --index 0");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  WORDS_DB_URL, WORDS_SHEETS_BASE_URL, WORDS_FETCH_TIMEOUT_SECS, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Add,
    Sync,
    SyncAll,
    Delete,
    Words,
    Widgets,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "add" => Some(Self::Add),
            "sync" => Some(Self::Sync),
            "sync-all" => Some(Self::SyncAll),
            "delete" => Some(Self::Delete),
            "words" => Some(Self::Words),
            "widgets" => Some(Self::Widgets),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Args {
    db_url: String,
    widget_id: Option<WidgetId>,
    spreadsheet_id: Option<String>,
    sheet_index: u32,
    name: Option<String>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            db_url: std::env::var("WORDS_DB_URL")
                .ok()
                .map_or_else(|| normalize_sqlite_url("words.sqlite3".into()), normalize_sqlite_url),
            ..Self::default()
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(value);
                }
                "--widget" => {
                    let value = require_value(args, "--widget")?;
                    let id = value
                        .parse::<WidgetId>()
                        .map_err(|_| ArgsError::InvalidWidgetId { raw: value.clone() })?;
                    parsed.widget_id = Some(id);
                }
                "--spreadsheet" => {
                    parsed.spreadsheet_id = Some(require_value(args, "--spreadsheet")?);
                }
                "--index" => {
                    let value = require_value(args, "--index")?;
                    parsed.sheet_index = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidSheetIndex { raw: value.clone() })?;
                }
                "--name" => {
                    parsed.name = Some(require_value(args, "--name")?);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }

    fn widget_id(&self) -> Result<WidgetId, ArgsError> {
        self.widget_id.ok_or(ArgsError::MissingFlag { flag: "--widget" })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let cmd = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let parsed = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    prepare_sqlite_file(&parsed.db_url)?;
    let services =
        AppServices::new_sqlite(&parsed.db_url, Arc::new(LoggingRefresher), Clock::system())
            .await?;

    match cmd {
        Command::Add => {
            let widget_id = parsed.widget_id()?;
            let spreadsheet = parsed
                .spreadsheet_id
                .clone()
                .ok_or(ArgsError::MissingFlag {
                    flag: "--spreadsheet",
                })?;
            let name = parsed
                .name
                .clone()
                .ok_or(ArgsError::MissingFlag { flag: "--name" })?;
            let remote_id = SheetRemoteId::new(spreadsheet, parsed.sheet_index)?;
            let new_sheet = NewSheet::new(remote_id, name)?;

            let added = services.add_widget().run(widget_id, new_sheet).await?;
            println!("{}", if added { "added" } else { "failed" });
        }
        Command::Sync => {
            let widget_id = parsed.widget_id()?;
            let ok = services.synchronize_words().run(widget_id).await?;
            println!("{}", if ok { "synchronized" } else { "failed" });
        }
        Command::SyncAll => {
            for (widget_id, ok) in services.synchronize_words().run_all().await? {
                println!("{widget_id}\t{}", if ok { "synchronized" } else { "failed" });
            }
        }
        Command::Delete => {
            services.delete_widget().run(parsed.widget_id()?).await?;
        }
        Command::Words => {
            let widget_id = parsed.widget_id()?;
            match services.widgets().widget_with_sheet(widget_id).await? {
                Some((_, sheet)) => {
                    for pair in services.words().current_words(sheet.id()).await? {
                        println!("{}\t{}", pair.original, pair.translated);
                    }
                }
                None => eprintln!("widget {widget_id} not found"),
            }
        }
        Command::Widgets => {
            for widget in services.widgets().list_widgets().await? {
                if let Some((_, sheet)) = services.widgets().widget_with_sheet(widget.id()).await? {
                    let synced = sheet
                        .last_synchronized_at()
                        .map_or_else(|| "never".to_string(), |at| at.to_rfc3339());
                    println!(
                        "{}\t{}\t{}\t{synced}",
                        widget.id(),
                        sheet.remote_id(),
                        sheet.name()
                    );
                }
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
