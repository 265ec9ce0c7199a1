use mimalloc::MiMalloc;
use std::str::FromStr;
use tagvault::config::{Config, DEFAULT_CONFIG_FILE};
use tagvault::utils::logging::init_tracing;
use tagvault::{ProfileEntry, ProfileRegistry, ProfileStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{error, info, warn};
use uuid::Uuid;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Drives the registry from host session events read on stdin, one per line:
///
/// ```text
/// start <uuid> <name>
/// end <uuid>
/// tag <uuid> <tag|-> [prefix]
/// rename <uuid> <name>
/// show <uuid|name>
/// delete <uuid>
/// list
/// ```
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
    let cfg = Config::load(&path)?;

    init_tracing(&cfg.basic.loglevel);
    info!(
        config = %path,
        engine = %cfg.storage.engine,
        max_in_flight = cfg.storage.max_in_flight,
        "configuration loaded"
    );

    let executor = match tagvault::db::open(&cfg.storage).await {
        Ok(executor) => executor,
        Err(e) => {
            error!(error = %e, "backend unavailable; refusing to start");
            return Err(e.into());
        }
    };
    if !executor.ensure_schema()?.wait().await {
        return Err("schema bootstrap failed".into());
    }

    let store = ProfileStore::new(executor.clone());
    let registry = ProfileRegistry::new(store, Vec::<(Uuid, String)>::new());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => handle_line(&registry, &line),
                None => break,
            },
            _ = &mut shutdown => break,
        }
    }

    for uuid in registry.identities() {
        registry.on_session_end(uuid);
    }
    executor.shutdown().await?;
    info!("Shut down gracefully.");
    Ok(())
}

/// One parsed stdin line.
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Start(Uuid, &'a str),
    End(Uuid),
    Tag(Uuid, Option<&'a str>, Option<&'a str>),
    Rename(Uuid, &'a str),
    Show(&'a str),
    Delete(Uuid),
    List,
}

impl<'a> Command<'a> {
    /// `Ok(None)` for a blank line; `Err` carries the text to print back.
    /// The prefix is the verbatim remainder of a `tag` line, trailing spaces included.
    fn parse(line: &'a str) -> Result<Option<Self>, String> {
        let mut parts = line.splitn(4, ' ');
        let command = match parts.next().unwrap_or_default() {
            "" => return Ok(None),
            "start" => match (parse_uuid(parts.next()), parts.next()) {
                (Some(uuid), Some(name)) => Command::Start(uuid, name),
                _ => return Err("usage: start <uuid> <name>".into()),
            },
            "end" => match parse_uuid(parts.next()) {
                Some(uuid) => Command::End(uuid),
                None => return Err("usage: end <uuid>".into()),
            },
            "tag" => match (parse_uuid(parts.next()), parts.next()) {
                (Some(uuid), Some(tag)) => {
                    let tag = (tag != "-").then_some(tag);
                    let prefix = parts.next().filter(|p| *p != "-");
                    Command::Tag(uuid, tag, prefix)
                }
                _ => return Err("usage: tag <uuid> <tag|-> [prefix]".into()),
            },
            "rename" => match (parse_uuid(parts.next()), parts.next()) {
                (Some(uuid), Some(name)) => Command::Rename(uuid, name),
                _ => return Err("usage: rename <uuid> <name>".into()),
            },
            "show" => match parts.next() {
                Some(key) => Command::Show(key),
                None => return Err("usage: show <uuid|name>".into()),
            },
            "delete" => match parse_uuid(parts.next()) {
                Some(uuid) => Command::Delete(uuid),
                None => return Err("usage: delete <uuid>".into()),
            },
            "list" => Command::List,
            other => return Err(format!("unknown command: {other}")),
        };
        Ok(Some(command))
    }
}

fn handle_line(registry: &ProfileRegistry, line: &str) {
    let command = match Command::parse(line) {
        Ok(Some(command)) => command,
        Ok(None) => return,
        Err(usage) => {
            println!("{usage}");
            return;
        }
    };
    match command {
        Command::Start(uuid, name) => {
            registry.on_session_start(uuid, name);
        }
        Command::End(uuid) => {
            if !registry.on_session_end(uuid) {
                println!("not found");
            }
        }
        Command::Tag(uuid, tag, prefix) => {
            if !registry.set_tag(uuid, tag.map(str::to_string), prefix.map(str::to_string)) {
                println!("not found");
            }
        }
        Command::Rename(uuid, name) => {
            if !registry.rename(uuid, name) {
                println!("not found");
            }
        }
        Command::Show(key) => {
            let found = match Uuid::from_str(key) {
                Ok(uuid) => registry.by_identity(uuid),
                Err(_) => registry.by_name(key),
            };
            match found {
                Some(entry) => println!("{}", describe(&entry)),
                None => println!("not found"),
            }
        }
        Command::Delete(uuid) => {
            if let Err(e) = registry.store().delete_one(uuid) {
                warn!(%uuid, error = %e, "failed to schedule delete");
            }
        }
        Command::List => {
            for uuid in registry.identities() {
                if let Some(entry) = registry.by_identity(uuid) {
                    println!("{}", describe(&entry));
                }
            }
        }
    }
}

fn parse_uuid(raw: Option<&str>) -> Option<Uuid> {
    raw.and_then(|s| Uuid::from_str(s).ok())
}

fn describe(entry: &ProfileEntry) -> String {
    let profile = &entry.profile;
    let tag = if profile.has_tag() {
        format!(
            "{} ({:?})",
            profile.tag.as_deref().unwrap_or_default(),
            profile.tag_prefix.as_deref().unwrap_or_default()
        )
    } else {
        "<none>".to_string()
    };
    format!(
        "{} {} state={:?} tag={}",
        profile.uuid, profile.name, entry.state, tag
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
