//! Hive CLI binary.
//!
//! Subcommands: `start` (run a swarm config), `init`, `generate`, `ps`,
//! `show`, `list-sessions`, `watch`, `clean`, `restore`, `version`.
//! Exit codes: 0 on success, 1 on configuration or runtime failure.

use std::error::Error;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use cli::{config_file, providers, SessionStore};
use hive::{RestoreOptions, Swarm};

#[derive(Parser, Debug)]
#[command(name = "hive")]
#[command(about = "hive — run agent swarms from the command line")]
struct Args {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a swarm from a YAML config.
    Start {
        /// Path to the swarm config (default: hive.yml)
        config: Option<PathBuf>,
        /// Run one prompt non-interactively and print the final reply.
        #[arg(short, long, value_name = "TEXT")]
        prompt: Option<String>,
        /// Interactive mode, optionally seeded with an initial message.
        #[arg(short, long, value_name = "TEXT", num_args = 0..=1, default_missing_value = "")]
        interactive: Option<String>,
        /// Skip permission checks (sets bypass_permissions on every agent).
        #[arg(long)]
        vibe: bool,
        /// Print structured log events to stderr while running.
        #[arg(long)]
        stream_logs: bool,
        /// Verbose diagnostics.
        #[arg(long)]
        debug: bool,
        /// Run inside a git worktree (optionally named).
        #[arg(short = 'w', long, value_name = "NAME", num_args = 0..=1, default_missing_value = "")]
        worktree: Option<String>,
        /// Reuse a fixed session id.
        #[arg(long, value_name = "ID")]
        session_id: Option<String>,
        /// Root directory for relative agent directories (default: config dir).
        #[arg(long, value_name = "DIR")]
        root_dir: Option<PathBuf>,
    },
    /// Write a commented starter config to hive.yml.
    Init,
    /// Print a config skeleton to stdout.
    Generate,
    /// List running sessions.
    Ps,
    /// Show one session's record and result.
    Show { id: String },
    /// List all sessions.
    ListSessions,
    /// Tail a session's event log.
    Watch { id: String },
    /// Remove finished sessions.
    Clean,
    /// Restore a session's snapshot and optionally continue it.
    Restore {
        id: String,
        /// Prompt to run after restoring.
        #[arg(short, long, value_name = "TEXT")]
        prompt: Option<String>,
    },
    /// Print the version.
    Version,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(error) = run(args).await {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    config::load_and_apply("hive", None)?;

    match args.cmd {
        Command::Start {
            config,
            prompt,
            interactive,
            vibe,
            stream_logs,
            debug,
            worktree,
            session_id,
            root_dir,
        } => {
            init_tracing(debug);
            start(StartOptions {
                config: config.unwrap_or_else(|| PathBuf::from("hive.yml")),
                prompt,
                interactive,
                vibe,
                stream_logs,
                worktree,
                session_id,
                root_dir,
            })
            .await
        }
        Command::Init => {
            let path = PathBuf::from("hive.yml");
            if path.exists() {
                return Err("hive.yml already exists".into());
            }
            std::fs::write(&path, config_file::STARTER_CONFIG)?;
            println!("wrote {}", path.display());
            Ok(())
        }
        Command::Generate => {
            print!("{}", config_file::STARTER_CONFIG);
            Ok(())
        }
        Command::Ps => {
            let store = SessionStore::open(None);
            for record in store.list()? {
                if record.status == "running" {
                    println!("{}  {}  {}", record.id, record.swarm, record.created_at);
                }
            }
            Ok(())
        }
        Command::ListSessions => {
            let store = SessionStore::open(None);
            for record in store.list()? {
                println!(
                    "{}  {}  {}  {}",
                    record.id, record.status, record.swarm, record.created_at
                );
            }
            Ok(())
        }
        Command::Show { id } => {
            let store = SessionStore::open(None);
            let record = store.read_record(&id)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Command::Watch { id } => watch(&id).await,
        Command::Clean => {
            let removed = SessionStore::open(None).clean()?;
            println!("removed {removed} session(s)");
            Ok(())
        }
        Command::Restore { id, prompt } => restore(&id, prompt).await,
        Command::Version => {
            println!("hive {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

struct StartOptions {
    config: PathBuf,
    prompt: Option<String>,
    interactive: Option<String>,
    vibe: bool,
    stream_logs: bool,
    worktree: Option<String>,
    session_id: Option<String>,
    root_dir: Option<PathBuf>,
}

/// Builds the swarm described by the config file.
fn build_swarm(options: &StartOptions) -> Result<(Swarm, String), Box<dyn Error>> {
    let file = config_file::load_swarm_file(&options.config)?;
    let config_dir = options
        .config
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let root = match (&options.root_dir, &options.worktree) {
        (Some(dir), _) => dir.clone(),
        (None, Some(name)) => create_worktree(name)?,
        (None, None) => config_dir,
    };

    let mut definitions = file.definitions(&root)?;
    if options.vibe {
        for definition in &mut definitions {
            definition.bypass_permissions = true;
        }
    }

    let mut builder = Swarm::builder(file.swarm.name.clone());
    for definition in definitions {
        let provider = providers::resolve_provider(&definition)?;
        builder = builder
            .provider_for(definition.name.clone(), provider)
            .agent(definition);
    }
    if let Some(lead) = &file.swarm.lead {
        builder = builder.lead(lead.clone());
    }
    Ok((builder.build()?, file.swarm.name))
}

async fn start(options: StartOptions) -> Result<(), Box<dyn Error>> {
    let first_prompt = match (&options.prompt, &options.interactive) {
        (Some(prompt), _) => prompt.clone(),
        (None, Some(seed)) if !seed.is_empty() => seed.clone(),
        (None, Some(_)) => read_line("> ")?.ok_or("no input")?,
        (None, None) => return Err("pass --prompt <text> or --interactive".into()),
    };

    let (swarm, swarm_name) = build_swarm(&options)?;

    let store = SessionStore::open(None);
    let mut record = store.create(
        options.session_id.clone(),
        &swarm_name,
        Some(options.config.clone()),
        &first_prompt,
    )?;
    println!("session {}", record.id);

    // Every emitted event lands in the session's NDJSON log; --stream-logs
    // additionally mirrors it to stderr.
    let log_root = store.root().clone();
    let session_id = record.id.clone();
    let stream_logs = options.stream_logs;
    let _subscription = swarm.stream().subscribe(None, move |event| {
        let sink = SessionStore::open(Some(log_root.clone()));
        if let Err(error) = sink.append_event(&session_id, event) {
            tracing::warn!(%error, "failed to append session event");
        }
        if stream_logs {
            eprintln!("{event}");
        }
    });

    let mut outcome = swarm.execute(&first_prompt).await;

    if options.interactive.is_some() {
        while let Ok(reply) = &outcome {
            println!("{reply}");
            let Some(next) = read_line("> ")? else { break };
            if next.trim().is_empty() || next.trim() == "exit" {
                break;
            }
            outcome = swarm.execute(&next).await;
        }
    }

    match outcome {
        Ok(content) => {
            if options.interactive.is_none() {
                println!("{content}");
            }
            record.status = "done".to_string();
            record.result = Some(content);
            store.write_record(&record)?;
            store.write_snapshot(&record.id, &swarm.snapshot())?;
            Ok(())
        }
        Err(error) => {
            record.status = "failed".to_string();
            store.write_record(&record)?;
            store.write_snapshot(&record.id, &swarm.snapshot())?;
            Err(error.into())
        }
    }
}

async fn restore(id: &str, prompt: Option<String>) -> Result<(), Box<dyn Error>> {
    let store = SessionStore::open(None);
    let record = store.read_record(id)?;
    let snapshot = store.read_snapshot(id)?;
    let config = record
        .config_path
        .clone()
        .ok_or("session has no config path recorded")?;

    let (swarm, _) = build_swarm(&StartOptions {
        config,
        prompt: None,
        interactive: None,
        vibe: false,
        stream_logs: false,
        worktree: None,
        session_id: None,
        root_dir: None,
    })?;

    let result = swarm.restore(&snapshot, RestoreOptions::default()).await?;
    for warning in &result.warnings {
        eprintln!("warning: {warning:?}");
    }

    if let Some(prompt) = prompt {
        let content = swarm.execute(&prompt).await?;
        println!("{content}");
        store.write_snapshot(id, &swarm.snapshot())?;
    } else {
        println!("restored session {id}");
    }
    Ok(())
}

/// Follows a session's event log, printing new lines as they appear.
async fn watch(id: &str) -> Result<(), Box<dyn Error>> {
    let store = SessionStore::open(None);
    store.read_record(id)?;
    let path = store.events_path(id);
    let mut offset = 0usize;
    loop {
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            for line in content.lines().skip(offset) {
                println!("{line}");
                offset += 1;
            }
        }
        let record = store.read_record(id)?;
        if record.status != "running" {
            return Ok(());
        }
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    }
}

fn read_line(prompt: &str) -> Result<Option<String>, Box<dyn Error>> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    let read = std::io::stdin().lock().read_line(&mut line)?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches('\n').to_string()))
}

/// Creates (or reuses) a git worktree under `$SWARM_HOME/worktrees`.
fn create_worktree(name: &str) -> Result<PathBuf, Box<dyn Error>> {
    let name = if name.is_empty() {
        format!("wt-{}", uuid::Uuid::new_v4().simple())
    } else {
        name.to_string()
    };
    let dir = config::worktrees_dir().join(&name);
    if dir.exists() {
        return Ok(dir);
    }
    std::fs::create_dir_all(config::worktrees_dir())?;
    let status = std::process::Command::new("git")
        .arg("worktree")
        .arg("add")
        .arg(&dir)
        .status()?;
    if !status.success() {
        return Err(format!("git worktree add failed for {}", dir.display()).into());
    }
    Ok(dir)
}
