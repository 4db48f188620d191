//! JSON-lines driver for the agent control surface.
//!
//! # Responsibility
//! - Read one `AgentAction` per stdin line and answer with one
//!   `ActionResponse` per stdout line.
//! - Wire config, logging, storage and sync delivery for `nexus_todo_core`.
//!
//! # Invariants
//! - A malformed line yields a `bad_request` response; the session continues.
//! - Nothing but response JSON is written to stdout.
//! - With sync enabled, the outbox is drained after every action.

use clap::Parser;
use log::{info, warn};
use nexus_todo_core::db::open_db;
use nexus_todo_core::{
    init_logging, ActionResponse, AgentAction, AutonomousController, CoreConfig,
    InMemoryTodoRepository, JsonLinesSink, KeywordEscalationPolicy, OwnerId, SqliteTodoRepository,
    SyncOutbox, SyncSink, TodoRepository, TodoService,
};
use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "nexus_todo_cli", version, about = "Owner-scoped todo tracker driven by JSON actions")]
struct Args {
    /// Account key that scopes every action in this session.
    #[arg(long)]
    owner: String,
    /// SQLite database file; omitted means an in-memory session.
    #[arg(long)]
    db: Option<PathBuf>,
    /// JSON config file; missing fields use defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Absolute directory for rolling log files; logging is off without it.
    #[arg(long)]
    log_dir: Option<String>,
    /// Overrides `logLevel` from the config file.
    #[arg(long)]
    log_level: Option<String>,
    /// JSON-lines file receiving sync events; required when sync is enabled.
    #[arg(long)]
    sync_out: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let config = match args.config.as_ref() {
        Some(path) => CoreConfig::load(path)?,
        None => CoreConfig::default(),
    };
    if let Some(log_dir) = args.log_dir.as_deref() {
        let level = args.log_level.as_deref().unwrap_or(config.log_level.as_str());
        init_logging(level, log_dir)?;
    }
    let owner = OwnerId::new(args.owner.as_str())?;
    let sink = match (config.sync.enabled, args.sync_out.as_ref()) {
        (true, Some(path)) => Some(JsonLinesSink::append_to(path)?),
        (true, None) => return Err("sync is enabled but --sync-out was not given".into()),
        (false, Some(_)) => {
            warn!("event=cli_start module=cli status=skip reason=sync_disabled");
            None
        }
        (false, None) => None,
    };
    let sink = sink.as_ref().map(|sink| sink as &dyn SyncSink);

    let stdin = io::stdin();
    let stdout = io::stdout();
    match args.db.as_ref() {
        Some(path) => {
            let mut conn = open_db(path)?;
            let repo = SqliteTodoRepository::try_new(&mut conn)?;
            let mut controller = build_controller(repo, &config)?;
            run_session(&mut controller, &owner, sink, stdin.lock(), stdout.lock())?;
        }
        None => {
            let mut controller = build_controller(InMemoryTodoRepository::new(), &config)?;
            run_session(&mut controller, &owner, sink, stdin.lock(), stdout.lock())?;
        }
    }
    Ok(())
}

fn build_controller<R: TodoRepository>(
    repo: R,
    config: &CoreConfig,
) -> Result<AutonomousController<R>, Box<dyn Error>> {
    let mut service = TodoService::new(repo).with_default_category(config.default_category.as_str());
    if let Some(outbox) = SyncOutbox::from_config(&config.sync) {
        service = service.with_outbox(outbox);
    }
    let policy = KeywordEscalationPolicy::new(config.escalation.clone())?;
    Ok(AutonomousController::with_policy(service, policy).with_planning(config.planning.clone()))
}

fn run_session<R, I, O>(
    controller: &mut AutonomousController<R>,
    owner: &OwnerId,
    sink: Option<&dyn SyncSink>,
    input: I,
    mut output: O,
) -> io::Result<()>
where
    R: TodoRepository,
    I: BufRead,
    O: Write,
{
    let mut handled = 0usize;
    for line in input.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<AgentAction>(trimmed) {
            Ok(action) => controller.handle(owner, action),
            Err(err) => {
                warn!(
                    "event=cli_action module=cli status=error owner={} error_code=bad_request",
                    owner
                );
                ActionResponse::failure("bad_request", format!("invalid action: {err}"))
            }
        };
        serde_json::to_writer(&mut output, &response)?;
        output.write_all(b"\n")?;
        output.flush()?;
        handled += 1;

        if let (Some(sink), Some(outbox)) = (sink, controller.service_mut().outbox_mut()) {
            let report = outbox.drain(sink);
            if report.dead_lettered > 0 {
                warn!(
                    "event=cli_sync module=cli status=error owner={} dead_lettered={} dead_letters_total={}",
                    owner,
                    report.dead_lettered,
                    outbox.dead_letters().len()
                );
            }
        }
    }

    if let Some(outbox) = controller.service().outbox() {
        info!(
            "event=cli_session module=cli status=ok owner={} actions={} sync_pending={} sync_dead_letters={}",
            owner,
            handled,
            outbox.pending_len(),
            outbox.dead_letters().len()
        );
    } else {
        info!(
            "event=cli_session module=cli status=ok owner={} actions={}",
            owner, handled
        );
    }
    Ok(())
}
