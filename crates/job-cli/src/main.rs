use std::process::exit;

use job_core::{JobId, LogEvent, LogLevel, StoreError};
use job_persistence::PgStatusStore;

const USAGE: &str = "Uso: job-cli show <ID> | tail <ID> [--level L] [--offset N] [--limit N] | remove <ID> | list [--limit N]";

fn main() {
    // Cargar .env si existe para obtener DATABASE_URL
    let _ = dotenvy::dotenv();
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("{USAGE}");
        exit(2);
    }
    let code = match args[1].as_str() {
        "show" => with_id(&args, "show", show),
        "tail" => with_id(&args, "tail", |store, id| tail(store, id, &args[3..])),
        "remove" => with_id(&args, "remove", remove),
        "list" => list(&args[2..]),
        other => {
            eprintln!("[job-cli] subcomando desconocido: {other}\n{USAGE}");
            2
        }
    };
    exit(code);
}

fn open_store() -> Result<PgStatusStore, i32> {
    job_persistence::open_store_from_env().map_err(|e| {
                                              eprintln!("[job-cli] no se pudo abrir el store: {e}");
                                              5
                                          })
}

fn with_id<F>(args: &[String], cmd: &str, f: F) -> i32
    where F: FnOnce(&PgStatusStore, &JobId) -> Result<i32, StoreError>
{
    let Some(raw) = args.get(2) else {
        eprintln!("[job-cli {cmd}] falta <ID>\n{USAGE}");
        return 2;
    };
    let id = JobId::parse(raw);
    if id.is_empty() {
        eprintln!("[job-cli {cmd}] id vacío");
        return 2;
    }
    let store = match open_store() {
        Ok(s) => s,
        Err(code) => return code,
    };
    match f(&store, &id) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("[job-cli {cmd}] error: {e}");
            5
        }
    }
}

struct Flags {
    level: Option<LogLevel>,
    offset: usize,
    limit: i64,
}

/// Parsea `--flag valor`; None ante flags desconocidos o valores inválidos.
fn parse_flags(args: &[String], default_limit: i64) -> Option<Flags> {
    let mut flags = Flags { level: None, offset: 0, limit: default_limit };
    let mut i = 0;
    while i < args.len() {
        let value = args.get(i + 1);
        match args[i].as_str() {
            "--level" => flags.level = Some(value?.parse().ok()?),
            "--offset" => flags.offset = value?.parse().ok()?,
            "--limit" => flags.limit = value?.parse().ok()?,
            _ => return None,
        }
        i += 2;
    }
    Some(flags)
}

fn show(store: &PgStatusStore, id: &JobId) -> Result<i32, StoreError> {
    let Some(status) = store.load(id)? else {
        eprintln!("[job-cli show] job no encontrado: {id}");
        return Ok(4);
    };
    let tail = status.log_tail();
    let summary = serde_json::json!({
        "id": id.to_string(),
        "status": &status,
        "log_lines": tail.size()?,
        "has_errors": tail.has_log_level(LogLevel::Error)?,
    });
    println!("{}", serde_json::to_string_pretty(&summary).unwrap_or_else(|_| summary.to_string()));
    Ok(0)
}

fn print_event(event: &LogEvent) {
    let mut line = format!("{} {:<5} {}", event.timestamp.to_rfc3339(), event.level.as_str(), event.formatted_message());
    if let Some(t) = &event.throwable {
        line.push_str(&format!(" [{}: {}]", t.type_name, t.message.as_deref().unwrap_or("")));
    }
    println!("{line}");
}

fn tail(store: &PgStatusStore, id: &JobId, rest: &[String]) -> Result<i32, StoreError> {
    let Some(flags) = parse_flags(rest, 0) else {
        eprintln!("{USAGE}");
        return Ok(2);
    };
    let Some(status) = store.load(id)? else {
        eprintln!("[job-cli tail] job no encontrado: {id}");
        return Ok(4);
    };
    for event in status.log_tail().log_events(flags.level, flags.offset, flags.limit) {
        print_event(&event?);
    }
    Ok(0)
}

fn remove(store: &PgStatusStore, id: &JobId) -> Result<i32, StoreError> {
    store.remove(id)?;
    println!("eliminado: {id}");
    Ok(0)
}

fn list(rest: &[String]) -> i32 {
    let Some(flags) = parse_flags(rest, 100) else {
        eprintln!("{USAGE}");
        return 2;
    };
    let store = match open_store() {
        Ok(s) => s,
        Err(code) => return code,
    };
    match store.list(flags.limit) {
        Ok(rows) => {
            for row in rows {
                println!("{}\t{}\t{}\t{}",
                         row.full_job_id,
                         row.job_type.as_deref().unwrap_or("-"),
                         row.state.as_deref().unwrap_or("-"),
                         row.end_date.map(|d| d.to_rfc3339()).unwrap_or_else(|| "-".into()));
            }
            0
        }
        Err(e) => {
            eprintln!("[job-cli list] error: {e}");
            5
        }
    }
}
