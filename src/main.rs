// src/main.rs

use std::env;
use std::io::{self, Write};

use log::{debug, info, warn};

use simpledb::database::{Database, DEFAULT_DB_FILE};

fn usage() {
    println!("commands: get <key> | set <key> <value> | .exit");
}

fn execute(db: &mut Database, line: &str) {
    let mut parts = line.splitn(3, char::is_whitespace);
    match (parts.next(), parts.next(), parts.next()) {
        (Some("get"), Some(key), None) => match db.get(key) {
            Ok(Some(value)) => println!("{}", value),
            Ok(None) => println!("(not found)"),
            Err(e) => warn!("get {}: {}", key, e),
        },
        (Some("set"), Some(key), Some(value)) => {
            // values may contain spaces; only the key is split off
            match db.set(key, value.trim()) {
                Ok(stored) => {
                    debug!("set {} = {:?}", key, stored);
                    println!("{}", stored);
                }
                Err(e) => warn!("set {}: {}", key, e),
            }
        }
        _ => usage(),
    }
}

fn main() -> io::Result<()> {
    env_logger::init();

    let path = env::args().nth(1).unwrap_or_else(|| DEFAULT_DB_FILE.to_string());
    let mut db = Database::new(&path).map_err(io::Error::other)?;
    if let Err(e) = db.open() {
        warn!("{}: {}", path, e);
        return Err(io::Error::other(e));
    }
    info!("simpledb: {} opened. Type .exit to quit.", path);

    loop {
        print!("simpledb> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break; // EOF
        }
        let trimmed = input.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.eq_ignore_ascii_case(".exit") {
            break;
        }
        execute(&mut db, trimmed);
    }

    Ok(())
}
