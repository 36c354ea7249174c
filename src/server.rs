use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use log::{error, info};

use crate::common::Result;
use crate::engine::{Engine, Session};
use crate::parser::{self, Command};

const PROMPT: &[u8] = b"pagedb> ";

/// Serves the line protocol forever: one blocking accept loop, one thread
/// per client. Sessions share the engine's storage state but keep their own
/// database selection.
pub fn run(engine: Arc<Engine>, addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr)?;
    info!("listening on {addr}, database '{}'", engine.mounted_db());

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    if let Err(e) = handle_client(engine, stream) {
                        error!("client session ended with error: {e}");
                    }
                });
            }
            Err(e) => error!("accept failed: {e}"),
        }
    }
    Ok(())
}

fn handle_client(engine: Arc<Engine>, stream: TcpStream) -> std::io::Result<()> {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "<unknown>".to_string());
    info!("client connected: {peer}");

    let mut session = Session::new(engine);
    let reader = BufReader::new(stream.try_clone()?);
    let mut out = stream;

    out.write_all(b"Welcome to pagedb.\n")?;
    out.write_all(PROMPT)?;

    for line in reader.lines() {
        let line = line?;
        let input = line.trim();
        if input.is_empty() {
            out.write_all(PROMPT)?;
            continue;
        }

        match parser::parse(input) {
            Ok(Command::Quit) => break,
            Ok(command) => {
                let start = Instant::now();
                match dispatch(&mut session, command) {
                    Ok(output) => {
                        if !output.is_empty() {
                            out.write_all(output.as_bytes())?;
                            out.write_all(b"\n")?;
                        }
                        let elapsed = start.elapsed().as_secs_f64();
                        out.write_all(format!("({elapsed:.4} sec)\n").as_bytes())?;
                    }
                    Err(e) => out.write_all(format!("Error: {e}\n").as_bytes())?,
                }
            }
            Err(e) => out.write_all(format!("Error: {e}\n").as_bytes())?,
        }
        out.write_all(PROMPT)?;
    }

    info!("client disconnected: {peer}");
    Ok(())
}

/// Executes one parsed command against the session, producing the text sent
/// back to the client.
pub fn dispatch(session: &mut Session, command: Command) -> Result<String> {
    let engine = Arc::clone(session.engine());
    match command {
        Command::Help => Ok(help_text()),
        // Handled by the connection loop; harmless as a no-op here.
        Command::Quit => Ok(String::new()),

        Command::ShowDatabases => {
            let mut out = String::from("Databases:");
            for name in engine.show_databases()? {
                out.push_str(&format!("\n- {name}"));
            }
            Ok(out)
        }
        Command::CreateDatabase(name) => {
            engine.create_database(&name)?;
            Ok("Database created.".to_string())
        }
        Command::DropDatabase(name) => {
            session.drop_database(&name)?;
            Ok("Database dropped.".to_string())
        }
        Command::UseDatabase(name) => {
            session.use_database(&name)?;
            Ok(format!("Database changed to '{name}'."))
        }

        Command::ShowTables => {
            let db = session.ensure_db_selected()?;
            let mut out = format!("Tables_in_{db}:");
            for name in engine.table_names() {
                out.push_str(&format!("\n- {name}"));
            }
            Ok(out)
        }
        Command::CreateTable { name, schema } => {
            session.ensure_db_selected()?;
            engine.create_table(&name, &schema)?;
            Ok("Query OK, 0 rows affected.".to_string())
        }
        Command::Describe(name) => {
            session.ensure_db_selected()?;
            engine.describe_table(&name)
        }
        Command::DropTable(name) => {
            session.ensure_db_selected()?;
            engine.drop_table(&name)?;
            Ok("Query OK, 0 rows affected.".to_string())
        }

        Command::Insert { table, key, value } => {
            session.ensure_db_selected()?;
            engine.insert(&table, key, &value)?;
            Ok("Query OK, 1 row affected.".to_string())
        }
        Command::SelectAll { table } => {
            session.ensure_db_selected()?;
            let rows = engine.select_all(&table)?;
            let mut out = format!("--- {table} ---");
            for (key, value) in &rows {
                out.push_str(&format!("\n[{key}] {value}"));
            }
            out.push_str(&format!("\n({} rows)", rows.len()));
            Ok(out)
        }
        Command::SelectById { table, key } => {
            session.ensure_db_selected()?;
            match engine.select_by_id(&table, key)? {
                Some(value) => Ok(format!("--- {table} ---\n[{key}] {value}\n(1 row)")),
                None => Ok("Empty set.".to_string()),
            }
        }
        Command::DeleteById { table, key } => {
            session.ensure_db_selected()?;
            if engine.delete_row(&table, key)? {
                Ok("Query OK, 1 row affected.".to_string())
            } else {
                Ok("Query OK, 0 rows affected.".to_string())
            }
        }
    }
}

fn help_text() -> String {
    [
        "--- pagedb help ---",
        "1.  show databases;",
        "2.  create database <name>;",
        "3.  drop database <name>;",
        "4.  use <name>;",
        "5.  show tables;",
        "6.  create table <name> (<col> <type>, ...);",
        "7.  describe <table>;",
        "8.  insert into <table> values (<id>, <data...>);",
        "9.  select * from <table> [where id = <val>];",
        "10. delete from <table> where id = <val>;",
        "11. drop table <table>;",
        "12. quit",
    ]
    .join("\n")
}
