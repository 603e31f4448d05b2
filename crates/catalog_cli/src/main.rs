//! Catalog CLI entry point.
//!
//! # Responsibility
//! - Provide a minimal executable over `catalog_core` for local checks.
//! - Print results as JSON; exit non-zero on failure.

mod args;

use args::{Cli, Command};
use catalog_core::{default_log_level, init_logging, Book, BookPatch, CatalogService, DbResult};
use clap::Parser;
use log::info;
use serde_json::{json, Value};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_ref() {
        let level = cli
            .log_level
            .clone()
            .unwrap_or_else(|| default_log_level().to_string());
        if let Err(err) = init_logging(&level, log_dir) {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    }

    match run(&cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<Value, String> {
    if cli.command == Command::Ping {
        return Ok(ping_output());
    }

    let service = CatalogService::open(&cli.store_address).map_err(|err| err.to_string())?;
    info!(
        "event=cli_command module=cli status=start command={}",
        cli.command.name()
    );
    let output = dispatch(&service, &cli.command);
    finish(output, service.close())
}

/// Combines the command result with the store close result; the command
/// error wins when both fail.
fn finish(output: Result<Value, String>, closed: DbResult<()>) -> Result<Value, String> {
    match (output, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err.to_string()),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => Err(format!("{err} (closing store also failed: {close_err})")),
    }
}

fn ping_output() -> Value {
    json!({
        "ping": catalog_core::ping(),
        "version": catalog_core::core_version(),
    })
}

fn dispatch(service: &CatalogService, command: &Command) -> Result<Value, String> {
    match command {
        Command::Ping => Ok(ping_output()),
        Command::Add {
            isbn,
            copies,
            title,
            authors,
        } => {
            let book = Book::new(isbn.as_str(), title.as_str(), authors.iter().cloned(), *copies);
            let stored = service.create(&book).map_err(|err| err.to_string())?;
            Ok(json!(Book::from(stored)))
        }
        Command::Get { isbn } => service
            .get(isbn)
            .map(|book| json!(book))
            .map_err(|err| err.to_string()),
        Command::SetTitle { isbn, title } => {
            let patch = BookPatch {
                title: Some(title.clone()),
                ..BookPatch::default()
            };
            service
                .update(isbn, &patch)
                .map(|modified| json!({ "modified": modified }))
                .map_err(|err| err.to_string())
        }
        Command::Remove { isbn } => service
            .remove(isbn)
            .map(|deleted| json!({ "deleted": deleted }))
            .map_err(|err| err.to_string()),
        Command::Search {
            text,
            offset,
            limit,
        } => service
            .search(text, *offset, *limit)
            .map(|books| json!(books))
            .map_err(|err| err.to_string()),
    }
}
