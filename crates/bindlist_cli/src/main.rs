//! CLI smoke entry point.
//!
//! # Responsibility
//! - Boot one app on the reference page and push a record through the form.
//! - Print the rendered rows so linkage and persistence can be eyeballed.
//!
//! Usage: `bindlist_cli [DB_PATH] [LOG_DIR]`. Without `DB_PATH` the slots live
//! in an in-memory SQLite database.

use bindlist_core::{
    build_record_page, core_version, default_log_level, init_logging, App, AppConfig, ArenaDom,
    Dom, SqliteStore, SubmitOutcome, UiEvent,
};
use log::info;
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("bindlist_cli error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let db_path = args.next();
    if let Some(log_dir) = args.next() {
        init_logging(default_log_level(), &log_dir)?;
    }

    let storage = match db_path.as_deref() {
        Some(path) => SqliteStore::open(path)?,
        None => SqliteStore::open_in_memory()?,
    };
    let config = AppConfig::default();
    let mut dom = ArenaDom::new();
    build_record_page(&mut dom, &config.validate()?, &config.schema)?;

    let app = App::bootstrap(dom, storage, config)?;
    println!("bindlist_core version={}", core_version());
    println!("restored records={}", app.model().borrow().len());

    {
        let mut view = app.view().borrow_mut();
        let fields: Vec<(String, _)> = view
            .form_fields()
            .iter()
            .map(|(field, node)| (field.to_string(), *node))
            .collect();
        for (field, node) in fields {
            let value = match field.as_str() {
                "author" => "Stanislaw Lem",
                "name" => "Solaris",
                "year" => "1961",
                "pages" => "204",
                _ => continue,
            };
            view.dom_mut().set_value(&node, value)?;
        }
    }

    match app.controller().submit()? {
        SubmitOutcome::Saved(mutation) => {
            info!("event=cli_submit module=cli status=ok id={}", mutation.id());
            println!("saved id={}", mutation.id());
        }
        SubmitOutcome::Rejected(errors) => println!("rejected: {errors}"),
    }
    app.dispatch(UiEvent::Reset)?;

    let view = app.view().borrow();
    let container = *view.template().container();
    for row in view.dom().children(&container) {
        println!("{}", view.dom().outer_html(row));
    }
    Ok(())
}
