use crate::cli::commands::open_db;
use crate::cli::parser::{Commands, OriginArg};
use crate::config::Config;
use crate::db::queries::{EventFilter, load_events};
use crate::errors::AppResult;
use crate::models::event::Event;
use crate::models::origin::Origin;
use crate::utils::colors::{RESET, color_for_kind, colorize_employee, colorize_synced};

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::List {
        origin,
        employee,
        unsynced,
    } = cmd
    {
        let pool = open_db(cfg)?;
        let filter = EventFilter {
            origin: origin.map(|o| match o {
                OriginArg::Device => Origin::Device,
                OriginArg::Cloud => Origin::CloudPlatform,
            }),
            employee_key: *employee,
            unsynced_only: *unsynced,
        };

        let events = load_events(&pool.conn, &filter)?;
        if events.is_empty() {
            println!("No events.");
            return Ok(());
        }
        print_events(&events);
    }
    Ok(())
}

fn print_events(events: &[Event]) {
    let name_w = events
        .iter()
        .map(|e| e.display_name.chars().count())
        .max()
        .unwrap_or(4)
        .clamp(4, 24);

    println!(
        "{:>6} | {:>8} | {:<name_w$} | {:<19} | {:<9} | {:<6} | synced",
        "id", "employee", "name", "time", "kind", "origin",
        name_w = name_w
    );
    println!("{}", "-".repeat(74 + name_w));

    for e in events {
        let name: String = e.display_name.chars().take(name_w).collect();

        println!(
            "{:>6} | {} | {:<name_w$} | {:<19} | {}{:<9}{} | {:<6} | {}",
            e.id,
            colorize_employee(e.employee_key, 8),
            name,
            e.time_str(),
            color_for_kind(e.kind),
            e.kind.pk_as_str(),
            RESET,
            e.origin.to_db_str(),
            colorize_synced(e.synced),
            name_w = name_w
        );
    }

    println!("\n{} rows", events.len());
}
