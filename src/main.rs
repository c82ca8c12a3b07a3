mod cli;
mod config;
mod domain;
mod filter;
mod range;
mod report;
mod session;
mod store;
mod sync;

use anyhow::{Context, Result, anyhow};
use chrono::{Duration, NaiveDate, Utc};
use clap::Parser;
use std::io::{self, Write};
use std::path::Path;

use crate::cli::{Cli, Command, ExpenseCmd, RangeFlags, RangeOpt, TripCmd};
use crate::config::{AppConfig, app_paths, ledger_path, load_or_init_config, now_utc, today_local};
use crate::domain::coerce_amount;
use crate::filter::DayFilter;
use crate::range::{DateRange, Preset};
use crate::session::Session;
use crate::store::LedgerStore;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let today = today_local();

    if cli.guest {
        // Transient session: nothing touches disk and sync is off.
        let mut session = Session::new(LedgerStore::default(), DateRange::month_of(today));
        session.mark_loaded();

        return match cli.command {
            Command::Login(_) | Command::Logout | Command::Sync(_) => {
                Err(anyhow!("Sync is not available in guest mode"))
            }
            Command::Trip(args) => handle_trip(args.cmd, &mut session, None, today),
            Command::Expense(args) => handle_expense(args.cmd, &mut session, None, today),
            Command::Report(args) => handle_report(&mut session, &args.window, today),
            Command::Days(args) => handle_days(&mut session, &args.window, today),
        };
    }

    let paths = app_paths(cli.home.clone())?;
    let (mut cfg, cfg_path) = load_or_init_config(&paths)?;
    let ledger = ledger_path(&paths);

    match cli.command {
        Command::Login(args) => crate::sync::handle_login(args, &mut cfg, &cfg_path),
        Command::Logout => crate::sync::handle_logout(&mut cfg, &cfg_path),
        cmd => {
            let store = LedgerStore::load(&ledger, today)?;
            let mut session = Session::new(store, DateRange::month_of(today));
            session.mark_loaded();

            match cmd {
                Command::Trip(args) => {
                    let mut persist = Persist {
                        ledger_path: &ledger,
                        cfg: &mut cfg,
                        cfg_path: &cfg_path,
                    };
                    handle_trip(args.cmd, &mut session, Some(&mut persist), today)
                }
                Command::Expense(args) => {
                    let mut persist = Persist {
                        ledger_path: &ledger,
                        cfg: &mut cfg,
                        cfg_path: &cfg_path,
                    };
                    handle_expense(args.cmd, &mut session, Some(&mut persist), today)
                }
                Command::Report(args) => handle_report(&mut session, &args.window, today),
                Command::Days(args) => handle_days(&mut session, &args.window, today),
                Command::Sync(args) => {
                    crate::sync::handle_sync(&mut session, args, &mut cfg, &cfg_path, &ledger)
                }
                Command::Login(_) | Command::Logout => unreachable!(),
            }
        }
    }
}

/// Where local mutations go: the JSON cache, plus a best-effort push to
/// the remote store when a session token is configured. Guest runs pass
/// `None` and keep everything in memory.
struct Persist<'a> {
    ledger_path: &'a Path,
    cfg: &'a mut AppConfig,
    cfg_path: &'a Path,
}

fn commit(session: &mut Session, persist: Option<&mut Persist<'_>>) -> Result<()> {
    session.reconcile_day();
    if let Some(p) = persist {
        session.store.save(p.ledger_path, now_utc())?;
        crate::sync::auto_push(session, p.cfg, p.cfg_path);
    }
    Ok(())
}

fn handle_trip(
    cmd: TripCmd,
    session: &mut Session,
    persist: Option<&mut Persist<'_>>,
    today: NaiveDate,
) -> Result<()> {
    match cmd {
        TripCmd::Add {
            date,
            yesterday,
            client,
            price,
            km,
        } => {
            let date = resolve_entry_date(date.as_deref(), yesterday, today)?;
            let price = coerce_amount(&price);
            let km = coerce_amount(&km);

            let id = session
                .store
                .add_trip(date, client, price, km, today, now_millis());
            commit(session, persist)?;
            println!("Added trip {id} ({date}).");
            Ok(())
        }
        TripCmd::Set {
            id,
            date,
            client,
            price,
            km,
        } => {
            let date = date.as_deref().map(parse_date).transpose()?;
            let price = price.as_deref().map(coerce_amount);
            let km = km.as_deref().map(coerce_amount);

            session
                .store
                .update_trip(id, date, client, price, km, today)?;
            commit(session, persist)?;
            println!("Updated trip {id}.");
            Ok(())
        }
        TripCmd::Rm { id, yes } => {
            if !yes && !prompt_yes_no(&format!("Delete trip {id}? [Y/n] "))? {
                return Ok(());
            }
            if !session.store.remove_trip(id) {
                return Err(anyhow!("No such trip: {id}"));
            }
            commit(session, persist)?;
            println!("Deleted trip {id}.");
            Ok(())
        }
        TripCmd::List { window } => {
            apply_window(session, &window, today)?;
            let view = session.view();

            if view.trips.is_empty() {
                println!("(no trips)");
                return Ok(());
            }

            let rows: Vec<Vec<String>> = view
                .trips
                .iter()
                .map(|t| {
                    vec![
                        t.id.to_string(),
                        t.date.to_string(),
                        t.client.clone(),
                        t.price.to_string(),
                        t.distance_km.to_string(),
                    ]
                })
                .collect();
            print_table(&["ID", "DATE", "CLIENT", "PRICE", "KM"], &rows);
            Ok(())
        }
    }
}

fn handle_expense(
    cmd: ExpenseCmd,
    session: &mut Session,
    persist: Option<&mut Persist<'_>>,
    today: NaiveDate,
) -> Result<()> {
    match cmd {
        ExpenseCmd::Add {
            date,
            yesterday,
            concept,
            amount,
        } => {
            let date = resolve_entry_date(date.as_deref(), yesterday, today)?;
            let amount = coerce_amount(&amount);

            let id = session.store.add_expense(date, concept, amount, now_millis());
            commit(session, persist)?;
            println!("Added expense {id} ({date}).");
            Ok(())
        }
        ExpenseCmd::Set {
            id,
            date,
            concept,
            amount,
        } => {
            let date = date.as_deref().map(parse_date).transpose()?;
            let amount = amount.as_deref().map(coerce_amount);

            session.store.update_expense(id, date, concept, amount)?;
            commit(session, persist)?;
            println!("Updated expense {id}.");
            Ok(())
        }
        ExpenseCmd::Rm { id, yes } => {
            if !yes && !prompt_yes_no(&format!("Delete expense {id}? [Y/n] "))? {
                return Ok(());
            }
            if !session.store.remove_expense(id) {
                return Err(anyhow!("No such expense: {id}"));
            }
            commit(session, persist)?;
            println!("Deleted expense {id}.");
            Ok(())
        }
        ExpenseCmd::List { window } => {
            apply_window(session, &window, today)?;
            let view = session.view();

            if view.expenses.is_empty() {
                println!("(no expenses)");
                return Ok(());
            }

            let rows: Vec<Vec<String>> = view
                .expenses
                .iter()
                .map(|e| {
                    vec![
                        e.id.to_string(),
                        e.date.to_string(),
                        e.concept.clone(),
                        e.amount.to_string(),
                    ]
                })
                .collect();
            print_table(&["ID", "DATE", "CONCEPT", "AMOUNT"], &rows);
            Ok(())
        }
    }
}

fn handle_report(session: &mut Session, window: &RangeFlags, today: NaiveDate) -> Result<()> {
    apply_window(session, window, today)?;
    let range = session.range();
    let view = session.view();

    println!("window\t{}..{}", range.start, range.end);
    if let DayFilter::Day(day) = session.day() {
        println!("day\t{day}");
    }
    println!();

    if view.trips.is_empty() {
        println!("(no trips)");
    } else {
        let rows: Vec<Vec<String>> = view
            .trips
            .iter()
            .map(|t| {
                vec![
                    t.id.to_string(),
                    t.date.to_string(),
                    t.client.clone(),
                    t.price.to_string(),
                    t.distance_km.to_string(),
                ]
            })
            .collect();
        print_table(&["ID", "DATE", "CLIENT", "PRICE", "KM"], &rows);
    }
    println!();

    if view.expenses.is_empty() {
        println!("(no expenses)");
    } else {
        let rows: Vec<Vec<String>> = view
            .expenses
            .iter()
            .map(|e| {
                vec![
                    e.id.to_string(),
                    e.date.to_string(),
                    e.concept.clone(),
                    e.amount.to_string(),
                ]
            })
            .collect();
        print_table(&["ID", "DATE", "CONCEPT", "AMOUNT"], &rows);
    }
    println!();

    println!("income\t{}", view.totals.income);
    println!("distance_km\t{}", view.totals.distance_km);
    println!("expenses\t{}", view.totals.expense_total);
    if view.totals.is_loss() {
        println!("net_profit\t{}\t(loss)", view.totals.net_profit);
    } else {
        println!("net_profit\t{}", view.totals.net_profit);
    }

    if !view.per_day.is_empty() {
        println!();
        println!("(per day)");
        for (day, totals) in &view.per_day {
            println!("{day}\t{}\t{} km", totals.income, totals.distance_km);
        }
    }

    Ok(())
}

fn handle_days(session: &mut Session, window: &RangeFlags, today: NaiveDate) -> Result<()> {
    apply_window(session, window, today)?;
    let view = session.view();

    if view.days.is_empty() {
        println!("(no days)");
        return Ok(());
    }

    for day in &view.days {
        let records = crate::filter::filter_by_date(&view.trips, *day).len()
            + crate::filter::filter_by_date(&view.expenses, *day).len();
        let totals = view.per_day.get(day).copied().unwrap_or_default();
        println!(
            "{day}\t{}\t{} km\t{records} records",
            totals.income, totals.distance_km
        );
    }
    Ok(())
}

/// Apply the shared `--range`/`--from`/`--to`/`--day` flags to the
/// session. Range first: the day selection is validated against the
/// resulting option list.
fn apply_window(session: &mut Session, flags: &RangeFlags, today: NaiveDate) -> Result<()> {
    session.select_range(resolve_window(flags, today)?);

    if let Some(raw) = flags.day.as_deref() {
        if raw.eq_ignore_ascii_case("all") {
            session.select_day(DayFilter::AllDays);
        } else {
            session.select_day(DayFilter::Day(parse_date(raw)?));
        }
    }
    Ok(())
}

fn resolve_window(flags: &RangeFlags, today: NaiveDate) -> Result<DateRange> {
    match (flags.from.as_deref(), flags.to.as_deref()) {
        (Some(from), Some(to)) => {
            if flags.range.is_some() {
                return Err(anyhow!("--from/--to cannot be combined with --range"));
            }
            let custom = DateRange::new(parse_date(from)?, parse_date(to)?);
            Ok(crate::range::resolve(Preset::Custom, today, Some(custom)))
        }
        (None, None) => {
            let preset = match flags.range {
                Some(RangeOpt::Today) => Preset::Today,
                Some(RangeOpt::Week) => Preset::Week,
                None | Some(RangeOpt::Month) => Preset::Month,
            };
            Ok(crate::range::resolve(preset, today, None))
        }
        _ => Err(anyhow!("--from and --to must be given together")),
    }
}

fn resolve_entry_date(
    date: Option<&str>,
    yesterday: bool,
    today: NaiveDate,
) -> Result<NaiveDate> {
    if yesterday {
        return Ok(today - Duration::days(1));
    }
    match date {
        Some(raw) => parse_date(raw),
        None => Ok(today),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date (expected YYYY-MM-DD): {raw}"))
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let cols = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();

    for row in rows {
        for (i, cell) in row.iter().take(cols).enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    fn print_row(cells: &[String], widths: &[usize]) {
        print!("|");
        for (i, w) in widths.iter().enumerate() {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            print!(" {:width$} |", cell, width = *w);
        }
        println!();
    }

    fn print_sep(widths: &[usize]) {
        print!("|");
        for w in widths {
            print!("{}|", "-".repeat(w + 2));
        }
        println!();
    }

    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    print_row(&header_cells, &widths);
    print_sep(&widths);
    for row in rows {
        print_row(row, &widths);
    }
}

fn prompt_yes_no(prompt: &str) -> Result<bool> {
    eprint!("{prompt}");
    io::stderr().flush().ok();
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let s = line.trim();
    if s.is_empty() {
        return Ok(true);
    }
    Ok(matches!(s.to_ascii_lowercase().as_str(), "y" | "yes"))
}
