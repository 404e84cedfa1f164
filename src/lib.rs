pub mod clients;
pub mod config;
pub mod db;
pub mod entities;
pub mod models;
pub mod scheduler;
pub mod services;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use clients::inpa::InpaClient;
pub use config::Config;
use db::Store;
use models::search::{FilterValue, SavedSearch};
use scheduler::{AppState, Scheduler};

pub async fn run() -> Result<()> {
    let config = Config::load()?;
    config.validate()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    match args[1].as_str() {
        "daemon" | "-d" | "--daemon" => {
            config.require_telegram_token()?;
            run_daemon(config).await
        }

        "check" | "-c" | "--check" => {
            config.require_telegram_token()?;
            run_single_check(config).await
        }

        "list" | "ls" | "l" => cmd_list(&config, args.get(2).map(String::as_str)).await,

        "add" | "a" => cmd_add(&config, &args[2..]).await,

        "remove" | "rm" | "r" => {
            if args.len() < 4 {
                println!("Usage: bandarr remove <chat_id> <search_id>");
                println!("Use 'bandarr list' to see search IDs");
                return Ok(());
            }
            cmd_remove(&config, &args[2], &args[3]).await
        }

        "test" | "t" => {
            if args.len() < 3 {
                println!("Usage: bandarr test <chat_id>");
                return Ok(());
            }
            cmd_test(&config, &args[2]).await
        }

        "vocab" | "v" => cmd_vocab(&config, args.get(2).map(String::as_str)).await,

        "init" | "--init" => {
            Config::create_default_if_missing()?;
            println!("✓ Config file created. Edit config.toml and run again.");
            Ok(())
        }

        "help" | "-h" | "--help" => {
            print_help();
            Ok(())
        }

        _ => {
            println!("Unknown command: {}", args[1]);
            println!();
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    println!("Bandarr - inPA Saved-Search Watcher");
    println!("Polls the inPA catalog and notifies users of new notices over Telegram");
    println!();
    println!("USAGE:");
    println!("  bandarr <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("  add <chat_id> <text> --category <id>=<name> [...]");
    println!("                    Create a saved search for a user");
    println!("  list, ls [chat]   List users and their saved searches");
    println!("  remove, rm <chat_id> <search_id>");
    println!("                    Delete a saved search");
    println!("  test <chat_id>    Run a user's searches now, print results only");
    println!("  vocab <kind>      Print a filter vocabulary (categories, regions, sectors)");
    println!("  check             Run a single poll cycle");
    println!("  daemon            Run as background daemon with scheduler");
    println!("  init              Create default config file");
    println!("  help              Show this help message");
    println!();
    println!("ADD OPTIONS (repeatable):");
    println!("  --category <id>=<name>   Required at least once");
    println!("  --region <id>=<name>     Optional; none means all regions");
    println!("  --sector <id>=<name>     Optional; none means all sectors");
    println!();
    println!("EXAMPLES:");
    println!("  bandarr vocab categories");
    println!("  bandarr add 123456789 bibliotec --category C1=Concorsi");
    println!("  bandarr add 123456789 ingegnere --category C1=Concorsi \\");
    println!("      --region R12=Lazio --region R9=Toscana");
    println!("  bandarr test 123456789            # Dry run, nothing is committed");
    println!("  bandarr check                     # One cycle, notifies and commits");
    println!("  bandarr daemon                    # Start background service");
    println!();
    println!("CONFIG:");
    println!("  Edit config.toml to configure the database, scheduler, and Telegram.");
    println!("  The bot token can also come from BANDARR_TELEGRAM_TOKEN.");
}

async fn run_daemon(config: Config) -> Result<()> {
    info!(
        "Bandarr v{} starting in daemon mode...",
        env!("CARGO_PKG_VERSION")
    );

    let state = AppState::new(config).await?;
    let scheduler = Arc::new(Scheduler::new(&state));

    let scheduler_handle = {
        let sched = Arc::clone(&scheduler);
        tokio::spawn(async move {
            if let Err(e) = sched.start().await {
                error!("Scheduler error: {e:#}");
            }
        })
    };

    info!("Daemon running. Press Ctrl+C to stop.");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(e) => {
            error!("Error listening for shutdown: {e}");
        }
    }

    scheduler.stop();
    // Let an in-flight cycle finish its current user before exiting.
    let _ = scheduler_handle.await;
    info!("Daemon stopped");

    Ok(())
}

async fn run_single_check(config: Config) -> Result<()> {
    info!("Running single check...");

    let state = AppState::new(config).await?;
    let scheduler = Scheduler::new(&state);
    let stats = scheduler.run_once().await?;

    println!(
        "Check complete. {} new items across {} searches ({} failed queries).",
        stats.new_items, stats.searches, stats.failed_queries
    );

    Ok(())
}

async fn cmd_list(config: &Config, chat_id: Option<&str>) -> Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    let users = match chat_id {
        Some(id) => vec![store.get_user(id).await?],
        None => store.all_users().await?,
    };

    if users.is_empty() {
        println!("No users yet.");
        println!();
        println!("Add a search with: bandarr add <chat_id> <text> --category <id>=<name>");
        return Ok(());
    }

    for view in &users {
        println!("User {}", view.chat_id);

        if view.searches.is_empty() {
            println!("  (no saved searches)");
        }
        for search in &view.searches {
            let seen = view.seen.get(&search.id).map_or(0, HashSet::len);
            println!("  • {} [{}]", search.label(), search.id);
            println!(
                "    {} categories, {} regions, {} sectors | {} queries per cycle | {} items seen",
                search.categories.len(),
                search.regions.len(),
                search.sectors.len(),
                search.expand().len(),
                seen
            );
        }
        if !view.legacy_seen.is_empty() {
            println!("  Legacy seen items: {}", view.legacy_seen.len());
        }
        println!();
    }

    Ok(())
}

async fn cmd_add(config: &Config, args: &[String]) -> Result<()> {
    if args.len() < 2 {
        println!(
            "Usage: bandarr add <chat_id> <text> --category <id>=<name> \
             [--region <id>=<name>] [--sector <id>=<name>]"
        );
        println!("Example: bandarr add 123456789 bibliotec --category C1=Concorsi");
        return Ok(());
    }

    let chat_id = &args[0];
    let text = args[1].trim();
    if text.is_empty() {
        println!("Search text cannot be empty.");
        return Ok(());
    }

    let mut categories = Vec::new();
    let mut regions = Vec::new();
    let mut sectors = Vec::new();

    let mut i = 2;
    while i < args.len() {
        let flag = args[i].as_str();
        let target = match flag {
            "--category" => &mut categories,
            "--region" => &mut regions,
            "--sector" => &mut sectors,
            other => {
                println!("Unknown option: {other}");
                return Ok(());
            }
        };

        let Some(raw) = args.get(i + 1) else {
            println!("Missing value after {flag}");
            return Ok(());
        };
        let Some(value) = parse_filter_value(raw) else {
            println!("Invalid filter value {raw:?}, expected <id>=<name>");
            return Ok(());
        };

        target.push(value);
        i += 2;
    }

    if categories.is_empty() {
        println!("At least one --category is required.");
        return Ok(());
    }

    let store = Store::new(&config.general.database_path).await?;
    let mut view = store.get_user(chat_id).await?;

    let search = SavedSearch::new(text, categories, regions, sectors);
    let label = search.label();
    let id = search.id.clone();
    let queries = search.expand().len();

    view.searches.push(search);
    store.set_user(chat_id, &view).await?;

    println!("✓ Added search: {label}");
    println!("  ID: {id}");
    println!("  Expands to {queries} queries per cycle");

    Ok(())
}

fn parse_filter_value(raw: &str) -> Option<FilterValue> {
    let (id, name) = raw.split_once('=')?;
    if id.is_empty() || name.is_empty() {
        return None;
    }
    Some(FilterValue {
        id: id.to_string(),
        name: name.to_string(),
    })
}

async fn cmd_remove(config: &Config, chat_id: &str, search_id: &str) -> Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let mut view = store.get_user(chat_id).await?;

    let before = view.searches.len();
    view.searches.retain(|s| s.id != search_id);
    if view.searches.len() == before {
        println!("Search {search_id} not found for user {chat_id}.");
        println!("Use 'bandarr list {chat_id}' to see search IDs.");
        return Ok(());
    }

    store.set_user(chat_id, &view).await?;
    println!("✓ Removed search {search_id}");

    Ok(())
}

async fn cmd_test(config: &Config, chat_id: &str) -> Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let view = store.get_user(chat_id).await?;

    let work = view.work_items();
    if work.is_empty() {
        println!("User {chat_id} has no saved searches.");
        return Ok(());
    }

    let timeout = Duration::from_secs(config.general.request_timeout_seconds);
    let inpa = InpaClient::new(&config.inpa.base_url, timeout)?;

    for work_item in work {
        let search = work_item.search;
        let specs = search.expand();
        if specs.is_empty() {
            println!("• {} — invalid (no categories), skipped", search.label());
            continue;
        }

        println!("• {} ({} queries)", search.label(), specs.len());
        let merged = services::aggregate::aggregate(&inpa, &specs).await;

        if merged.errors > 0 {
            println!("  ⚠ {} queries failed", merged.errors);
        }
        if merged.items.is_empty() {
            println!("  No open notices match.");
            continue;
        }
        for item in merged.items.iter().take(5) {
            println!("  {} — {}", item.published_key(), item.title());
        }
        if merged.items.len() > 5 {
            println!("  … and {} more", merged.items.len() - 5);
        }
    }

    println!();
    println!("Dry run only: nothing was notified or marked as seen.");

    Ok(())
}

async fn cmd_vocab(config: &Config, which: Option<&str>) -> Result<()> {
    let Some(which) = which else {
        println!("Usage: bandarr vocab <categories|regions|sectors>");
        return Ok(());
    };

    let timeout = Duration::from_secs(config.general.request_timeout_seconds);
    let inpa = InpaClient::new(&config.inpa.base_url, timeout)?;

    let entries = match which {
        "categories" | "cat" => inpa.fetch_categories().await?,
        "regions" | "reg" => inpa.fetch_regions().await?,
        "sectors" | "sec" => inpa.fetch_sectors().await?,
        other => {
            println!("Unknown vocabulary: {other}");
            println!("Use: categories, regions, sectors");
            return Ok(());
        }
    };

    if entries.is_empty() {
        println!("The {which} vocabulary is empty.");
        return Ok(());
    }

    for entry in &entries {
        match entry.count {
            Some(count) => println!("{} — {} ({} open)", entry.id, entry.name, count),
            None => println!("{} — {}", entry.id, entry.name),
        }
    }

    Ok(())
}
