/// `taskboard [actor-id]`: load the actor's boards and print the selected
/// board as that actor sees it.
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use taskboard_client::config::{default_config_path, load_config};
use taskboard_client::log_bridge::{self, default_log_path};
use taskboard_client::HttpAuthority;
use taskboard_core::BoardStore;

#[tokio::main]
async fn main() -> ExitCode {
    let log_path = default_log_path();
    if let Err(e) = log_bridge::init(log_path.clone()) {
        log_bridge::write_fallback_line(
            &log_path,
            &format!("failed to initialize client logger: {}", e),
        );
    }

    let config_path = std::env::var_os("TASKBOARD_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let config = load_config(&config_path);

    let Some(actor) = std::env::args().nth(1).or_else(|| config.actor_id.clone()) else {
        eprintln!(
            "usage: taskboard <actor-id>  (or set \"actorId\" in {})",
            config_path.display()
        );
        return ExitCode::from(2);
    };

    let authority = match HttpAuthority::from_config(&config) {
        Ok(authority) => authority,
        Err(e) => {
            log::error!("[taskboard.main] {}", e);
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    log::info!(
        "[taskboard.main] using {} as {} (logs: {})",
        authority.base_url(),
        actor,
        log_path.display()
    );

    let store = BoardStore::with_policy(Arc::new(authority), config.reconcile.clone());
    if let Err(e) = store.sync_boards(&actor).await {
        eprintln!("Could not load boards: {}", e);
        for line in log_bridge::recent_problems() {
            eprintln!("  {}", line);
        }
        return ExitCode::FAILURE;
    }

    let Some(board) = store.current_visible(Some(&actor)) else {
        println!("No boards yet.");
        return ExitCode::SUCCESS;
    };
    match serde_json::to_string_pretty(&board) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Could not render board: {}", e);
            ExitCode::FAILURE
        }
    }
}
