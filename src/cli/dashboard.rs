use super::ui;
use crate::core::format::{UNIT, format_amount, format_tx_date, truncate_id};
use crate::core::{BalanceStore, CoordinatorHandle, RefreshBus, RefreshState};
use anyhow::{Context, Result};
use comfy_table::{Cell, Color};
use std::sync::Arc;
use tokio::sync::{Notify, mpsc};
use tracing::{debug, info};

const SKELETON_ROWS: usize = 5;

fn render_header(balance: Option<&str>, address: &str) -> String {
    let balance = match balance {
        Some(value) => format!(
            "  {} {}",
            ui::style_text(value.split(' ').next().unwrap_or(value), ui::StyleType::Value),
            ui::style_text(UNIT, ui::StyleType::Subtle)
        ),
        None => String::new(),
    };
    format!(
        "{}{}\nAccount: {}\n",
        ui::style_text("QuaiScan", ui::StyleType::Title),
        balance,
        address
    )
}

fn render_activity(state: &RefreshState) -> String {
    format!(
        "{}\n  Requests: {}  Failures: {}  Visible Txs: {}\n",
        ui::style_text("Session Activity", ui::StyleType::Label),
        state.stats.requests,
        ui::style_text(&state.stats.errors.to_string(), ui::StyleType::Error),
        ui::style_text(&state.transactions.len().to_string(), ui::StyleType::Value)
    )
}

/// Short address, highlighted when it is the watched wallet.
fn party(id: &str, own: &str, highlight: ui::StyleType) -> String {
    let short = truncate_id(id, 8);
    if id.to_lowercase() == own {
        ui::style_text(&short, highlight)
    } else {
        ui::style_text(&short, ui::StyleType::Subtle)
    }
}

fn render_transactions(state: &RefreshState, address: &str) -> String {
    if !state.loading && state.transactions.is_empty() {
        return ui::style_text("No records found for this address", ui::StyleType::Subtle);
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Hash"),
        ui::header_cell("Block"),
        ui::header_cell("From / To"),
        ui::header_cell(&format!("Amount ({UNIT})")),
        ui::header_cell("Date"),
    ]);

    if state.loading {
        for _ in 0..SKELETON_ROWS {
            table.add_row(vec![
                ui::skeleton_cell(12),
                ui::skeleton_cell(6),
                ui::skeleton_cell(24),
                ui::skeleton_cell(8),
                ui::skeleton_cell(10),
            ]);
        }
        return table.to_string();
    }

    let own = address.to_lowercase();
    for tx in &state.transactions {
        let from_to = format!(
            "{} → {}",
            party(&tx.from, &own, ui::StyleType::Outgoing),
            party(&tx.to, &own, ui::StyleType::Incoming)
        );
        table.add_row(vec![
            Cell::new(truncate_id(&tx.hash, 10)).fg(Color::Blue),
            Cell::new(&tx.block_number),
            Cell::new(from_to),
            ui::amount_cell(&format_amount(&tx.value)),
            Cell::new(format_tx_date(&tx.time_stamp)),
        ]);
    }
    table.to_string()
}

/// Renders the full dashboard as text.
pub fn render(state: &RefreshState, balance: Option<&str>, address: &str) -> String {
    let mut output = render_header(balance, address);

    if let Some(error) = &state.error {
        output.push_str(&format!("\n{}\n", ui::style_text(error, ui::StyleType::Error)));
    }

    output.push('\n');
    output.push_str(&render_activity(state));

    let syncing = if state.background_fetching {
        format!("  {}", ui::style_text("syncing…", ui::StyleType::Subtle))
    } else {
        String::new()
    };
    output.push_str(&format!(
        "\n{} (Network: Mainnet){}\n",
        ui::style_text("Transaction History", ui::StyleType::Title),
        syncing
    ));
    output.push_str(&render_transactions(state, address));

    output.push_str(&format!(
        "\n\n{}\n",
        ui::style_text(&format!("Updated {}", state.updated_label), ui::StyleType::Subtle)
    ));
    output
}

/// Waits for the first fetch to settle and prints the dashboard once.
pub async fn run_snapshot(
    handle: &CoordinatorHandle,
    balance: &BalanceStore,
    address: &str,
) -> Result<()> {
    let spinner = ui::new_spinner("Fetching wallet data...");
    let state = handle
        .subscribe()
        .wait_for(|s| s.settled > 0)
        .await
        .context("Refresh coordinator stopped before the first fetch settled")?
        .clone();
    spinner.finish_and_clear();

    println!("{}", render(&state, balance.get().as_deref(), address));
    Ok(())
}

/// Reads stdin on a detached thread so a pending read never holds up
/// runtime shutdown.
fn spawn_input_reader() -> mpsc::UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            if line.is_err() || tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}

/// Live dashboard: redraws on every state or balance change, Enter requests
/// a refresh, Ctrl-C exits.
pub async fn run_watch(
    handle: &CoordinatorHandle,
    balance: &BalanceStore,
    bus: &RefreshBus,
    address: &str,
) -> Result<()> {
    let term = console::Term::stdout();
    let mut states = handle.subscribe();

    let balance_changed = Arc::new(Notify::new());
    let notify = Arc::clone(&balance_changed);
    let _balance_subscription = balance.subscribe(Arc::new(move |_: Option<&str>| {
        notify.notify_one();
    }));

    let mut input = spawn_input_reader();
    let mut input_open = true;
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        let state = states.borrow_and_update().clone();
        term.clear_screen().context("Failed to clear terminal")?;
        println!("{}", render(&state, balance.get().as_deref(), address));
        println!(
            "{}",
            ui::style_text("[Enter] refresh  [Ctrl-C] quit", ui::StyleType::Subtle)
        );

        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = balance_changed.notified() => {}
            line = input.recv(), if input_open => match line {
                Some(()) => {
                    debug!("Manual refresh requested");
                    bus.publish();
                }
                None => input_open = false,
            },
            _ = &mut interrupted => {
                info!("Interrupted, shutting down dashboard");
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Transaction, TrackerStats};
    use chrono::Utc;

    const ADDRESS: &str = "0x002624Fa55DFf0ca53aF9166B4d44c16a294C4e0";

    fn state() -> RefreshState {
        RefreshState {
            transactions: Vec::new(),
            loading: false,
            background_fetching: false,
            error: None,
            last_updated: Utc::now(),
            updated_label: "12s ago".to_string(),
            stats: TrackerStats {
                requests: 6,
                errors: 1,
                ..TrackerStats::default()
            },
            settled: 3,
        }
    }

    #[test]
    fn test_render_transactions() {
        let mut state = state();
        state.transactions = vec![Transaction {
            hash: "0xdeadbeefcafebabe0011".to_string(),
            block_number: "4242".to_string(),
            from: ADDRESS.to_lowercase(),
            to: "0x00aabbccddeeff".to_string(),
            value: "2500000000000000000".to_string(),
            time_stamp: "1717171717".to_string(),
            ..Transaction::default()
        }];

        let output = render(&state, Some("12.3456 QUAI"), ADDRESS);
        assert!(output.contains("12.3456"));
        assert!(output.contains(ADDRESS));
        assert!(output.contains("Requests: 6"));
        assert!(output.contains("0xdeadbeef..."));
        assert!(output.contains("4242"));
        assert!(output.contains("2.5000"));
        assert!(output.contains("May 31, 2024"));
        assert!(output.contains("Updated 12s ago"));
        assert!(!output.contains("No records found"));
    }

    #[test]
    fn test_render_empty_and_error() {
        let mut state = state();
        state.error = Some("Failed to fetch dashboard data.".to_string());

        let output = render(&state, None, ADDRESS);
        assert!(output.contains("Failed to fetch dashboard data."));
        assert!(output.contains("No records found for this address"));
    }

    #[test]
    fn test_render_loading_shows_skeleton() {
        let mut state = state();
        state.loading = true;

        let output = render(&state, None, ADDRESS);
        assert!(output.contains("░░░░"));
        assert!(!output.contains("No records found"));
    }

    #[test]
    fn test_render_background_marker() {
        let mut state = state();
        state.background_fetching = true;
        assert!(render(&state, None, ADDRESS).contains("syncing"));
    }
}
