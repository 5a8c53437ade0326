pub mod cli;
pub mod core;
pub mod providers;

use crate::core::config::AppConfig;
use crate::core::{BalanceStore, CoordinatorHandle, RefreshBus, RefreshCoordinator, RequestTracker};
use anyhow::Result;
use providers::quaiscan::QuaiscanProvider;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Snapshot,
    Watch,
}

/// Session-wide collaborators. Constructed once and handed to the
/// coordinator and the presentation layer.
pub struct Session {
    pub tracker: Arc<RequestTracker>,
    pub balance: Arc<BalanceStore>,
    pub bus: RefreshBus,
    pub source: Arc<QuaiscanProvider>,
}

impl Session {
    pub fn new(config: &AppConfig) -> Self {
        let tracker = Arc::new(RequestTracker::new());
        let source = Arc::new(QuaiscanProvider::new(
            &config.api.base_url,
            Arc::clone(&tracker),
        ));
        Self {
            tracker,
            balance: Arc::new(BalanceStore::new()),
            bus: RefreshBus::new(),
            source,
        }
    }

    pub fn mount(&self, config: &AppConfig) -> CoordinatorHandle {
        RefreshCoordinator::new(
            config.coordinator_config(),
            Arc::clone(&self.source) as Arc<dyn crate::core::WalletSource>,
            Arc::clone(&self.tracker),
            Arc::clone(&self.balance),
        )
        .mount(&self.bus)
    }
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Quaiwatch starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let session = Session::new(&config);
    let handle = session.mount(&config);

    let result = match command {
        AppCommand::Snapshot => {
            cli::dashboard::run_snapshot(&handle, &session.balance, &config.address).await
        }
        AppCommand::Watch => {
            cli::dashboard::run_watch(&handle, &session.balance, &session.bus, &config.address)
                .await
        }
    };

    handle.unmount();
    result
}
