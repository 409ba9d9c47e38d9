use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use crate::api::DesignApi;

pub const FUN_FACT_FALLBACK: &str =
    "Could not fetch a fun fact. Waiting for the magic to happen...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunFactState {
    Pending,
    Fact(String),
    Unavailable,
}

impl FunFactState {
    pub fn display_text(&self) -> &str {
        match self {
            Self::Pending => "",
            Self::Fact(text) => text,
            Self::Unavailable => FUN_FACT_FALLBACK,
        }
    }
}

#[derive(Debug)]
pub struct FunFactFeed {
    state_rx: watch::Receiver<FunFactState>,
    task: JoinHandle<()>,
}

impl FunFactFeed {
    pub fn spawn<A: DesignApi>(handle: &Handle, api: A, refresh_every: Duration) -> Self {
        let (state_tx, state_rx) = watch::channel(FunFactState::Pending);
        let task = handle.spawn(async move {
            let mut ticker = interval(refresh_every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let state = match api.fun_fact().await {
                    Ok(fact) => FunFactState::Fact(fact.text),
                    Err(error) => {
                        warn!(error = %error, "failed to fetch fun fact");
                        FunFactState::Unavailable
                    }
                };

                if state_tx.send(state).is_err() {
                    debug!("fun fact feed has no viewers; stopping");
                    break;
                }
            }
        });

        Self { state_rx, task }
    }

    pub fn current(&self) -> FunFactState {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FunFactState> {
        self.state_rx.clone()
    }
}

impl Drop for FunFactFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}
