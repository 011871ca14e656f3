//! The single control loop: metabolism, goal evaluation and introspection ticks,
//! plus interactions as they arrive.

use super::{ContinuityController, Interaction, IntrospectionOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

const INBOX_CAPACITY: usize = 64;

/// Feeds and stops a spawned control loop.
pub struct ControlLoopHandle {
    interactions: mpsc::Sender<Interaction>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ControlLoopHandle {
    pub fn spawn(controller: Arc<ContinuityController>) -> Self {
        let (interactions, inbox) = mpsc::channel(INBOX_CAPACITY);
        let (shutdown, stop) = watch::channel(false);
        let task = tokio::spawn(run_control_loop(controller, inbox, stop));
        Self {
            interactions,
            shutdown,
            task,
        }
    }

    pub fn sender(&self) -> mpsc::Sender<Interaction> {
        self.interactions.clone()
    }

    /// Queues an interaction. False once the loop has stopped.
    pub async fn submit(&self, interaction: Interaction) -> bool {
        self.interactions.send(interaction).await.is_ok()
    }

    /// Stops the loop and waits for its final save.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        drop(self.interactions);
        if let Err(e) = self.task.await {
            tracing::warn!(target: "continuity::controller", error = %e, "Control loop task ended abnormally");
        }
    }
}

fn ticker(secs: u64) -> Interval {
    let period = Duration::from_secs(secs.max(1));
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Runs until `shutdown` flips to true (or its sender is dropped), then saves
/// every store.
///
/// Introspection runs as its own task so a slow generator never holds up
/// interactions; a tick that finds the previous cycle still running is skipped.
pub async fn run_control_loop(
    controller: Arc<ContinuityController>,
    mut interactions: mpsc::Receiver<Interaction>,
    mut shutdown: watch::Receiver<bool>,
) {
    let cfg = controller.config().clone();
    let mut metabolism = ticker(cfg.metabolism_interval_secs);
    let mut goal_eval = ticker(cfg.goal_eval_interval_secs);
    let mut introspection = ticker(cfg.introspection_interval_secs);
    let mut introspecting: Option<JoinHandle<()>> = None;
    let mut inbox_open = true;

    tracing::info!(
        target: "continuity::controller",
        metabolism_secs = cfg.metabolism_interval_secs,
        goal_eval_secs = cfg.goal_eval_interval_secs,
        introspection_secs = cfg.introspection_interval_secs,
        "Control loop started"
    );

    loop {
        tokio::select! {
            _ = metabolism.tick() => {
                controller.metabolism_tick().await;
            }
            _ = goal_eval.tick() => {
                if let Err(e) = controller.evaluate_goals().await {
                    tracing::warn!(target: "continuity::controller", error = %e, "Goal evaluation failed");
                }
            }
            _ = introspection.tick() => {
                if introspecting.as_ref().map(|t| t.is_finished()).unwrap_or(true) {
                    let c = Arc::clone(&controller);
                    introspecting = Some(tokio::spawn(async move {
                        match c.introspect().await {
                            Ok(IntrospectionOutcome::Captured { status, .. }) => {
                                tracing::info!(
                                    target: "continuity::controller",
                                    coherence = status.coherence,
                                    drift = ?status.latest_drift,
                                    goal = ?status.active_goal,
                                    mood = status.mood_label.as_str(),
                                    "Status report"
                                );
                            }
                            Ok(IntrospectionOutcome::Skipped { .. }) => {}
                            Err(e) => {
                                tracing::warn!(target: "continuity::controller", error = %e, "Introspection failed");
                            }
                        }
                    }));
                } else {
                    tracing::debug!(target: "continuity::controller", "Previous introspection still running, tick skipped");
                }
            }
            received = interactions.recv(), if inbox_open => match received {
                Some(interaction) => {
                    if let Err(e) = controller.process_interaction(interaction).await {
                        tracing::warn!(target: "continuity::controller", error = %e, "Interaction dropped");
                    }
                }
                None => inbox_open = false,
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    if let Some(task) = introspecting {
        let _ = task.await;
    }
    if let Err(e) = controller.save_all().await {
        tracing::warn!(target: "continuity::controller", error = %e, "Final save failed");
    }
    tracing::info!(target: "continuity::controller", "Control loop stopped");
}
