//! Timer coordinator.
//!
//! Single-authority countdown: only the Moderator's client transitions
//! the state machine (`Idle → Running ⇄ Paused → Expired`) and publishes
//! a tick every second. Every other client is a passive mirror that
//! overwrites its remaining time from ticks and never decrements on its
//! own — N independent decrementers would drift under clock skew.
//!
//! The authority recomputes the remaining time from its deadline instant
//! on each tick, so a delayed tick never accumulates error. If the
//! Moderator disconnects the countdown stalls until they resume or a new
//! Moderator is promoted externally.

use std::sync::Arc;

use tokio::sync::Mutex;

use yoriai_shared::protocol::SessionEvent;
use yoriai_shared::time::Clock;

use crate::domain::entity::TimerPhase;
use crate::domain::replica::SessionReplica;
use crate::port::bus::EventBus;

use super::error::TimerError;
use super::{publish_lossy, Identity};

/// Outcome of one authority tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Countdown continues with this many seconds left
    Ticked(u32),
    /// The countdown reached zero; the caller triggers the auto-reveal
    Expired,
}

pub struct TimerCoordinator {
    replica: Arc<Mutex<SessionReplica>>,
    bus: Arc<dyn EventBus>,
    identity: Arc<Identity>,
    clock: Arc<dyn Clock>,
    /// Authority-side deadline instant (JST millis); `None` unless Running
    deadline: Mutex<Option<i64>>,
}

impl TimerCoordinator {
    pub fn new(
        replica: Arc<Mutex<SessionReplica>>,
        bus: Arc<dyn EventBus>,
        identity: Arc<Identity>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            replica,
            bus,
            identity,
            clock,
            deadline: Mutex::new(None),
        }
    }

    /// Start the countdown. `duration` falls back to the configured limit.
    pub async fn start(&self, duration: Option<u32>) -> Result<(), TimerError> {
        self.require_moderator()?;
        let event = {
            let mut replica = self.replica.lock().await;
            match replica.timer.phase {
                TimerPhase::Idle | TimerPhase::Expired => {}
                TimerPhase::Running => {
                    return Err(TimerError::InvalidTransition {
                        action: "start",
                        phase: "running",
                    });
                }
                TimerPhase::Paused => {
                    return Err(TimerError::InvalidTransition {
                        action: "start",
                        phase: "paused",
                    });
                }
            }
            let duration = duration.unwrap_or(replica.timer.limit_seconds);
            let event = SessionEvent::TimerStart {
                duration_seconds: duration,
                actor_id: self.identity.user_id.as_str().to_string(),
            };
            replica
                .apply(&event, self.identity.user_id.as_str())
                .expect("timer events carry no fallible payload");
            *self.deadline.lock().await =
                Some(self.clock.now_jst_millis() + i64::from(duration) * 1000);
            event
        };
        publish_lossy(&self.bus, event).await;
        Ok(())
    }

    pub async fn pause(&self) -> Result<(), TimerError> {
        self.require_moderator()?;
        let event = {
            let mut replica = self.replica.lock().await;
            if replica.timer.phase != TimerPhase::Running {
                return Err(TimerError::InvalidTransition {
                    action: "pause",
                    phase: phase_name(replica.timer.phase),
                });
            }
            let remaining = self.remaining_now().await;
            *self.deadline.lock().await = None;
            let event = SessionEvent::TimerPause {
                remaining_seconds: remaining,
                actor_id: self.identity.user_id.as_str().to_string(),
            };
            replica
                .apply(&event, self.identity.user_id.as_str())
                .expect("timer events carry no fallible payload");
            event
        };
        publish_lossy(&self.bus, event).await;
        Ok(())
    }

    pub async fn resume(&self) -> Result<(), TimerError> {
        self.require_moderator()?;
        let event = {
            let mut replica = self.replica.lock().await;
            if replica.timer.phase != TimerPhase::Paused {
                return Err(TimerError::InvalidTransition {
                    action: "resume",
                    phase: phase_name(replica.timer.phase),
                });
            }
            let remaining = replica.timer.remaining_seconds;
            *self.deadline.lock().await =
                Some(self.clock.now_jst_millis() + i64::from(remaining) * 1000);
            let event = SessionEvent::TimerResume {
                remaining_seconds: remaining,
                actor_id: self.identity.user_id.as_str().to_string(),
            };
            replica
                .apply(&event, self.identity.user_id.as_str())
                .expect("timer events carry no fallible payload");
            event
        };
        publish_lossy(&self.bus, event).await;
        Ok(())
    }

    /// Return to idle from any state
    pub async fn reset(&self) -> Result<(), TimerError> {
        self.require_moderator()?;
        let event = {
            let mut replica = self.replica.lock().await;
            *self.deadline.lock().await = None;
            let event = SessionEvent::TimerReset {
                actor_id: self.identity.user_id.as_str().to_string(),
            };
            replica
                .apply(&event, self.identity.user_id.as_str())
                .expect("timer events carry no fallible payload");
            event
        };
        publish_lossy(&self.bus, event).await;
        Ok(())
    }

    /// Change the default duration. Takes effect on the next start; the
    /// change is published so late joiners see the new default.
    pub async fn set_limit(&self, seconds: u32) -> Result<(), TimerError> {
        self.require_moderator()?;
        let event = {
            let mut replica = self.replica.lock().await;
            let event = SessionEvent::TimerConfigChanged {
                new_limit_seconds: seconds,
                actor_id: self.identity.user_id.as_str().to_string(),
            };
            replica
                .apply(&event, self.identity.user_id.as_str())
                .expect("timer events carry no fallible payload");
            event
        };
        publish_lossy(&self.bus, event).await;
        Ok(())
    }

    /// One authority tick. Call once per second while the session runs;
    /// it is a no-op for non-moderators and outside `Running`.
    pub async fn tick(&self) -> Option<TickOutcome> {
        if !self.identity.is_moderator() {
            return None;
        }
        let (event, remaining) = {
            let mut replica = self.replica.lock().await;
            if replica.timer.phase != TimerPhase::Running {
                return None;
            }
            let remaining = self.remaining_now().await;
            let event = SessionEvent::TimerTick {
                remaining_seconds: remaining,
                running: remaining > 0,
                actor_id: self.identity.user_id.as_str().to_string(),
            };
            replica
                .apply(&event, self.identity.user_id.as_str())
                .expect("timer events carry no fallible payload");
            if remaining == 0 {
                *self.deadline.lock().await = None;
            }
            (event, remaining)
        };
        publish_lossy(&self.bus, event).await;
        Some(if remaining == 0 {
            TickOutcome::Expired
        } else {
            TickOutcome::Ticked(remaining)
        })
    }

    async fn remaining_now(&self) -> u32 {
        let deadline = self.deadline.lock().await;
        match *deadline {
            Some(deadline) => {
                let left = deadline - self.clock.now_jst_millis();
                if left <= 0 {
                    0
                } else {
                    // Round up: a deadline 2.4s away still shows 3.
                    ((left + 999) / 1000) as u32
                }
            }
            None => 0,
        }
    }

    fn require_moderator(&self) -> Result<(), TimerError> {
        if self.identity.is_moderator() {
            Ok(())
        } else {
            Err(TimerError::Unauthorized)
        }
    }
}

fn phase_name(phase: TimerPhase) -> &'static str {
    match phase {
        TimerPhase::Idle => "idle",
        TimerPhase::Running => "running",
        TimerPhase::Paused => "paused",
        TimerPhase::Expired => "expired",
    }
}
