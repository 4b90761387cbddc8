/// Modal dialog sequencing
///
/// The detail screen can show one modal flow at a time: the web image
/// search, the camera, or the crop editor. Presenting the next dialog while
/// the previous one is still closing glitches, so a hand-off always goes
/// through the same steps: clear the current dialog, wait for the host to
/// confirm it is gone (`on_dismissed`), sleep for the settle delay, then show
/// the queued dialog (`complete_settle`).

use std::time::Duration;

/// Shortest settle delay accepted; shorter configured values are raised to this
pub const MIN_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// The modal flows the detail screen can present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialogKind {
    Search,
    Camera,
    Editor,
}

/// Internal sequencer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Nothing on screen
    Idle,
    /// `active` is on screen; `pending` will follow once it is dismissed
    Showing {
        active: DialogKind,
        pending: Option<DialogKind>,
    },
    /// The host was asked to close its dialog but has not confirmed yet
    Closing { pending: Option<DialogKind> },
    /// Dismissal confirmed; `next` appears when ticket `generation` completes
    Settling { next: DialogKind, generation: u64 },
}

/// Handed to the host after a confirmed dismissal with a queued dialog.
/// The host sleeps for `delay` and passes it back to `complete_settle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleTicket {
    pub kind: DialogKind,
    pub delay: Duration,
    generation: u64,
}

/// Guarantees at most one modal dialog is visible and that hand-offs
/// between dialogs never overlap
#[derive(Debug, Clone)]
pub struct DialogSequencer {
    phase: Phase,
    settle_delay: Duration,
    generation: u64,
}

impl Default for DialogSequencer {
    fn default() -> Self {
        Self::new(MIN_SETTLE_DELAY)
    }
}

impl DialogSequencer {
    pub fn new(settle_delay: Duration) -> Self {
        Self {
            phase: Phase::Idle,
            settle_delay: settle_delay.max(MIN_SETTLE_DELAY),
            generation: 0,
        }
    }

    /// The dialog currently on screen, if any
    pub fn active(&self) -> Option<DialogKind> {
        match self.phase {
            Phase::Showing { active, .. } => Some(active),
            _ => None,
        }
    }

    /// The dialog queued to appear after the current one is gone
    pub fn pending(&self) -> Option<DialogKind> {
        match self.phase {
            Phase::Idle => None,
            Phase::Showing { pending, .. } | Phase::Closing { pending } => pending,
            Phase::Settling { next, .. } => Some(next),
        }
    }

    /// True when no dialog is shown, closing or queued
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    /// True while waiting for the host to confirm a dialog has closed
    pub fn is_closing(&self) -> bool {
        matches!(self.phase, Phase::Closing { .. })
    }

    /// Show `kind` now if nothing is on screen, otherwise queue it behind the
    /// current dialog without interrupting it
    pub fn present(&mut self, kind: DialogKind) {
        self.phase = match self.phase {
            Phase::Idle => Phase::Showing {
                active: kind,
                pending: None,
            },
            Phase::Showing { active, .. } => Phase::Showing {
                active,
                pending: Some(kind),
            },
            Phase::Closing { .. } => Phase::Closing {
                pending: Some(kind),
            },
            // Replaces the queued dialog; the running ticket still applies.
            Phase::Settling { generation, .. } => Phase::Settling {
                next: kind,
                generation,
            },
        };
        tracing::debug!(?kind, phase = ?self.phase, "present dialog");
    }

    /// Close whatever is on screen and queue `kind` to follow it
    pub fn transition_to(&mut self, kind: DialogKind) {
        self.phase = match self.phase {
            Phase::Settling { generation, .. } => Phase::Settling {
                next: kind,
                generation,
            },
            _ => Phase::Closing {
                pending: Some(kind),
            },
        };
        tracing::debug!(?kind, phase = ?self.phase, "transition dialog");
    }

    /// Close the current dialog and forget anything queued
    pub fn dismiss(&mut self) {
        self.phase = match self.phase {
            Phase::Showing { .. } | Phase::Closing { .. } => Phase::Closing { pending: None },
            Phase::Idle | Phase::Settling { .. } => Phase::Idle,
        };
        // Invalidates any settle ticket the host is still sleeping on.
        self.generation += 1;
        tracing::debug!(phase = ?self.phase, "dismiss dialog");
    }

    /// Host signal: the previous dialog has finished closing.
    ///
    /// Also accepts a dialog the host closed on its own (user cancel), in
    /// which case any queued dialog still follows. Returns a ticket when a
    /// dialog is waiting to be shown.
    pub fn on_dismissed(&mut self) -> Option<SettleTicket> {
        let pending = match self.phase {
            Phase::Showing { pending, .. } | Phase::Closing { pending } => pending,
            Phase::Idle | Phase::Settling { .. } => {
                tracing::debug!(phase = ?self.phase, "ignoring dismissal with no dialog closing");
                return None;
            }
        };

        match pending {
            Some(next) => {
                self.generation += 1;
                self.phase = Phase::Settling {
                    next,
                    generation: self.generation,
                };
                Some(SettleTicket {
                    kind: next,
                    delay: self.settle_delay,
                    generation: self.generation,
                })
            }
            None => {
                self.phase = Phase::Idle;
                None
            }
        }
    }

    /// Host signal: the settle delay for `ticket` has elapsed.
    ///
    /// Returns the dialog that is now showing, or `None` if the ticket was
    /// superseded or cancelled while the host was waiting.
    pub fn complete_settle(&mut self, ticket: SettleTicket) -> Option<DialogKind> {
        match self.phase {
            Phase::Settling { next, generation } if generation == ticket.generation => {
                self.phase = Phase::Showing {
                    active: next,
                    pending: None,
                };
                Some(next)
            }
            _ => {
                tracing::debug!(?ticket, phase = ?self.phase, "dropping stale settle ticket");
                None
            }
        }
    }
}

/// Sleeps for the ticket's settle delay and hands it back
pub async fn wait_settle(ticket: SettleTicket) -> SettleTicket {
    tokio::time::sleep(ticket.delay).await;
    ticket
}
