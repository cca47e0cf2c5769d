use log::{debug, info};
use shared::{Cell, PlayerState, Snapshot};

/// What the display layer needs to know about the local player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalSummary {
    pub length: usize,
    pub head: Option<Cell>,
}

/// Latest authoritative state as received from the server
///
/// The client never simulates; it only keeps the newest snapshot and a little
/// bookkeeping about its own snake.
#[derive(Debug, Default)]
pub struct ClientGameState {
    latest: Option<Snapshot>,
    snapshots_received: u64,
    best_length: usize,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current state with a freshly decoded snapshot
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) {
        self.snapshots_received += 1;

        if let Some(me) = snapshot.local_player() {
            let length = me.body.len();
            if length > self.best_length {
                if self.best_length > 0 {
                    info!("{} grew to length {}", me.name, length);
                }
                self.best_length = length;
            }
            debug!(
                "Snapshot {}: {} players, {} apples, own length {} head {:?}",
                self.snapshots_received,
                snapshot.players.len(),
                snapshot.apples.len(),
                length,
                me.head()
            );
        }

        self.latest = Some(snapshot);
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.latest.as_ref()
    }

    /// The first player record is always the one this client controls
    pub fn local_player(&self) -> Option<&PlayerState> {
        self.latest.as_ref()?.local_player()
    }

    pub fn local_summary(&self) -> Option<LocalSummary> {
        self.local_player().map(|me| LocalSummary {
            length: me.body.len(),
            head: me.head(),
        })
    }

    pub fn snapshots_received(&self) -> u64 {
        self.snapshots_received
    }

    /// Longest the local snake has been this session
    pub fn best_length(&self) -> usize {
        self.best_length
    }
}
