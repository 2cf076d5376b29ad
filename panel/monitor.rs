use anyhow::Result;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast::error::RecvError, watch};
use wrldbot_feed::FeedSubscriber;

/// Latest actor seen losing coins to the agent on the broadcast feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StealVictim {
    /// Victim handle as broadcast by the game.
    pub actor: String,
    /// When the broadcast was noticed.
    pub noticed_at: DateTime<Utc>,
}

/// Watches the append-only broadcast feed for entries of the shape
/// `BROADCAST | <actor> lost <amount> coins to <handle>` and publishes the
/// latest victim. Non-matching lines are ignored and no history is kept
/// beyond the single most recent match.
#[derive(Debug)]
pub struct BroadcastMonitor {
    pattern: Regex,
    latest: watch::Sender<Option<StealVictim>>,
}

impl BroadcastMonitor {
    /// Creates a monitor for steals landed by `agent_handle`.
    pub fn new(agent_handle: &str) -> Result<Self> {
        let pattern = Regex::new(&format!(
            r"BROADCAST \| (\w+) lost [\d.]+ coins to {}",
            regex::escape(agent_handle)
        ))?;
        let (latest, _) = watch::channel(None);
        Ok(Self { pattern, latest })
    }

    /// Receiver for the latest victim (starts at `None`).
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Option<StealVictim>> {
        self.latest.subscribe()
    }

    /// Extracts the victim handle from a single line, without recording it.
    #[must_use]
    pub fn extract(&self, line: &str) -> Option<String> {
        self.pattern
            .captures(line)
            .and_then(|captures| captures.get(1))
            .map(|actor| actor.as_str().to_owned())
    }

    /// Feeds a line through the matcher, publishing on a hit.
    pub fn notice(&self, line: &str) {
        if let Some(actor) = self.extract(line) {
            tracing::info!(victim = %actor, "steal broadcast noticed");
            let _ = self.latest.send(Some(StealVictim {
                actor,
                noticed_at: Utc::now(),
            }));
        }
    }

    /// Consumes appended feed entries until the feed closes. Lagged
    /// receivers skip ahead; old lines are of no interest anyway.
    pub async fn run(&self, feed: &dyn FeedSubscriber) -> Result<()> {
        let mut entries = feed.subscribe().await?;
        loop {
            match entries.recv().await {
                Ok(entry) => self.notice(&entry.line),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        Ok(())
    }
}
