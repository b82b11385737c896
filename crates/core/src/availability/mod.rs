//! Availability tracking for remote transformers.
//!
//! A remote transformer is probed the first time anyone asks about it. An
//! available result is kept. A down result is kept until its retry period has
//! passed since the failed check, and only then is the engine probed again.

use std::collections::{HashMap, HashSet};

use futures::future::{BoxFuture, FutureExt};
use parking_lot::RwLock;
use tokio::time::{timeout, Duration, Instant};
use tracing::{info, warn};

use crate::channel::RemoteTransformChannel;
use crate::metrics;
use crate::transform::{LocalTransform, RemoteTransform};

const LOG_TARGET: &str = "transform_core::availability";

/// Last known state of one remote transformer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityState {
    pub transformer_name: String,
    pub available: bool,
    /// Diagnostic from the last probe.
    pub message: String,
    pub last_checked: Instant,
    pub retry_period: Duration,
}

impl AvailabilityState {
    fn due_for_probe(&self, now: Instant) -> bool {
        !self.available && now.duration_since(self.last_checked) >= self.retry_period
    }
}

/// Remote transformers already probed during one resolution.
///
/// A transformer is probed at most once per round, however short its retry
/// period, even when several capability entries or composites lead to it.
#[derive(Debug, Default)]
pub struct ProbeRound {
    probed: HashSet<String>,
}

impl ProbeRound {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Probes and caches the liveness of remote transformers.
pub struct AvailabilityTracker {
    states: RwLock<HashMap<String, AvailabilityState>>,
    probe_timeout: Duration,
}

impl AvailabilityTracker {
    pub fn new(probe_timeout: Duration) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            probe_timeout,
        }
    }

    /// Whether `transform` can currently run.
    ///
    /// Pass-through is always available. A pipeline needs every step, a
    /// failover needs at least one candidate.
    pub async fn is_available(&self, transform: &LocalTransform) -> bool {
        self.is_available_in(transform, &mut ProbeRound::new()).await
    }

    /// Like [`is_available`](Self::is_available), probing each remote
    /// transformer at most once for the whole `round`.
    pub fn is_available_in<'a>(
        &'a self,
        transform: &'a LocalTransform,
        round: &'a mut ProbeRound,
    ) -> BoxFuture<'a, bool> {
        async move {
            match transform {
                LocalTransform::PassThrough(_) => true,
                LocalTransform::Remote(remote) => self.check_remote(remote, round).await,
                LocalTransform::Pipeline(pipeline) => {
                    for stage in &pipeline.stages {
                        if !self.is_available_in(&stage.transform, &mut *round).await {
                            return false;
                        }
                    }
                    true
                }
                LocalTransform::Failover(failover) => {
                    for candidate in &failover.candidates {
                        if self.is_available_in(candidate, &mut *round).await {
                            return true;
                        }
                    }
                    false
                }
            }
        }
        .boxed()
    }

    async fn check_remote(&self, remote: &RemoteTransform, round: &mut ProbeRound) -> bool {
        let now = Instant::now();
        let probed = round.probed.contains(&remote.name);
        let cached = self
            .states
            .read()
            .get(&remote.name)
            .filter(|s| probed || !s.due_for_probe(now))
            .map(|s| s.available);
        if let Some(available) = cached {
            return available;
        }

        let (available, message) = self.probe(&remote.name, remote.channel.as_ref()).await;
        round.probed.insert(remote.name.clone());
        let state = AvailabilityState {
            transformer_name: remote.name.clone(),
            available,
            message,
            last_checked: Instant::now(),
            retry_period: remote.retry_period,
        };
        self.states.write().insert(remote.name.clone(), state);
        available
    }

    async fn probe(&self, name: &str, channel: &dyn RemoteTransformChannel) -> (bool, String) {
        match timeout(self.probe_timeout, channel.probe()).await {
            Ok(result) if result.available => {
                metrics::AVAILABILITY_PROBES.with_label_values(&["up"]).inc();
                info!(
                    target: LOG_TARGET,
                    transformer = name,
                    endpoint = channel.endpoint(),
                    version = %result.message,
                    "Transformer is available"
                );
                (true, result.message)
            }
            Ok(result) => {
                metrics::AVAILABILITY_PROBES.with_label_values(&["down"]).inc();
                warn!(
                    target: LOG_TARGET,
                    transformer = name,
                    endpoint = channel.endpoint(),
                    reason = %result.message,
                    "Transformer is not available"
                );
                (false, result.message)
            }
            Err(_) => {
                metrics::AVAILABILITY_PROBES.with_label_values(&["timeout"]).inc();
                let message = format!("Probe timed out after {:?}", self.probe_timeout);
                warn!(
                    target: LOG_TARGET,
                    transformer = name,
                    endpoint = channel.endpoint(),
                    reason = %message,
                    "Transformer is not available"
                );
                (false, message)
            }
        }
    }

    /// Last known state of a remote transformer.
    pub fn state(&self, name: &str) -> Option<AvailabilityState> {
        self.states.read().get(name).cloned()
    }

    /// All known states.
    pub fn states(&self) -> Vec<AvailabilityState> {
        let mut states: Vec<_> = self.states.read().values().cloned().collect();
        states.sort_by(|a, b| a.transformer_name.cmp(&b.transformer_name));
        states
    }

    /// Forgets every state so the next query probes again.
    pub fn reset(&self) {
        *self.states.write() = HashMap::new();
    }
}

impl std::fmt::Debug for AvailabilityTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvailabilityTracker")
            .field("known", &self.states.read().len())
            .field("probe_timeout", &self.probe_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ProbeResult;
    use crate::testing::{fixtures, MockTransformChannel};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn remote(name: &str, channel: Arc<MockTransformChannel>, retry_secs: u64) -> LocalTransform {
        LocalTransform::Remote(RemoteTransform {
            name: name.to_string(),
            all_option_names: Arc::new(HashSet::new()),
            channel,
            retry_period: Duration::from_secs(retry_secs),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_available_state_is_cached() {
        let channel = Arc::new(MockTransformChannel::new("http://lo"));
        let transform = remote("libreoffice", Arc::clone(&channel), 60);
        let tracker = AvailabilityTracker::new(Duration::from_secs(5));

        assert!(tracker.is_available(&transform).await);
        assert!(tracker.is_available(&transform).await);
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(tracker.is_available(&transform).await);
        assert_eq!(channel.probe_count(), 1);
        assert!(tracker.state("libreoffice").unwrap().available);
    }

    #[tokio::test(start_paused = true)]
    async fn test_down_state_reprobed_after_retry_period() {
        let channel = Arc::new(MockTransformChannel::new("http://lo"));
        channel.set_probe_result(ProbeResult::down("connection refused"));
        let transform = remote("libreoffice", Arc::clone(&channel), 60);
        let tracker = AvailabilityTracker::new(Duration::from_secs(5));

        assert!(!tracker.is_available(&transform).await);
        assert_eq!(
            tracker.state("libreoffice").unwrap().message,
            "connection refused"
        );

        channel.set_probe_result(ProbeResult::up("2.5.3"));
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(!tracker.is_available(&transform).await);
        assert_eq!(channel.probe_count(), 1);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(tracker.is_available(&transform).await);
        assert_eq!(channel.probe_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_timeout_marks_down() {
        let channel = Arc::new(MockTransformChannel::new("http://slow"));
        channel.set_probe_delay(Duration::from_secs(30));
        let transform = remote("slow", Arc::clone(&channel), 60);
        let tracker = AvailabilityTracker::new(Duration::from_secs(5));

        assert!(!tracker.is_available(&transform).await);
        assert!(tracker.state("slow").unwrap().message.contains("timed out"));
    }

    #[tokio::test]
    async fn test_composites() {
        let up = Arc::new(MockTransformChannel::new("http://up"));
        let down = Arc::new(MockTransformChannel::new("http://down"));
        down.set_probe_result(ProbeResult::down("gone"));
        let a = Arc::new(remote("a", up, 60));
        let b = Arc::new(remote("b", down, 60));
        let tracker = AvailabilityTracker::new(Duration::from_secs(5));

        let pipeline = fixtures::pipeline_of("ab", vec![Arc::clone(&a), Arc::clone(&b)]);
        let failover = fixtures::failover_of("a_or_b", vec![Arc::clone(&b), Arc::clone(&a)]);
        let all_down = fixtures::failover_of("b_or_b", vec![Arc::clone(&b), Arc::clone(&b)]);

        assert!(!tracker.is_available(&pipeline).await);
        assert!(tracker.is_available(&failover).await);
        assert!(!tracker.is_available(&all_down).await);
        assert!(tracker.is_available(&fixtures::pass_through()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_down_transformer_probed_once_per_round() {
        let channel = Arc::new(MockTransformChannel::new("http://lo"));
        channel.set_probe_result(ProbeResult::down("connection refused"));
        let transform = Arc::new(remote("libreoffice", Arc::clone(&channel), 0));
        let twice = fixtures::failover_of(
            "lo_or_lo",
            vec![Arc::clone(&transform), Arc::clone(&transform)],
        );
        let tracker = AvailabilityTracker::new(Duration::from_secs(5));

        let mut round = ProbeRound::new();
        assert!(!tracker.is_available_in(&transform, &mut round).await);
        assert!(!tracker.is_available_in(&transform, &mut round).await);
        assert!(!tracker.is_available_in(&twice, &mut round).await);
        assert_eq!(channel.probe_count(), 1);

        // A zero retry period allows a probe in the next round
        let mut round = ProbeRound::new();
        assert!(!tracker.is_available_in(&twice, &mut round).await);
        assert_eq!(channel.probe_count(), 2);
    }

    #[tokio::test]
    async fn test_reset_forgets_states() {
        let channel = Arc::new(MockTransformChannel::new("http://lo"));
        let transform = remote("libreoffice", Arc::clone(&channel), 60);
        let tracker = AvailabilityTracker::new(Duration::from_secs(5));

        tracker.is_available(&transform).await;
        tracker.reset();
        assert!(tracker.state("libreoffice").is_none());
        tracker.is_available(&transform).await;
        assert_eq!(channel.probe_count(), 2);
    }
}
