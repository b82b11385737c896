//! A registry snapshot together with the executors built from it.

use std::collections::HashMap;
use std::sync::Arc;

use crate::availability::{AvailabilityTracker, ProbeRound};
use crate::channel::ChannelFactory;
use crate::registry::{RegistrySnapshot, UNLIMITED};
use crate::transform::{build_transforms, LocalTransform};

/// Swapped as one unit on reload so a call never sees a snapshot paired
/// with executors built from another.
#[derive(Debug)]
pub struct Loaded {
    snapshot: Arc<RegistrySnapshot>,
    transforms: HashMap<String, Arc<LocalTransform>>,
}

impl Loaded {
    pub fn new(snapshot: RegistrySnapshot, factory: &dyn ChannelFactory) -> Self {
        let transforms = build_transforms(&snapshot, factory);
        Self {
            snapshot: Arc::new(snapshot),
            transforms,
        }
    }

    pub fn snapshot(&self) -> &Arc<RegistrySnapshot> {
        &self.snapshot
    }

    pub fn transform(&self, name: &str) -> Option<&Arc<LocalTransform>> {
        self.transforms.get(name)
    }

    /// The best available transformer for the pair, or `None`. Each remote
    /// transformer is probed at most once per call.
    pub async fn resolve(
        &self,
        tracker: &AvailabilityTracker,
        source: &str,
        size: i64,
        target: &str,
    ) -> Option<Arc<LocalTransform>> {
        let mut round = ProbeRound::new();
        for entry in self.snapshot.candidates(source, size, target) {
            let Some(transform) = self.transforms.get(&entry.transformer_name) else {
                continue;
            };
            if tracker.is_available_in(transform, &mut round).await {
                return Some(Arc::clone(transform));
            }
        }
        None
    }

    /// Largest source size any available transformer accepts for the pair.
    /// [`UNLIMITED`] if one has no limit, 0 if none match.
    pub async fn find_max_source_size_bytes(
        &self,
        tracker: &AvailabilityTracker,
        source: &str,
        target: &str,
    ) -> i64 {
        let mut round = ProbeRound::new();
        let mut max = 0;
        for entry in self
            .snapshot
            .entries()
            .iter()
            .filter(|e| e.matches(source, target))
        {
            let limit = entry.max_source_size_bytes;
            if limit >= 0 && limit <= max {
                continue;
            }
            let Some(transform) = self.transforms.get(&entry.transformer_name) else {
                continue;
            };
            if !tracker.is_available_in(transform, &mut round).await {
                continue;
            }
            if limit < 0 {
                return UNLIMITED;
            }
            max = limit;
        }
        max
    }
}
