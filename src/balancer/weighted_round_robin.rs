//! Weighted round robin picker
//!
//! Connections are grouped into buckets by weight. A pick first draws a
//! bucket with probability proportional to `weight × members`, then hands out
//! the bucket's members in rotation, so every connection ends up with a share
//! proportional to its own weight. When no connection carries weight the
//! picker degrades to plain round robin.

use super::picker::{
    ErrPicker, PickError, PickInfo, PickResult, Picker, PickerBuildInfo, PickerBuilder,
};
use super::state::WeightBucket;
use crate::random::{self, RandomSource};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Registration name of the weighted round robin balancer
pub const NAME: &str = "nacos_weighted_round_robin";

/// Builds [`WeightedRoundRobinPicker`]s
#[derive(Debug, Clone)]
pub struct WeightedRoundRobinBuilder {
    random: Arc<RandomSource>,
}

impl WeightedRoundRobinBuilder {
    /// Builder drawing from the process-wide random source
    pub fn new() -> Self {
        Self {
            random: random::global(),
        }
    }

    /// Builder drawing from a caller-supplied source
    pub fn with_random(random: Arc<RandomSource>) -> Self {
        Self { random }
    }
}

impl Default for WeightedRoundRobinBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PickerBuilder for WeightedRoundRobinBuilder {
    fn name(&self) -> &'static str {
        NAME
    }

    fn build(&self, info: PickerBuildInfo) -> Arc<dyn Picker> {
        match WeightedRoundRobinPicker::try_build(info, Arc::clone(&self.random)) {
            Ok(picker) => {
                debug!(
                    "Built weighted round robin picker: {} connections, {} buckets, total weight {}",
                    picker.len(),
                    picker.bucket_count(),
                    picker.total_weight()
                );
                Arc::new(picker)
            }
            Err(PickError::TotalWeightExceedsLimit) => {
                warn!("Ready set weights overflow u32, every pick will fail");
                Arc::new(ErrPicker::new(PickError::TotalWeightExceedsLimit))
            }
            Err(err) => Arc::new(ErrPicker::new(err)),
        }
    }
}

/// Weighted round robin over an immutable ready set
#[derive(Debug)]
pub struct WeightedRoundRobinPicker {
    // Ascending weight order keeps the cumulative bounds deterministic.
    buckets: Mutex<BTreeMap<u32, WeightBucket>>,
    total_weight: u32,
    len: usize,
    random: Arc<RandomSource>,
}

impl WeightedRoundRobinPicker {
    /// Group the ready set into weight buckets.
    ///
    /// Fails with [`PickError::NoConnectionAvailable`] on an empty set and with
    /// [`PickError::TotalWeightExceedsLimit`] when the weights sum past
    /// `u32::MAX`; no partial picker is ever produced.
    pub fn try_build(info: PickerBuildInfo, random: Arc<RandomSource>) -> Result<Self, PickError> {
        if info.ready.is_empty() {
            return Err(PickError::NoConnectionAvailable);
        }

        let mut ready = info.ready;
        ready.sort_by(|a, b| a.address.cmp(&b.address));
        let len = ready.len();

        let mut buckets: BTreeMap<u32, WeightBucket> = BTreeMap::new();
        let mut total_weight: u32 = 0;
        for entry in ready {
            let weight = entry.address.weight();
            total_weight = total_weight
                .checked_add(weight)
                .ok_or(PickError::TotalWeightExceedsLimit)?;
            buckets
                .entry(weight)
                .or_insert_with(|| WeightBucket::new(weight))
                .sub_conns
                .push(entry.sub_conn);
        }

        for bucket in buckets.values_mut() {
            bucket.next = random.index_below(bucket.len());
        }

        Ok(Self {
            buckets: Mutex::new(buckets),
            total_weight,
            len,
            random,
        })
    }

    /// Sum of the weights of every connection
    pub fn total_weight(&self) -> u32 {
        self.total_weight
    }

    pub fn bucket_count(&self) -> usize {
        self.lock().len()
    }

    /// Number of connections
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<u32, WeightBucket>> {
        // Cursor state stays valid even if a holder panicked.
        self.buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Picker for WeightedRoundRobinPicker {
    fn pick(&self, _info: &PickInfo<'_>) -> Result<PickResult, PickError> {
        let mut buckets = self.lock();

        let bucket = if self.total_weight == 0 {
            // Every connection is unweighted and lives in bucket 0.
            buckets.get_mut(&0)
        } else {
            let r = u64::from(self.random.u32_below(self.total_weight));
            let mut lo: u64 = 0;
            let mut selected = None;
            for bucket in buckets.values_mut() {
                let hi = lo + bucket.mass();
                if lo <= r && r < hi {
                    selected = Some(bucket);
                    break;
                }
                lo = hi;
            }
            selected
        };

        bucket
            .and_then(WeightBucket::rotate)
            .map(|sub_conn| PickResult { sub_conn })
            .ok_or(PickError::NoConnectionAvailable)
    }
}
