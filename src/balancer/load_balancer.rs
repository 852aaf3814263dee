use std::sync::{Arc, RwLock};
use tracing::debug;

use super::picker::{
    ErrPicker, PickError, PickInfo, PickResult, Picker, PickerBuildInfo, PickerBuilder,
    ReadySubConn,
};

/// Holds the current picker and replaces it wholesale on every ready-set change.
///
/// This is the role the RPC framework's balancer plays; readers never see a
/// half-rebuilt picker because the swap is a single pointer store.
#[derive(Clone)]
pub struct Balancer {
    builder: Arc<dyn PickerBuilder>,
    picker: Arc<RwLock<Arc<dyn Picker>>>,
}

impl std::fmt::Debug for Balancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Balancer")
            .field("builder", &self.builder.name())
            .field("picker", &"<dyn Picker>")
            .finish()
    }
}

impl Balancer {
    /// Balancer with no ready connections yet
    pub fn new(builder: Arc<dyn PickerBuilder>) -> Self {
        let initial: Arc<dyn Picker> = Arc::new(ErrPicker::new(PickError::NoConnectionAvailable));
        Self {
            builder,
            picker: Arc::new(RwLock::new(initial)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.builder.name()
    }

    /// Rebuild the picker from a new ready set and swap it in
    pub fn update_ready(&self, ready: Vec<ReadySubConn>) {
        let count = ready.len();
        let picker = self.builder.build(PickerBuildInfo::new(ready));
        let mut current = self
            .picker
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = picker;
        debug!("Balancer {} swapped picker for {} ready connections", self.name(), count);
    }

    /// The picker currently serving requests
    pub fn picker(&self) -> Arc<dyn Picker> {
        self.picker
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn pick(&self, info: &PickInfo<'_>) -> Result<PickResult, PickError> {
        self.picker().pick(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::balancer::picker::SubConn;
    use crate::balancer::weighted_round_robin::WeightedRoundRobinBuilder;

    #[derive(Debug)]
    struct TestConn(u64);

    impl SubConn for TestConn {
        fn id(&self) -> u64 {
            self.0
        }
    }

    fn ready_conn(id: u64, weight: u32) -> ReadySubConn {
        ReadySubConn::new(
            Arc::new(TestConn(id)),
            Address::new(format!("10.0.0.{}:80", id), "orders").with_weight(weight),
        )
    }

    #[test]
    fn test_starts_unavailable() {
        let balancer = Balancer::new(Arc::new(WeightedRoundRobinBuilder::new()));
        assert_eq!(
            balancer.pick(&PickInfo::default()).unwrap_err(),
            PickError::NoConnectionAvailable
        );
    }

    #[test]
    fn test_update_swaps_picker() {
        let balancer = Balancer::new(Arc::new(WeightedRoundRobinBuilder::new()));
        balancer.update_ready(vec![ready_conn(1, 0)]);
        let old = balancer.picker();
        assert_eq!(old.pick(&PickInfo::default()).unwrap().sub_conn.id(), 1);

        balancer.update_ready(vec![ready_conn(2, 0)]);
        assert_eq!(balancer.pick(&PickInfo::default()).unwrap().sub_conn.id(), 2);
        // A picker handed out earlier keeps serving its own snapshot.
        assert_eq!(old.pick(&PickInfo::default()).unwrap().sub_conn.id(), 1);
    }

    #[test]
    fn test_update_to_empty_is_unavailable() {
        let balancer = Balancer::new(Arc::new(WeightedRoundRobinBuilder::new()));
        balancer.update_ready(vec![ready_conn(1, 4)]);
        balancer.update_ready(Vec::new());
        assert_eq!(
            balancer.pick(&PickInfo::default()).unwrap_err(),
            PickError::NoConnectionAvailable
        );
    }
}
