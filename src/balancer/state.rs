use super::picker::SubConnRef;

/// Connections sharing one weight, with a rotation cursor
#[derive(Debug, Clone)]
pub struct WeightBucket {
    pub weight: u32,
    pub sub_conns: Vec<SubConnRef>,
    pub next: usize,
}

impl WeightBucket {
    pub fn new(weight: u32) -> Self {
        Self {
            weight,
            sub_conns: Vec::new(),
            next: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.sub_conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sub_conns.is_empty()
    }

    /// Probability mass of the whole bucket: one `weight` per member
    pub fn mass(&self) -> u64 {
        u64::from(self.weight) * self.sub_conns.len() as u64
    }

    /// Connection at the cursor; advances the cursor modulo the bucket size
    pub fn rotate(&mut self) -> Option<SubConnRef> {
        if self.sub_conns.is_empty() {
            return None;
        }
        let idx = self.next % self.sub_conns.len();
        self.next = (idx + 1) % self.sub_conns.len();
        Some(self.sub_conns[idx].clone())
    }
}
