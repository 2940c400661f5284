use crate::error::SignupError;
use crate::metrics::SignupMetrics;
use crate::storage::storable::Cbor;
use ic_stable_structures::{Memory, StableCell};

type StorableSignupMetrics = Cbor<SignupMetrics>;

pub struct MetricsCell<M: Memory> {
    cell: StableCell<StorableSignupMetrics, M>,
}

impl<M: Memory> MetricsCell<M> {
    pub fn init(memory: M) -> Result<Self, SignupError> {
        let cell = StableCell::init(memory, Cbor(SignupMetrics::default())).map_err(|e| {
            SignupError::StorageError(format!("Failed to initialize metrics cell: {:?}", e))
        })?;
        Ok(Self { cell })
    }

    pub fn get(&self) -> SignupMetrics {
        self.cell.get().0.clone()
    }

    /// Applies `update_fn` to a copy of the counters and writes it back.
    pub fn update<F>(&mut self, update_fn: F) -> Result<(), SignupError>
    where
        F: FnOnce(&mut SignupMetrics),
    {
        let mut metrics = self.get();
        update_fn(&mut metrics);
        self.cell
            .set(Cbor(metrics))
            .map(|_old| ())
            .map_err(|e| SignupError::StorageError(format!("Failed to update metrics: {:?}", e)))
    }
}
