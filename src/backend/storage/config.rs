// src/backend/storage/config.rs
use crate::error::SignupError;
use crate::models::init::CanisterConfig;
use crate::storage::storable::Cbor;
use candid::Principal;
use ic_stable_structures::{Memory, StableCell};

pub struct ConfigCell<M: Memory> {
    cell: StableCell<Cbor<CanisterConfig>, M>,
}

impl<M: Memory> ConfigCell<M> {
    pub fn init(memory: M) -> Result<Self, SignupError> {
        let cell = StableCell::init(memory, Cbor(CanisterConfig::default())).map_err(|e| {
            SignupError::StorageError(format!("Failed to initialize config cell: {:?}", e))
        })?;
        Ok(Self { cell })
    }

    pub fn get(&self) -> CanisterConfig {
        self.cell.get().0.clone()
    }

    /// Should be called only during canister initialization.
    pub fn set(&mut self, config: CanisterConfig) -> Result<(), SignupError> {
        self.cell
            .set(Cbor(config))
            .map(|_old| ())
            .map_err(|e| SignupError::StorageError(format!("Failed to set config: {:?}", e)))
    }

    pub fn is_gateway(&self, caller: &Principal) -> bool {
        self.cell.get().0.gateway_principal == *caller
    }

    pub fn is_admin(&self, caller: &Principal) -> bool {
        self.cell.get().0.admin_principals.contains(caller)
    }
}
