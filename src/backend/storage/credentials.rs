// src/backend/storage/credentials.rs
use crate::models::AccessCredential;
use crate::storage::storable::{Cbor, StorableString};
use ic_stable_structures::{Memory, StableBTreeMap};

/// Owner-delegated group credentials, kept apart from the app records
/// so that no app query can leak them.
pub struct CredentialVault<M: Memory> {
    credentials: StableBTreeMap<StorableString, Cbor<AccessCredential>, M>,
}

impl<M: Memory> CredentialVault<M> {
    pub fn init(memory: M) -> Self {
        Self {
            credentials: StableBTreeMap::init(memory),
        }
    }

    pub fn get(&self, app_id: &str) -> Option<AccessCredential> {
        self.credentials.get(&Cbor(app_id.to_string())).map(|c| c.0)
    }

    pub fn put(&mut self, app_id: &str, credential: AccessCredential) {
        self.credentials.insert(Cbor(app_id.to_string()), Cbor(credential));
    }

    pub fn remove(&mut self, app_id: &str) -> Option<AccessCredential> {
        self.credentials.remove(&Cbor(app_id.to_string())).map(|c| c.0)
    }
}
