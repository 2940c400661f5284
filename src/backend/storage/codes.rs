// src/backend/storage/codes.rs
use crate::error::SignupError;
use crate::models::{AppId, CodeId, PromotionalCode, Timestamp};
use crate::storage::storable::Cbor;
use candid::CandidType;
use ic_stable_structures::{Memory, StableBTreeMap, StableCell};
use serde::{Deserialize, Serialize};

/// Codes are keyed per app; `code_id` grows monotonically so key order is creation order.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct CodeKey {
    pub app_id: AppId,
    pub code_id: CodeId,
}

type StorableCode = Cbor<PromotionalCode>;

#[derive(CandidType, Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CodeStats {
    pub total: u64,
    pub redeemed: u64,
    pub available: u64,
}

/// Data-access contract the allocation engine works against.
pub trait CodePool {
    /// Any one code of the app whose redemption timestamp is absent.
    fn find_one_available(&self, app_id: &str) -> Option<PromotionalCode>;

    /// Compare-and-set: marks the code redeemed only if it is still available.
    /// Returns `RedemptionConflict` when someone else got there first.
    fn redeem(
        &mut self,
        code_id: CodeId,
        redeemer_email: &str,
        app_id: &str,
        now: Timestamp,
    ) -> Result<PromotionalCode, SignupError>;
}

pub struct CodePoolStore<M: Memory> {
    codes: StableBTreeMap<Cbor<CodeKey>, StorableCode, M>,
    next_id: StableCell<CodeId, M>,
}

impl<M: Memory> CodePoolStore<M> {
    pub fn init(codes_memory: M, counter_memory: M) -> Result<Self, SignupError> {
        let next_id = StableCell::init(counter_memory, 0).map_err(|e| {
            SignupError::StorageError(format!("Failed to initialize code counter: {:?}", e))
        })?;
        Ok(Self {
            codes: StableBTreeMap::init(codes_memory),
            next_id,
        })
    }

    fn allocate_ids(&mut self, count: u64) -> Result<CodeId, SignupError> {
        let first = *self.next_id.get();
        let next = first
            .checked_add(count)
            .ok_or_else(|| SignupError::InternalError("Code counter overflow".to_string()))?;
        self.next_id
            .set(next)
            .map_err(|e| SignupError::StorageError(format!("Failed to update code counter: {:?}", e)))?;
        Ok(first)
    }

    /// Appends codes to the app's pool. Duplicate strings are stored as given.
    pub fn add_codes(
        &mut self,
        app_id: &str,
        codes: &[String],
        now: Timestamp,
    ) -> Result<Vec<CodeId>, SignupError> {
        let first = self.allocate_ids(codes.len() as u64)?;
        let mut ids = Vec::with_capacity(codes.len());
        for (offset, code) in codes.iter().enumerate() {
            let id = first + offset as u64;
            let record = PromotionalCode {
                id,
                app_id: app_id.to_string(),
                code: code.clone(),
                created_at: now,
                redeemed_at: None,
                redeemed_by: None,
            };
            self.codes.insert(key(app_id, id), Cbor(record));
            ids.push(id);
        }
        Ok(ids)
    }

    fn app_codes<'a>(&'a self, app_id: &'a str) -> impl Iterator<Item = PromotionalCode> + 'a {
        self.codes
            .range(key(app_id, 0)..)
            .take_while(move |(k, _)| k.0.app_id == app_id)
            .map(|(_, code)| code.0)
    }

    /// All codes of the app, newest first.
    pub fn list_codes(&self, app_id: &str) -> Vec<PromotionalCode> {
        let mut codes: Vec<PromotionalCode> = self.app_codes(app_id).collect();
        codes.reverse();
        codes
    }

    pub fn get(&self, app_id: &str, code_id: CodeId) -> Option<PromotionalCode> {
        self.codes.get(&key(app_id, code_id)).map(|c| c.0)
    }

    pub fn stats(&self, app_id: &str) -> CodeStats {
        let (total, redeemed) = self
            .app_codes(app_id)
            .fold((0u64, 0u64), |(total, redeemed), code| {
                (total + 1, redeemed + u64::from(!code.is_available()))
            });
        CodeStats {
            total,
            redeemed,
            available: total - redeemed,
        }
    }

    /// Deletes every code of the app. Only used when the app itself is deleted.
    pub fn remove_all(&mut self, app_id: &str) -> u64 {
        let keys: Vec<Cbor<CodeKey>> = self
            .codes
            .range(key(app_id, 0)..)
            .take_while(|(k, _)| k.0.app_id == app_id)
            .map(|(k, _)| k)
            .collect();
        for k in &keys {
            self.codes.remove(k);
        }
        keys.len() as u64
    }
}

impl<M: Memory> CodePool for CodePoolStore<M> {
    fn find_one_available(&self, app_id: &str) -> Option<PromotionalCode> {
        self.app_codes(app_id).find(PromotionalCode::is_available)
    }

    fn redeem(
        &mut self,
        code_id: CodeId,
        redeemer_email: &str,
        app_id: &str,
        now: Timestamp,
    ) -> Result<PromotionalCode, SignupError> {
        let k = key(app_id, code_id);
        let mut code = self.codes.get(&k).map(|c| c.0).ok_or_else(|| {
            SignupError::NotFound(format!("Promotional code {} of app {}", code_id, app_id))
        })?;
        if !code.is_available() {
            return Err(SignupError::RedemptionConflict(code_id));
        }
        code.redeemed_at = Some(now);
        code.redeemed_by = Some(redeemer_email.to_string());
        self.codes.insert(k, Cbor(code.clone()));
        Ok(code)
    }
}

fn key(app_id: &str, code_id: CodeId) -> Cbor<CodeKey> {
    Cbor(CodeKey {
        app_id: app_id.to_string(),
        code_id,
    })
}
