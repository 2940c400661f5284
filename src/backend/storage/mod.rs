// src/backend/storage/mod.rs
// Stable memory collections. `Store` owns one handle per collection and is
// passed explicitly to the services; the canister installs a single instance.

pub mod apps;
pub mod codes;
pub mod config;
pub mod credentials;
pub mod memory;
pub mod metrics;
pub mod storable;
pub mod testers;

pub use apps::AppRegistry;
pub use codes::{CodePool, CodePoolStore, CodeStats};
pub use config::ConfigCell;
pub use credentials::CredentialVault;
pub use memory::CanisterMemory;
pub use metrics::MetricsCell;
pub use storable::{Cbor, StorableString};
pub use testers::{TesterRegistry, TesterStore};

use crate::error::SignupError;
use ic_stable_structures::memory_manager::MemoryId;
use ic_stable_structures::Memory;
use std::cell::RefCell;
use std::rc::Rc;

pub struct Store<M: Memory> {
    pub apps: AppRegistry<M>,
    pub codes: CodePoolStore<M>,
    pub testers: TesterRegistry<M>,
    pub credentials: CredentialVault<M>,
    pub config: ConfigCell<M>,
    pub metrics: MetricsCell<M>,
}

/// Shared handle. Borrows must never be held across an `await`.
pub type StoreHandle<M> = Rc<RefCell<Store<M>>>;

/// Counts removed by a cascading app deletion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub codes: u64,
    pub testers: u64,
}

impl<M: Memory> Store<M> {
    /// Opens (or re-opens after an upgrade) every collection.
    pub fn init(memory_for: impl Fn(MemoryId) -> M) -> Result<Self, SignupError> {
        Ok(Self {
            apps: AppRegistry::init(memory_for(memory::APPS_MEM_ID)),
            codes: CodePoolStore::init(
                memory_for(memory::PROMO_CODES_MEM_ID),
                memory_for(memory::CODE_COUNTER_MEM_ID),
            )?,
            testers: TesterRegistry::init(memory_for(memory::TESTERS_MEM_ID)),
            credentials: CredentialVault::init(memory_for(memory::CREDENTIALS_MEM_ID)),
            config: ConfigCell::init(memory_for(memory::CONFIG_MEM_ID))?,
            metrics: MetricsCell::init(memory_for(memory::METRICS_MEM_ID))?,
        })
    }

    /// Deletes an app together with its codes, testers and stored credential.
    pub fn delete_app_cascade(&mut self, app_id: &str) -> Option<CascadeReport> {
        let removed = self.apps.remove(app_id)?;
        self.credentials.remove(&removed.app_id);
        Some(CascadeReport {
            codes: self.codes.remove_all(&removed.app_id),
            testers: self.testers.remove_all(&removed.app_id),
        })
    }
}

thread_local! {
    static STORE: RefCell<Option<StoreHandle<CanisterMemory>>> = const { RefCell::new(None) };
}

/// Opens the canister store. Called from `init` and `post_upgrade`.
pub fn install_canister_store() -> Result<StoreHandle<CanisterMemory>, SignupError> {
    let store = Rc::new(RefCell::new(Store::init(memory::get_memory)?));
    STORE.with(|slot| *slot.borrow_mut() = Some(Rc::clone(&store)));
    Ok(store)
}

pub fn canister_store() -> Result<StoreHandle<CanisterMemory>, SignupError> {
    STORE.with(|slot| slot.borrow().clone()).ok_or_else(|| {
        SignupError::StorageError("Store accessed before canister initialization".to_string())
    })
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use ic_stable_structures::memory_manager::{MemoryManager, VirtualMemory};
    use ic_stable_structures::DefaultMemoryImpl;

    use crate::models::{CodeId, PromotionalCode, Tester, TesterId, TesterUpdate, Timestamp};

    pub type TestMemory = VirtualMemory<DefaultMemoryImpl>;

    /// Fresh in-heap store; each call gets its own memory.
    pub fn test_store() -> StoreHandle<TestMemory> {
        let manager = MemoryManager::init(DefaultMemoryImpl::default());
        let store = Store::init(|id| manager.get(id)).expect("in-heap store initializes");
        Rc::new(RefCell::new(store))
    }

    /// Fails every redemption with a store error.
    pub struct BrokenPool<'a, P>(pub &'a mut P);

    impl<P: CodePool> CodePool for BrokenPool<'_, P> {
        fn find_one_available(&self, app_id: &str) -> Option<PromotionalCode> {
            self.0.find_one_available(app_id)
        }

        fn redeem(&mut self, _: CodeId, _: &str, _: &str, _: Timestamp) -> Result<PromotionalCode, SignupError> {
            Err(SignupError::StorageError("write rejected".into()))
        }
    }

    /// Reads pass through; every tester write fails with a store error.
    pub struct RejectingTesters<'a, T>(pub &'a mut T);

    impl<T: TesterStore> TesterStore for RejectingTesters<'_, T> {
        fn find_by_email(&self, app_id: &str, email: &str) -> Option<Tester> {
            self.0.find_by_email(app_id, email)
        }

        fn create(&mut self, _: &str, _: &str, _: bool, _: Option<String>, _: Timestamp) -> Result<Tester, SignupError> {
            Err(SignupError::StorageError("write rejected".into()))
        }

        fn update(&mut self, _: &TesterId, _: &str, _: TesterUpdate) -> Result<Tester, SignupError> {
            Err(SignupError::StorageError("write rejected".into()))
        }
    }
}
