// src/backend/storage/testers.rs
use crate::error::SignupError;
use crate::models::{tester::normalize_email, AppId, Tester, TesterId, TesterUpdate, Timestamp};
use crate::storage::storable::Cbor;
use crate::utils::crypto::tester_id;
use ic_stable_structures::{Memory, StableBTreeMap};
use serde::{Deserialize, Serialize};

/// Testers: Key = (AppId, TesterId), where TesterId is derived from the email.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct TesterKey {
    pub app_id: AppId,
    pub tester_id: TesterId,
}

type StorableTester = Cbor<Tester>;

/// Tester records as the signup workflow sees them.
pub trait TesterStore {
    fn find_by_email(&self, app_id: &str, email: &str) -> Option<Tester>;

    /// Inserts a new tester under its deterministic key.
    /// A second insert for the same (app, email) fails instead of creating a duplicate.
    fn create(
        &mut self,
        app_id: &str,
        email: &str,
        has_joined_group: bool,
        promotional_code: Option<String>,
        now: Timestamp,
    ) -> Result<Tester, SignupError>;

    /// Applies set-only updates. An assigned code is never replaced.
    fn update(&mut self, id: &TesterId, app_id: &str, update: TesterUpdate) -> Result<Tester, SignupError>;
}

pub struct TesterRegistry<M: Memory> {
    testers: StableBTreeMap<Cbor<TesterKey>, StorableTester, M>,
}

impl<M: Memory> TesterRegistry<M> {
    pub fn init(memory: M) -> Self {
        Self {
            testers: StableBTreeMap::init(memory),
        }
    }

    pub fn list_for_app(&self, app_id: &str) -> Vec<Tester> {
        self.testers
            .range(key(app_id, "")..)
            .take_while(|(k, _)| k.0.app_id == app_id)
            .map(|(_, tester)| tester.0)
            .collect()
    }

    /// Deletes every tester of the app. Only used when the app itself is deleted.
    pub fn remove_all(&mut self, app_id: &str) -> u64 {
        let keys: Vec<Cbor<TesterKey>> = self
            .testers
            .range(key(app_id, "")..)
            .take_while(|(k, _)| k.0.app_id == app_id)
            .map(|(k, _)| k)
            .collect();
        for k in &keys {
            self.testers.remove(k);
        }
        keys.len() as u64
    }
}

impl<M: Memory> TesterStore for TesterRegistry<M> {
    fn find_by_email(&self, app_id: &str, email: &str) -> Option<Tester> {
        self.testers
            .get(&key(app_id, &tester_id(app_id, email)))
            .map(|c| c.0)
    }

    fn create(
        &mut self,
        app_id: &str,
        email: &str,
        has_joined_group: bool,
        promotional_code: Option<String>,
        now: Timestamp,
    ) -> Result<Tester, SignupError> {
        let id = tester_id(app_id, email);
        let k = key(app_id, &id);
        if self.testers.contains_key(&k) {
            return Err(SignupError::TesterAlreadyExists(normalize_email(email)));
        }
        let tester = Tester {
            id,
            app_id: app_id.to_string(),
            email: normalize_email(email),
            has_joined_group,
            promotional_code,
            joined_at: now,
        };
        self.testers.insert(k, Cbor(tester.clone()));
        Ok(tester)
    }

    fn update(
        &mut self,
        id: &TesterId,
        app_id: &str,
        update: TesterUpdate,
    ) -> Result<Tester, SignupError> {
        let k = key(app_id, id);
        let mut tester = self
            .testers
            .get(&k)
            .map(|c| c.0)
            .ok_or_else(|| SignupError::NotFound(format!("Tester {} of app {}", id, app_id)))?;

        if let Some(code) = update.promotional_code {
            match &tester.promotional_code {
                Some(existing) if *existing != code => {
                    return Err(SignupError::InternalError(format!(
                        "Tester {} already holds a promotional code",
                        id
                    )));
                }
                _ => tester.promotional_code = Some(code),
            }
        }
        tester.has_joined_group |= update.has_joined_group;

        self.testers.insert(k, Cbor(tester.clone()));
        Ok(tester)
    }
}

fn key(app_id: &str, tester_id: &str) -> Cbor<TesterKey> {
    Cbor(TesterKey {
        app_id: app_id.to_string(),
        tester_id: tester_id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ic_stable_structures::memory_manager::{MemoryId, MemoryManager, VirtualMemory};
    use ic_stable_structures::DefaultMemoryImpl;

    fn registry() -> TesterRegistry<VirtualMemory<DefaultMemoryImpl>> {
        let mm = MemoryManager::init(DefaultMemoryImpl::default());
        TesterRegistry::init(mm.get(MemoryId::new(0)))
    }

    #[test]
    fn second_create_for_same_email_fails() {
        let mut registry = registry();
        registry.create("com.a.app", "x@example.com", false, None, 1).unwrap();
        let err = registry
            .create("com.a.app", "X@Example.com", true, Some("A1".into()), 2)
            .unwrap_err();
        assert_eq!(err, SignupError::TesterAlreadyExists("x@example.com".into()));

        let stored = registry.find_by_email("com.a.app", "x@example.com").unwrap();
        assert!(!stored.has_joined_group);
        assert_eq!(stored.promotional_code, None);
        assert_eq!(registry.list_for_app("com.a.app").len(), 1);
    }

    #[test]
    fn same_email_may_join_many_apps() {
        let mut registry = registry();
        registry.create("com.a.app", "x@example.com", false, None, 1).unwrap();
        registry.create("com.b.app", "x@example.com", true, None, 1).unwrap();
        assert_eq!(registry.list_for_app("com.a.app").len(), 1);
        assert_eq!(registry.list_for_app("com.b.app").len(), 1);
        assert!(registry.find_by_email("com.c.app", "x@example.com").is_none());
    }

    #[test]
    fn update_only_sets_fields() {
        let mut registry = registry();
        let tester = registry.create("com.a.app", "x@example.com", true, None, 1).unwrap();

        let updated = registry
            .update(&tester.id, "com.a.app", TesterUpdate { has_joined_group: false, promotional_code: Some("A1".into()) })
            .unwrap();
        assert!(updated.has_joined_group);
        assert_eq!(updated.promotional_code.as_deref(), Some("A1"));

        let replay = registry
            .update(&tester.id, "com.a.app", TesterUpdate { has_joined_group: true, promotional_code: Some("A1".into()) })
            .unwrap();
        assert_eq!(replay.promotional_code.as_deref(), Some("A1"));

        assert!(registry
            .update(&tester.id, "com.a.app", TesterUpdate { has_joined_group: true, promotional_code: Some("A2".into()) })
            .is_err());
        assert_eq!(
            registry.find_by_email("com.a.app", "x@example.com").unwrap().promotional_code.as_deref(),
            Some("A1")
        );
    }

    #[test]
    fn update_of_unknown_tester_is_not_found() {
        let mut registry = registry();
        assert!(matches!(
            registry.update(&"missing".to_string(), "com.a.app", TesterUpdate::default()),
            Err(SignupError::NotFound(_))
        ));
    }

    #[test]
    fn remove_all_clears_the_app() {
        let mut registry = registry();
        registry.create("com.a.app", "x@example.com", false, None, 1).unwrap();
        registry.create("com.a.app", "y@example.com", false, None, 1).unwrap();
        registry.create("com.b.app", "z@example.com", false, None, 1).unwrap();
        assert_eq!(registry.remove_all("com.a.app"), 2);
        assert!(registry.list_for_app("com.a.app").is_empty());
        assert_eq!(registry.list_for_app("com.b.app").len(), 1);
    }
}
