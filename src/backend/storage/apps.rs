// src/backend/storage/apps.rs
use crate::error::SignupError;
use crate::models::App;
use crate::storage::storable::{Cbor, StorableString};
use ic_stable_structures::{Memory, StableBTreeMap};

type StorableApp = Cbor<App>;

/// Root collection: one record per registered Android app.
pub struct AppRegistry<M: Memory> {
    apps: StableBTreeMap<StorableString, StorableApp, M>,
}

impl<M: Memory> AppRegistry<M> {
    pub fn init(memory: M) -> Self {
        Self {
            apps: StableBTreeMap::init(memory),
        }
    }

    pub fn get(&self, app_id: &str) -> Option<App> {
        self.apps.get(&Cbor(app_id.to_string())).map(|c| c.0)
    }

    /// Inserts a new app. Fails if the id is already taken, complete or not;
    /// callers decide whether an incomplete record may be discarded first.
    pub fn insert(&mut self, app: App) -> Result<(), SignupError> {
        let key = Cbor(app.app_id.clone());
        if self.apps.contains_key(&key) {
            return Err(SignupError::AppAlreadyExists(app.app_id));
        }
        self.apps.insert(key, Cbor(app));
        Ok(())
    }

    pub fn mark_setup_complete(&mut self, app_id: &str) -> Result<App, SignupError> {
        let key = Cbor(app_id.to_string());
        let mut app = self
            .apps
            .get(&key)
            .map(|c| c.0)
            .ok_or_else(|| SignupError::NotFound(format!("App {}", app_id)))?;
        app.is_setup_complete = true;
        self.apps.insert(key, Cbor(app.clone()));
        Ok(app)
    }

    pub fn remove(&mut self, app_id: &str) -> Option<App> {
        self.apps.remove(&Cbor(app_id.to_string())).map(|c| c.0)
    }
}
