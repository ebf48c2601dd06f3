//! The engine. `Core` methods are split by component across the files of
//! this module; each mutation runs as one store transaction and dispatches
//! its notifications only after the commit.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use kindred_shared::errors::AppResult;

use crate::clock::Clock;
use crate::notify::{Notification, NotificationDispatcher};
use crate::store::{transaction, Repo, Store};

mod account;
mod discovery;
mod graph;
mod identity;
mod locations;
mod messaging;
mod profiles;

pub use account::delete_profile_closure;
pub use graph::teardown_pair;
pub use identity::require_identity;

#[derive(Debug, Clone)]
pub struct CoreSettings {
    pub activities_cooldown: Duration,
    pub location_decimals: u32,
    pub geohash_precision: usize,
    pub max_photos: usize,
    pub max_message_length: usize,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            activities_cooldown: Duration::days(7),
            location_decimals: 3,
            geohash_precision: 6,
            max_photos: 6,
            max_message_length: 2000,
        }
    }
}

#[derive(Clone)]
pub struct Core {
    store: Arc<dyn Store>,
    notifier: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    settings: CoreSettings,
}

impl Core {
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn NotificationDispatcher>,
        clock: Arc<dyn Clock>,
        settings: CoreSettings,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &CoreSettings {
        &self.settings
    }

    pub fn store_health(&self) -> AppResult<()> {
        self.store.ping()
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn tx<T>(&self, f: impl FnMut(&mut dyn Repo) -> AppResult<T>) -> AppResult<T> {
        transaction(self.store.as_ref(), f)
    }

    fn dispatch(&self, notifications: Vec<Notification>) {
        for notification in notifications {
            self.notifier.notify(notification);
        }
    }
}
