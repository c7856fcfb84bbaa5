use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::{
    counter::{AtomicCounter, LocalAtomicCounter},
    namespace_map::{LocalNamespaceMap, NamespaceMap},
};

pub const ROOT_ELECTION_COUNTER: &str = "numberOfDirs";
pub const PROGRESS_COUNTER: &str = "progress";
pub const PHASE_COUNTER: &str = "completedPhases";

pub trait CoordinationSubstrate: Send + Sync {
    fn namespace_map(&self) -> Arc<dyn NamespaceMap>;
    fn counter(&self, name: &str) -> Arc<dyn AtomicCounter>;
}

#[derive(Debug, Default)]
pub struct LocalSubstrate {
    namespace: Arc<LocalNamespaceMap>,
    counters: Mutex<HashMap<String, Arc<LocalAtomicCounter>>>,
}

impl LocalSubstrate {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CoordinationSubstrate for LocalSubstrate {
    fn namespace_map(&self) -> Arc<dyn NamespaceMap> {
        self.namespace.clone()
    }
    fn counter(&self, name: &str) -> Arc<dyn AtomicCounter> {
        // the map is only ever inserted into, a poisoned lock still holds consistent data
        let mut counters = self
            .counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        counters
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(LocalAtomicCounter::default()))
            .clone()
    }
}
