//! The profile store itself: a read-mostly, class-keyed map of sorted
//! OID→entry profiles, swapped atomically on reload.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use super::entry::ProfileEntry;
use super::walk::{self, WalkEntry, WalkStats};
use super::DeviceClass;
use crate::simulate::{evaluate, DeviceView};
use crate::snmp::{Oid, SnmpValue, TypeTag};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupError {
    NotFound,
    ClassUnknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextOutcome {
    EndOfMib,
    ClassUnknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryStats {
    pub class_count: usize,
    pub total_entries: usize,
}

/// A single device class's MIB data: a sorted, duplicate-free sequence
/// of (OID, entry) pairs plus a hash index for O(1) point lookup. Both
/// views are built together and never diverge.
#[derive(Debug, Default)]
pub struct Profile {
    entries: Vec<(Oid, ProfileEntry)>,
    index: HashMap<Oid, usize>,
}

impl Profile {
    fn build(walk_entries: Vec<WalkEntry>) -> Self {
        let mut by_oid: HashMap<Oid, ProfileEntry> = HashMap::new();
        for w in walk_entries {
            let behavior = super::entry::infer_behavior(&w.oid, w.type_tag, &w.value);
            by_oid.insert(w.oid, ProfileEntry::new(w.value, behavior));
        }
        let mut entries: Vec<(Oid, ProfileEntry)> = by_oid.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut index = HashMap::with_capacity(entries.len());
        for (i, (oid, _)) in entries.iter().enumerate() {
            index.insert(oid.clone(), i);
        }

        Self { entries, index }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn successor_index(&self, oid: &Oid) -> usize {
        match self.entries.binary_search_by(|(o, _)| o.cmp(oid)) {
            Ok(idx) => idx + 1,
            Err(idx) => idx,
        }
    }
}

/// Process-wide shared store, one profile per device class. Reads take
/// a brief lock only to clone the `Arc<Profile>` handle, so lookups do
/// not contend with one another or with a concurrent reload; a reader
/// that already holds a handle always sees a fully pre- or post-reload
/// profile, never a partial one.
#[derive(Debug, Default)]
pub struct ProfileStore {
    profiles: RwLock<HashMap<DeviceClass, Arc<Profile>>>,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self { profiles: RwLock::new(HashMap::new()) }
    }

    fn snapshot(&self, class: &DeviceClass) -> Option<Arc<Profile>> {
        self.profiles.read().expect("profile store lock poisoned").get(class).cloned()
    }

    pub fn has_class(&self, class: &DeviceClass) -> bool {
        self.profiles.read().expect("profile store lock poisoned").contains_key(class)
    }

    /// Parses `walk_source` and installs the result as `class`'s
    /// profile, replacing whatever was there atomically. On parse
    /// failure the previous profile, if any, is left untouched.
    pub fn load_walk_profile(&self, class: DeviceClass, walk_source: &str) -> Result<WalkStats> {
        let (entries, stats) = walk::parse_walk(walk_source);
        self.store_profile(class, entries);
        Ok(stats)
    }

    pub fn store_profile(&self, class: DeviceClass, entries: Vec<WalkEntry>) {
        let profile = Arc::new(Profile::build(entries));
        let mut profiles = self.profiles.write().expect("profile store lock poisoned");
        profiles.insert(class, profile);
    }

    pub fn get(
        &self,
        class: &DeviceClass,
        oid: &Oid,
        view: &DeviceView,
        now: DateTime<Utc>,
    ) -> std::result::Result<(TypeTag, SnmpValue), LookupError> {
        let profile = self.snapshot(class).ok_or(LookupError::ClassUnknown)?;
        let idx = profile.index.get(oid).ok_or(LookupError::NotFound)?;
        let (_, entry) = &profile.entries[*idx];
        Ok(evaluate(entry, view, oid, now))
    }

    pub fn get_next(&self, class: &DeviceClass, oid: &Oid) -> std::result::Result<Oid, NextOutcome> {
        let profile = self.snapshot(class).ok_or(NextOutcome::ClassUnknown)?;
        let idx = profile.successor_index(oid);
        profile.entries.get(idx).map(|(o, _)| o.clone()).ok_or(NextOutcome::EndOfMib)
    }

    /// Walks at most `max_repetitions` entries strictly after
    /// `start_oid`. Returns an empty vector (never an error) when
    /// `start_oid` is at or past the last entry in the profile.
    pub fn get_bulk(
        &self,
        class: &DeviceClass,
        start_oid: &Oid,
        max_repetitions: u32,
        view: &DeviceView,
        now: DateTime<Utc>,
    ) -> std::result::Result<Vec<(Oid, TypeTag, SnmpValue)>, LookupError> {
        let profile = self.snapshot(class).ok_or(LookupError::ClassUnknown)?;
        let start = profile.successor_index(start_oid);
        let end = (start + max_repetitions as usize).min(profile.entries.len());

        let mut results = Vec::with_capacity(end.saturating_sub(start));
        for (oid, entry) in &profile.entries[start..end] {
            let (type_tag, value) = evaluate(entry, view, oid, now);
            results.push((oid.clone(), type_tag, value));
        }
        Ok(results)
    }

    pub fn list_classes(&self) -> Vec<DeviceClass> {
        self.profiles.read().expect("profile store lock poisoned").keys().cloned().collect()
    }

    pub fn memory_stats(&self) -> MemoryStats {
        let profiles = self.profiles.read().expect("profile store lock poisoned");
        MemoryStats {
            class_count: profiles.len(),
            total_entries: profiles.values().map(|p| p.len()).sum(),
        }
    }
}
