use std::collections::HashSet;

use crate::config::Host;

/// Deduplicated, ordered view over a seed list.
///
/// Two hosts are the same seed when their [`Host::lookup_key`] strings are
/// equal. The first occurrence is kept; later duplicates are dropped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HostLookup {
    hosts: Vec<Host>,
    seen: HashSet<String>,
}

impl HostLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `host` unless an equivalent seed is already present. Returns
    /// `true` if it was added.
    pub fn insert(&mut self, host: &Host) -> bool {
        if !self.seen.insert(host.lookup_key()) {
            return false;
        }
        self.hosts.push(host.clone());
        true
    }

    pub fn contains(&self, lookup_key: &str) -> bool {
        self.seen.contains(lookup_key)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Unique seeds in first-seen order.
    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn keys(&self) -> impl Iterator<Item = String> + '_ {
        self.hosts.iter().map(Host::lookup_key)
    }
}

impl<'a> FromIterator<&'a Host> for HostLookup {
    fn from_iter<I: IntoIterator<Item = &'a Host>>(iter: I) -> Self {
        let mut lookup = Self::new();
        for host in iter {
            lookup.insert(host);
        }
        lookup
    }
}
