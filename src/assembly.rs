// Copyright 2024 Mikael Lund
//
// Licensed under the Apache license, version 2.0 (the "license");
// you may not use this file except in compliance with the license.
// You may obtain a copy of the license at
//
//     http://www.apache.org/licenses/license-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the license is distributed on an "as is" basis,
// without warranties or conditions of any kind, either express or implied.
// See the license for the specific language governing permissions and
// limitations under the license.

//! # Chains permitted by the selected biological assembly
//!
//! Distances are only calculated between chains in the [`PermittedChainSet`].
//! When the set changes, dependents are told in two phases: first to recalculate
//! link distances, then that the set itself changed. [`AssemblyFilter::notify`] always
//! sends both phases in that order so no dependent sees a new set with stale distances.

use crate::chains::ChainRegistry;
use crate::structure::{ChainIndex, Structure};
use derive_more::Debug;
use std::collections::BTreeSet;

/// Chain indices eligible for distance calculations.
pub type PermittedChainSet = BTreeSet<ChainIndex>;

/// Dependent of the permitted chain set.
pub trait ChainPermissionListener {
    /// Phase one: recompute anything derived from link distances.
    fn recalculate_link_distances(&mut self, _permitted: &PermittedChainSet) {}
    /// Phase two: the permitted chain set has changed.
    fn permitted_chains_updated(&mut self, _permitted: &PermittedChainSet) {}
}

/// Tracks the permitted chain set and its listeners.
#[derive(Debug, Default)]
pub struct AssemblyFilter {
    permitted: PermittedChainSet,
    #[debug(skip)]
    listeners: Vec<Box<dyn ChainPermissionListener>>,
}

impl AssemblyFilter {
    /// Permit every chain of the registry. This is the silent initial call at structure load.
    pub fn new(registry: &ChainRegistry) -> Self {
        let mut filter = Self::default();
        filter.set_allowed_chain_names(registry, None);
        filter
    }

    /// Recompute the permitted set from chain names, or permit every chain if `None`.
    ///
    /// Names absent from the structure match nothing. No listener is notified here;
    /// the owner recalculates its distances and then calls [`AssemblyFilter::notify`].
    /// Returns true if the permitted set changed.
    pub(crate) fn set_allowed_chain_names(
        &mut self,
        registry: &ChainRegistry,
        names: Option<&BTreeSet<String>>,
    ) -> bool {
        let permitted: PermittedChainSet = registry
            .chains()
            .iter()
            .filter(|chain| names.map_or(true, |names| names.contains(chain.name())))
            .map(|chain| *chain.index())
            .collect();
        log::debug!(
            "Permitted chains: {}",
            permitted.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(", ")
        );
        let changed = permitted != self.permitted;
        self.permitted = permitted;
        changed
    }

    pub fn is_permitted(&self, chain: ChainIndex) -> bool {
        self.permitted.contains(&chain)
    }

    pub fn permitted(&self) -> &PermittedChainSet {
        &self.permitted
    }

    pub fn subscribe(&mut self, listener: Box<dyn ChainPermissionListener>) {
        self.listeners.push(listener);
    }

    /// Hand over the listeners, e.g. to the filter of a newly loaded structure.
    pub(crate) fn take_listeners(&mut self) -> Vec<Box<dyn ChainPermissionListener>> {
        std::mem::take(&mut self.listeners)
    }

    /// Run both notification phases on all listeners.
    pub(crate) fn notify(&mut self) {
        for listener in self.listeners.iter_mut() {
            listener.recalculate_link_distances(&self.permitted);
        }
        for listener in self.listeners.iter_mut() {
            listener.permitted_chains_updated(&self.permitted);
        }
    }
}

/// Chain names of a biological assembly.
///
/// Unknown or empty assemblies mean every chain of the structure, as for the asymmetric unit.
pub fn assembly_chain_names(structure: &Structure, assembly_key: &str) -> BTreeSet<String> {
    match structure.assembly(assembly_key) {
        Some(names) if !names.is_empty() => names.clone(),
        _ => {
            log::debug!(
                "Assembly '{}' not found in {}; using all chains",
                assembly_key,
                structure.name()
            );
            structure.chains().iter().map(|c| c.name().clone()).collect()
        }
    }
}
