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

//! Distance context of one loaded structure.
//!
//! [`Distances`] owns the chain registry, the permitted chain set, the residue coordinates
//! and the distance matrices of a structure. Loading another structure means creating
//! a new [`Distances`].

use crate::align::ResidueAligner;
use crate::assembly::{assembly_chain_names, AssemblyFilter, ChainPermissionListener};
use crate::chains::ChainRegistry;
use crate::crosslink::Crosslink;
use crate::crosslinker::CrosslinkerSpecificity;
use crate::matrix::{DistanceMatrixCache, ResidueCoordinate, ResidueCoordinates};
use crate::protein::ProteinStore;
use crate::resolver::{CrosslinkResolver, DistanceOptions, LinkMapper, XLinkDistance};
use crate::sampling::{SampleDistanceGenerator, SampleScope};
use crate::structure::{ChainIndex, Structure};
use std::collections::BTreeSet;
use std::rc::Rc;

/// Residue pair list used for links-only matrices
pub type LinkList = Vec<(ResidueCoordinate, ResidueCoordinate)>;

#[derive(Debug)]
pub struct Distances {
    registry: ChainRegistry,
    filter: AssemblyFilter,
    coordinates: Rc<ResidueCoordinates>,
    matrices: Option<DistanceMatrixCache>,
    /// Links the current matrices were built with
    built_links: LinkList,
    /// Maximum residue count for dense matrices
    cutoff: usize,
}

impl Distances {
    /// Distance context for a structure with every chain permitted. No matrices are built yet.
    pub fn new(structure: &Structure, cutoff: usize) -> Self {
        let registry = ChainRegistry::new(structure);
        let filter = AssemblyFilter::new(&registry);
        Self {
            coordinates: Rc::new(ResidueCoordinates::new(structure)),
            registry,
            filter,
            matrices: None,
            built_links: LinkList::new(),
            cutoff,
        }
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    pub fn filter(&self) -> &AssemblyFilter {
        &self.filter
    }

    pub fn subscribe(&mut self, listener: Box<dyn ChainPermissionListener>) {
        self.filter.subscribe(listener);
    }

    pub(crate) fn take_listeners(&mut self) -> Vec<Box<dyn ChainPermissionListener>> {
        self.filter.take_listeners()
    }

    /// Run both notification phases of the permitted chain set.
    pub(crate) fn notify(&mut self) {
        self.filter.notify();
    }

    pub fn cutoff(&self) -> usize {
        self.cutoff
    }

    /// Change the dense matrix cutoff.
    ///
    /// Matrices are rebuilt on the next [`Distances::update_matrices`].
    pub fn set_cutoff(&mut self, cutoff: usize) {
        if cutoff != self.cutoff {
            self.cutoff = cutoff;
            self.matrices = None;
        }
    }

    /// Permitted chains matched to a protein
    pub fn viable_chains(&self) -> BTreeSet<ChainIndex> {
        self.registry
            .mapped_chains()
            .map(|chain| *chain.index())
            .filter(|&index| self.filter.is_permitted(index))
            .collect()
    }

    /// Permit chains by name, or all chains if `None`.
    ///
    /// Matrices are dropped if the viable chains change. Listeners are not notified.
    /// Returns true if the permitted set changed.
    pub fn set_allowed_chain_names(&mut self, names: Option<&BTreeSet<String>>) -> bool {
        let changed = self.filter.set_allowed_chain_names(&self.registry, names);
        let stale = self
            .matrices
            .as_ref()
            .is_some_and(|m| *m.chains() != self.viable_chains());
        if stale {
            log::debug!("Permitted chains changed; distance matrices invalidated");
            self.matrices = None;
        }
        changed
    }

    /// Permit the chains of a biological assembly of `structure`.
    pub fn set_assembly_chains(&mut self, structure: &Structure, assembly_key: &str) -> bool {
        let names = assembly_chain_names(structure, assembly_key);
        self.set_allowed_chain_names(Some(&names))
    }

    /// Build matrices for the viable chains unless the current ones are still valid.
    ///
    /// Links-only matrices are also rebuilt when `links` differ from those they were built
    /// with. Returns true if matrices were built.
    pub fn update_matrices(&mut self, links: &[(ResidueCoordinate, ResidueCoordinate)]) -> bool {
        let viable = self.viable_chains();
        let valid = self.matrices.as_ref().is_some_and(|m| {
            *m.chains() == viable && (!m.is_links_only() || self.built_links == links)
        });
        if valid {
            return false;
        }
        let matrices = DistanceMatrixCache::build(
            &viable,
            self.coordinates.clone(),
            links,
            false,
            self.cutoff,
        );
        log::info!(
            "Built {} {} distance matrices",
            matrices.len(),
            if matrices.is_links_only() {
                "links-only"
            } else {
                "dense"
            }
        );
        self.built_links = links.to_vec();
        self.matrices = Some(matrices);
        true
    }

    /// Current distance matrices; an error if none have been built
    pub fn matrices(&self) -> anyhow::Result<&DistanceMatrixCache> {
        self.matrices
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("distance matrices have not been built"))
    }

    /// Distance computed directly from coordinates, bypassing the matrices
    pub fn single_distance_between_residues(
        &self,
        a: ResidueCoordinate,
        b: ResidueCoordinate,
    ) -> Option<f64> {
        self.coordinates.distance(a, b)
    }

    pub fn mapper<'a>(
        &'a self,
        aligner: &'a dyn ResidueAligner,
        proteins: &'a ProteinStore,
    ) -> LinkMapper<'a> {
        LinkMapper {
            registry: &self.registry,
            permitted: self.filter.permitted(),
            aligner,
            proteins,
        }
    }

    pub fn resolver<'a>(
        &'a self,
        aligner: &'a dyn ResidueAligner,
        proteins: &'a ProteinStore,
    ) -> anyhow::Result<CrosslinkResolver<'a>> {
        Ok(CrosslinkResolver::new(
            self.mapper(aligner, proteins),
            self.matrices()?,
        ))
    }

    pub fn sampler<'a>(
        &'a self,
        aligner: &'a dyn ResidueAligner,
        proteins: &'a ProteinStore,
    ) -> anyhow::Result<SampleDistanceGenerator<'a>> {
        Ok(SampleDistanceGenerator::new(
            self.mapper(aligner, proteins),
            self.matrices()?,
        ))
    }

    /// Distance of a crosslink; see [`CrosslinkResolver::xlink_distance`]
    pub fn get_xlink_distance(
        &self,
        crosslink: &Crosslink,
        aligner: &dyn ResidueAligner,
        proteins: &ProteinStore,
        options: &DistanceOptions,
    ) -> anyhow::Result<XLinkDistance> {
        Ok(self
            .resolver(aligner, proteins)?
            .xlink_distance(crosslink, options))
    }

    /// Background distances; see [`SampleDistanceGenerator::sample_distances`]
    pub fn sample_distances(
        &self,
        count: usize,
        specificities: &[CrosslinkerSpecificity],
        scope: &SampleScope,
        aligner: &dyn ResidueAligner,
        proteins: &ProteinStore,
    ) -> anyhow::Result<Vec<f64>> {
        Ok(self
            .sampler(aligner, proteins)?
            .sample_distances(count, specificities, scope))
    }
}
