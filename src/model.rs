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

//! # Structure model
//!
//! [`StructureModel`] ties a loaded structure to the proteins, alignments and crosslinks
//! of a data set. Whenever an input changes, link alternatives are regenerated and the
//! distance matrices rebuilt if needed. Changing the permitted chains additionally
//! notifies subscribed listeners after the regeneration.

use crate::align::ResidueAligner;
use crate::assembly::ChainPermissionListener;
use crate::crosslink::Crosslink;
use crate::crosslinker::CrosslinkerSpecificity;
use crate::distances::Distances;
use crate::matrix::DEFAULT_FULL_DISTANCE_CUTOFF;
use crate::protein::ProteinStore;
use crate::resolver::{
    shortest_link_alternatives, Coverage, CrosslinkResidueAlternative, DistanceOptions, HalfLink,
    LinkSet, XLinkDistance,
};
use crate::sampling::SampleScope;
use crate::structure::Structure;
use derive_more::Debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::rc::Rc;
use validator::Validate;

/// User settings for crosslink distances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct DistanceSettings {
    /// Above this total residue count only crosslinked residue pairs are cached
    #[validate(range(min = 1))]
    pub full_distance_cutoff: usize,
    /// Pair chains of different models
    pub allow_inter_model_distances: bool,
    /// Keep only the shortest alternative of each crosslink
    pub shortest_only: bool,
    /// Map decoy proteins onto the chains of their target protein
    pub calc_decoy_protein_distances: bool,
}

impl Default for DistanceSettings {
    fn default() -> Self {
        Self {
            full_distance_cutoff: DEFAULT_FULL_DISTANCE_CUTOFF,
            allow_inter_model_distances: false,
            shortest_only: true,
            calc_decoy_protein_distances: false,
        }
    }
}

impl DistanceSettings {
    /// Resolver options matching these settings
    pub fn options(&self) -> DistanceOptions {
        DistanceOptions {
            allow_inter_model_distances: self.allow_inter_model_distances,
            calc_decoy_protein_distances: self.calc_decoy_protein_distances,
            ..Default::default()
        }
    }
}

/// A structure with crosslinks mapped onto it.
#[derive(Debug)]
pub struct StructureModel {
    structure: Structure,
    proteins: Rc<ProteinStore>,
    #[debug(skip)]
    aligner: Rc<dyn ResidueAligner>,
    crosslinks: Vec<Crosslink>,
    settings: DistanceSettings,
    distances: Distances,
    links: LinkSet,
}

impl StructureModel {
    pub fn new(
        structure: Structure,
        proteins: Rc<ProteinStore>,
        aligner: Rc<dyn ResidueAligner>,
        crosslinks: Vec<Crosslink>,
        settings: DistanceSettings,
    ) -> anyhow::Result<Self> {
        settings.validate()?;
        let distances = Distances::new(&structure, settings.full_distance_cutoff);
        let mut model = Self {
            structure,
            proteins,
            aligner,
            crosslinks,
            settings,
            distances,
            links: LinkSet::default(),
        };
        model.regenerate()?;
        Ok(model)
    }

    /// Replace the structure and its alignments. All chains are permitted again;
    /// listeners are kept but not notified.
    pub fn load_structure(
        &mut self,
        structure: Structure,
        aligner: Rc<dyn ResidueAligner>,
    ) -> anyhow::Result<()> {
        let listeners = self.distances.take_listeners();
        self.distances = Distances::new(&structure, self.settings.full_distance_cutoff);
        listeners
            .into_iter()
            .for_each(|listener| self.distances.subscribe(listener));
        self.structure = structure;
        self.aligner = aligner;
        self.regenerate()
    }

    pub fn set_crosslinks(&mut self, crosslinks: Vec<Crosslink>) -> anyhow::Result<()> {
        self.crosslinks = crosslinks;
        self.regenerate()
    }

    pub fn set_settings(&mut self, settings: DistanceSettings) -> anyhow::Result<()> {
        settings.validate()?;
        self.distances.set_cutoff(settings.full_distance_cutoff);
        self.settings = settings;
        self.regenerate()
    }

    /// Permit chains by name, or all chains if `None`, then regenerate and notify listeners.
    pub fn set_allowed_chain_names(
        &mut self,
        names: Option<&BTreeSet<String>>,
    ) -> anyhow::Result<()> {
        self.distances.set_allowed_chain_names(names);
        self.regenerate()?;
        self.distances.notify();
        Ok(())
    }

    /// Permit the chains of a biological assembly, then regenerate and notify listeners.
    pub fn set_assembly_chains(&mut self, assembly_key: &str) -> anyhow::Result<()> {
        self.distances.set_assembly_chains(&self.structure, assembly_key);
        self.regenerate()?;
        self.distances.notify();
        Ok(())
    }

    pub fn subscribe(&mut self, listener: Box<dyn ChainPermissionListener>) {
        self.distances.subscribe(listener);
    }

    /// Rebuild matrices if needed and recompute all link alternatives.
    fn regenerate(&mut self) -> anyhow::Result<()> {
        let options = self.settings.options();
        let candidates = self
            .distances
            .mapper(self.aligner.as_ref(), &self.proteins)
            .candidate_links(&self.crosslinks, options.calc_decoy_protein_distances);
        self.distances.update_matrices(&candidates);

        let mut links = self
            .distances
            .resolver(self.aligner.as_ref(), &self.proteins)?
            .resolve_links(&self.crosslinks, &options);
        if self.settings.shortest_only {
            links.alternatives = shortest_link_alternatives(&links.alternatives);
        }
        self.links = links;
        log::info!("{}", self.coverage());
        Ok(())
    }

    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    pub fn proteins(&self) -> &ProteinStore {
        &self.proteins
    }

    pub fn aligner(&self) -> &dyn ResidueAligner {
        self.aligner.as_ref()
    }

    pub fn crosslinks(&self) -> &[Crosslink] {
        &self.crosslinks
    }

    pub fn settings(&self) -> &DistanceSettings {
        &self.settings
    }

    pub fn distances(&self) -> &Distances {
        &self.distances
    }

    pub fn links(&self) -> &LinkSet {
        &self.links
    }

    /// Current alternatives; only the shortest per crosslink if so configured
    pub fn alternatives(&self) -> &[CrosslinkResidueAlternative] {
        &self.links.alternatives
    }

    pub fn half_links(&self) -> &[HalfLink] {
        &self.links.half_links
    }

    pub fn coverage(&self) -> Coverage {
        self.links.coverage(self.crosslinks.len())
    }

    /// Distance of any crosslink, not necessarily one of the model's own
    pub fn get_xlink_distance(
        &self,
        crosslink: &Crosslink,
        options: &DistanceOptions,
    ) -> anyhow::Result<XLinkDistance> {
        self.distances
            .get_xlink_distance(crosslink, self.aligner.as_ref(), &self.proteins, options)
    }

    /// Background distances on the permitted chains
    pub fn sample_distances(
        &self,
        count: usize,
        specificities: &[CrosslinkerSpecificity],
        scope: &SampleScope,
    ) -> anyhow::Result<Vec<f64>> {
        self.distances.sample_distances(
            count,
            specificities,
            scope,
            self.aligner.as_ref(),
            &self.proteins,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::{AlignmentCollection, AlignmentId, ResidueAlignment};
    use crate::assembly::PermittedChainSet;
    use crate::protein::{Protein, ProteinId};
    use crate::structure::{ChainIndex, StructureResidue};
    use crate::Point;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    /// Trimer of identical five residue chains, 6 Å apart
    fn model() -> StructureModel {
        let mut structure = Structure::new("TRI");
        let mut alignments = AlignmentCollection::new();
        for (copy, name) in ["A", "B", "C"].iter().enumerate() {
            let residues = (0..5)
                .map(|i| {
                    let position = Point::new(3.8 * i as f64, 6.0 * copy as f64, 0.0);
                    StructureResidue::new("LYS", i + 1, Some(position))
                })
                .collect();
            let index = structure.add_chain(name, 0, residues);
            let id = AlignmentId::for_chain("TRI", structure.chain(index).unwrap());
            alignments.insert("P1".into(), id, ResidueAlignment::with_offset(5, 5, 0));
        }
        structure.add_assembly("1", ["A".to_string(), "B".to_string()]);
        let names = ["A", "B", "C"].map(|n| (n.to_string(), ProteinId::new("P1")));
        structure.assign_proteins(&BTreeMap::from(names));

        let proteins = ProteinStore::new([Protein::new("P1", "KKKKK")]);
        let crosslinks = vec![
            Crosslink::new("1", ("P1", 1), ("P1", 1)).homomultimeric(),
            Crosslink::new("2", ("P1", 2), ("P1", 4)),
            Crosslink::new("3", ("P1", 2), ("P1", 9)),
        ];
        StructureModel::new(
            structure,
            Rc::new(proteins),
            Rc::new(alignments),
            crosslinks,
            DistanceSettings::default(),
        )
        .unwrap()
    }

    struct Recorder(Rc<RefCell<Vec<(String, usize)>>>);

    impl ChainPermissionListener for Recorder {
        fn recalculate_link_distances(&mut self, permitted: &PermittedChainSet) {
            self.0.borrow_mut().push(("recalc".into(), permitted.len()));
        }
        fn permitted_chains_updated(&mut self, permitted: &PermittedChainSet) {
            self.0.borrow_mut().push(("updated".into(), permitted.len()));
        }
    }

    #[test]
    fn regenerate_on_assembly_change() {
        let mut model = model();
        let coverage = model.coverage();
        assert_eq!((coverage.full, coverage.half, coverage.unresolved), (2, 1, 0));
        assert_eq!(model.alternatives().len(), 2);
        assert_eq!(model.distances().matrices().unwrap().len(), 9);

        let log = Rc::new(RefCell::new(Vec::new()));
        model.subscribe(Box::new(Recorder(log.clone())));
        model.set_assembly_chains("1").unwrap();
        assert_eq!(model.distances().matrices().unwrap().len(), 4);
        assert_eq!(
            *log.borrow(),
            vec![("recalc".to_string(), 2), ("updated".to_string(), 2)]
        );

        // a single chain cannot satisfy the homomultimeric link
        let only_c = BTreeSet::from(["C".to_string()]);
        model.set_allowed_chain_names(Some(&only_c)).unwrap();
        assert_eq!(model.coverage().full, 1);

        model.set_allowed_chain_names(None).unwrap();
        assert_eq!(model.distances().filter().permitted().len(), 3);
        assert_eq!(model.coverage().full, 2);
        assert_eq!(log.borrow().len(), 6);
    }

    #[test]
    fn reload_permits_all_chains_silently() {
        let mut model = model();
        let log = Rc::new(RefCell::new(Vec::new()));
        model.subscribe(Box::new(Recorder(log.clone())));
        model.set_assembly_chains("1").unwrap();
        assert_eq!(log.borrow().len(), 2);

        // four chains of four residues each
        let mut structure = Structure::new("QUAD");
        let mut alignments = AlignmentCollection::new();
        for (copy, name) in ["A", "B", "C", "D"].iter().enumerate() {
            let residues = (0..4)
                .map(|i| {
                    let position = Point::new(3.8 * i as f64, 0.0, 8.0 * copy as f64);
                    StructureResidue::new("LYS", i + 1, Some(position))
                })
                .collect();
            let index = structure.add_chain(name, 0, residues);
            let id = AlignmentId::for_chain("QUAD", structure.chain(index).unwrap());
            alignments.insert("P1".into(), id, ResidueAlignment::with_offset(5, 4, 0));
        }
        let names = ["A", "B", "C", "D"].map(|n| (n.to_string(), ProteinId::new("P1")));
        structure.assign_proteins(&BTreeMap::from(names));

        model.load_structure(structure, Rc::new(alignments)).unwrap();
        let all_chains: PermittedChainSet = (0..4).map(ChainIndex).collect();
        assert_eq!(*model.distances().filter().permitted(), all_chains);
        let matrices = model.distances().matrices().unwrap();
        assert_eq!(*matrices.chains(), all_chains);
        assert_eq!(matrices.len(), 16);
        assert_eq!(model.coverage().full, 2);
        assert_eq!(log.borrow().len(), 2);

        let only_a = BTreeSet::from(["A".to_string()]);
        model.set_allowed_chain_names(Some(&only_a)).unwrap();
        assert_eq!(
            log.borrow()[2..],
            [("recalc".to_string(), 1), ("updated".to_string(), 1)]
        );
    }

    #[test]
    fn shortest_only_setting() {
        let mut model = model();
        let settings = DistanceSettings {
            shortest_only: false,
            ..Default::default()
        };
        model.set_settings(settings).unwrap();
        // homomultimer: 6 ordered pairs of distinct chains collapse to one via the octree;
        // crosslink 2: 9 pairings collapse as well
        assert_eq!(model.alternatives().len(), 2);

        let invalid = DistanceSettings {
            full_distance_cutoff: 0,
            ..Default::default()
        };
        assert!(model.set_settings(invalid).is_err());
    }

    #[test]
    fn sparse_model_matches_dense_model() {
        let mut model = model();
        let dense: Vec<f64> = model.alternatives().iter().map(|a| a.distance).collect();
        let settings = DistanceSettings {
            full_distance_cutoff: 10,
            ..Default::default()
        };
        model.set_settings(settings).unwrap();
        assert!(model.distances().matrices().unwrap().is_links_only());
        let sparse: Vec<f64> = model.alternatives().iter().map(|a| a.distance).collect();
        assert_eq!(dense, sparse);
    }
}
