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

//! Mapping between proteins, structure chains and models.

use crate::align::AlignmentId;
use crate::protein::ProteinId;
use crate::structure::{ChainIndex, Structure};
use derive_getters::Getters;
use std::collections::BTreeMap;

/// Chain metadata needed for distance calculations.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct StructureChain {
    /// Globally unique index
    index: ChainIndex,
    /// PDB-style label
    name: String,
    /// Model index
    model: usize,
    /// Matched protein, if any
    protein: Option<ProteinId>,
    /// Number of residues
    residue_count: usize,
    /// Alignment of the matched protein against this chain
    alignment_id: AlignmentId,
}

/// Protein → chains, ordered by chain index.
pub type ChainMap = BTreeMap<ProteinId, Vec<ChainIndex>>;

/// Registry of the chains of one loaded structure.
///
/// Built once per structure load and never mutated; loading a new structure
/// replaces the registry wholesale.
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    chains: Vec<StructureChain>,
    chain_map: ChainMap,
}

impl ChainRegistry {
    pub fn new(structure: &Structure) -> Self {
        let chains: Vec<StructureChain> = structure
            .chains()
            .iter()
            .map(|chain| StructureChain {
                index: *chain.index(),
                name: chain.name().clone(),
                model: *chain.model(),
                protein: chain.protein().clone(),
                residue_count: chain.len(),
                alignment_id: AlignmentId::for_chain(structure.name(), chain),
            })
            .collect();

        let mut chain_map = ChainMap::new();
        for chain in &chains {
            if let Some(protein) = &chain.protein {
                chain_map
                    .entry(protein.clone())
                    .or_default()
                    .push(chain.index);
            }
        }
        log::debug!(
            "{} of {} chains matched to {} protein(s)",
            chain_map.values().map(Vec::len).sum::<usize>(),
            chains.len(),
            chain_map.len()
        );
        Self { chains, chain_map }
    }

    pub fn chains(&self) -> &[StructureChain] {
        &self.chains
    }

    pub fn chain(&self, index: ChainIndex) -> Option<&StructureChain> {
        self.chains.get(index.0).filter(|c| c.index == index)
    }

    pub fn chain_map(&self) -> &ChainMap {
        &self.chain_map
    }

    /// Chains matched to a protein
    pub fn chains_for_protein<'a>(
        &'a self,
        protein: &ProteinId,
    ) -> impl Iterator<Item = &'a StructureChain> + 'a {
        self.chain_map
            .get(protein)
            .into_iter()
            .flatten()
            .filter_map(|&index| self.chain(index))
    }

    /// Chains matched to any protein
    pub fn mapped_chains(&self) -> impl Iterator<Item = &StructureChain> {
        self.chains.iter().filter(|c| c.protein.is_some())
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::StructureResidue;

    #[test]
    fn chain_map_groups_copies() {
        let mut structure = Structure::new("2TST");
        let residues = vec![StructureResidue::new("LYS", 1, None); 3];
        for (name, model) in [("A", 0), ("B", 0), ("C", 0), ("A", 1)] {
            structure.add_chain(name, model, residues.clone());
        }
        structure.assign_proteins(&BTreeMap::from([
            ("A".to_string(), ProteinId::new("P1")),
            ("B".to_string(), ProteinId::new("P1")),
            ("C".to_string(), ProteinId::new("P2")),
        ]));
        let registry = ChainRegistry::new(&structure);
        let p1: Vec<_> = registry
            .chains_for_protein(&"P1".into())
            .map(|c| *c.index())
            .collect();
        assert_eq!(p1, vec![ChainIndex(0), ChainIndex(1), ChainIndex(3)]);
        assert_eq!(registry.chains_for_protein(&"P3".into()).count(), 0);
        assert_eq!(registry.mapped_chains().count(), 4);

        let a1 = registry.chain(ChainIndex(3)).unwrap();
        assert_eq!(*a1.model(), 1);
        assert_eq!(*a1.residue_count(), 3);
        assert_eq!(a1.alignment_id().to_string(), "2TST:A:3");
    }
}
