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

//! # YAML input
//!
//! A data set in one file: the structure to load, the searched proteins, which chains
//! they were matched to, optional alignments, crosslinker specificities, crosslinks,
//! distance settings and background sampling.
//!
//! ~~~yaml
//! structure: { file: dimer.pdb, assembly: "1" }
//! proteins:
//!   - { id: P1, sequence: MKTAYIAKQR }
//! chains: { A: P1, B: P1 }
//! crosslinkers:
//!   - { name: BS3, searches: [s1], linkables: [[K, NTERM]] }
//! crosslinks:
//!   - { id: "1", from: { protein: P1, residue: 2 }, to: { protein: P1, residue: 8 } }
//! sampling: { count: 500 }
//! ~~~

use crate::align::{AlignmentCollection, AlignmentId, ResidueAlignment};
use crate::crosslink::Crosslink;
use crate::crosslinker::{CrosslinkerSpecificity, CrosslinkerSpecificityStore};
use crate::histogram::Binning;
use crate::model::{DistanceSettings, StructureModel};
use crate::protein::{Protein, ProteinId, ProteinStore};
use crate::sampling::SampleScope;
use crate::structure::{read_structure, Structure};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use validator::{Validate, ValidationError};

/// Structure file and which part of it to use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StructureInput {
    /// Relative paths are resolved against the directory of the input file
    pub file: PathBuf,
    /// Overrides the name found in the file
    #[serde(default)]
    pub name: Option<String>,
    /// Biological assembly to restrict distances to
    #[serde(default)]
    pub assembly: Option<String>,
}

/// Pre-computed alignment of a protein against all chains of a given name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlignmentInput {
    pub protein: ProteinId,
    pub chain: String,
    /// Restrict to one model; all models if absent
    #[serde(default)]
    pub model: Option<usize>,
    /// Gapped search sequence
    pub search: String,
    /// Gapped structure sequence of the same length
    pub structure: String,
}

/// Background distance sampling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct SamplingInput {
    /// Approximate number of sampled distances
    #[validate(range(min = 1))]
    pub count: usize,
    pub within_protein: bool,
    pub within_chain: bool,
    pub within_model: bool,
    /// Histogram bin width in Å
    #[validate(range(exclusive_min = 0.0))]
    pub bin_width: f64,
    /// Histogram upper bound in Å
    #[validate(range(exclusive_min = 0.0))]
    pub max_distance: f64,
}

impl Default for SamplingInput {
    fn default() -> Self {
        let scope = SampleScope::default();
        let binning = Binning::default();
        Self {
            count: 1000,
            within_protein: scope.within_protein,
            within_chain: scope.within_chain,
            within_model: scope.within_model,
            bin_width: binning.bin_width,
            max_distance: binning.max_distance,
        }
    }
}

impl SamplingInput {
    pub fn scope(&self) -> SampleScope {
        SampleScope {
            within_protein: self.within_protein,
            within_chain: self.within_chain,
            within_model: self.within_model,
        }
    }

    pub fn binning(&self) -> Binning {
        Binning {
            bin_width: self.bin_width,
            max_distance: self.max_distance,
        }
    }
}

/// Complete data set read from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_input"))]
pub struct Input {
    pub structure: StructureInput,
    pub proteins: Vec<Protein>,
    /// Chain name → protein
    #[serde(default)]
    pub chains: BTreeMap<String, ProteinId>,
    /// Alignments for chains not aligned by best ungapped offset
    #[serde(default)]
    pub alignments: Vec<AlignmentInput>,
    #[serde(default)]
    pub crosslinkers: Vec<CrosslinkerSpecificity>,
    #[serde(default)]
    pub crosslinks: Vec<Crosslink>,
    #[serde(default)]
    #[validate(nested)]
    pub options: DistanceSettings,
    #[serde(default)]
    #[validate(nested)]
    pub sampling: Option<SamplingInput>,
}

fn validate_input(input: &Input) -> Result<(), ValidationError> {
    let ids: BTreeSet<&ProteinId> = input.proteins.iter().map(Protein::id).collect();
    if ids.len() != input.proteins.len() {
        return Err(ValidationError::new("proteins have non-unique ids"));
    }
    if input.chains.values().any(|id| !ids.contains(id)) {
        return Err(ValidationError::new("chain assigned to an undefined protein"));
    }
    if input.alignments.iter().any(|a| !ids.contains(&a.protein)) {
        return Err(ValidationError::new("alignment of an undefined protein"));
    }
    let undefined_end = input
        .crosslinks
        .iter()
        .flat_map(|c| [&c.from, &c.to])
        .any(|end| !ids.contains(&end.protein) || end.residue == 0);
    if undefined_end {
        return Err(ValidationError::new(
            "crosslink end outside the defined proteins",
        ));
    }
    if !input.crosslinks.iter().map(|c| &c.id).all_unique() {
        return Err(ValidationError::new("crosslinks have non-unique ids"));
    }
    Ok(())
}

impl Input {
    /// Parse and validate a YAML string. Relative structure paths are kept as given.
    pub fn from_str(string: &str) -> anyhow::Result<Self> {
        let input = serde_yaml::from_str::<Input>(string)?;
        input.validate()?;
        CrosslinkerSpecificityStore::new(input.crosslinkers.clone())?;
        Ok(input)
    }

    /// Read a YAML input file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let string = std::fs::read_to_string(path)
            .map_err(|err| anyhow::anyhow!("Cannot read {}: {}", path.display(), err))?;
        let mut input = Self::from_str(&string)
            .map_err(|err| anyhow::anyhow!("Invalid input {}: {}", path.display(), err))?;
        if input.structure.file.is_relative() {
            if let Some(dir) = path.parent() {
                input.structure.file = dir.join(&input.structure.file);
            }
        }
        Ok(input)
    }

    pub fn crosslinker_store(&self) -> anyhow::Result<CrosslinkerSpecificityStore> {
        CrosslinkerSpecificityStore::new(self.crosslinkers.clone())
    }

    /// Load the structure and match its chains to proteins by name.
    pub fn load_structure(&self) -> anyhow::Result<Structure> {
        let mut structure = read_structure(&self.structure.file)?;
        if let Some(name) = &self.structure.name {
            structure.set_name(name);
        }
        structure.assign_proteins(&self.chains);
        Ok(structure)
    }

    /// Alignments of every matched chain of `structure`.
    ///
    /// Chains without a given alignment get the best ungapped placement of the chain
    /// sequence onto the protein sequence.
    pub fn alignments(
        &self,
        structure: &Structure,
        proteins: &ProteinStore,
    ) -> anyhow::Result<AlignmentCollection> {
        let mut collection = AlignmentCollection::new();
        for chain in structure.chains() {
            let Some(protein) = chain.protein().as_ref().and_then(|id| proteins.get(id)) else {
                continue;
            };
            let given = self.alignments.iter().find(|a| {
                a.protein == *protein.id()
                    && a.chain == *chain.name()
                    && a.model.map_or(true, |m| m == *chain.model())
            });
            let alignment = match given {
                Some(a) => ResidueAlignment::from_aligned_sequences(&a.search, &a.structure)
                    .map_err(|err| {
                        anyhow::anyhow!("Alignment of {} to chain {}: {}", a.protein, a.chain, err)
                    })?,
                None => ResidueAlignment::ungapped(protein.sequence(), &chain.sequence()),
            };
            collection.insert(
                protein.id().clone(),
                AlignmentId::for_chain(structure.name(), chain),
                alignment,
            );
        }
        log::debug!(
            "{} alignment(s), {} given in input",
            collection.len(),
            self.alignments.len()
        );
        Ok(collection)
    }

    /// Structure model of the whole data set, restricted to the assembly if one is given.
    pub fn build_model(&self) -> anyhow::Result<StructureModel> {
        let structure = self.load_structure()?;
        let proteins = ProteinStore::new(self.proteins.iter().cloned());
        let alignments = self.alignments(&structure, &proteins)?;
        let mut model = StructureModel::new(
            structure,
            Rc::new(proteins),
            Rc::new(alignments),
            self.crosslinks.clone(),
            self.options.clone(),
        )?;
        if let Some(assembly) = &self.structure.assembly {
            model.set_assembly_chains(assembly)?;
        }
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
structure: { file: dimer.pdb, assembly: "1" }
proteins:
  - { id: P1, sequence: MKTAYIAKQR }
  - { id: REV_P1, sequence: RQKAIYATKM, decoy: true, target: P1 }
chains: { A: P1, B: P1 }
alignments:
  - { protein: P1, chain: B, search: MKTAYIAKQR, structure: -KTAYIAKQ- }
crosslinkers:
  - { name: BS3, searches: [s1, s2], linkables: [[K, S, T, Y, NTERM]] }
crosslinks:
  - { id: "1", from: { protein: P1, residue: 2 }, to: { protein: P1, residue: 8 } }
  - id: "2"
    from: { protein: P1, residue: 2 }
    to: { protein: P1, residue: 2 }
    homomultimer: true
options: { full_distance_cutoff: 800 }
sampling: { count: 500, within_chain: true }
"#;

    #[test]
    fn parse_input() {
        let input = Input::from_str(YAML).unwrap();
        assert_eq!(input.structure.assembly.as_deref(), Some("1"));
        assert_eq!(input.proteins.len(), 2);
        assert!(*input.proteins[1].is_decoy());
        assert_eq!(input.chains["B"], ProteinId::new("P1"));
        assert!(input.crosslinks[1].confirmed_homomultimer);
        assert_eq!(input.options.full_distance_cutoff, 800);
        assert!(input.options.shortest_only);

        let sampling = input.sampling.unwrap();
        assert_eq!(sampling.count, 500);
        let scope = sampling.scope();
        assert!(scope.within_chain && scope.within_model && !scope.within_protein);
        assert_eq!(sampling.binning(), Binning::default());

        let store = input.crosslinker_store().unwrap();
        assert_eq!(store.for_search("s2").count(), 1);
    }

    #[test]
    fn reject_inconsistent_input() {
        let undefined_protein = YAML.replace("{ A: P1, B: P1 }", "{ A: P1, B: P2 }");
        assert!(Input::from_str(&undefined_protein).is_err());

        let duplicate_link = YAML.replace("id: \"2\"", "id: \"1\"");
        assert!(Input::from_str(&duplicate_link).is_err());

        let zero_residue = YAML.replace("residue: 8", "residue: 0");
        assert!(Input::from_str(&zero_residue).is_err());

        let bad_cutoff = YAML.replace("full_distance_cutoff: 800", "full_distance_cutoff: 0");
        assert!(Input::from_str(&bad_cutoff).is_err());

        let bad_sampling = YAML.replace("count: 500", "count: 500, bin_width: 0.0");
        assert!(Input::from_str(&bad_sampling).is_err());

        let bad_crosslinker = YAML.replace("[[K, S, T, Y, NTERM]]", "[[K], [S], [T]]");
        assert!(Input::from_str(&bad_crosslinker).is_err());

        let unknown_field = YAML.replace("sampling:", "sampler:");
        assert!(Input::from_str(&unknown_field).is_err());
    }

    #[test]
    fn given_and_ungapped_alignments() {
        use crate::align::ResidueAligner;
        use crate::structure::StructureResidue;

        let input = Input::from_str(YAML).unwrap();
        let mut structure = Structure::new("DIMER");
        for name in ["A", "B"] {
            // structure residues K2..Q9 of the search sequence
            let residues = (0..8)
                .map(|i| StructureResidue::new("GLY", i + 2, None))
                .collect();
            structure.add_chain(name, 0, residues);
        }
        structure.assign_proteins(&input.chains);
        let proteins = ProteinStore::new(input.proteins.iter().cloned());
        let alignments = input.alignments(&structure, &proteins).unwrap();
        assert_eq!(alignments.len(), 2);

        let p1 = ProteinId::new("P1");
        let chain_b = structure.chain(crate::structure::ChainIndex(1)).unwrap();
        let id_b = AlignmentId::for_chain("DIMER", chain_b);
        assert_eq!(alignments.structure_index(2, &p1, &id_b), Some(0));
        assert_eq!(alignments.structure_index(1, &p1, &id_b), None);
        assert_eq!(alignments.search_range(&p1, &id_b), Some(2..=9));
    }
}
