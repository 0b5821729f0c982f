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

//! # 3D structures
//!
//! A [`Structure`] holds one or more models (e.g. NMR ensembles), each with one or more
//! chains. Every chain has a globally unique [`ChainIndex`]; chain names repeat across
//! models and homomultimer copies. Each residue carries the position of one representative
//! atom (Cα for amino acids) which is used for all distance calculations.
//!
//! PDB files are always readable natively. Other formats require the `chemfiles` feature.

#[cfg(feature = "chemfiles")]
mod chemfiles_io;
pub mod pdb;

use crate::protein::ProteinId;
use crate::Point;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

/// Globally unique index of a chain within a loaded structure.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ChainIndex(pub usize);

impl fmt::Display for ChainIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Residue of a structure chain.
#[derive(Debug, Clone, PartialEq, Getters)]
pub struct StructureResidue {
    /// Residue name, e.g. _LYS_
    name: String,
    /// Residue number as given in the file (`resno`); not necessarily contiguous
    number: i32,
    /// Insertion code
    insertion_code: Option<char>,
    /// Position of the representative atom, if present
    position: Option<Point>,
}

impl StructureResidue {
    pub fn new(name: &str, number: i32, position: Option<Point>) -> Self {
        Self {
            name: name.to_string(),
            number,
            insertion_code: None,
            position,
        }
    }

    pub(crate) fn with_insertion_code(mut self, code: Option<char>) -> Self {
        self.insertion_code = code;
        self
    }

    /// One-letter code; `X` if unknown
    pub fn letter(&self) -> char {
        residue_name_to_letter(&self.name).unwrap_or('X')
    }
}

/// Chain instance within one model of a structure.
#[derive(Debug, Clone, Getters)]
pub struct Chain {
    /// Globally unique index
    index: ChainIndex,
    /// Short PDB-style label; not unique
    name: String,
    /// Model the chain belongs to
    model: usize,
    /// Protein the chain was matched to
    protein: Option<ProteinId>,
    /// Residues in sequence order; the position in this list is the sequence index
    residues: Vec<StructureResidue>,
}

impl Chain {
    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    /// One-letter sequence of the observed residues
    pub fn sequence(&self) -> String {
        self.residues.iter().map(StructureResidue::letter).collect()
    }

    /// Position of the representative atom of a 0-based sequence index
    pub fn position(&self, seq_index: usize) -> Option<&Point> {
        self.residues.get(seq_index)?.position.as_ref()
    }
}

/// Macromolecular structure with models, chains and biological assemblies.
#[derive(Debug, Clone, Default, Getters)]
pub struct Structure {
    /// Structure name, e.g. the PDB id
    name: String,
    /// All chains of all models, ordered by chain index
    chains: Vec<Chain>,
    /// Biological assemblies: assembly key → chain names
    assemblies: BTreeMap<String, BTreeSet<String>>,
}

impl Structure {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Append a chain and return its newly assigned global index.
    pub fn add_chain(
        &mut self,
        name: &str,
        model: usize,
        residues: Vec<StructureResidue>,
    ) -> ChainIndex {
        let index = ChainIndex(self.chains.len());
        self.chains.push(Chain {
            index,
            name: name.to_string(),
            model,
            protein: None,
            residues,
        });
        index
    }

    /// Define a biological assembly by the names of its chains.
    pub fn add_assembly(&mut self, key: &str, chain_names: impl IntoIterator<Item = String>) {
        self.assemblies
            .entry(key.to_string())
            .or_default()
            .extend(chain_names);
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn chain(&self, index: ChainIndex) -> Option<&Chain> {
        self.chains.get(index.0)
    }

    /// Chain names of an assembly
    pub fn assembly(&self, key: &str) -> Option<&BTreeSet<String>> {
        self.assemblies.get(key)
    }

    /// Number of models
    pub fn num_models(&self) -> usize {
        self.chains
            .iter()
            .map(|c| c.model + 1)
            .max()
            .unwrap_or_default()
    }

    /// Total number of residues in all chains
    pub fn num_residues(&self) -> usize {
        self.chains.iter().map(Chain::len).sum()
    }

    /// Match chains to proteins by chain name.
    ///
    /// This is the outcome of the external sequence matching step and
    /// applies to every model. Names not found in the structure are reported and skipped.
    pub fn assign_proteins(&mut self, assignments: &BTreeMap<String, ProteinId>) {
        for (name, protein) in assignments {
            let mut found = false;
            for chain in self.chains.iter_mut().filter(|c| &c.name == name) {
                chain.protein = Some(protein.clone());
                found = true;
            }
            if !found {
                log::warn!(
                    "Chain '{}' assigned to {} is absent from structure {}",
                    name,
                    protein,
                    self.name
                );
            }
        }
    }

    /// Match a single chain to a protein.
    pub fn assign_protein(&mut self, index: ChainIndex, protein: ProteinId) -> anyhow::Result<()> {
        let chain = self
            .chains
            .get_mut(index.0)
            .ok_or_else(|| anyhow::anyhow!("No chain with index {}", index))?;
        chain.protein = Some(protein);
        Ok(())
    }
}

/// Supplier of structures from files.
pub trait StructureSource: std::fmt::Debug {
    /// Read a structure from a file path.
    fn read(&self, path: &Path) -> anyhow::Result<Structure>;
}

/// Return a reader for the given file path based on its extension.
/// PDB is always available. Other formats require the `chemfiles` feature.
pub fn format_for_path(path: &Path) -> anyhow::Result<Box<dyn StructureSource>> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("pdb") | Some("ent") => Ok(Box::new(pdb::PdbFormat)),
        #[cfg(feature = "chemfiles")]
        Some(_) => Ok(Box::new(chemfiles_io::ChemfilesFormat)),
        #[cfg(not(feature = "chemfiles"))]
        Some(ext) => anyhow::bail!("Format '.{ext}' requires the `chemfiles` feature"),
        None => anyhow::bail!("Cannot determine format: no file extension"),
    }
}

/// Convenience: read a structure file, auto-detecting format.
pub fn read_structure(path: &impl AsRef<Path>) -> anyhow::Result<Structure> {
    let path = path.as_ref();
    let structure = format_for_path(path)?.read(path)?;
    log::info!(
        "Loaded structure {} with {} chain(s) in {} model(s) and {} residues",
        structure.name,
        structure.chains.len(),
        structure.num_models(),
        structure.num_residues()
    );
    Ok(structure)
}

/// Function to convert an amino acid residue name to a one-letter code.
/// This follows the PDB standard and handles the 20 standard amino acids, common
/// modified residues, and nucleic acids (A, G, C, T, U).
pub(crate) fn residue_name_to_letter(name: &str) -> Option<char> {
    let letter = match name.trim().to_uppercase().as_str() {
        "ALA" => 'A',
        "ARG" => 'R',
        "LYS" => 'K',
        "ASP" => 'D',
        "GLU" => 'E',
        "GLN" => 'Q',
        "ASN" => 'N',
        "HIS" | "HSD" | "HSE" | "HSP" => 'H',
        "TRP" => 'W',
        "PHE" => 'F',
        "TYR" => 'Y',
        "THR" => 'T',
        "SER" => 'S',
        "GLY" => 'G',
        "PRO" => 'P',
        "CYS" | "CYX" => 'C',
        "MET" | "MSE" => 'M',
        "VAL" => 'V',
        "LEU" => 'L',
        "ILE" => 'I',
        "SEC" => 'U',
        "PYL" => 'O',
        "UNK" => 'X',
        "DA" => 'A',
        "DG" => 'G',
        "DT" => 'T',
        "DC" => 'C',
        "A" => 'A',
        "G" => 'G',
        "U" => 'U',
        "C" => 'C',
        _ => return None,
    };
    Some(letter)
}
