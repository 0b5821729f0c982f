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

//! Read-only store of the proteins (participants) of a crosslinking search.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Accession prefixes used by search engines to mark reversed or shuffled decoy sequences.
const DECOY_PREFIXES: [&str; 3] = ["REV_", "DECOY_", "DECOY:"];

/// Unique protein identifier, e.g. a database accession.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProteinId(String);

impl ProteinId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProteinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProteinId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A protein searched against the mass spectrometry data.
#[derive(Debug, Clone, Serialize, Deserialize, Getters)]
#[serde(deny_unknown_fields)]
pub struct Protein {
    /// Unique identifier
    id: ProteinId,
    /// Database accession
    #[serde(default)]
    accession: String,
    /// One-letter amino acid sequence as searched
    sequence: String,
    /// True for decoy (reversed/shuffled) sequences
    #[serde(default, rename = "decoy")]
    is_decoy: bool,
    /// Target protein a decoy was generated from
    #[serde(default)]
    target: Option<ProteinId>,
}

impl Protein {
    pub fn new(id: impl Into<ProteinId>, sequence: &str) -> Self {
        let id = id.into();
        Self {
            accession: id.to_string(),
            id,
            sequence: sequence.to_string(),
            is_decoy: false,
            target: None,
        }
    }

    /// Mark as a decoy of `target`.
    pub fn into_decoy(mut self, target: Option<ProteinId>) -> Self {
        self.is_decoy = true;
        self.target = target;
        self
    }

    /// Number of residues in the searched sequence
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// One-letter code of a 1-based search residue
    pub fn residue(&self, search_index: usize) -> Option<char> {
        search_index
            .checked_sub(1)
            .and_then(|i| self.sequence.as_bytes().get(i))
            .map(|&b| b as char)
    }
}

/// Lookup of proteins by id.
#[derive(Debug, Clone, Default)]
pub struct ProteinStore {
    proteins: BTreeMap<ProteinId, Protein>,
}

impl ProteinStore {
    pub fn new(proteins: impl IntoIterator<Item = Protein>) -> Self {
        Self {
            proteins: proteins.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    pub fn get(&self, id: &ProteinId) -> Option<&Protein> {
        self.proteins.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Protein> {
        self.proteins.values()
    }

    pub fn len(&self) -> usize {
        self.proteins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proteins.is_empty()
    }

    pub fn is_decoy(&self, id: &ProteinId) -> bool {
        self.get(id).is_some_and(|p| p.is_decoy)
    }

    /// Target protein of a decoy.
    ///
    /// Uses the explicit target when given, otherwise strips a known decoy prefix
    /// from the accession and looks for a target protein with that accession.
    /// Non-decoys are their own target.
    pub fn real_protein_id(&self, id: &ProteinId) -> Option<ProteinId> {
        let protein = self.get(id)?;
        if !protein.is_decoy {
            return Some(protein.id.clone());
        }
        if let Some(target) = &protein.target {
            return Some(target.clone());
        }
        let accession = DECOY_PREFIXES
            .iter()
            .find_map(|prefix| protein.accession.strip_prefix(prefix))?;
        self.proteins
            .values()
            .find(|p| !p.is_decoy && p.accession == accession)
            .map(|p| p.id.clone())
    }
}
