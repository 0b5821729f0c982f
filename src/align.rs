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

//! # Residue index conversion between search sequences and structure chains
//!
//! Search residues are 1-based positions in the searched protein sequence.
//! Structure indices are 0-based positions in a chain's residue list.
//! The actual sequence alignment is done elsewhere; [`AlignmentCollection`] stores
//! its outcome as lookup tables.

use crate::protein::ProteinId;
use crate::structure::{Chain, ChainIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::RangeInclusive;

/// Identifies the alignment of a protein against one chain of one structure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AlignmentId {
    pub structure: String,
    pub chain_name: String,
    pub chain_index: ChainIndex,
}

impl AlignmentId {
    pub fn new(structure: &str, chain_name: &str, chain_index: ChainIndex) -> Self {
        Self {
            structure: structure.to_string(),
            chain_name: chain_name.to_string(),
            chain_index,
        }
    }

    /// Alignment id of a structure chain
    pub fn for_chain(structure: &str, chain: &Chain) -> Self {
        Self::new(structure, chain.name(), *chain.index())
    }
}

impl fmt::Display for AlignmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.structure, self.chain_name, self.chain_index)
    }
}

/// Direction of an index conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignDirection {
    /// 1-based search residue → 0-based structure index
    SearchToStructure,
    /// 0-based structure index → 1-based search residue
    StructureToSearch,
}

/// Converts residue indices between search sequences and structure chains.
pub trait ResidueAligner {
    /// Convert a residue index; `None` if the residue falls in a gap or outside coverage.
    fn aligned_index(
        &self,
        index: usize,
        protein: &ProteinId,
        direction: AlignDirection,
        alignment: &AlignmentId,
    ) -> Option<usize>;

    /// First and last 1-based search residue covered by the structure chain.
    fn search_range(
        &self,
        protein: &ProteinId,
        alignment: &AlignmentId,
    ) -> Option<RangeInclusive<usize>>;

    /// Shorthand for [`AlignDirection::SearchToStructure`]
    fn structure_index(
        &self,
        search_residue: usize,
        protein: &ProteinId,
        alignment: &AlignmentId,
    ) -> Option<usize> {
        self.aligned_index(
            search_residue,
            protein,
            AlignDirection::SearchToStructure,
            alignment,
        )
    }
}

/// Position-wise correspondence between one search sequence and one structure chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResidueAlignment {
    /// Indexed by search residue - 1
    to_structure: Vec<Option<usize>>,
    /// Indexed by structure index
    to_search: Vec<Option<usize>>,
}

impl ResidueAlignment {
    /// Build from a pair of gapped, equally long aligned sequences (`-` or `.` marks a gap).
    ///
    /// ~~~
    /// use xldist::align::ResidueAlignment;
    /// let alignment = ResidueAlignment::from_aligned_sequences("MKL-V", "-KLAV").unwrap();
    /// assert_eq!(alignment.structure_index(1), None);
    /// assert_eq!(alignment.structure_index(2), Some(0));
    /// assert_eq!(alignment.structure_index(4), Some(3));
    /// assert_eq!(alignment.search_residue(2), None);
    /// ~~~
    pub fn from_aligned_sequences(search: &str, structure: &str) -> anyhow::Result<Self> {
        if search.len() != structure.len() {
            anyhow::bail!(
                "Aligned sequences differ in length ({} vs {})",
                search.len(),
                structure.len()
            );
        }
        let is_gap = |c: u8| c == b'-' || c == b'.';
        let mut alignment = Self::default();
        let (mut search_pos, mut structure_pos) = (0, 0);
        for (&a, &b) in search.as_bytes().iter().zip(structure.as_bytes()) {
            match (is_gap(a), is_gap(b)) {
                (false, false) => {
                    alignment.to_structure.push(Some(structure_pos));
                    alignment.to_search.push(Some(search_pos + 1));
                    search_pos += 1;
                    structure_pos += 1;
                }
                (false, true) => {
                    alignment.to_structure.push(None);
                    search_pos += 1;
                }
                (true, false) => {
                    alignment.to_search.push(None);
                    structure_pos += 1;
                }
                (true, true) => {}
            }
        }
        Ok(alignment)
    }

    /// Ungapped alignment with the structure shifted by `offset` residues relative to the search
    /// sequence, i.e. structure index `i` corresponds to search residue `i + offset + 1`.
    pub fn with_offset(search_length: usize, structure_length: usize, offset: isize) -> Self {
        let to_structure = (0..search_length as isize)
            .map(|s| {
                usize::try_from(s - offset)
                    .ok()
                    .filter(|&i| i < structure_length)
            })
            .collect();
        let to_search = (0..structure_length as isize)
            .map(|i| {
                usize::try_from(i + offset)
                    .ok()
                    .filter(|&s| s < search_length)
                    .map(|s| s + 1)
            })
            .collect();
        Self {
            to_structure,
            to_search,
        }
    }

    /// Best ungapped placement of a structure sequence onto a search sequence.
    ///
    /// Every offset is scored by the number of identical residues; ties go to the
    /// smallest absolute offset. Unknown structure residues (`X`) never score.
    pub fn ungapped(search: &str, structure: &str) -> Self {
        let (search, structure) = (search.as_bytes(), structure.as_bytes());
        let (n, m) = (search.len() as isize, structure.len() as isize);
        let score = |offset: isize| {
            (0..m)
                .filter(|&i| {
                    let s = i + offset;
                    (0..n).contains(&s)
                        && structure[i as usize] != b'X'
                        && search[s as usize].eq_ignore_ascii_case(&structure[i as usize])
                })
                .count()
        };
        let best = ((1 - m)..n)
            .map(|offset| (score(offset), offset))
            .max_by(|a, b| a.0.cmp(&b.0).then(b.1.abs().cmp(&a.1.abs())))
            .map(|(identical, offset)| {
                log::debug!("Ungapped alignment offset {} with {} identities", offset, identical);
                offset
            })
            .unwrap_or_default();
        Self::with_offset(search.len(), structure.len(), best)
    }

    /// 0-based structure index of a 1-based search residue
    pub fn structure_index(&self, search_residue: usize) -> Option<usize> {
        search_residue
            .checked_sub(1)
            .and_then(|i| self.to_structure.get(i).copied().flatten())
    }

    /// 1-based search residue of a 0-based structure index
    pub fn search_residue(&self, structure_index: usize) -> Option<usize> {
        self.to_search.get(structure_index).copied().flatten()
    }

    /// First and last aligned search residue
    pub fn search_range(&self) -> Option<RangeInclusive<usize>> {
        let first = self.to_structure.iter().position(Option::is_some)?;
        let last = self.to_structure.iter().rposition(Option::is_some)?;
        Some(first + 1..=last + 1)
    }
}

/// Alignments of proteins against structure chains.
#[derive(Debug, Clone, Default)]
pub struct AlignmentCollection {
    alignments: HashMap<(ProteinId, AlignmentId), ResidueAlignment>,
}

impl AlignmentCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, protein: ProteinId, id: AlignmentId, alignment: ResidueAlignment) {
        self.alignments.insert((protein, id), alignment);
    }

    pub fn get(&self, protein: &ProteinId, id: &AlignmentId) -> Option<&ResidueAlignment> {
        self.alignments.get(&(protein.clone(), id.clone()))
    }

    pub fn len(&self) -> usize {
        self.alignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alignments.is_empty()
    }
}

impl ResidueAligner for AlignmentCollection {
    fn aligned_index(
        &self,
        index: usize,
        protein: &ProteinId,
        direction: AlignDirection,
        alignment: &AlignmentId,
    ) -> Option<usize> {
        let alignment = self.get(protein, alignment)?;
        match direction {
            AlignDirection::SearchToStructure => alignment.structure_index(index),
            AlignDirection::StructureToSearch => alignment.search_residue(index),
        }
    }

    fn search_range(
        &self,
        protein: &ProteinId,
        alignment: &AlignmentId,
    ) -> Option<RangeInclusive<usize>> {
        self.get(protein, alignment)?.search_range()
    }
}
