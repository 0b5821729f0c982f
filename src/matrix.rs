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

//! # Residue distance matrices
//!
//! One matrix per ordered pair of chains, holding distances between the representative
//! atoms of all residues (dense) or only of crosslinked residue pairs (links-only).
//! Links-only mode is forced for large structures. Lookups that miss a links-only matrix
//! fall back to an exact distance computed from the coordinates.

use crate::structure::{ChainIndex, Structure};
use crate::Point;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

/// Default maximum number of residues for which all-pairs matrices are built
pub const DEFAULT_FULL_DISTANCE_CUTOFF: usize = 1200;

/// A residue of a structure chain by its 0-based sequence index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResidueCoordinate {
    pub chain: ChainIndex,
    pub seq_index: usize,
}

impl ResidueCoordinate {
    pub fn new(chain: ChainIndex, seq_index: usize) -> Self {
        Self { chain, seq_index }
    }
}

/// Representative atom positions of all residues of a structure, indexed by chain.
#[derive(Debug, Clone, Default)]
pub struct ResidueCoordinates {
    chains: Vec<Vec<Option<Point>>>,
}

impl ResidueCoordinates {
    pub fn new(structure: &Structure) -> Self {
        let chains = structure
            .chains()
            .iter()
            .map(|chain| chain.residues().iter().map(|r| *r.position()).collect())
            .collect();
        Self { chains }
    }

    pub fn position(&self, residue: ResidueCoordinate) -> Option<&Point> {
        self.chains
            .get(residue.chain.0)?
            .get(residue.seq_index)?
            .as_ref()
    }

    /// Exact distance between two residues; `None` if either position is unknown
    pub fn distance(&self, a: ResidueCoordinate, b: ResidueCoordinate) -> Option<f64> {
        Some((self.position(a)? - self.position(b)?).norm())
    }

    /// Number of residues in a chain; zero for unknown chains
    pub fn residue_count(&self, chain: ChainIndex) -> usize {
        self.chains.get(chain.0).map_or(0, Vec::len)
    }
}

/// Ordered pair of chains keying a distance matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainPair {
    pub first: ChainIndex,
    pub second: ChainIndex,
}

impl ChainPair {
    pub fn new(first: ChainIndex, second: ChainIndex) -> Self {
        Self { first, second }
    }

    pub fn is_symmetric(&self) -> bool {
        self.first == self.second
    }
}

/// Distances indexed by (sequence index in first chain, sequence index in second chain)
#[derive(Debug, Clone)]
pub enum Cells {
    /// All residue pairs; `NaN` where a position is unknown
    Dense(Array2<f64>),
    /// Crosslinked residue pairs only
    Sparse(HashMap<(usize, usize), f64>),
}

/// Distance matrix of one chain pair.
#[derive(Debug, Clone)]
pub struct DistanceMatrixEntry {
    pub pair: ChainPair,
    pub cells: Cells,
}

impl DistanceMatrixEntry {
    pub fn is_symmetric(&self) -> bool {
        self.pair.is_symmetric()
    }

    pub fn is_links_only(&self) -> bool {
        matches!(self.cells, Cells::Sparse(_))
    }

    /// Cached distance, if present and finite
    pub fn get(&self, seq_a: usize, seq_b: usize) -> Option<f64> {
        let value = match &self.cells {
            Cells::Dense(matrix) => matrix.get((seq_a, seq_b)).copied(),
            Cells::Sparse(cells) => cells.get(&(seq_a, seq_b)).copied(),
        };
        value.filter(|d| d.is_finite())
    }

    fn dense(pair: ChainPair, coordinates: &ResidueCoordinates) -> Self {
        let (n, m) = (
            coordinates.residue_count(pair.first),
            coordinates.residue_count(pair.second),
        );
        let matrix = if pair.is_symmetric() {
            let mut matrix = Array2::zeros((n, n));
            for i in 0..n {
                for j in (i + 1)..n {
                    let d = coordinates
                        .distance(
                            ResidueCoordinate::new(pair.first, i),
                            ResidueCoordinate::new(pair.first, j),
                        )
                        .unwrap_or(f64::NAN);
                    matrix[[i, j]] = d;
                    matrix[[j, i]] = d;
                }
            }
            matrix
        } else {
            Array2::from_shape_fn((n, m), |(i, j)| {
                coordinates
                    .distance(
                        ResidueCoordinate::new(pair.first, i),
                        ResidueCoordinate::new(pair.second, j),
                    )
                    .unwrap_or(f64::NAN)
            })
        };
        Self {
            pair,
            cells: Cells::Dense(matrix),
        }
    }
}

/// Distance matrices of every ordered pair of a set of chains.
///
/// Built wholesale and never modified; a change of chains, structure or (in links-only
/// mode) crosslinks means building a new cache.
#[derive(Debug, Clone)]
pub struct DistanceMatrixCache {
    chains: BTreeSet<ChainIndex>,
    links_only: bool,
    matrices: BTreeMap<ChainPair, DistanceMatrixEntry>,
    coordinates: Rc<ResidueCoordinates>,
}

impl DistanceMatrixCache {
    /// Build matrices for all ordered pairs of `chains`, including each chain with itself.
    ///
    /// Only `links` are stored if `links_only` is set or if the total number of residues
    /// exceeds `cutoff`.
    pub fn build(
        chains: &BTreeSet<ChainIndex>,
        coordinates: Rc<ResidueCoordinates>,
        links: &[(ResidueCoordinate, ResidueCoordinate)],
        links_only: bool,
        cutoff: usize,
    ) -> Self {
        let total_residues: usize = chains.iter().map(|&c| coordinates.residue_count(c)).sum();
        let links_only = links_only || total_residues > cutoff;
        log::debug!(
            "Building {} distance matrices for {} chain(s) with {} residues",
            if links_only { "links-only" } else { "dense" },
            chains.len(),
            total_residues
        );
        let matrices = if links_only {
            Self::sparse_matrices(chains, &coordinates, links)
        } else {
            Self::dense_matrices(chains, &coordinates)
        };
        Self {
            chains: chains.clone(),
            links_only,
            matrices,
            coordinates,
        }
    }

    fn dense_matrices(
        chains: &BTreeSet<ChainIndex>,
        coordinates: &ResidueCoordinates,
    ) -> BTreeMap<ChainPair, DistanceMatrixEntry> {
        let mut matrices = BTreeMap::new();
        for &first in chains {
            for &second in chains.range(first..) {
                let entry = DistanceMatrixEntry::dense(ChainPair::new(first, second), coordinates);
                if first != second {
                    if let Cells::Dense(matrix) = &entry.cells {
                        let pair = ChainPair::new(second, first);
                        let transposed = DistanceMatrixEntry {
                            pair,
                            cells: Cells::Dense(matrix.t().to_owned()),
                        };
                        matrices.insert(pair, transposed);
                    }
                }
                matrices.insert(entry.pair, entry);
            }
        }
        matrices
    }

    fn sparse_matrices(
        chains: &BTreeSet<ChainIndex>,
        coordinates: &ResidueCoordinates,
        links: &[(ResidueCoordinate, ResidueCoordinate)],
    ) -> BTreeMap<ChainPair, DistanceMatrixEntry> {
        let mut cells: BTreeMap<ChainPair, HashMap<(usize, usize), f64>> = BTreeMap::new();
        for &first in chains {
            for &second in chains {
                cells.entry(ChainPair::new(first, second)).or_default();
            }
        }
        for &(a, b) in links {
            let Some(d) = coordinates.distance(a, b) else {
                continue;
            };
            for (x, y) in [(a, b), (b, a)] {
                if let Some(cells) = cells.get_mut(&ChainPair::new(x.chain, y.chain)) {
                    cells.insert((x.seq_index, y.seq_index), d);
                }
            }
        }
        cells
            .into_iter()
            .map(|(pair, cells)| {
                let entry = DistanceMatrixEntry {
                    pair,
                    cells: Cells::Sparse(cells),
                };
                (pair, entry)
            })
            .collect()
    }

    /// Distance between two residues.
    ///
    /// The same residue of the same chain is zero. Residues not in the cache are
    /// computed from coordinates; `None` only if a position is unknown.
    pub fn get(
        &self,
        seq_a: usize,
        seq_b: usize,
        chain_a: ChainIndex,
        chain_b: ChainIndex,
    ) -> Option<f64> {
        if chain_a == chain_b && seq_a == seq_b {
            return Some(0.0);
        }
        let cached = self
            .matrices
            .get(&ChainPair::new(chain_a, chain_b))
            .and_then(|entry| entry.get(seq_a, seq_b));
        cached.or_else(|| {
            log::trace!(
                "Distance cache miss for {}:{} - {}:{}; computing directly",
                chain_a,
                seq_a,
                chain_b,
                seq_b
            );
            self.coordinates.distance(
                ResidueCoordinate::new(chain_a, seq_a),
                ResidueCoordinate::new(chain_b, seq_b),
            )
        })
    }

    /// Chains the cache was built for
    pub fn chains(&self) -> &BTreeSet<ChainIndex> {
        &self.chains
    }

    pub fn is_links_only(&self) -> bool {
        self.links_only
    }

    pub fn matrix(&self, pair: ChainPair) -> Option<&DistanceMatrixEntry> {
        self.matrices.get(&pair)
    }

    /// Number of chain pair matrices
    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    pub fn coordinates(&self) -> &Rc<ResidueCoordinates> {
        &self.coordinates
    }
}
