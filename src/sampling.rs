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

//! # Background distance distributions
//!
//! Observed crosslink distances are compared against distances between residues that
//! the crosslinker _could_ have linked. Those residues are sampled deterministically:
//! evenly spaced rows and columns of the eligible residue lists, and their full cross
//! product. Identical input always gives identical output.
//!
//! Sampling proceeds in three layers, each callable on its own:
//!
//! 1. [`SampleDistanceGenerator::sample_distances`] finds the covered residues of
//!    every chain, then
//! 2. [`SampleDistanceGenerator::generate_subdivided_sample_distances_by_search`]
//!    splits the requested count across crosslinkers by the number of searches using them,
//! 3. [`SampleDistanceGenerator::generate_sample_distances_by_search`] samples
//!    one crosslinker, optionally stratified by protein, chain and model.

use crate::crosslinker::{CrosslinkerSpecificity, ResidueSet};
use crate::matrix::{DistanceMatrixCache, ResidueCoordinate};
use crate::protein::ProteinId;
use crate::resolver::{is_valid_distance, LinkMapper};
use crate::structure::ChainIndex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Restricts sampled residue pairs to the same protein, chain and/or model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SampleScope {
    pub within_protein: bool,
    pub within_chain: bool,
    pub within_model: bool,
}

impl Default for SampleScope {
    fn default() -> Self {
        Self {
            within_protein: false,
            within_chain: false,
            within_model: true,
        }
    }
}

/// Residues of one chain that are covered by the structure.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainSites {
    pub chain: ChainIndex,
    pub model: usize,
    pub protein: ProteinId,
    /// (structure index, one-letter code) within the aligned search range
    pub residues: Vec<(usize, char)>,
    /// Structure index of the first search residue, if aligned
    pub nterm: Option<usize>,
    /// Structure index of the last search residue, if aligned
    pub cterm: Option<usize>,
}

impl ChainSites {
    /// Sorted, unique structure indices a crosslinker end can react with
    pub fn eligible(&self, set: &ResidueSet) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .residues
            .iter()
            .filter(|(_, letter)| set.matches(*letter))
            .map(|(index, _)| *index)
            .collect();
        if set.includes_nterm() {
            indices.extend(self.nterm);
        }
        if set.includes_cterm() {
            indices.extend(self.cterm);
        }
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

/// Stratum of sampled residues: (protein, chain, model), each only if restricted
type BucketKey = (Option<ProteinId>, Option<ChainIndex>, Option<usize>);

/// Eligible residues of both crosslinker ends within one stratum
#[derive(Debug, Default)]
struct Bucket {
    a: Vec<ResidueCoordinate>,
    b: Vec<ResidueCoordinate>,
}

impl Bucket {
    fn pairings(&self) -> usize {
        self.a.len() * self.b.len()
    }
}

/// `k` evenly spaced indices into a list of length `len`
fn evenly_spaced(len: usize, k: usize) -> impl Iterator<Item = usize> {
    (0..k).map(move |i| i * len / k)
}

/// Split `count` in proportion to `weights`, rounding down
fn allocate(count: usize, weights: &[usize]) -> Vec<usize> {
    let total: u128 = weights.iter().map(|&w| w as u128).sum();
    weights
        .iter()
        .map(|&w| match total {
            0 => 0,
            _ => (count as u128 * w as u128 / total) as usize,
        })
        .collect()
}

/// Samples background distances on the permitted chains of a structure.
#[derive(Clone, Copy)]
pub struct SampleDistanceGenerator<'a> {
    mapper: LinkMapper<'a>,
    cache: &'a DistanceMatrixCache,
}

impl<'a> SampleDistanceGenerator<'a> {
    pub fn new(mapper: LinkMapper<'a>, cache: &'a DistanceMatrixCache) -> Self {
        Self { mapper, cache }
    }

    /// Covered residues of every permitted chain matched to a target protein.
    ///
    /// Only the aligned search range counts; residues inside it that fall in an
    /// alignment gap are skipped.
    pub fn chain_sites(&self) -> Vec<ChainSites> {
        self.mapper
            .registry
            .mapped_chains()
            .filter(|chain| self.mapper.permitted.contains(chain.index()))
            .filter_map(|chain| {
                let protein = self.mapper.proteins.get(chain.protein().as_ref()?)?;
                if *protein.is_decoy() {
                    return None;
                }
                let id = protein.id();
                let alignment = chain.alignment_id();
                let range = self.mapper.aligner.search_range(id, alignment)?;
                let structure_index = |search_residue| {
                    self.mapper
                        .aligner
                        .structure_index(search_residue, id, alignment)
                };
                let residues = range
                    .filter_map(|s| Some((structure_index(s)?, protein.residue(s)?)))
                    .collect();
                Some(ChainSites {
                    chain: *chain.index(),
                    model: *chain.model(),
                    protein: id.clone(),
                    residues,
                    nterm: structure_index(1),
                    cterm: structure_index(protein.len()),
                })
            })
            .collect()
    }

    /// Sample distances for one crosslinker.
    ///
    /// Residues are divided into strata by `scope`, and `count` is split across strata
    /// by their number of possible residue pairs.
    pub fn generate_sample_distances_by_search(
        &self,
        sites: &[ChainSites],
        specificity: &CrosslinkerSpecificity,
        count: usize,
        scope: &SampleScope,
    ) -> Vec<f64> {
        let (set_a, set_b) = specificity.ends();
        let mut buckets: BTreeMap<BucketKey, Bucket> = BTreeMap::new();
        for site in sites {
            let key = (
                scope.within_protein.then(|| site.protein.clone()),
                scope.within_chain.then_some(site.chain),
                scope.within_model.then_some(site.model),
            );
            let bucket = buckets.entry(key).or_default();
            let coordinate = |seq_index| ResidueCoordinate::new(site.chain, seq_index);
            bucket.a.extend(site.eligible(set_a).into_iter().map(coordinate));
            bucket.b.extend(site.eligible(set_b).into_iter().map(coordinate));
        }

        let weights: Vec<usize> = buckets.values().map(Bucket::pairings).collect();
        let allocations = allocate(count, &weights);
        let mut distances = Vec::new();
        for (bucket, allocation) in buckets.values().zip(allocations) {
            let n = (allocation as f64).sqrt().round() as usize;
            let (k_a, k_b) = (n.min(bucket.a.len()), n.min(bucket.b.len()));
            for i in evenly_spaced(bucket.a.len(), k_a) {
                for j in evenly_spaced(bucket.b.len(), k_b) {
                    let (a, b) = (bucket.a[i], bucket.b[j]);
                    let distance = self.cache.get(a.seq_index, b.seq_index, a.chain, b.chain);
                    distances.extend(distance.filter(|&d| is_valid_distance(d)));
                }
            }
        }
        log::debug!(
            "{} sample distances for {} from {} strata",
            distances.len(),
            specificity.name(),
            buckets.len()
        );
        distances
    }

    /// Sample distances for several crosslinkers.
    ///
    /// Every search gets `ceil(count / searches)` samples and a crosslinker gets the
    /// samples of all searches using it.
    pub fn generate_subdivided_sample_distances_by_search(
        &self,
        sites: &[ChainSites],
        specificities: &[CrosslinkerSpecificity],
        count: usize,
        scope: &SampleScope,
    ) -> Vec<f64> {
        let searches: usize = specificities.iter().map(|s| s.search_count()).sum();
        if searches == 0 {
            return Vec::new();
        }
        let per_search = count.div_ceil(searches);
        specificities
            .iter()
            .flat_map(|specificity| {
                let quota = specificity.search_count() * per_search;
                self.generate_sample_distances_by_search(sites, specificity, quota, scope)
            })
            .collect()
    }

    /// Sample about `count` background distances for the given crosslinkers.
    pub fn sample_distances(
        &self,
        count: usize,
        specificities: &[CrosslinkerSpecificity],
        scope: &SampleScope,
    ) -> Vec<f64> {
        let sites = self.chain_sites();
        let distances = self.generate_subdivided_sample_distances_by_search(
            &sites,
            specificities,
            count,
            scope,
        );
        log::info!(
            "Sampled {} background distances from {} chain(s)",
            distances.len(),
            sites.len()
        );
        distances
    }
}
