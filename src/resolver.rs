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

//! # Mapping crosslinks onto structure chains
//!
//! A crosslink names two search residues. When a protein occurs as several chain copies
//! (homomultimers, NMR ensembles) each combination of chains is a possible structural
//! realisation, an _alternative_. This module enumerates alternatives, computes their
//! distances and picks the shortest one.
//!
//! Alternatives with equal distance are ordered by [`tie_break`]:
//!
//! 1. lower sum of model indices
//! 2. lower sum of chain indices
//! 3. lower minimum chain index
//! 4. lower chain index of the first residue
//! 5. lower sequence indices
//!
//! Only the first three levels matter for alternatives with distinct chain
//! tuples; the remaining levels make the order total.

use crate::align::ResidueAligner;
use crate::assembly::PermittedChainSet;
use crate::chains::ChainRegistry;
use crate::crosslink::{Crosslink, CrosslinkId, LinkEnd, Side};
use crate::matrix::{DistanceMatrixCache, ResidueCoordinate};
use crate::protein::{ProteinId, ProteinStore};
use crate::spatial::{nearest_neighbours, Located};
use crate::structure::ChainIndex;
use crate::Point;
use average::{Estimate, Mean};
use derive_builder::Builder;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

/// Up to this many chain pairings are compared one by one; above, an octree is used.
pub const EXHAUSTIVE_PAIRING_LIMIT: usize = 4;

/// Options for crosslink distance calculations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(default, derive(Debug))]
#[serde(default, deny_unknown_fields)]
pub struct DistanceOptions {
    /// Mean of all valid alternatives instead of the minimum
    pub average: bool,
    /// Report the chain pairs behind the distance
    pub return_chain_info: bool,
    /// Pair chains of different models
    pub allow_inter_model_distances: bool,
    /// Map decoy proteins onto the chains of their target protein
    pub calc_decoy_protein_distances: bool,
}

/// A crosslinked residue placed on a structure chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkResidue {
    pub coordinate: ResidueCoordinate,
    pub model: usize,
    pub protein: ProteinId,
    /// 1-based residue in the searched sequence
    pub search_index: usize,
}

impl LinkResidue {
    pub fn chain(&self) -> ChainIndex {
        self.coordinate.chain
    }

    pub fn seq_index(&self) -> usize {
        self.coordinate.seq_index
    }
}

/// One structural realisation of a crosslink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrosslinkResidueAlternative {
    /// The abstract crosslink this realises
    pub orig_id: CrosslinkId,
    /// Residue of the `from` end
    pub residue_a: LinkResidue,
    /// Residue of the `to` end
    pub residue_b: LinkResidue,
    /// Distance in Ångström; always finite and positive
    pub distance: f64,
}

/// A crosslink with only one end on the structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HalfLink {
    pub orig_id: CrosslinkId,
    pub residue: LinkResidue,
    /// The resolved end
    pub end: Side,
}

/// Alternatives and half-links of a set of crosslinks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkSet {
    pub alternatives: Vec<CrosslinkResidueAlternative>,
    pub half_links: Vec<HalfLink>,
}

impl LinkSet {
    /// Link counts for `total` crosslinks
    pub fn coverage(&self, total: usize) -> Coverage {
        let full: BTreeSet<_> = self.alternatives.iter().map(|a| &a.orig_id).collect();
        let half: BTreeSet<_> = self
            .half_links
            .iter()
            .map(|h| &h.orig_id)
            .filter(|id| !full.contains(id))
            .collect();
        Coverage {
            total,
            full: full.len(),
            half: half.len(),
            unresolved: total.saturating_sub(full.len() + half.len()),
        }
    }
}

/// How many crosslinks could be placed on the structure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub total: usize,
    /// Both ends on the structure with a distance
    pub full: usize,
    /// Only one end on the structure
    pub half: usize,
    pub unresolved: usize,
}

impl std::fmt::Display for Coverage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let percent = match self.total {
            0 => 0.0,
            n => 100.0 * self.full as f64 / n as f64,
        };
        write!(
            f,
            "{} of {} crosslinks on structure ({:.1}%), {} half-links, {} unresolved",
            self.full, self.total, percent, self.half, self.unresolved
        )
    }
}

/// Result of [`CrosslinkResolver::xlink_distance`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct XLinkDistance {
    /// Shortest or mean distance; `None` if the crosslink has no valid alternative
    pub distance: Option<f64>,
    /// Alternatives behind the distance, if requested
    pub chain_info: Option<Vec<CrosslinkResidueAlternative>>,
}

/// Usable distances are finite and positive
pub fn is_valid_distance(distance: f64) -> bool {
    distance.is_finite() && distance > 0.0
}

type TieBreakKey = (usize, usize, ChainIndex, ChainIndex, usize, usize);

fn tie_break_key(a: &LinkResidue, b: &LinkResidue) -> TieBreakKey {
    (
        a.model + b.model,
        a.chain().0 + b.chain().0,
        a.chain().min(b.chain()),
        a.chain(),
        a.seq_index(),
        b.seq_index(),
    )
}

/// Deterministic order of alternatives regardless of distance.
pub fn tie_break(a: &CrosslinkResidueAlternative, b: &CrosslinkResidueAlternative) -> Ordering {
    tie_break_key(&a.residue_a, &a.residue_b).cmp(&tie_break_key(&b.residue_a, &b.residue_b))
}

/// Shorter distance first, then [`tie_break`].
pub fn compare_alternatives(
    a: &CrosslinkResidueAlternative,
    b: &CrosslinkResidueAlternative,
) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| tie_break(a, b))
}

/// Keep the shortest alternative of every crosslink.
///
/// Crosslinks appear in the order of their first alternative. Applying this twice
/// gives the same result as applying it once.
pub fn shortest_link_alternatives(
    alternatives: &[CrosslinkResidueAlternative],
) -> Vec<CrosslinkResidueAlternative> {
    let mut shortest: Vec<CrosslinkResidueAlternative> = Vec::new();
    let mut position: HashMap<&CrosslinkId, usize> = HashMap::new();
    for alternative in alternatives {
        match position.get(&alternative.orig_id) {
            Some(&i) => {
                if compare_alternatives(alternative, &shortest[i]) == Ordering::Less {
                    shortest[i] = alternative.clone();
                }
            }
            None => {
                position.insert(&alternative.orig_id, shortest.len());
                shortest.push(alternative.clone());
            }
        }
    }
    shortest
}

/// True if the two residues may form an alternative of `crosslink`.
///
/// A confirmed homomultimeric link must connect two different chain copies.
fn pairing_allowed(
    crosslink: &Crosslink,
    a: &LinkResidue,
    b: &LinkResidue,
    allow_inter_model: bool,
) -> bool {
    (allow_inter_model || a.model == b.model)
        && !(crosslink.confirmed_homomultimer && a.chain() == b.chain())
}

/// Places crosslink ends on the permitted chains of a structure.
#[derive(Clone, Copy)]
pub struct LinkMapper<'a> {
    pub registry: &'a ChainRegistry,
    pub permitted: &'a PermittedChainSet,
    pub aligner: &'a dyn ResidueAligner,
    pub proteins: &'a ProteinStore,
}

impl<'a> LinkMapper<'a> {
    /// Protein whose chains a crosslink end is mapped onto; `None` for excluded decoys
    fn structural_protein(&self, protein: &ProteinId, calc_decoy: bool) -> Option<ProteinId> {
        match self.proteins.is_decoy(protein) {
            false => Some(protein.clone()),
            true if calc_decoy => self.proteins.real_protein_id(protein),
            true => None,
        }
    }

    /// True if the crosslink involves a decoy protein that should not be placed
    pub fn is_excluded_decoy(&self, crosslink: &Crosslink, calc_decoy: bool) -> bool {
        !calc_decoy
            && (self.proteins.is_decoy(&crosslink.from.protein)
                || self.proteins.is_decoy(&crosslink.to.protein))
    }

    /// The residue of a crosslink end on every permitted chain where it aligns.
    ///
    /// Chains where the residue falls into an alignment gap are skipped.
    pub fn link_residues(&self, end: &LinkEnd, calc_decoy: bool) -> Vec<LinkResidue> {
        let Some(protein) = self.structural_protein(&end.protein, calc_decoy) else {
            return Vec::new();
        };
        self.registry
            .chains_for_protein(&protein)
            .filter(|chain| self.permitted.contains(chain.index()))
            .filter_map(|chain| {
                let seq_index =
                    self.aligner
                        .structure_index(end.residue, &protein, chain.alignment_id())?;
                Some(LinkResidue {
                    coordinate: ResidueCoordinate::new(*chain.index(), seq_index),
                    model: *chain.model(),
                    protein: end.protein.clone(),
                    search_index: end.residue,
                })
            })
            .collect()
    }

    /// Every residue pair that any alternative of `crosslinks` could use
    pub fn candidate_links(
        &self,
        crosslinks: &[Crosslink],
        calc_decoy: bool,
    ) -> Vec<(ResidueCoordinate, ResidueCoordinate)> {
        crosslinks
            .iter()
            .filter(|crosslink| !self.is_excluded_decoy(crosslink, calc_decoy))
            .flat_map(|crosslink| {
                let from = self.link_residues(&crosslink.from, calc_decoy);
                let to = self.link_residues(&crosslink.to, calc_decoy);
                from.iter()
                    .cartesian_product(&to)
                    .map(|(a, b)| (a.coordinate, b.coordinate))
                    .collect_vec()
            })
            .collect()
    }
}

/// Residue with its position, for the octree
struct Placed<'r> {
    residue: &'r LinkResidue,
    position: Point,
}

impl Located for Placed<'_> {
    fn position(&self) -> Point {
        self.position
    }
}

/// Computes crosslink alternatives and distances on one structure.
#[derive(Clone, Copy)]
pub struct CrosslinkResolver<'a> {
    mapper: LinkMapper<'a>,
    cache: &'a DistanceMatrixCache,
}

impl<'a> CrosslinkResolver<'a> {
    pub fn new(mapper: LinkMapper<'a>, cache: &'a DistanceMatrixCache) -> Self {
        Self { mapper, cache }
    }

    pub fn mapper(&self) -> &LinkMapper<'a> {
        &self.mapper
    }

    /// Alternative for a residue pair, if its distance is valid
    fn alternative(
        &self,
        crosslink: &Crosslink,
        a: &LinkResidue,
        b: &LinkResidue,
    ) -> Option<CrosslinkResidueAlternative> {
        let distance = self
            .cache
            .get(a.seq_index(), b.seq_index(), a.chain(), b.chain())
            .filter(|&d| is_valid_distance(d))?;
        Some(CrosslinkResidueAlternative {
            orig_id: crosslink.id.clone(),
            residue_a: a.clone(),
            residue_b: b.clone(),
            distance,
        })
    }

    /// Alternatives of every allowed pairing
    fn all_alternatives(
        &self,
        crosslink: &Crosslink,
        from: &[LinkResidue],
        to: &[LinkResidue],
        allow_inter_model: bool,
    ) -> Vec<CrosslinkResidueAlternative> {
        from.iter()
            .cartesian_product(to)
            .filter(|(a, b)| pairing_allowed(crosslink, a, b, allow_inter_model))
            .filter_map(|(a, b)| self.alternative(crosslink, a, b))
            .collect()
    }

    /// Residue with its position; `NaN` if unknown
    fn place<'r>(&self, residue: &'r LinkResidue) -> Placed<'r> {
        let position = self
            .cache
            .coordinates()
            .position(residue.coordinate)
            .copied()
            .unwrap_or_else(|| Point::repeat(f64::NAN));
        Placed { residue, position }
    }

    /// Single shortest alternative found by nearest neighbour search
    fn nearest_alternative(
        &self,
        crosslink: &Crosslink,
        from: &[LinkResidue],
        to: &[LinkResidue],
        allow_inter_model: bool,
    ) -> Option<CrosslinkResidueAlternative> {
        let from = from.iter().map(|r| self.place(r)).collect_vec();
        let to = to.iter().map(|r| self.place(r)).collect_vec();
        let ignore = |a: &Placed<'_>, b: &Placed<'_>| {
            !pairing_allowed(crosslink, a.residue, b.residue, allow_inter_model)
                || a.position == b.position
        };
        nearest_neighbours(&from, &to, None, ignore)
            .into_iter()
            .filter_map(|m| self.alternative(crosslink, m.a?.residue, m.b.residue))
            .min_by(compare_alternatives)
    }

    /// Alternatives of one crosslink given the residues of both ends.
    ///
    /// Few pairings are all kept; many pairings collapse to the shortest one.
    fn alternatives(
        &self,
        crosslink: &Crosslink,
        from: &[LinkResidue],
        to: &[LinkResidue],
        allow_inter_model: bool,
    ) -> Vec<CrosslinkResidueAlternative> {
        let pairings = from
            .iter()
            .cartesian_product(to)
            .filter(|(a, b)| pairing_allowed(crosslink, a, b, allow_inter_model))
            .count();
        if pairings <= EXHAUSTIVE_PAIRING_LIMIT {
            self.all_alternatives(crosslink, from, to, allow_inter_model)
        } else {
            log::debug!(
                "Crosslink {} has {} chain pairings; using octree",
                crosslink.id,
                pairings
            );
            self.nearest_alternative(crosslink, from, to, allow_inter_model)
                .into_iter()
                .collect()
        }
    }

    /// Alternatives and half-links of all crosslinks.
    ///
    /// If one end cannot be placed on any chain, the placed residues of the other end
    /// become half-links. Crosslinks with neither end placed are left out.
    pub fn resolve_links(&self, crosslinks: &[Crosslink], options: &DistanceOptions) -> LinkSet {
        let mut links = LinkSet::default();
        for crosslink in crosslinks {
            if self
                .mapper
                .is_excluded_decoy(crosslink, options.calc_decoy_protein_distances)
            {
                continue;
            }
            let from = self
                .mapper
                .link_residues(&crosslink.from, options.calc_decoy_protein_distances);
            let to = self
                .mapper
                .link_residues(&crosslink.to, options.calc_decoy_protein_distances);
            let half_link = |(residue, end): (&LinkResidue, Side)| HalfLink {
                orig_id: crosslink.id.clone(),
                residue: residue.clone(),
                end,
            };
            match (from.is_empty(), to.is_empty()) {
                (true, true) => {}
                (true, false) => links
                    .half_links
                    .extend(to.iter().map(|r| half_link((r, Side::To)))),
                (false, true) => links
                    .half_links
                    .extend(from.iter().map(|r| half_link((r, Side::From)))),
                (false, false) => links.alternatives.extend(self.alternatives(
                    crosslink,
                    &from,
                    &to,
                    options.allow_inter_model_distances,
                )),
            }
        }
        links
    }

    /// Distance of a crosslink on the structure.
    ///
    /// The shortest alternative by default, or the mean over all valid pairings with
    /// [`DistanceOptions::average`]. Decoy proteins have no distance unless
    /// [`DistanceOptions::calc_decoy_protein_distances`] is set.
    pub fn xlink_distance(
        &self,
        crosslink: &Crosslink,
        options: &DistanceOptions,
    ) -> XLinkDistance {
        let calc_decoy = options.calc_decoy_protein_distances;
        if self.mapper.is_excluded_decoy(crosslink, calc_decoy) {
            return XLinkDistance::default();
        }
        let from = self.mapper.link_residues(&crosslink.from, calc_decoy);
        let to = self.mapper.link_residues(&crosslink.to, calc_decoy);
        let allow_inter_model = options.allow_inter_model_distances;

        let (distance, used) = if options.average {
            let all = self.all_alternatives(crosslink, &from, &to, allow_inter_model);
            let mut mean = Mean::new();
            all.iter().for_each(|a| mean.add(a.distance));
            ((!all.is_empty()).then(|| mean.mean()), all)
        } else {
            let shortest = self
                .alternatives(crosslink, &from, &to, allow_inter_model)
                .into_iter()
                .min_by(compare_alternatives);
            (shortest.as_ref().map(|a| a.distance), shortest.into_iter().collect())
        };
        XLinkDistance {
            distance,
            chain_info: options.return_chain_info.then_some(used),
        }
    }
}
