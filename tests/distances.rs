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

//! Crosslink distances on ideal helix homomultimers.

mod common;

use approx::assert_relative_eq;
use common::{bs3, Fixture};
use float_cmp::approx_eq;
use std::collections::BTreeSet;
use xldist::crosslink::Side;
use xldist::matrix::ResidueCoordinate;
use xldist::resolver::DistanceOptionsBuilder;
use xldist::sampling::SampleScope;
use xldist::{
    shortest_link_alternatives, ChainIndex, Crosslink, CrosslinkId, DistanceOptions,
    DistanceSettings, StructureModel,
};

fn dimer(crosslinks: Vec<Crosslink>) -> StructureModel {
    Fixture::homomultimer(60, &[60, 60], None).model(crosslinks, DistanceSettings::default())
}

fn crosslinks() -> Vec<Crosslink> {
    vec![
        Crosslink::new("1", ("P1", 10), ("P1", 30)),
        Crosslink::new("2", ("P1", 2), ("P1", 2)).homomultimeric(),
        Crosslink::new("3", ("P1", 8), ("P1", 48)),
    ]
}

fn distances(model: &StructureModel) -> Vec<f64> {
    model.alternatives().iter().map(|a| a.distance).collect()
}

#[test]
fn dimer_self_link_is_intra_chain() {
    let model = dimer(crosslinks());
    let options = DistanceOptionsBuilder::default()
        .return_chain_info(true)
        .build()
        .unwrap();
    let result = model
        .get_xlink_distance(&model.crosslinks()[0], &options)
        .unwrap();

    let direct = |chain| {
        model
            .distances()
            .single_distance_between_residues(
                ResidueCoordinate::new(ChainIndex(chain), 9),
                ResidueCoordinate::new(ChainIndex(chain), 29),
            )
            .unwrap()
    };
    let (aa, bb) = (direct(0), direct(1));
    assert_relative_eq!(aa, bb, epsilon = 1e-9);
    assert_relative_eq!(result.distance.unwrap(), aa.min(bb), epsilon = 1e-12);

    let info = result.chain_info.unwrap();
    assert_eq!(info.len(), 1);
    assert_eq!(info[0].residue_a.chain(), info[0].residue_b.chain());
    assert_eq!(info[0].residue_a.search_index, 10);
    assert_eq!(info[0].residue_b.search_index, 30);
}

#[test]
fn homomultimeric_link_spans_chains() {
    let model = dimer(crosslinks());
    let link = model
        .alternatives()
        .iter()
        .find(|a| a.orig_id == CrosslinkId::from("2"))
        .unwrap();
    assert_ne!(link.residue_a.chain(), link.residue_b.chain());
    // identical residues of chains 20 Å apart
    assert_relative_eq!(link.distance, 20.0, epsilon = 1e-9);
}

#[test]
fn average_distance() {
    let model = dimer(crosslinks());
    let options = DistanceOptions {
        average: true,
        ..Default::default()
    };
    let result = model
        .get_xlink_distance(&model.crosslinks()[0], &options)
        .unwrap();
    let shortest = model.alternatives()[0].distance;
    // intra-chain pairs are shorter than inter-chain pairs
    assert!(result.distance.unwrap() > shortest);
    assert!(result.chain_info.is_none());
}

#[test]
fn gap_gives_half_links() {
    let fixture = Fixture::homomultimer(40, &[40, 40], Some(15..=20));
    let crosslinks = vec![
        Crosslink::new("gap", ("P1", 17), ("P1", 5)),
        Crosslink::new("full", ("P1", 5), ("P1", 25)),
        Crosslink::new("none", ("P1", 16), ("P1", 18)),
    ];
    let model = fixture.model(crosslinks, DistanceSettings::default());

    let half_links = model.half_links();
    assert_eq!(half_links.len(), 2);
    assert!(half_links.iter().all(|h| h.orig_id == CrosslinkId::from("gap")));
    assert!(half_links.iter().all(|h| h.end == Side::To));
    assert!(half_links.iter().all(|h| h.residue.seq_index() == 4));

    let coverage = model.coverage();
    assert_eq!(
        (coverage.total, coverage.full, coverage.half, coverage.unresolved),
        (3, 1, 1, 1)
    );

    let gap = model
        .get_xlink_distance(&model.crosslinks()[0], &DistanceOptions::default())
        .unwrap();
    assert!(gap.distance.is_none());

    // residue 25 lies after the six missing residues
    let full = &model.alternatives()[0];
    assert_eq!(full.residue_b.seq_index(), 18);
}

#[test]
fn cutoff_boundary() {
    let crosslinks = vec![
        Crosslink::new("1", ("P1", 10), ("P1", 300)),
        Crosslink::new("2", ("P1", 100), ("P1", 550)),
        Crosslink::new("3", ("P1", 1), ("P1", 600)),
        Crosslink::new("4", ("P1", 42), ("P1", 42)).homomultimeric(),
    ];
    let dense = Fixture::homomultimer(601, &[600, 600], None)
        .model(crosslinks.clone(), DistanceSettings::default());
    let sparse = Fixture::homomultimer(601, &[600, 601], None)
        .model(crosslinks, DistanceSettings::default());

    assert!(!dense.distances().matrices().unwrap().is_links_only());
    assert!(sparse.distances().matrices().unwrap().is_links_only());

    assert_eq!(dense.alternatives().len(), 4);
    assert_eq!(sparse.alternatives().len(), 4);
    for (d, s) in dense.alternatives().iter().zip(sparse.alternatives()) {
        assert_eq!(d.orig_id, s.orig_id);
        assert_eq!(d.residue_a.coordinate, s.residue_a.coordinate);
        assert_eq!(d.residue_b.coordinate, s.residue_b.coordinate);
        assert!(approx_eq!(f64, d.distance, s.distance, ulps = 2));
    }
}

#[test]
fn shortest_only_is_idempotent() {
    let all = Fixture::homomultimer(60, &[60, 60], None).model(
        crosslinks(),
        DistanceSettings {
            shortest_only: false,
            ..Default::default()
        },
    );
    // links 1 and 3 keep all four pairings; the homomultimer keeps both chain orders
    assert_eq!(all.alternatives().len(), 10);

    let once = shortest_link_alternatives(all.alternatives());
    let twice = shortest_link_alternatives(&once);
    assert_eq!(once, twice);
    assert_eq!(once.len(), 3);
    assert_eq!(once, dimer(crosslinks()).alternatives());
}

#[test]
fn permission_round_trip() {
    let mut model = dimer(crosslinks());
    let before = model.alternatives().to_vec();

    let only_a = BTreeSet::from(["A".to_string()]);
    model.set_allowed_chain_names(Some(&only_a)).unwrap();
    assert_eq!(model.coverage().full, 2);
    assert!(model
        .alternatives()
        .iter()
        .all(|a| a.residue_a.chain() == ChainIndex(0) && a.residue_b.chain() == ChainIndex(0)));

    model.set_allowed_chain_names(None).unwrap();
    assert_eq!(model.alternatives(), before.as_slice());
}

#[test]
fn sampling_layers_agree() {
    let model = dimer(Vec::new());
    let specificity = bs3(&["s1", "s2"]);
    let scope = SampleScope {
        within_chain: true,
        ..Default::default()
    };
    let sampler = model
        .distances()
        .sampler(model.aligner(), model.proteins())
        .unwrap();
    let sites = sampler.chain_sites();
    assert_eq!(sites.len(), 2);

    let sampled = model
        .sample_distances(100, std::slice::from_ref(&specificity), &scope)
        .unwrap();
    assert!(!sampled.is_empty() && sampled.len() <= 100);
    assert!(sampled.iter().all(|&d| d.is_finite() && d > 0.0));

    // two searches share the crosslinker, so it gets both quotas of 50
    let subdivided = sampler.generate_subdivided_sample_distances_by_search(
        &sites,
        std::slice::from_ref(&specificity),
        100,
        &scope,
    );
    let by_search = sampler.generate_sample_distances_by_search(&sites, &specificity, 100, &scope);
    assert_eq!(sampled, subdivided);
    assert_eq!(sampled, by_search);

    // identical chains split the count evenly
    let per_chain: Vec<f64> = sites
        .iter()
        .flat_map(|site| {
            sampler.generate_sample_distances_by_search(
                std::slice::from_ref(site),
                &specificity,
                50,
                &scope,
            )
        })
        .collect();
    assert_eq!(sampled, per_chain);
}

#[test]
fn deterministic() {
    let a = dimer(crosslinks());
    let b = dimer(crosslinks());
    assert_eq!(a.alternatives(), b.alternatives());
    assert_eq!(distances(&a), distances(&b));

    let specificities = [bs3(&["s1"])];
    let scope = SampleScope::default();
    let first = a.sample_distances(200, &specificities, &scope).unwrap();
    let second = a.sample_distances(200, &specificities, &scope).unwrap();
    let other = b.sample_distances(200, &specificities, &scope).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, other);
}
