//! Shared fixtures for integration tests.
//!
//! Structures are built from ideal α-helices so that distances are known
//! without reading files.

#![allow(dead_code)]

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::rc::Rc;
use xldist::align::{AlignmentCollection, AlignmentId, ResidueAlignment};
use xldist::crosslinker::CrosslinkerSpecificity;
use xldist::protein::{Protein, ProteinId, ProteinStore};
use xldist::structure::StructureResidue;
use xldist::{Crosslink, DistanceSettings, Point, Structure, StructureModel};

/// Residue pattern of the test protein
const PATTERN: &str = "MKSTYAGKLE";

/// Search sequence of `length` residues
pub fn sequence(length: usize) -> String {
    PATTERN.chars().cycle().take(length).collect()
}

/// Cα position of 1-based residue `residue` on an ideal helix along z
pub fn helix_position(residue: usize, shift: f64) -> Point {
    let angle = (100.0 * (residue - 1) as f64).to_radians();
    Point::new(2.3 * angle.cos() + shift, 2.3 * angle.sin(), 1.5 * (residue - 1) as f64)
}

/// Structure, proteins and alignments of a homomultimer.
pub struct Fixture {
    pub structure: Structure,
    pub proteins: ProteinStore,
    pub alignments: AlignmentCollection,
}

impl Fixture {
    /// Copies of protein `P1` of `protein_length` residues, one chain per entry in
    /// `chain_lengths` spaced 20 Å apart. Search residues in `gap` are not observed.
    pub fn homomultimer(
        protein_length: usize,
        chain_lengths: &[usize],
        gap: Option<RangeInclusive<usize>>,
    ) -> Self {
        let sequence = sequence(protein_length);
        let mut structure = Structure::new("HELIX");
        let mut alignments = AlignmentCollection::new();
        let in_gap = |s: usize| gap.as_ref().is_some_and(|g| g.contains(&s));
        for (copy, &length) in chain_lengths.iter().enumerate() {
            let name = ((b'A' + copy as u8) as char).to_string();
            let shift = 20.0 * copy as f64;
            let residues = (1..=length)
                .filter(|&s| !in_gap(s))
                .map(|s| StructureResidue::new("LYS", s as i32, Some(helix_position(s, shift))))
                .collect();
            let index = structure.add_chain(&name, 0, residues);
            let chain = structure.chain(index).unwrap();
            let observed: String = sequence
                .chars()
                .enumerate()
                .map(|(i, c)| match i + 1 {
                    s if s > length || in_gap(s) => '-',
                    _ => c,
                })
                .collect();
            let alignment = match gap {
                None => ResidueAlignment::with_offset(protein_length, length, 0),
                Some(_) => ResidueAlignment::from_aligned_sequences(&sequence, &observed).unwrap(),
            };
            alignments.insert("P1".into(), AlignmentId::for_chain("HELIX", chain), alignment);
        }
        let names = (0..chain_lengths.len())
            .map(|copy| (((b'A' + copy as u8) as char).to_string(), ProteinId::new("P1")))
            .collect();
        structure.assign_proteins(&names);
        Self {
            structure,
            proteins: ProteinStore::new([Protein::new("P1", &sequence)]),
            alignments,
        }
    }

    pub fn model(self, crosslinks: Vec<Crosslink>, settings: DistanceSettings) -> StructureModel {
        StructureModel::new(
            self.structure,
            Rc::new(self.proteins),
            Rc::new(self.alignments),
            crosslinks,
            settings,
        )
        .unwrap()
    }
}

/// Lysine, serine, threonine, tyrosine and N-terminus reactive crosslinker
pub fn bs3(searches: &[&str]) -> CrosslinkerSpecificity {
    CrosslinkerSpecificity::new(
        "BS3",
        searches.iter().map(|s| s.to_string()),
        vec![xldist::crosslinker::ResidueSet::parse(&["K", "S", "T", "Y", "NTERM"]).unwrap()],
    )
    .unwrap()
}

/// Path of a file in `tests/files`
pub fn test_file(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/files")
        .join(name)
}
