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

//! Chemfiles-based reader for non-PDB formats (mmCIF, MMTF, ...).
//!
//! Every frame of the trajectory is read as one model. Residues are grouped into chains
//! using the `chainname` residue property set by chemfiles.

use super::{Structure, StructureResidue, StructureSource};
use crate::Point;
use chemfiles::{Frame, Property};
use itertools::Itertools;
use std::path::Path;

#[derive(Debug)]
pub(crate) struct ChemfilesFormat;

impl StructureSource for ChemfilesFormat {
    fn read(&self, path: &Path) -> anyhow::Result<Structure> {
        let mut trajectory = chemfiles::Trajectory::open(path, 'r')?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_uppercase();
        let mut structure = Structure::new(&name);
        let mut frame = Frame::new();
        for model in 0..trajectory.nsteps()? {
            trajectory.read_step(model, &mut frame)?;
            add_frame(&frame, model, &mut structure);
        }
        Ok(structure)
    }
}

fn add_frame(frame: &Frame, model: usize, structure: &mut Structure) {
    let topology = frame.topology();
    let positions = frame.positions();
    let residues = (0..topology.residues_count())
        .filter_map(|i| topology.residue(i))
        .map(|residue| {
            let chain_name = match residue.get("chainname") {
                Some(Property::String(name)) => name,
                _ => String::new(),
            };
            let position = residue
                .atoms()
                .into_iter()
                .find(|&atom| frame.atom(atom).name() == "CA")
                .map(|atom| Point::from(positions[atom]));
            let number = residue.id().unwrap_or_default() as i32;
            (chain_name, StructureResidue::new(&residue.name(), number, position))
        })
        .collect_vec();

    for (chain_name, chain_residues) in &residues.into_iter().group_by(|(name, _)| name.clone()) {
        let chain_residues = chain_residues.map(|(_, r)| r).collect_vec();
        structure.add_chain(&chain_name, model, chain_residues);
    }
}
