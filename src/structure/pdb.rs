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

//! Native PDB reader.
//!
//! Reads HEADER, REMARK 350 (biological assemblies), MODEL/ENDMDL, TER, ATOM and HETATM
//! records. All models are kept; each chain of each model becomes a separate
//! [`Chain`](super::Chain).
//! HETATM records are only kept for modified residues with a known one-letter code
//! (e.g. _MSE_) so that waters and ligands do not end up in chain sequences.

use super::{residue_name_to_letter, Structure, StructureResidue, StructureSource};
use crate::Point;
use std::path::Path;

/// Atom names used as residue position, in order of preference.
const REPRESENTATIVE_ATOMS: [&str; 3] = ["CA", "C4'", "P"];

#[derive(Debug)]
pub struct PdbFormat;

impl StructureSource for PdbFormat {
    fn read(&self, path: &Path) -> anyhow::Result<Structure> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot open '{}': {}", path.display(), e))?;
        let mut structure = parse_pdb(&text)
            .map_err(|e| anyhow::anyhow!("{} in {}", e, path.display()))?;
        if structure.name().is_empty() {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                structure.set_name(&stem.to_uppercase());
            }
        }
        Ok(structure)
    }
}

/// Parse PDB formatted text into a [`Structure`].
///
/// Errors if no ATOM records are found or if a coordinate record is malformed.
pub fn parse_pdb(text: &str) -> anyhow::Result<Structure> {
    let mut structure = Structure::new("");
    let mut chain: Option<ChainBuilder> = None;
    let mut model = 0;
    let mut num_model_records = 0;
    let mut biomolecule: Option<String> = None;
    let mut num_atoms = 0;

    for (line_number, line) in text.lines().enumerate() {
        let record = line.get(0..6).unwrap_or(line).trim_end();
        match record {
            "HEADER" => {
                if let Some(id) = field(line, 62, 66) {
                    structure.set_name(id);
                }
            }
            "REMARK" if field(line, 7, 10) == Some("350") => {
                parse_remark_350(line, &mut biomolecule, &mut structure);
            }
            "MODEL" => {
                flush(&mut chain, &mut structure);
                model = num_model_records;
                num_model_records += 1;
            }
            "ENDMDL" | "TER" => flush(&mut chain, &mut structure),
            "ATOM" | "HETATM" => {
                let atom = AtomRecord::parse(line)
                    .map_err(|e| anyhow::anyhow!("{} on line {}", e, line_number + 1))?;
                if record == "HETATM" && residue_name_to_letter(atom.residue_name).is_none() {
                    continue;
                }
                if atom.alt_loc.is_some_and(|c| c != 'A') {
                    continue;
                }
                num_atoms += 1;
                if chain.as_ref().is_some_and(|c| c.name != atom.chain_name) {
                    flush(&mut chain, &mut structure);
                }
                chain
                    .get_or_insert_with(|| ChainBuilder::new(atom.chain_name, model))
                    .add_atom(&atom);
            }
            _ => {}
        }
    }
    flush(&mut chain, &mut structure);

    if num_atoms == 0 {
        anyhow::bail!("No ATOM records found");
    }
    Ok(structure)
}

/// Trimmed, non-empty fixed-width field
fn field(line: &str, start: usize, end: usize) -> Option<&str> {
    let end = end.min(line.len());
    line.get(start..end)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn flush(chain: &mut Option<ChainBuilder>, structure: &mut Structure) {
    if let Some(builder) = chain.take() {
        builder.finish(structure);
    }
}

/// Collect chain names of biological assemblies.
///
/// ~~~text
/// REMARK 350 BIOMOLECULE: 1
/// REMARK 350 APPLY THE FOLLOWING TO CHAINS: A, B
/// REMARK 350                    AND CHAINS: C
/// ~~~
fn parse_remark_350(line: &str, biomolecule: &mut Option<String>, structure: &mut Structure) {
    let content = line.get(10..).unwrap_or_default().trim();
    if let Some(id) = content.strip_prefix("BIOMOLECULE:") {
        *biomolecule = Some(id.trim().to_string());
        return;
    }
    let chain_list = content
        .strip_prefix("APPLY THE FOLLOWING TO CHAINS:")
        .or_else(|| content.strip_prefix("AND CHAINS:"));
    if let (Some(key), Some(chain_list)) = (biomolecule.as_deref(), chain_list) {
        let names = chain_list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        structure.add_assembly(key, names);
    }
}

/// Fields of an ATOM/HETATM record needed to place residues.
#[derive(Debug)]
struct AtomRecord<'a> {
    name: &'a str,
    alt_loc: Option<char>,
    residue_name: &'a str,
    chain_name: &'a str,
    residue_number: i32,
    insertion_code: Option<char>,
    position: Point,
}

impl<'a> AtomRecord<'a> {
    fn parse(line: &'a str) -> anyhow::Result<Self> {
        if line.len() < 54 {
            anyhow::bail!("Coordinate record too short ({} chars)", line.len());
        }
        let char_at = |i: usize| {
            line.get(i..i + 1)
                .and_then(|s| s.chars().next())
                .filter(|c| *c != ' ')
        };
        let coordinate = |start: usize, axis: &str| -> anyhow::Result<f64> {
            field(line, start, start + 8)
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| anyhow::anyhow!("Invalid {} coordinate", axis))
        };
        let residue_number = field(line, 22, 26)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| anyhow::anyhow!("Invalid residue number"))?;
        Ok(Self {
            name: field(line, 12, 16).unwrap_or_default(),
            alt_loc: char_at(16),
            residue_name: field(line, 17, 20).unwrap_or_default(),
            chain_name: field(line, 21, 22).unwrap_or_default(),
            residue_number,
            insertion_code: char_at(26),
            position: Point::new(coordinate(30, "x")?, coordinate(38, "y")?, coordinate(46, "z")?),
        })
    }
}

/// Residue under construction
#[derive(Debug)]
struct ResidueBuilder {
    name: String,
    number: i32,
    insertion_code: Option<char>,
    /// Best representative atom so far as (preference rank, position)
    representative: Option<(usize, Point)>,
}

impl ResidueBuilder {
    fn finish(self) -> StructureResidue {
        StructureResidue::new(&self.name, self.number, self.representative.map(|(_, p)| p))
            .with_insertion_code(self.insertion_code)
    }
}

/// Chain under construction
#[derive(Debug)]
struct ChainBuilder {
    name: String,
    model: usize,
    residues: Vec<StructureResidue>,
    current: Option<ResidueBuilder>,
}

impl ChainBuilder {
    fn new(name: &str, model: usize) -> Self {
        Self {
            name: name.to_string(),
            model,
            residues: Vec::new(),
            current: None,
        }
    }

    fn add_atom(&mut self, atom: &AtomRecord) {
        let same_residue = self.current.as_ref().is_some_and(|r| {
            r.number == atom.residue_number && r.insertion_code == atom.insertion_code
        });
        if !same_residue {
            if let Some(residue) = self.current.take() {
                self.residues.push(residue.finish());
            }
        }
        let residue = self.current.get_or_insert_with(|| ResidueBuilder {
            name: atom.residue_name.to_string(),
            number: atom.residue_number,
            insertion_code: atom.insertion_code,
            representative: None,
        });
        if let Some(rank) = REPRESENTATIVE_ATOMS.iter().position(|n| *n == atom.name) {
            if residue.representative.map_or(true, |(best, _)| rank < best) {
                residue.representative = Some((rank, atom.position));
            }
        }
    }

    fn finish(mut self, structure: &mut Structure) {
        if let Some(residue) = self.current.take() {
            self.residues.push(residue.finish());
        }
        if !self.residues.is_empty() {
            structure.add_chain(&self.name, self.model, self.residues);
        }
    }
}
