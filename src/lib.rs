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

//! # Crosslink distances on 3D structures
//!
//! Crosslinking mass spectrometry reports pairs of residues in searched protein
//! sequences. This crate maps them onto the chains of a structure, resolves the
//! shortest realisation among chain copies, and samples background distances
//! for comparison.

use nalgebra::Vector3;

pub type Point = Vector3<f64>;

pub mod align;
pub mod assembly;
pub mod chains;
pub mod cli;
pub mod crosslink;
pub mod crosslinker;
pub mod distances;
pub mod histogram;
pub mod input;
pub mod matrix;
pub mod model;
pub mod protein;
pub mod report;
pub mod resolver;
pub mod sampling;
pub mod spatial;
pub mod structure;

pub use self::crosslink::{Crosslink, CrosslinkId};
pub use self::distances::Distances;
pub use self::model::{DistanceSettings, StructureModel};
pub use self::resolver::{
    shortest_link_alternatives, CrosslinkResidueAlternative, DistanceOptions, XLinkDistance,
};
pub use self::structure::{ChainIndex, Structure};
