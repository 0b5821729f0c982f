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

//! Abstract crosslinks, independent of any structure.

use crate::protein::ProteinId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of an abstract crosslink, shared by all of its structural alternatives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CrosslinkId(String);

impl CrosslinkId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for CrosslinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CrosslinkId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// One end of a crosslink: a 1-based residue in a searched protein sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkEnd {
    pub protein: ProteinId,
    pub residue: usize,
}

/// Which end of a crosslink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    From,
    To,
}

/// Residue-residue constraint derived from mass spectrometry evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Crosslink {
    pub id: CrosslinkId,
    pub from: LinkEnd,
    pub to: LinkEnd,
    /// The peptides overlap, so the link must connect two copies of the protein.
    /// Populated upstream and trusted as given.
    #[serde(default, rename = "homomultimer")]
    pub confirmed_homomultimer: bool,
}

impl Crosslink {
    pub fn new(
        id: impl Into<CrosslinkId>,
        from: (impl Into<ProteinId>, usize),
        to: (impl Into<ProteinId>, usize),
    ) -> Self {
        Self {
            id: id.into(),
            from: LinkEnd {
                protein: from.0.into(),
                residue: from.1,
            },
            to: LinkEnd {
                protein: to.0.into(),
                residue: to.1,
            },
            confirmed_homomultimer: false,
        }
    }

    /// Flag as a confirmed homomultimeric link.
    pub fn homomultimeric(mut self) -> Self {
        self.confirmed_homomultimer = true;
        self
    }
}
