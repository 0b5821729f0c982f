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

//! YAML report of crosslink distances on a structure.

use crate::chains::ChainRegistry;
use crate::crosslink::{CrosslinkId, Side};
use crate::crosslinker::CrosslinkerSpecificityStore;
use crate::histogram::DistanceHistogram;
use crate::input::SamplingInput;
use crate::model::StructureModel;
use crate::resolver::{
    compare_alternatives, is_valid_distance, Coverage, CrosslinkResidueAlternative, LinkResidue,
};
use average::{Estimate, Mean};
use flate2::{write::GzEncoder, Compression};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Crosslinked residue as it appears in the report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResidueReport {
    pub chain: String,
    pub model: usize,
    pub protein: String,
    /// 1-based search residue
    pub residue: usize,
}

impl ResidueReport {
    fn new(registry: &ChainRegistry, residue: &LinkResidue) -> Self {
        Self {
            chain: registry
                .chain(residue.chain())
                .map(|c| c.name().clone())
                .unwrap_or_default(),
            model: residue.model,
            protein: residue.protein.to_string(),
            residue: residue.search_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlternativeReport {
    pub from: ResidueReport,
    pub to: ResidueReport,
    pub distance: f64,
}

/// Distance of one crosslink with all its retained alternatives, shortest first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrosslinkReport {
    pub id: CrosslinkId,
    pub distance: Option<f64>,
    pub alternatives: Vec<AlternativeReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HalfLinkReport {
    pub id: CrosslinkId,
    pub end: Side,
    pub residue: ResidueReport,
}

/// Observed and background distance distributions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamplingReport {
    pub requested: usize,
    pub sampled: usize,
    pub mean_sampled_distance: Option<f64>,
    pub mean_observed_distance: Option<f64>,
    pub background: DistanceHistogram,
    pub observed: DistanceHistogram,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub structure: String,
    pub permitted_chains: Vec<String>,
    pub coverage: Coverage,
    pub crosslinks: Vec<CrosslinkReport>,
    pub half_links: Vec<HalfLinkReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingReport>,
}

fn mean(values: &[f64]) -> Option<f64> {
    let mut mean = Mean::new();
    values.iter().for_each(|&v| mean.add(v));
    (!values.is_empty()).then(|| mean.mean())
}

impl Report {
    /// Report the current links of a model, and optionally sample background distances.
    pub fn new(
        model: &StructureModel,
        crosslinkers: &CrosslinkerSpecificityStore,
        sampling: Option<&SamplingInput>,
    ) -> anyhow::Result<Self> {
        let registry = model.distances().registry();
        let alternative = |a: &CrosslinkResidueAlternative| AlternativeReport {
            from: ResidueReport::new(registry, &a.residue_a),
            to: ResidueReport::new(registry, &a.residue_b),
            distance: a.distance,
        };

        let crosslinks: Vec<CrosslinkReport> = model
            .crosslinks()
            .iter()
            .map(|crosslink| {
                let mut alternatives: Vec<&CrosslinkResidueAlternative> = model
                    .alternatives()
                    .iter()
                    .filter(|a| a.orig_id == crosslink.id)
                    .collect();
                alternatives.sort_by(|a, b| compare_alternatives(a, b));
                CrosslinkReport {
                    id: crosslink.id.clone(),
                    distance: alternatives.first().map(|a| a.distance),
                    alternatives: alternatives.into_iter().map(&alternative).collect(),
                }
            })
            .collect();

        let half_links = model
            .half_links()
            .iter()
            .map(|h| HalfLinkReport {
                id: h.orig_id.clone(),
                end: h.end,
                residue: ResidueReport::new(registry, &h.residue),
            })
            .collect();

        let permitted_chains = model
            .distances()
            .viable_chains()
            .into_iter()
            .filter_map(|index| registry.chain(index))
            .map(|c| format!("{}/{}", c.name(), c.model()))
            .collect();

        let sampling = match sampling {
            Some(input) => {
                let observed: Vec<f64> = crosslinks
                    .iter()
                    .filter_map(|c| c.distance)
                    .filter(|&d| is_valid_distance(d))
                    .collect();
                Some(Self::sample(model, crosslinkers, input, &observed)?)
            }
            None => None,
        };

        Ok(Self {
            structure: model.structure().name().clone(),
            permitted_chains,
            coverage: model.coverage(),
            crosslinks,
            half_links,
            sampling,
        })
    }

    fn sample(
        model: &StructureModel,
        crosslinkers: &CrosslinkerSpecificityStore,
        input: &SamplingInput,
        observed: &[f64],
    ) -> anyhow::Result<SamplingReport> {
        let sampled =
            model.sample_distances(input.count, crosslinkers.specificities(), &input.scope())?;
        let binning = input.binning();
        Ok(SamplingReport {
            requested: input.count,
            sampled: sampled.len(),
            mean_sampled_distance: mean(&sampled),
            mean_observed_distance: mean(observed),
            background: DistanceHistogram::from_distances(&binning, sampled.iter().copied())?,
            observed: DistanceHistogram::from_distances(&binning, observed.iter().copied())?,
        })
    }

    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Write as YAML; paths ending with `.gz` are gzip compressed.
    pub fn write(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let yaml = self.to_yaml()?;
        let file = std::fs::File::create(path)
            .map_err(|err| anyhow::anyhow!("Cannot create {}: {}", path.display(), err))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("gz") => {
                let mut encoder = GzEncoder::new(file, Compression::default());
                encoder.write_all(yaml.as_bytes())?;
                encoder.finish()?;
            }
            _ => {
                let mut file = file;
                file.write_all(yaml.as_bytes())?;
            }
        }
        log::info!("Wrote report to {}", path.display());
        Ok(())
    }
}
