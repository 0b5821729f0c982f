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

//! Chemical specificity of crosslinkers.
//!
//! A crosslinker reacts with a set of residues at each of its two ends. Homobifunctional
//! crosslinkers (e.g. BS3, DSS) use the same set at both ends, heterobifunctional ones
//! (e.g. SDA) have two different sets.

use derive_getters::Getters;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;

/// Residues a crosslinker end can react with.
///
/// Parsed from one-letter codes plus the special tokens `NTERM` and `CTERM`.
/// `X`, `*` or an empty list matches every residue.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResidueSet {
    residues: BTreeSet<char>,
    nterm: bool,
    cterm: bool,
    wildcard: bool,
}

impl ResidueSet {
    /// Parse from a list of residue tokens such as `["K", "S", "NTERM"]`.
    pub fn parse<S: AsRef<str>>(tokens: &[S]) -> anyhow::Result<Self> {
        let mut set = Self::default();
        for token in tokens.iter().map(|t| t.as_ref().trim()) {
            match token.to_ascii_uppercase().as_str() {
                "NTERM" => set.nterm = true,
                "CTERM" => set.cterm = true,
                "X" | "*" => set.wildcard = true,
                code if code.len() == 1 && code.chars().all(|c| c.is_ascii_alphabetic()) => {
                    set.residues.extend(code.chars());
                }
                _ => anyhow::bail!("Unknown crosslinker residue specificity '{}'", token),
            }
        }
        set.wildcard |= set.residues.is_empty() && !set.nterm && !set.cterm;
        Ok(set)
    }

    /// Set matching every residue.
    pub fn any() -> Self {
        Self {
            wildcard: true,
            ..Default::default()
        }
    }

    /// True if every residue type is reactive
    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// True if the one-letter residue is reactive
    pub fn matches(&self, residue: char) -> bool {
        self.wildcard || self.residues.contains(&residue.to_ascii_uppercase())
    }

    pub fn includes_nterm(&self) -> bool {
        self.nterm
    }

    pub fn includes_cterm(&self) -> bool {
        self.cterm
    }

    fn tokens(&self) -> Vec<String> {
        let mut tokens: Vec<String> = self.residues.iter().map(|c| c.to_string()).collect();
        if self.nterm {
            tokens.push("NTERM".into());
        }
        if self.cterm {
            tokens.push("CTERM".into());
        }
        if self.wildcard {
            tokens.push("X".into());
        }
        tokens
    }
}

impl Serialize for ResidueSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.tokens().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ResidueSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tokens = Vec::<String>::deserialize(deserializer)?;
        Self::parse(&tokens).map_err(serde::de::Error::custom)
    }
}

/// Specificity of one crosslinker and the searches that used it.
#[derive(Debug, Clone, Serialize, Deserialize, Getters)]
#[serde(deny_unknown_fields)]
pub struct CrosslinkerSpecificity {
    /// Crosslinker name, e.g. _BS3_
    name: String,
    /// Identifiers of the searches using this crosslinker
    searches: BTreeSet<String>,
    /// Reactive residues; one set for homobifunctional, two for heterobifunctional crosslinkers
    #[serde(deserialize_with = "deserialize_linkables")]
    linkables: Vec<ResidueSet>,
}

fn check_linkable_count(count: usize) -> anyhow::Result<()> {
    if !(1..=2).contains(&count) {
        anyhow::bail!("expected one or two residue sets, found {}", count);
    }
    Ok(())
}

/// Deserialize residue sets and make sure there are one or two of them.
fn deserialize_linkables<'de, D>(deserializer: D) -> Result<Vec<ResidueSet>, D::Error>
where
    D: Deserializer<'de>,
{
    let linkables: Vec<ResidueSet> = Vec::deserialize(deserializer)?;
    check_linkable_count(linkables.len()).map_err(serde::de::Error::custom)?;
    Ok(linkables)
}

impl CrosslinkerSpecificity {
    pub fn new(
        name: &str,
        searches: impl IntoIterator<Item = String>,
        linkables: Vec<ResidueSet>,
    ) -> anyhow::Result<Self> {
        let specificity = Self {
            name: name.to_string(),
            searches: searches.into_iter().collect(),
            linkables,
        };
        specificity.check()?;
        Ok(specificity)
    }

    /// Homobifunctional crosslinker reacting with `residues` at both ends.
    pub fn homobifunctional(name: &str, search: &str, residues: &[&str]) -> anyhow::Result<Self> {
        Self::new(name, [search.to_string()], vec![ResidueSet::parse(residues)?])
    }

    pub(crate) fn check(&self) -> anyhow::Result<()> {
        check_linkable_count(self.linkables.len())
            .map_err(|err| anyhow::anyhow!("Crosslinker '{}': {}", self.name, err))
    }

    /// True if the two ends react with different residue sets
    pub fn is_heterobifunctional(&self) -> bool {
        self.linkables.len() == 2 && self.linkables[0] != self.linkables[1]
    }

    /// Residue sets of the two ends; a homobifunctional set is mirrored.
    pub fn ends(&self) -> (&ResidueSet, &ResidueSet) {
        let first = &self.linkables[0];
        (first, self.linkables.get(1).unwrap_or(first))
    }

    /// Number of searches using this crosslinker
    pub fn search_count(&self) -> usize {
        self.searches.len()
    }
}

/// All crosslinker specificities of a data set.
#[derive(Debug, Clone, Default)]
pub struct CrosslinkerSpecificityStore {
    specificities: Vec<CrosslinkerSpecificity>,
}

impl CrosslinkerSpecificityStore {
    pub fn new(specificities: Vec<CrosslinkerSpecificity>) -> anyhow::Result<Self> {
        specificities.iter().try_for_each(|s| s.check())?;
        Ok(Self { specificities })
    }

    pub fn specificities(&self) -> &[CrosslinkerSpecificity] {
        &self.specificities
    }

    /// Crosslinkers used by a given search
    pub fn for_search<'a>(
        &'a self,
        search: &'a str,
    ) -> impl Iterator<Item = &'a CrosslinkerSpecificity> + 'a {
        self.specificities
            .iter()
            .filter(move |s| s.searches.contains(search))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_residue_set() {
        let set = ResidueSet::parse(&["K", "s", "NTERM"]).unwrap();
        assert!(set.matches('K'));
        assert!(set.matches('S'));
        assert!(!set.matches('T'));
        assert!(set.includes_nterm());
        assert!(!set.includes_cterm());
        assert!(!set.is_wildcard());
    }

    #[test]
    fn wildcard_sets() {
        assert!(ResidueSet::parse(&["X"]).unwrap().matches('W'));
        assert!(ResidueSet::parse(&["*"]).unwrap().is_wildcard());
        assert!(ResidueSet::parse::<&str>(&[]).unwrap().is_wildcard());
        // a terminus-only set is not a wildcard
        assert!(!ResidueSet::parse(&["CTERM"]).unwrap().is_wildcard());
        assert!(ResidueSet::parse(&["LYS"]).is_err());
    }

    #[test]
    fn heterobifunctional_ends() {
        let sda = CrosslinkerSpecificity::new(
            "SDA",
            ["s1".to_string()],
            vec![
                ResidueSet::parse(&["K", "S", "T", "Y"]).unwrap(),
                ResidueSet::any(),
            ],
        )
        .unwrap();
        assert!(sda.is_heterobifunctional());
        let (a, b) = sda.ends();
        assert!(!a.matches('A'));
        assert!(b.matches('A'));

        let bs3 = CrosslinkerSpecificity::homobifunctional("BS3", "s2", &["K"]).unwrap();
        assert!(!bs3.is_heterobifunctional());
        let (a, b) = bs3.ends();
        assert_eq!(a, b);
    }

    #[test]
    fn yaml_round_trip() {
        let yaml = "name: BS3\nsearches: [s1, s2]\nlinkables: [[K, S, T, Y, NTERM]]\n";
        let bs3: CrosslinkerSpecificity = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(bs3.search_count(), 2);
        assert!(bs3.ends().0.includes_nterm());
        let store = CrosslinkerSpecificityStore::new(vec![bs3]).unwrap();
        assert_eq!(store.for_search("s2").count(), 1);
        assert_eq!(store.for_search("s3").count(), 0);

        assert!(CrosslinkerSpecificity::new("BAD", ["s1".to_string()], vec![]).is_err());
    }

    #[test]
    fn residue_set_count_checked_on_deserialize() {
        let empty = "name: BAD\nsearches: [s1]\nlinkables: []\n";
        let err = serde_yaml::from_str::<CrosslinkerSpecificity>(empty).unwrap_err();
        assert!(err.to_string().contains("one or two residue sets"));

        let three = "name: BAD\nsearches: [s1]\nlinkables: [[K], [S], [T]]\n";
        assert!(serde_yaml::from_str::<CrosslinkerSpecificity>(three).is_err());

        let sda = "name: SDA\nsearches: [s1]\nlinkables: [[K, S, T, Y], [X]]\n";
        let sda: CrosslinkerSpecificity = serde_yaml::from_str(sda).unwrap();
        assert!(sda.ends().1.is_wildcard());
    }
}
