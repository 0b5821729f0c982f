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

//! Report written for the trimer in `tests/files`.

mod common;

use common::test_file;
use flate2::read::GzDecoder;
use serde_yaml::Value;
use std::io::Read;
use std::process::Command;
use xldist::input::Input;

fn read_report(path: &std::path::Path) -> Value {
    serde_yaml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn trimer_report() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("report.yaml");
    xldist::cli::run(&test_file("trimer.yaml"), &output, true).unwrap();
    let report = read_report(&output);

    assert_eq!(report["structure"], "XLTR");
    // assembly 1 holds chains A and B of the single model
    let permitted: Vec<&str> = report["permitted_chains"]
        .as_sequence()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(permitted, vec!["A/0", "B/0"]);

    let coverage = &report["coverage"];
    assert_eq!(coverage["total"].as_u64(), Some(3));
    assert_eq!(coverage["full"].as_u64(), Some(2));
    assert_eq!(coverage["half"].as_u64(), Some(1));
    assert_eq!(coverage["unresolved"].as_u64(), Some(0));

    let crosslinks = report["crosslinks"].as_sequence().unwrap();
    assert_eq!(crosslinks.len(), 3);
    let intra = &crosslinks[0]["alternatives"][0];
    assert_eq!(intra["from"]["chain"], intra["to"]["chain"]);
    assert_eq!(intra["from"]["residue"].as_u64(), Some(2));
    assert_eq!(intra["to"]["residue"].as_u64(), Some(8));
    let homomultimer = &crosslinks[1]["alternatives"][0];
    assert_ne!(homomultimer["from"]["chain"], homomultimer["to"]["chain"]);
    assert!(crosslinks[2]["distance"].is_null());

    let half_links = report["half_links"].as_sequence().unwrap();
    assert_eq!(half_links.len(), 2);
    assert!(half_links.iter().all(|h| h["end"] == "from" && h["id"] == "3"));

    let sampling = &report["sampling"];
    assert_eq!(sampling["requested"].as_u64(), Some(50));
    assert!(sampling["sampled"].as_u64().unwrap() > 0);
    assert_eq!(
        sampling["background"]["counts"].as_sequence().unwrap().len(),
        30
    );
}

#[test]
fn compressed_report_without_sampling() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("report.yaml.gz");
    xldist::cli::run(&test_file("trimer.yaml"), &output, false).unwrap();
    let mut yaml = String::new();
    GzDecoder::new(std::fs::File::open(&output).unwrap())
        .read_to_string(&mut yaml)
        .unwrap();
    let report: Value = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(report["coverage"]["full"].as_u64(), Some(2));
    assert!(report.get("sampling").is_none());
}

#[test]
fn relative_structure_path() {
    let input = Input::from_file(test_file("trimer.yaml")).unwrap();
    assert_eq!(input.structure.file, test_file("trimer.pdb"));
    let model = input.build_model().unwrap();
    assert_eq!(model.structure().chains().len(), 3);
    assert_eq!(model.distances().viable_chains().len(), 2);
}

#[test]
fn binary_reports_errors() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("report.yaml");
    let status = Command::new(env!("CARGO_BIN_EXE_xldist"))
        .arg("-o")
        .arg(&output)
        .arg("run")
        .arg("-i")
        .arg(test_file("trimer.yaml"))
        .arg("--no-sampling")
        .status()
        .unwrap();
    assert!(status.success());
    assert!(read_report(&output)["sampling"].is_null());

    let missing = Command::new(env!("CARGO_BIN_EXE_xldist"))
        .arg("-o")
        .arg(dir.path().join("missing.yaml"))
        .arg("run")
        .arg("-i")
        .arg(dir.path().join("no_such_input.yaml"))
        .output()
        .unwrap();
    assert_eq!(missing.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&missing.stderr).starts_with("Error:"));
}
