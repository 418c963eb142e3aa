use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

#[test]
fn generates_svg_from_json_file() -> Result<(), Box<dyn std::error::Error>> {
    let input = fixture("shop.json");
    assert!(input.exists(), "fixture diagram should exist");

    let tmp = tempdir()?;
    let output_path = tmp.path().join("diagram.svg");

    let mut cmd = Command::cargo_bin("archcanvas")?;
    cmd.arg("--input")
        .arg(&input)
        .arg("--output")
        .arg(&output_path)
        .arg("--output-format")
        .arg("svg");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("diagram"));

    let svg_contents = fs::read_to_string(&output_path)?;
    assert!(
        svg_contents.contains("<svg"),
        "output should contain an <svg> element"
    );
    assert!(
        svg_contents.contains("card-mandatory-one-start"),
        "ER edge should use crow's-foot markers"
    );

    Ok(())
}

#[test]
fn converts_json_to_xml_and_back() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let xml_path = tmp.path().join("shop.xml");

    Command::cargo_bin("archcanvas")?
        .arg("convert")
        .arg("--input")
        .arg(fixture("shop.json"))
        .arg("--to")
        .arg("xml")
        .arg("--output")
        .arg(&xml_path)
        .assert()
        .success();

    let xml = fs::read_to_string(&xml_path)?;
    assert!(xml.contains("<mxGraphModel>"));
    assert!(xml.contains("cardinality=mandatory-one-to-many;"));

    let json_path = tmp.path().join("shop.json");
    Command::cargo_bin("archcanvas")?
        .arg("convert")
        .arg("--input")
        .arg(&xml_path)
        .arg("--to")
        .arg("json")
        .arg("--output")
        .arg(&json_path)
        .assert()
        .success();

    let json = fs::read_to_string(&json_path)?;
    assert!(json.contains("\"mandatory-one-to-many\""));

    Ok(())
}

#[test]
fn check_accepts_a_valid_diagram() -> Result<(), Box<dyn std::error::Error>> {
    Command::cargo_bin("archcanvas")?
        .arg("check")
        .arg("--input")
        .arg(fixture("shop.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("3 nodes, 2 edges"));

    Ok(())
}

#[test]
fn check_rejects_a_dangling_edge() -> Result<(), Box<dyn std::error::Error>> {
    Command::cargo_bin("archcanvas")?
        .arg("check")
        .arg("--input")
        .arg(fixture("dangling.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("ghost"));

    Ok(())
}

#[test]
fn render_reads_stdin_and_writes_stdout() -> Result<(), Box<dyn std::error::Error>> {
    let payload = fs::read_to_string(fixture("shop.json"))?;

    Command::cargo_bin("archcanvas")?
        .arg("--input")
        .arg("-")
        .arg("--output")
        .arg("-")
        .write_stdin(payload)
        .assert()
        .success()
        .stdout(predicate::str::contains("<svg"));

    Ok(())
}
