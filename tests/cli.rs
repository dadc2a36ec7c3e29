use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/input/tree.json")
}

#[test]
fn generates_svg_from_tree_listing() -> Result<(), Box<dyn std::error::Error>> {
    let fixture = fixture();
    assert!(fixture.exists(), "fixture tree listing should exist");

    let tmp = tempdir()?;
    let output_path = tmp.path().join("tree.svg");

    let mut cmd = Command::cargo_bin("oxtree")?;
    cmd.arg("--input")
        .arg(&fixture)
        .arg("--output")
        .arg(&output_path)
        .arg("--output-format")
        .arg("svg");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Generated tree diagram"));

    let svg_contents = fs::read_to_string(&output_path)?;
    assert!(
        svg_contents.contains("<svg"),
        "output should contain an <svg> element"
    );
    assert!(svg_contents.contains("guide.md"));

    Ok(())
}

#[test]
fn hide_and_highlight_flags_shape_the_output() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempdir()?;
    let output_path = tmp.path().join("tree.svg");

    Command::cargo_bin("oxtree")?
        .arg("render")
        .arg("-i")
        .arg(fixture())
        .arg("-o")
        .arg(&output_path)
        .arg("--hide")
        .arg("src/layout")
        .arg("--highlight")
        .arg("readme")
        .arg("--name")
        .arg("octo/sample")
        .arg("-q")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let svg = fs::read_to_string(&output_path)?;
    assert!(!svg.contains("tidy.rs"));
    assert!(svg.contains("octo/sample"));
    assert_eq!(svg.matches("class=\"blink\"").count(), 1);
    Ok(())
}

#[test]
fn reads_plain_path_list_from_stdin() -> Result<(), Box<dyn std::error::Error>> {
    Command::cargo_bin("oxtree")?
        .arg("-i")
        .arg("-")
        .write_stdin("src/\nsrc/lib.rs\nCargo.toml\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("<svg").and(predicate::str::contains("lib.rs")));
    Ok(())
}

#[test]
fn missing_input_file_fails() -> Result<(), Box<dyn std::error::Error>> {
    Command::cargo_bin("oxtree")?
        .arg("-i")
        .arg("does/not/exist.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
    Ok(())
}

#[test]
fn malformed_json_listing_fails() -> Result<(), Box<dyn std::error::Error>> {
    Command::cargo_bin("oxtree")?
        .arg("-i")
        .arg("-")
        .arg("-o")
        .arg("-")
        .write_stdin("{\"message\": \"Not Found\"}")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to decode tree listing"));
    Ok(())
}

#[test]
fn undecodable_entries_are_skipped() -> Result<(), Box<dyn std::error::Error>> {
    Command::cargo_bin("oxtree")?
        .arg("-i")
        .arg("-")
        .write_stdin(
            r#"{"tree": [
                {"path": "docs/guide.md", "type": "blob"},
                {"path": "shortcut-to-docs", "type": "symlink"},
                {"type": "blob"}
            ]}"#,
        )
        .assert()
        .success()
        .stdout(
            predicate::str::contains("guide.md")
                .and(predicate::str::contains("shortcut-to-docs").not()),
        );
    Ok(())
}
