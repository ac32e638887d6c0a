use std::fs;
use std::path::Path;
use std::process::{Command, Output};

/// Helper function to run the plotbook binary with arguments
fn run_plotbook(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_plotbook"))
        .args(args)
        .output()
        .expect("Failed to spawn plotbook")
}

/// Check if bytes are a valid PNG
fn is_valid_png(bytes: &[u8]) -> bool {
    bytes.len() > 8 && bytes[0..8] == [137, 80, 78, 71, 13, 10, 26, 10]
}

fn write_spec(dir: &Path, json: &str) -> String {
    let path = dir.join("spec.json");
    fs::write(&path, json).expect("Failed to write spec");
    path.to_string_lossy().into_owned()
}

#[test]
fn test_list_prints_every_recipe() {
    let output = run_plotbook(&["list"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["bar1", "box2", "line2", "dist3"] {
        assert!(stdout.contains(name), "missing {} in {}", name, stdout);
    }
    assert_eq!(stdout.lines().count(), 14);
}

#[test]
fn test_end_to_end_chart_png() {
    let dir = tempfile::tempdir().unwrap();
    let spec = write_spec(
        dir.path(),
        r#"{
            "layers": [{"geometry": "boxplot"}],
            "aes": {"x": "species", "y": "petal_width"},
            "labels": {"title": "Petal width"}
        }"#,
    );
    let out = dir.path().join("nested/box.png");
    let output = run_plotbook(&[
        "chart",
        "--data",
        "iris",
        "--spec",
        &spec,
        "--output",
        out.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let bytes = fs::read(&out).unwrap();
    assert!(is_valid_png(&bytes), "Output is not a valid PNG");
}

#[test]
fn test_end_to_end_chart_with_filter_and_svg() {
    let dir = tempfile::tempdir().unwrap();
    let spec = write_spec(
        dir.path(),
        r#"{
            "layers": [{"geometry": "line", "style": {"width": 2.0}}],
            "aes": {"x": "date", "y": "cases", "color": "country"},
            "highlight": "max > 20000"
        }"#,
    );
    let out = dir.path().join("lines.svg");
    let output = run_plotbook(&[
        "chart",
        "--data",
        "coronavirus",
        "--spec",
        &spec,
        "--filter",
        r#"type == "confirmed""#,
        "--output",
        out.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let svg = fs::read_to_string(&out).unwrap();
    assert!(svg.contains("<svg"));
    // Trimming vector output degrades to a warning on stderr
    assert!(String::from_utf8_lossy(&output.stderr).contains("trimming unavailable"));
}

#[test]
fn test_chart_unknown_column_fails() {
    let dir = tempfile::tempdir().unwrap();
    let spec = write_spec(
        dir.path(),
        r#"{"layers": [{"geometry": "bar"}], "aes": {"x": "species", "y": "stem_length"}}"#,
    );
    let out = dir.path().join("bad.png");
    let output = run_plotbook(&[
        "chart",
        "--data",
        "iris",
        "--spec",
        &spec,
        "--output",
        out.to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("stem_length"));
    assert!(!out.exists());
}

#[test]
fn test_chart_pdf_is_unsupported() {
    let dir = tempfile::tempdir().unwrap();
    let spec = write_spec(
        dir.path(),
        r#"{"layers": [{"geometry": {"histogram": {"bins": 10}}}], "aes": {"x": "sepal_width"}}"#,
    );
    let out = dir.path().join("hist.pdf");
    let output = run_plotbook(&[
        "chart",
        "--data",
        "iris",
        "--spec",
        &spec,
        "--output",
        out.to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unsupported output format"));
}

#[test]
fn test_render_selected_recipes() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_plotbook(&[
        "render",
        "bar1",
        "dist1",
        "--out-dir",
        dir.path().to_str().unwrap(),
        "--jobs",
        "1",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    for name in ["bar1.png", "dist1.png"] {
        let bytes = fs::read(dir.path().join(name)).unwrap();
        assert!(is_valid_png(&bytes));
    }
}

#[test]
fn test_render_unknown_recipe_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_plotbook(&["render", "pie9", "--out-dir", dir.path().to_str().unwrap()]);
    assert!(!output.status.success());
}
