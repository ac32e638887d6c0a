use approx::assert_relative_eq;
use plotbook::artifact::{save, ArtifactOptions, OutputFormat, TrimOutcome};
use plotbook::compiler::visible_fraction;
use plotbook::datasets::Sources;
use plotbook::ir::DrawCommand;
use plotbook::labels::{place_labels, LabelRequest, PixelRect};
use plotbook::prep::{Aggregation, SortKey, WindowAlign};
use plotbook::recipes::{self, Prepared, Recipe};
use plotbook::{render_chart, ChartSpec, Dataset, Error, Geometry, Value};

fn table(csv: &str) -> Dataset {
    Dataset::from_csv_reader(csv.as_bytes()).unwrap()
}

fn numbers(data: &Dataset, column: &str) -> Vec<Option<f64>> {
    data.numeric_column(column).unwrap()
}

#[test]
fn test_groups_partition_rows() {
    let iris = Sources::builtin().unwrap().iris;
    let counts = iris
        .group_aggregate(&["species"], &[Aggregation::count("n")])
        .unwrap();
    assert_eq!(counts.len(), 3);
    let total: f64 = numbers(&counts, "n").into_iter().flatten().sum();
    assert_eq!(total as usize, iris.len());
}

#[test]
fn test_group_members_reproduce_input() {
    let iris = Sources::builtin().unwrap().iris;
    let groups = iris
        .group_aggregate(&["species"], &[Aggregation::count("n")])
        .unwrap();

    let mut regrouped = Vec::new();
    for row in groups.rows() {
        let members = iris
            .filter_expr(&format!(r#"species == "{}""#, row[0]))
            .unwrap();
        assert_eq!(Value::Num(members.len() as f64), row[1]);
        regrouped.extend(numbers(&members, "sepal_length").into_iter().flatten());
    }
    let mut original: Vec<f64> = numbers(&iris, "sepal_length").into_iter().flatten().collect();
    regrouped.sort_by(f64::total_cmp);
    original.sort_by(f64::total_cmp);
    assert_eq!(regrouped, original);
}

#[test]
fn test_mean_by_species_example() {
    let data = table("species,v\nA,5\nA,6\nB,7\n");
    let means = data
        .group_aggregate(&["species"], &[Aggregation::mean("v", "mean_v")])
        .unwrap();
    assert_eq!(means.columns(), &["species".to_string(), "mean_v".to_string()]);
    assert_eq!(means.rows()[0], vec![Value::Str("A".to_string()), Value::Num(5.5)]);
    assert_eq!(means.rows()[1], vec![Value::Str("B".to_string()), Value::Num(7.0)]);
}

#[test]
fn test_trailing_rolling_mean_example() {
    let data = table("t,v\n1,1\n2,2\n3,3\n4,4\n5,5\n6,6\n7,7\n");
    let rolled = data
        .rolling_mean("v", 3, "t", &[], WindowAlign::Trailing, "avg")
        .unwrap();
    assert_eq!(
        numbers(&rolled, "avg"),
        vec![None, None, Some(2.0), Some(3.0), Some(4.0), Some(5.0), Some(6.0)]
    );
    assert!(matches!(
        data.rolling_mean("v", 0, "t", &[], WindowAlign::Trailing, "avg"),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_cumulative_sum_example() {
    let data = table("t,g,v\n1,a,3\n1,b,10\n2,a,5\n3,a,2\n");
    let summed = data.cumulative_sum("v", "t", &["g"], "total").unwrap();
    let a = summed.filter_expr(r#"g == "a""#).unwrap();
    assert_eq!(numbers(&a, "total"), vec![Some(3.0), Some(8.0), Some(10.0)]);
}

#[test]
fn test_prep_verbs_compose() {
    let covid = Sources::builtin().unwrap().coronavirus;
    let top = covid
        .filter_expr(r#"type == "death""#)
        .unwrap()
        .group_aggregate(&["country"], &[Aggregation::sum("cases", "deaths")])
        .unwrap()
        .arrange(&[SortKey::desc("deaths")])
        .unwrap();
    assert_eq!(top.rows()[0][0], Value::Str("US".to_string()));
}

#[test]
fn test_filter_on_missing_column_is_schema_mismatch() {
    let empty = Dataset::empty(vec!["species".to_string()]);
    assert!(matches!(
        empty.filter_expr("petal_length > 1"),
        Err(Error::SchemaMismatch { .. })
    ));
}

#[test]
fn test_axis_bound_changes_rendered_ratio() {
    let data = table("species,mean\nsetosa,5.0\nvirginica,6.6\n");
    let bar_ratio = |lower: f64| {
        let spec = ChartSpec::new()
            .x("species")
            .y("mean")
            .geom(Geometry::Bar)
            .y_limits(Some(lower), None);
        let chart = render_chart(&spec, &data).unwrap();
        let scene = chart.scene();
        let heights: Vec<f64> = scene
            .commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::DrawRect { tl, br, .. } => Some(visible_fraction(&scene.y_scale, br.1, tl.1)),
                _ => None,
            })
            .collect();
        heights[1] / heights[0]
    };
    let honest = bar_ratio(0.0);
    let truncated = bar_ratio(4.5);
    assert_relative_eq!(honest, 6.6 / 5.0, epsilon = 1e-9);
    assert!(truncated > honest * 2.0);
}

#[test]
fn test_unpinned_bars_start_near_data_minimum() {
    let data = table("species,mean\nsetosa,5.0\nvirginica,6.6\n");
    let spec = ChartSpec::new().x("species").y("mean").geom(Geometry::Bar);
    let chart = render_chart(&spec, &data).unwrap();
    let (lo, hi) = chart.scene().y_scale.domain;
    assert_relative_eq!(lo, 4.92, epsilon = 1e-9);
    assert_relative_eq!(hi, 6.68, epsilon = 1e-9);
}

#[test]
fn test_label_placement_never_overlaps() {
    let requests: Vec<LabelRequest> = (0..12)
        .map(|i| LabelRequest {
            text: format!("country {}", i),
            anchor: (300.0, 100.0 + (i % 4) as f64 * 5.0),
            priority: i as f64,
        })
        .collect();
    let placed = place_labels(&requests, PixelRect::new(0.0, 0.0, 600.0, 400.0), 12.0);
    assert!(placed.len() < requests.len());
    for (i, a) in placed.iter().enumerate() {
        for b in &placed[i + 1..] {
            assert!(!a.rect.overlaps(&b.rect));
        }
    }
}

#[test]
fn test_png_trim_and_svg_degrade() {
    let dir = tempfile::tempdir().unwrap();
    let data = table("x,y\n1,1\n2,3\n3,2\n");
    let spec = ChartSpec::new().x("x").y("y").geom(Geometry::Line);
    let chart = render_chart(&spec, &data).unwrap();
    let options = ArtifactOptions {
        width: 4.0,
        height: 3.0,
        dpi: 100,
        trim: true,
        margin: 2,
    };

    let png = save(&chart, dir.path().join("line.png"), &options).unwrap();
    assert_eq!(png.format, OutputFormat::Png);
    assert!(matches!(png.trim, TrimOutcome::Trimmed { original: (400, 300) }));
    assert!(png.width_px < 400 || png.height_px < 300);
    let decoded = image::open(&png.path).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (png.width_px, png.height_px));

    let svg = save(&chart, dir.path().join("line.svg"), &options).unwrap();
    assert!(matches!(svg.trim, TrimOutcome::Unavailable(_)));
    assert_eq!((svg.width_px, svg.height_px), (400, 300));
    assert!(svg.path.exists());
}

#[test]
fn test_unwritable_target_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not_a_dir");
    std::fs::write(&blocker, "plain file").unwrap();

    let data = table("x,y\n1,1\n2,2\n");
    let chart = render_chart(&ChartSpec::new().x("x").y("y").geom(Geometry::Point), &data).unwrap();
    let result = save(&chart, blocker.join("chart.png"), &ArtifactOptions::default());
    assert!(matches!(result, Err(Error::Io { .. })));
}

#[test]
fn test_batch_isolates_failures() {
    let dir = tempfile::tempdir().unwrap();
    let sources = Sources::builtin().unwrap();

    let broken = Recipe {
        name: "broken",
        title: "References a column iris does not have",
        build: |sources| {
            Ok(Prepared {
                data: sources.iris.clone(),
                spec: ChartSpec::new().x("species").y("stem_length").geom(Geometry::Bar),
            })
        },
    };
    let batch = vec![
        recipes::find("bar1").unwrap(),
        broken,
        recipes::find("dist2").unwrap(),
    ];

    for parallel in [false, true] {
        let report = recipes::run_batch(
            &batch,
            &sources,
            dir.path(),
            OutputFormat::Svg,
            &ArtifactOptions::default(),
            parallel,
        );
        assert_eq!(report.outcomes.len(), 3);
        assert!(!report.is_success());
        let failed: Vec<_> = report.failed().map(|(name, _)| name).collect();
        assert_eq!(failed, vec!["broken"]);
        assert!(matches!(report.outcomes[1].result, Err(Error::SchemaMismatch { .. })));
        assert_eq!(report.succeeded().count(), 2);
    }
    assert!(dir.path().join("bar1.svg").exists());
    assert!(dir.path().join("dist2.svg").exists());
    assert!(!dir.path().join("broken.svg").exists());
}

#[test]
fn test_chart_spec_json_round_trip() {
    let spec = ChartSpec::new()
        .x("date")
        .y("cases")
        .color("country")
        .geom(Geometry::Line)
        .highlight(plotbook::Predicate::parse("last > 1000").unwrap());
    let json = serde_json::to_string(&spec).unwrap();
    assert!(json.contains(r#""highlight":"last > 1000""#));
    assert_eq!(ChartSpec::from_json(&json).unwrap(), spec);
}
