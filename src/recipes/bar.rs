use super::{Prepared, Recipe};
use crate::chart::{Axes, ChartSpec, Geometry, Layer, LegendPosition};
use crate::data::Dataset;
use crate::datasets::Sources;
use crate::error::Result;
use crate::prep::Aggregation;

pub(super) fn recipes() -> Vec<Recipe> {
    vec![
        Recipe {
            name: "bar1",
            title: "Mean sepal length per species",
            build: zero_based,
        },
        Recipe {
            name: "bar2",
            title: "Mean sepal length, truncated axis",
            build: truncated,
        },
        Recipe {
            name: "bar3",
            title: "Mean sepal length with standard deviation",
            build: with_error_bars,
        },
        Recipe {
            name: "bar4",
            title: "One species highlighted",
            build: highlighted,
        },
    ]
}

fn mean_sepal_length(sources: &Sources) -> Result<Dataset> {
    sources.iris.group_aggregate(
        &["species"],
        &[
            Aggregation::mean("sepal_length", "mean_length"),
            Aggregation::sd("sepal_length", "sd_length"),
        ],
    )
}

/// Value axis runs horizontally, so its gridlines are the vertical ones.
fn horizontal_bars() -> ChartSpec {
    ChartSpec::new()
        .x("species")
        .y("mean_length")
        .geom(Geometry::Bar)
        .y_label("Mean sepal length (cm)")
        .x_label("Species")
        .gridlines(Axes::X, Axes::None)
        .legend(LegendPosition::None)
        .flip()
}

fn zero_based(sources: &Sources) -> Result<Prepared> {
    let data = mean_sepal_length(sources)?;
    let spec = horizontal_bars()
        .y_limits(Some(0.0), None)
        .title("Iris sepal length")
        .subtitle("Bars start at zero, so lengths compare honestly")
        .caption("Data: Fisher's iris");
    Ok(Prepared { data, spec })
}

fn truncated(sources: &Sources) -> Result<Prepared> {
    let data = mean_sepal_length(sources)?;
    let spec = horizontal_bars()
        .y_limits(Some(4.5), None)
        .title("Iris sepal length")
        .subtitle("A truncated axis makes virginica look four times longer")
        .caption("Data: Fisher's iris");
    Ok(Prepared { data, spec })
}

fn with_error_bars(sources: &Sources) -> Result<Prepared> {
    let data = mean_sepal_length(sources)?
        .derive("lower", "mean_length - sd_length")?
        .derive("upper", "mean_length + sd_length")?;
    let spec = ChartSpec::new()
        .x("species")
        .y("mean_length")
        .ymin("lower")
        .ymax("upper")
        .layer(Layer::new(Geometry::Bar).fill("grey70").width(0.6))
        .layer(Layer::new(Geometry::ErrorBar).color("grey20").width(1.5))
        .y_limits(Some(0.0), None)
        .title("Sepal length by species")
        .subtitle("Mean \u{b1} one standard deviation")
        .x_label("Species")
        .y_label("Sepal length (cm)")
        .gridlines(Axes::Y, Axes::None)
        .legend(LegendPosition::None);
    Ok(Prepared { data, spec })
}

fn highlighted(sources: &Sources) -> Result<Prepared> {
    let data = mean_sepal_length(sources)?.derive(
        "emphasis",
        r#"if_else(species == "virginica", "virginica", "other")"#,
    )?;
    let spec = ChartSpec::new()
        .x("species")
        .y("mean_length")
        .fill("emphasis")
        .geom(Geometry::Bar)
        .series_color("virginica", "firebrick")
        .series_color("other", "grey70")
        .y_limits(Some(0.0), None)
        .title("Virginica has the longest sepals")
        .x_label("Species")
        .y_label("Mean sepal length (cm)")
        .gridlines(Axes::Y, Axes::None)
        .legend(LegendPosition::None);
    Ok(Prepared { data, spec })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_per_species() {
        let sources = Sources::builtin().unwrap();
        let data = mean_sepal_length(&sources).unwrap();
        assert_eq!(data.len(), 3);
        let means = data.numeric_column("mean_length").unwrap();
        assert_relative_eq!(means[0].unwrap(), 5.006, epsilon = 1e-9);
        assert_relative_eq!(means[2].unwrap(), 6.588, epsilon = 1e-9);
    }

    #[test]
    fn test_highlight_column_recodes() {
        let sources = Sources::builtin().unwrap();
        let prepared = highlighted(&sources).unwrap();
        let emphasis: Vec<_> = prepared.data.column("emphasis").unwrap().into_iter().cloned().collect();
        assert_eq!(
            emphasis,
            vec![
                Value::Str("other".to_string()),
                Value::Str("other".to_string()),
                Value::Str("virginica".to_string())
            ]
        );
    }

    #[test]
    fn test_error_bars_span_mean() {
        let sources = Sources::builtin().unwrap();
        let prepared = with_error_bars(&sources).unwrap();
        let lower = prepared.data.numeric_column("lower").unwrap();
        let upper = prepared.data.numeric_column("upper").unwrap();
        let mean = prepared.data.numeric_column("mean_length").unwrap();
        for i in 0..3 {
            assert_relative_eq!(mean[i].unwrap() * 2.0, lower[i].unwrap() + upper[i].unwrap(), epsilon = 1e-9);
        }
    }
}
