use crate::chart::ChartSpec;
use crate::data::{ColumnType, Dataset};
use crate::error::{Error, Result};
use crate::ir::{ResolvedAesthetics, ResolvedLayer, ResolvedSpec};

/// Check a chart spec against the dataset it will draw.
///
/// Every mapped channel must name an existing column (case-insensitive);
/// value channels must be numeric. Fails with `SchemaMismatch` otherwise.
pub fn resolve_chart(spec: &ChartSpec, data: &Dataset) -> Result<ResolvedSpec> {
    spec.validate()?;

    let x_col = canonical(data, spec.aes.x.as_deref())?
        .ok_or_else(|| Error::InvalidSpec("no column mapped to x".to_string()))?;
    let y_col = canonical(data, spec.aes.y.as_deref())?;
    let ymin_col = canonical(data, spec.aes.ymin.as_deref())?;
    let ymax_col = canonical(data, spec.aes.ymax.as_deref())?;
    let series_col = canonical(data, spec.aes.series())?;

    for col in [&y_col, &ymin_col, &ymax_col].into_iter().flatten() {
        require_numeric(data, col)?;
    }

    let mut layers = Vec::with_capacity(spec.layers.len());
    for layer in &spec.layers {
        if layer.geometry.is_univariate() {
            require_numeric(data, &x_col)?;
        }
        if layer.geometry.is_distribution() && data.column_type(&x_col)? != ColumnType::Categorical {
            return Err(Error::SchemaMismatch {
                column: x_col.clone(),
                reason: format!("{} layers need a categorical x column", layer.geometry.name()),
            });
        }
        layers.push(ResolvedLayer {
            layer: layer.clone(),
            aesthetics: ResolvedAesthetics {
                x_col: x_col.clone(),
                y_col: y_col.clone(),
                ymin_col: ymin_col.clone(),
                ymax_col: ymax_col.clone(),
                series_col: series_col.clone(),
            },
        });
    }

    Ok(ResolvedSpec {
        layers,
        labels: spec.labels.clone(),
        gridlines: spec.gridlines,
        legend: spec.legend,
        x_limits: spec.x_limits,
        y_limits: spec.y_limits,
        highlight: spec.highlight.clone(),
        flip: spec.flip,
        series_colors: spec.series_colors.clone(),
    })
}

/// Column name as spelled in the dataset.
fn canonical(data: &Dataset, name: Option<&str>) -> Result<Option<String>> {
    name.map(|n| data.column_index(n).map(|idx| data.columns()[idx].clone()))
        .transpose()
}

fn require_numeric(data: &Dataset, column: &str) -> Result<()> {
    match data.column_type(column)? {
        ColumnType::Numeric => Ok(()),
        other => Err(Error::SchemaMismatch {
            column: column.to_string(),
            reason: format!("expected a numeric column, found {:?} values", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{Geometry, Layer};

    fn data() -> Dataset {
        Dataset::from_csv_reader("Species,Length\nA,1.5\nB,2.5\n".as_bytes()).unwrap()
    }

    #[test]
    fn test_resolve_canonicalizes_names() {
        let spec = ChartSpec::new().x("species").y("LENGTH").fill("species").geom(Geometry::Bar);
        let resolved = resolve_chart(&spec, &data()).unwrap();
        let aes = &resolved.layers[0].aesthetics;
        assert_eq!(aes.x_col, "Species");
        assert_eq!(aes.y_col.as_deref(), Some("Length"));
        assert_eq!(aes.series_col.as_deref(), Some("Species"));
    }

    #[test]
    fn test_missing_column_is_schema_mismatch() {
        let spec = ChartSpec::new().x("species").y("width").geom(Geometry::Bar);
        assert!(matches!(resolve_chart(&spec, &data()), Err(Error::SchemaMismatch { .. })));
    }

    #[test]
    fn test_text_y_is_schema_mismatch() {
        let spec = ChartSpec::new().x("length").y("species").geom(Geometry::Line);
        assert!(matches!(resolve_chart(&spec, &data()), Err(Error::SchemaMismatch { .. })));
    }

    #[test]
    fn test_boxplot_needs_categorical_x() {
        let spec = ChartSpec::new()
            .x("length")
            .y("length")
            .layer(Layer::new(Geometry::Boxplot));
        assert!(matches!(resolve_chart(&spec, &data()), Err(Error::SchemaMismatch { .. })));
    }
}
