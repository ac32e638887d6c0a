use super::{Prepared, Recipe};
use crate::chart::{Axes, ChartSpec, Geometry, Layer, LegendPosition};
use crate::datasets::Sources;
use crate::error::Result;

pub(super) fn recipes() -> Vec<Recipe> {
    vec![
        Recipe {
            name: "dist1",
            title: "Sepal length histogram",
            build: histogram,
        },
        Recipe {
            name: "dist2",
            title: "Petal length density by species",
            build: density,
        },
        Recipe {
            name: "dist3",
            title: "Sepal length ECDF by species",
            build: ecdf,
        },
    ]
}

fn histogram(sources: &Sources) -> Result<Prepared> {
    let spec = ChartSpec::new()
        .x("sepal_length")
        .layer(
            Layer::new(Geometry::Histogram { bins: 20 })
                .fill("steelblue")
                .color("white"),
        )
        .y_limits(Some(0.0), None)
        .title("Distribution of sepal length")
        .subtitle("All 150 flowers, 20 bins")
        .x_label("Sepal length (cm)")
        .y_label("Count")
        .gridlines(Axes::Both, Axes::Both)
        .caption("Data: Fisher's iris");
    Ok(Prepared {
        data: sources.iris.clone(),
        spec,
    })
}

fn density(sources: &Sources) -> Result<Prepared> {
    let spec = ChartSpec::new()
        .x("petal_length")
        .fill("species")
        .layer(Layer::new(Geometry::Density).alpha(0.4))
        .y_limits(Some(0.0), None)
        .title("Petal length by species")
        .subtitle("Gaussian kernel density, Silverman bandwidth")
        .x_label("Petal length (cm)")
        .y_label("Density")
        .legend(LegendPosition::Inside);
    Ok(Prepared {
        data: sources.iris.clone(),
        spec,
    })
}

fn ecdf(sources: &Sources) -> Result<Prepared> {
    let spec = ChartSpec::new()
        .x("sepal_length")
        .color("species")
        .layer(Layer::new(Geometry::Ecdf).width(1.5))
        .y_limits(Some(0.0), Some(1.0))
        .title("Cumulative distribution of sepal length")
        .x_label("Sepal length (cm)")
        .y_label("Share of flowers at or below")
        .gridlines(Axes::Both, Axes::Both)
        .legend(LegendPosition::Bottom);
    Ok(Prepared {
        data: sources.iris.clone(),
        spec,
    })
}
