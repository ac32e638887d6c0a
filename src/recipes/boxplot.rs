use super::{Prepared, Recipe};
use crate::chart::{Axes, ChartSpec, Geometry, Layer, LegendPosition};
use crate::datasets::Sources;
use crate::error::Result;

pub(super) fn recipes() -> Vec<Recipe> {
    vec![
        Recipe {
            name: "box1",
            title: "Petal length boxplot",
            build: boxplot,
        },
        Recipe {
            name: "box2",
            title: "Violin with boxplot",
            build: violin_and_box,
        },
        Recipe {
            name: "box3",
            title: "Boxplot with raw observations",
            build: box_and_points,
        },
    ]
}

fn petal_length() -> ChartSpec {
    ChartSpec::new()
        .x("species")
        .y("petal_length")
        .x_label("Species")
        .y_label("Petal length (cm)")
        .gridlines(Axes::Y, Axes::None)
        .caption("Data: Fisher's iris")
}

fn boxplot(sources: &Sources) -> Result<Prepared> {
    let spec = petal_length()
        .layer(Layer::new(Geometry::Boxplot).fill("grey85").color("grey20"))
        .title("Petal length by species")
        .subtitle("Box spans the quartiles; whiskers reach 1.5 IQR");
    Ok(Prepared {
        data: sources.iris.clone(),
        spec,
    })
}

fn violin_and_box(sources: &Sources) -> Result<Prepared> {
    let spec = petal_length()
        .fill("species")
        .layer(Layer::new(Geometry::Violin).alpha(0.45).width(0.9))
        .layer(Layer::new(Geometry::Boxplot).fill("white").color("grey20").width(0.12))
        .title("Petal length by species")
        .subtitle("Density outline with the five-number summary inside")
        .legend(LegendPosition::None);
    Ok(Prepared {
        data: sources.iris.clone(),
        spec,
    })
}

fn box_and_points(sources: &Sources) -> Result<Prepared> {
    let spec = petal_length()
        .color("species")
        .layer(Layer::new(Geometry::Boxplot).fill("white").color("grey40").width(0.5))
        .layer(Layer::new(Geometry::Point).alpha(0.5).size(2.5))
        .title("Petal length by species")
        .subtitle("Every measurement drawn over its summary")
        .legend(LegendPosition::Bottom);
    Ok(Prepared {
        data: sources.iris.clone(),
        spec,
    })
}
