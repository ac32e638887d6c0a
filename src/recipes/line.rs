use super::{Prepared, Recipe};
use crate::chart::{Axes, ChartSpec, Geometry, Layer, LegendPosition, Position};
use crate::data::Dataset;
use crate::datasets::Sources;
use crate::error::Result;
use crate::expr::Predicate;
use crate::prep::WindowAlign;

pub(super) fn recipes() -> Vec<Recipe> {
    vec![
        Recipe {
            name: "line1",
            title: "Daily confirmed cases",
            build: daily_cases,
        },
        Recipe {
            name: "line2",
            title: "Seven-day average with highlighted countries",
            build: rolling_average,
        },
        Recipe {
            name: "line3",
            title: "Cumulative confirmed cases",
            build: cumulative_cases,
        },
        Recipe {
            name: "line4",
            title: "Cumulative deaths in March",
            build: cumulative_deaths,
        },
    ]
}

const SELECTED: &str = r#"country in ["US", "Italy", "Spain", "Germany"]"#;
const CAPTION: &str = "Data: daily case counts by country";

fn confirmed(sources: &Sources) -> Result<Dataset> {
    sources.coronavirus.filter_expr(r#"type == "confirmed""#)
}

fn daily_cases(sources: &Sources) -> Result<Prepared> {
    let data = confirmed(sources)?.filter_expr(SELECTED)?;
    let spec = ChartSpec::new()
        .x("date")
        .y("cases")
        .color("country")
        .layer(Layer::new(Geometry::Line).width(1.5))
        .title("Daily confirmed cases")
        .x_label("Date")
        .y_label("New cases per day")
        .caption(CAPTION)
        .legend(LegendPosition::Top);
    Ok(Prepared { data, spec })
}

fn rolling_average(sources: &Sources) -> Result<Prepared> {
    let data = confirmed(sources)?.rolling_mean(
        "cases",
        7,
        "date",
        &["country"],
        WindowAlign::Trailing,
        "cases_7d",
    )?;
    let spec = ChartSpec::new()
        .x("date")
        .y("cases_7d")
        .color("country")
        .layer(Layer::new(Geometry::Line).width(2.0))
        .highlight(Predicate::parse("last > 1000")?)
        .title("Where cases are still high")
        .subtitle("Seven-day trailing average; countries above 1,000 daily cases at the end are labelled")
        .x_label("Date")
        .y_label("New cases per day (7-day average)")
        .caption(CAPTION)
        .gridlines(Axes::Y, Axes::None);
    Ok(Prepared { data, spec })
}

fn cumulative_cases(sources: &Sources) -> Result<Prepared> {
    let data = confirmed(sources)?
        .filter_expr(SELECTED)?
        .cumulative_sum("cases", "date", &["country"], "total")?;
    let spec = ChartSpec::new()
        .x("date")
        .y("total")
        .fill("country")
        .layer(Layer::new(Geometry::Area).alpha(0.85).position(Position::Stack))
        .y_limits(Some(0.0), None)
        .title("Cumulative confirmed cases")
        .x_label("Date")
        .y_label("Confirmed cases")
        .caption(CAPTION)
        .legend(LegendPosition::Inside);
    Ok(Prepared { data, spec })
}

fn cumulative_deaths(sources: &Sources) -> Result<Prepared> {
    let data = sources
        .coronavirus
        .filter_expr(r#"type == "death" && month(date) == 3"#)?
        .filter_expr(SELECTED)?
        .derive("day", "day(date)")?
        .cumulative_sum("cases", "date", &["country"], "deaths")?;
    let spec = ChartSpec::new()
        .x("day")
        .y("deaths")
        .color("country")
        .layer(Layer::new(Geometry::Step).width(1.5))
        .x_limits(Some(1.0), Some(31.0))
        .title("Cumulative deaths in March 2020")
        .x_label("Day of month")
        .y_label("Deaths")
        .caption(CAPTION)
        .gridlines(Axes::Both, Axes::X);
    Ok(Prepared { data, spec })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::render_chart;

    #[test]
    fn test_rolling_average_leading_gap() {
        let sources = Sources::builtin().unwrap();
        let prepared = rolling_average(&sources).unwrap();
        let us = prepared.data.filter_expr(r#"country == "US""#).unwrap();
        let smoothed = us.numeric_column("cases_7d").unwrap();
        assert!(smoothed[..6].iter().all(Option::is_none));
        assert!(smoothed[6..].iter().all(Option::is_some));
    }

    #[test]
    fn test_rolling_average_labels_highlighted_countries() {
        let sources = Sources::builtin().unwrap();
        let prepared = rolling_average(&sources).unwrap();
        let chart = render_chart(&prepared.spec, &prepared.data).unwrap();
        let mut labels: Vec<_> = chart.scene().inline_labels.iter().map(|l| l.text.clone()).collect();
        labels.sort();
        assert_eq!(labels, vec!["Brazil", "US", "United Kingdom"]);
        assert!(chart.scene().legend.is_empty());
    }

    #[test]
    fn test_cumulative_deaths_cover_march() {
        let sources = Sources::builtin().unwrap();
        let prepared = cumulative_deaths(&sources).unwrap();
        let days = prepared.data.numeric_column("day").unwrap();
        assert_eq!(days.iter().flatten().copied().fold(0.0, f64::max), 31.0);
        let totals = prepared.data.numeric_column("deaths").unwrap();
        let italy = prepared.data.filter_expr(r#"country == "Italy""#).unwrap();
        let italy_totals = italy.numeric_column("deaths").unwrap();
        assert!(italy_totals.windows(2).all(|w| w[1] >= w[0]));
        assert_eq!(totals.len(), 4 * 31);
    }
}
