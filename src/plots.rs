// src/plots.rs
// CHART RENDERING
// Bar charts over the summary table, each written as PNG and SVG. Chart data is
// assembled first (pure, testable) and then handed to a backend-generic painter.

use std::fs;
use std::path::{Path, PathBuf};

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::aggregate::{mean, SummaryRow};
use crate::error::Result;
use crate::scenarios::{Condition, Context, Split};

const STEELBLUE: RGBColor = RGBColor(70, 130, 180);
const INDIANRED: RGBColor = RGBColor(205, 92, 92);
const CONTEXT_COLORS: [RGBColor; 2] = [RGBColor(31, 119, 180), RGBColor(255, 127, 14)];

/// Share of a group slot covered by its bars.
const GROUP_WIDTH: f64 = 0.8;
const ACCEPT_Y_MAX: f64 = 1.1;

const SINGLE_SIZE: (u32, u32) = (1000, 600);
const FACET_SIZE: (u32, u32) = (1200, 960);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub value: f64,
    pub sd: Option<f64>,
}

/// One hue: a bar (or a gap) per group.
#[derive(Debug, Clone)]
pub struct Series {
    pub name: String,
    pub color: RGBColor,
    pub bars: Vec<Option<Bar>>,
}

#[derive(Debug, Clone)]
pub struct BarChart {
    pub title: String,
    pub x_desc: String,
    pub y_desc: String,
    pub groups: Vec<String>,
    pub series: Vec<Series>,
    pub y_max: f64,
}

enum Figure {
    Single(BarChart),
    Facets { title: String, panels: Vec<BarChart> },
}

fn bar_width(n_hues: usize) -> f64 {
    GROUP_WIDTH / n_hues.max(1) as f64
}

/// (left, center, right) of the bar for hue `hue` in group `group`.
pub fn bar_span(group: usize, hue: usize, n_hues: usize) -> (f64, f64, f64) {
    let width = bar_width(n_hues);
    let offset = hue as f64 - (n_hues.max(1) - 1) as f64 / 2.0;
    let center = group as f64 + offset * width;
    (center - width / 2.0, center, center + width / 2.0)
}

/// Stem, lower cap and upper cap of an error bar, clipped to the y range.
/// `None` when the bar carries no SD.
pub fn error_bar_segments(center: f64, bar: Bar, cap: f64, y_max: f64) -> Option<[Vec<(f64, f64)>; 3]> {
    let sd = bar.sd?;
    let lo = (bar.value - sd).max(0.0);
    let hi = (bar.value + sd).min(y_max);
    Some([
        vec![(center, lo), (center, hi)],
        vec![(center - cap, lo), (center + cap, lo)],
        vec![(center - cap, hi), (center + cap, hi)],
    ])
}

/// Mean value and mean SD over the rows that have a value.
fn averaged(
    rows: &[&SummaryRow],
    value: fn(&SummaryRow) -> Option<f64>,
    sd: fn(&SummaryRow) -> Option<f64>,
) -> Option<Bar> {
    let values: Vec<f64> = rows.iter().filter_map(|r| value(*r)).collect();
    let sds: Vec<f64> = rows.iter().filter_map(|r| sd(*r)).collect();
    Some(Bar {
        value: mean(&values)?,
        sd: mean(&sds),
    })
}

fn acceptance_chart(
    rows: &[SummaryRow],
    title: &str,
    x_desc: &str,
    groups: Vec<String>,
    in_group: impl Fn(&SummaryRow, &str) -> bool,
) -> BarChart {
    let series = Context::ALL
        .iter()
        .zip(CONTEXT_COLORS)
        .map(|(context, color)| Series {
            name: context.label().to_string(),
            color,
            bars: groups
                .iter()
                .map(|group| {
                    let members: Vec<&SummaryRow> = rows
                        .iter()
                        .filter(|r| r.context == context.label() && in_group(*r, group.as_str()))
                        .collect();
                    averaged(&members, |r| r.accept_mean, |r| r.accept_sd)
                })
                .collect(),
        })
        .collect();

    BarChart {
        title: title.to_string(),
        x_desc: x_desc.to_string(),
        y_desc: "Mean Acceptance".to_string(),
        groups,
        series,
        y_max: ACCEPT_Y_MAX,
    }
}

/// Conditions on x, contexts as hue, averaged over splits.
pub fn acceptance_by_condition(rows: &[SummaryRow]) -> BarChart {
    let groups = Condition::ALL.iter().map(|c| c.label().to_string()).collect();
    acceptance_chart(
        rows,
        "Acceptance Rate by Condition and Context with SD",
        "Condition",
        groups,
        |row, group| row.condition == group,
    )
}

/// Splits on x, contexts as hue, averaged over conditions.
pub fn acceptance_by_split(rows: &[SummaryRow], splits: &[String]) -> BarChart {
    acceptance_chart(
        rows,
        "Acceptance Rate by Split and Context",
        "Split Offered",
        splits.to_vec(),
        |row, group| row.split == group,
    )
}

/// One panel per condition; both fairness dimensions per split. Panels share
/// a y range.
pub fn fairness_facets(rows: &[SummaryRow], context: Context, splits: &[String]) -> Vec<BarChart> {
    let mut panels: Vec<BarChart> = Condition::ALL
        .iter()
        .map(|condition| {
            let cell = |split: &String| -> Vec<&SummaryRow> {
                rows.iter()
                    .filter(|r| {
                        r.context == context.label() && r.condition == condition.label() && &r.split == split
                    })
                    .collect()
            };
            let interpersonal = splits
                .iter()
                .map(|s| averaged(&cell(s), |r| r.interpersonal_mean, |r| r.interpersonal_sd))
                .collect();
            let informational = splits
                .iter()
                .map(|s| averaged(&cell(s), |r| r.informational_mean, |r| r.informational_sd))
                .collect();

            BarChart {
                title: condition.label().to_string(),
                x_desc: "Split".to_string(),
                y_desc: "Mean Rating".to_string(),
                groups: splits.to_vec(),
                series: vec![
                    Series {
                        name: "Interpersonal Fairness".to_string(),
                        color: STEELBLUE,
                        bars: interpersonal,
                    },
                    Series {
                        name: "Informational Fairness".to_string(),
                        color: INDIANRED,
                        bars: informational,
                    },
                ],
                y_max: 0.0,
            }
        })
        .collect();

    let top = panels
        .iter()
        .flat_map(|p| p.series.iter())
        .flat_map(|s| s.bars.iter().flatten())
        .map(|b| b.value + b.sd.unwrap_or(0.0))
        .fold(0.0, f64::max);
    let y_max = (top * 1.1).max(1.0);
    for panel in &mut panels {
        panel.y_max = y_max;
    }
    panels
}

fn draw_panel<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, chart: &BarChart, caption_size: i32) -> Result<()> {
    let n_groups = chart.groups.len().max(1);
    let n_hues = chart.series.len();

    let mut ctx = ChartBuilder::on(area)
        .caption(&chart.title, ("sans-serif", caption_size))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(-0.5f64..(n_groups as f64 - 0.5), 0f64..chart.y_max)?;

    let labels = &chart.groups;
    let group_label = |x: &f64| {
        let idx = x.round();
        if (x - idx).abs() > 1e-6 || idx < 0.0 {
            return String::new();
        }
        labels.get(idx as usize).cloned().unwrap_or_default()
    };
    ctx.configure_mesh()
        .disable_x_mesh()
        .x_labels(n_groups)
        .x_label_formatter(&group_label)
        .x_desc(chart.x_desc.as_str())
        .y_desc(chart.y_desc.as_str())
        .draw()?;

    for (h, series) in chart.series.iter().enumerate() {
        let color = series.color;
        let rects: Vec<_> = series
            .bars
            .iter()
            .enumerate()
            .filter_map(|(g, bar)| {
                let bar = (*bar)?;
                let (left, _, right) = bar_span(g, h, n_hues);
                Some(Rectangle::new([(left, 0.0), (right, bar.value)], color.filled()))
            })
            .collect();
        ctx.draw_series(rects)?
            .label(series.name.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], color.filled()));
    }

    let cap = bar_width(n_hues) / 4.0;
    for (h, series) in chart.series.iter().enumerate() {
        for (g, bar) in series.bars.iter().enumerate() {
            let Some(bar) = *bar else { continue };
            let (_, center, _) = bar_span(g, h, n_hues);
            if let Some(segments) = error_bar_segments(center, bar, cap, chart.y_max) {
                ctx.draw_series(
                    segments
                        .into_iter()
                        .map(|points| PathElement::new(points, BLACK.stroke_width(2))),
                )?;
            }
        }
    }

    ctx.configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    Ok(())
}

fn draw_figure<DB: DrawingBackend>(root: DrawingArea<DB, Shift>, figure: &Figure) -> Result<()> {
    root.fill(&WHITE)?;
    match figure {
        Figure::Single(chart) => draw_panel(&root, chart, 24)?,
        Figure::Facets { title, panels } => {
            let inner = root.titled(title, ("sans-serif", 26))?;
            for (area, panel) in inner.split_evenly((2, 2)).iter().zip(panels) {
                draw_panel(area, panel, 18)?;
            }
        }
    }
    root.present()?;
    Ok(())
}

fn save_figure(dir: &Path, stem: &str, size: (u32, u32), figure: &Figure) -> Result<Vec<PathBuf>> {
    let png = dir.join(format!("{}.png", stem));
    draw_figure(BitMapBackend::new(&png, size).into_drawing_area(), figure)?;
    let svg = dir.join(format!("{}.svg", stem));
    draw_figure(SVGBackend::new(&svg, size).into_drawing_area(), figure)?;
    tracing::debug!(chart = stem, "chart written");
    Ok(vec![png, svg])
}

fn capitalized(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Renders the four charts into `dir` and returns every file written.
pub fn render_all(rows: &[SummaryRow], splits: &[Split], dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let split_labels: Vec<String> = splits.iter().map(Split::label).collect();
    let mut written = Vec::new();

    let by_condition = Figure::Single(acceptance_by_condition(rows));
    written.extend(save_figure(dir, "acceptance_rate_condition_context", SINGLE_SIZE, &by_condition)?);

    for context in Context::ALL {
        let facets = Figure::Facets {
            title: format!(
                "Fairness Ratings by Split and Condition ({} Context)",
                capitalized(context.label())
            ),
            panels: fairness_facets(rows, context, &split_labels),
        };
        let stem = format!("facet_fairness_{}", context.label());
        written.extend(save_figure(dir, &stem, FACET_SIZE, &facets)?);
    }

    let by_split = Figure::Single(acceptance_by_split(rows, &split_labels));
    written.extend(save_figure(dir, "acceptance_rate_by_split", SINGLE_SIZE, &by_split)?);

    tracing::info!(dir = %dir.display(), files = written.len(), "charts rendered");
    Ok(written)
}
