use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::Path;

use crate::analysis::{rank_by_peak, Selection};
use crate::config::{ImageFormat, VisConfig};
use crate::data::ImportanceCurves;
use crate::dictionary::{letter, letter_bounds, stack_totals, DictionaryDump};

const SERIES_GREY: RGBColor = RGBColor(160, 160, 160);

/// Min/max of the finite values with a little headroom
fn value_range(values: &[f64]) -> (f64, f64) {
    let (lo, hi) = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });

    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    if (hi - lo).abs() < f64::EPSILON {
        return (lo - 1.0, hi + 1.0);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad, hi + pad)
}

/// Panel caption, e.g. `Mean > 0.4200 (t=10..25)`
pub fn selection_caption(selection: &Selection) -> String {
    format!(
        "{} {} {:.4} (t={}..{})",
        selection.name,
        selection.node.comparison.symbol(),
        selection.node.threshold,
        selection.node.interval_start,
        selection.node.interval_end
    )
}

/// Shaded x extent of an inclusive interval, half a time step past each end
fn shaded_span(start: usize, end: usize) -> (f64, f64) {
    (start as f64 - 0.5, end.max(start) as f64 + 0.5)
}

/// Plot the explained series with one panel per selected attribute
pub fn plot_prediction_explanation(
    series: &[f64],
    selections: &[Selection],
    title: &str,
    output_path: &Path,
    config: &VisConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let size = (
        config.width,
        config.panel_height * (selections.len() as u32 + 1),
    );

    match config.format {
        ImageFormat::Png => draw_prediction_explanation(
            BitMapBackend::new(output_path, size).into_drawing_area(),
            series,
            selections,
            title,
        )?,
        ImageFormat::Svg => draw_prediction_explanation(
            SVGBackend::new(output_path, size).into_drawing_area(),
            series,
            selections,
            title,
        )?,
    }

    println!("📊 Explanation figure saved to: {}", output_path.display());
    Ok(())
}

fn draw_prediction_explanation<DB>(
    root: DrawingArea<DB, Shift>,
    series: &[f64],
    selections: &[Selection],
    title: &str,
) -> Result<(), Box<dyn std::error::Error>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let panels = root.split_evenly((selections.len() + 1, 1));

    let x_max = series.len().saturating_sub(1).max(1) as f64 + 0.5;
    let (y_min, y_max) = value_range(series);
    let points = || series.iter().enumerate().map(|(t, v)| (t as f64, *v));

    let mut chart = ChartBuilder::on(&panels[0])
        .caption(title, ("sans-serif", 24).into_font())
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..x_max, y_min..y_max)?;

    chart.configure_mesh().x_desc("Time Point").draw()?;
    chart.draw_series(LineSeries::new(points(), &BLUE))?;

    let colors = [&RED, &GREEN, &MAGENTA, &CYAN];

    for (idx, selection) in selections.iter().enumerate() {
        let color = colors[idx % colors.len()];
        let start = selection.node.interval_start;
        let end = selection.node.interval_end.min(series.len().saturating_sub(1));
        let (span_start, span_end) = shaded_span(start, end);

        let mut chart = ChartBuilder::on(&panels[idx + 1])
            .caption(selection_caption(selection), ("sans-serif", 20).into_font())
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(60)
            .build_cartesian_2d(-0.5f64..x_max, y_min..y_max)?;

        chart.configure_mesh().x_desc("Time Point").draw()?;

        chart.draw_series(std::iter::once(Rectangle::new(
            [(span_start, y_min), (span_end, y_max)],
            color.mix(0.15).filled(),
        )))?;

        chart.draw_series(LineSeries::new(points(), &SERIES_GREY))?;

        chart.draw_series(LineSeries::new(
            points().skip(start).take(end.saturating_sub(start) + 1),
            color.stroke_width(3),
        ))?;

        if let Some(value) = series.get(selection.peak_time) {
            chart.draw_series(std::iter::once(Circle::new(
                (selection.peak_time as f64, *value),
                5,
                color.filled(),
            )))?;
        }
    }

    root.present()?;
    Ok(())
}

/// Plot the temporal importance curves of the `top_n` attributes
pub fn plot_importance_curves(
    curves: &ImportanceCurves,
    top_n: usize,
    output_path: &Path,
    config: &VisConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let size = (config.width, config.panel_height * 2);

    match config.format {
        ImageFormat::Png => draw_importance_curves(
            BitMapBackend::new(output_path, size).into_drawing_area(),
            curves,
            top_n,
        )?,
        ImageFormat::Svg => draw_importance_curves(
            SVGBackend::new(output_path, size).into_drawing_area(),
            curves,
            top_n,
        )?,
    }

    println!("📊 Temporal importance curves saved to: {}", output_path.display());
    Ok(())
}

fn draw_importance_curves<DB>(
    root: DrawingArea<DB, Shift>,
    curves: &ImportanceCurves,
    top_n: usize,
) -> Result<(), Box<dyn std::error::Error>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    let ranked = rank_by_peak(&curves.curves, top_n);
    let length = curves.curves.first().map_or(1, Vec::len);
    let x_max = length.saturating_sub(1).max(1);
    let y_max = ranked
        .iter()
        .map(|(_, peak)| *peak)
        .filter(|p| p.is_finite())
        .fold(0.0f64, f64::max)
        .max(f64::EPSILON)
        * 1.05;

    let mut chart = ChartBuilder::on(&root)
        .caption("Temporal Importance Curves", ("sans-serif", 30).into_font())
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(0usize..x_max, 0f64..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Time Point")
        .y_desc("Information Gain")
        .draw()?;

    let colors = [&BLUE, &RED, &GREEN, &MAGENTA, &CYAN, &BLACK];

    for (idx, (attribute, _)) in ranked.iter().enumerate() {
        let color = colors[idx % colors.len()];
        chart
            .draw_series(LineSeries::new(
                curves.curves[*attribute]
                    .iter()
                    .enumerate()
                    .map(|(t, v)| (t, *v)),
                color,
            ))?
            .label(curves.names[*attribute].clone())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Tallest stacked bar, or zero for an empty histogram
fn max_total(stacks: &[Vec<f64>]) -> f64 {
    stack_totals(stacks)
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(0.0, f64::max)
}

/// Class-normalised word histograms stacked by class.
///
/// Rows from the top: the first pyramid level, the bigrams, each deeper level
/// split into its quadrants, and finally every histogram concatenated.
pub fn plot_word_histograms(
    dump: &DictionaryDump,
    output_path: &Path,
    config: &VisConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let rows = dump.level_rows().len() as u32 + 2;
    let size = (config.width, config.panel_height * rows);

    match config.format {
        ImageFormat::Png => {
            draw_word_histograms(BitMapBackend::new(output_path, size).into_drawing_area(), dump)?
        }
        ImageFormat::Svg => {
            draw_word_histograms(SVGBackend::new(output_path, size).into_drawing_area(), dump)?
        }
    }

    println!("📊 Word histograms saved to: {}", output_path.display());
    Ok(())
}

fn draw_word_histograms<DB>(
    root: DrawingArea<DB, Shift>,
    dump: &DictionaryDump,
) -> Result<(), Box<dyn std::error::Error>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    let level_rows = dump.level_rows();
    let rows = level_rows.len() + 2;
    let panels = root.split_evenly((rows, 1));

    for (level, histograms) in level_rows.iter().enumerate() {
        // bigrams take the second row
        let area = if level == 0 { &panels[0] } else { &panels[level + 1] };
        let stacks: Vec<Vec<Vec<f64>>> = histograms
            .iter()
            .map(|h| h.normalised(&dump.class_counts))
            .collect();
        let y_max = stacks.iter().map(|s| max_total(s)).fold(0.0, f64::max);

        let cells = area.split_evenly((1, histograms.len()));
        for ((histogram, stack), cell) in histograms.iter().zip(&stacks).zip(&cells) {
            draw_stacked_bars(cell, &histogram.label, stack, y_max, level == 0)?;
        }
    }

    let bigrams = dump.bigrams.normalised(&dump.class_counts);
    draw_stacked_bars(&panels[1], &dump.bigrams.label, &bigrams, max_total(&bigrams), false)?;

    let all = dump.concatenated();
    let all_stacks = all.normalised(&dump.class_counts);
    draw_stacked_bars(
        &panels[rows - 1],
        &all.label,
        &all_stacks,
        max_total(&all_stacks),
        false,
    )?;

    root.present()?;
    Ok(())
}

fn draw_stacked_bars<DB>(
    area: &DrawingArea<DB, Shift>,
    caption: &str,
    stacks: &[Vec<f64>],
    y_max: f64,
    with_legend: bool,
) -> Result<(), Box<dyn std::error::Error>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let num_words = stacks.iter().map(Vec::len).max().unwrap_or(0);
    let y_top = if y_max.is_finite() && y_max > 0.0 { y_max } else { 1.0 };

    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", 16).into_font())
        .margin(5)
        .build_cartesian_2d(0f64..num_words.max(1) as f64, 0f64..y_top)?;

    let mut bottoms = vec![0.0f64; num_words];
    for (class, row) in stacks.iter().enumerate() {
        let color = Palette99::pick(class);
        let bars: Vec<Rectangle<(f64, f64)>> = row
            .iter()
            .enumerate()
            .map(|(i, &height)| {
                let x = i as f64;
                Rectangle::new(
                    [(x, bottoms[i]), (x + 1.0, bottoms[i] + height)],
                    color.filled(),
                )
            })
            .collect();
        for (bottom, height) in bottoms.iter_mut().zip(row) {
            *bottom += height;
        }

        let drawn = chart.draw_series(bars)?;
        if with_legend {
            drawn
                .label(format!("Class {}", class))
                .legend(move |(x, y)| {
                    Rectangle::new([(x, y - 5), (x + 10, y + 5)], Palette99::pick(class).filled())
                });
        }
    }

    if with_legend {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
    }
    Ok(())
}

/// Series, its first window, the window's DFT and the drawn word's breakpoints
pub fn plot_sfa_transform(
    dump: &DictionaryDump,
    output_path: &Path,
    config: &VisConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let size = (config.width, config.panel_height * 4);

    match config.format {
        ImageFormat::Png => {
            draw_sfa_transform(BitMapBackend::new(output_path, size).into_drawing_area(), dump)?
        }
        ImageFormat::Svg => {
            draw_sfa_transform(SVGBackend::new(output_path, size).into_drawing_area(), dump)?
        }
    }

    println!("📊 SFA transform figure saved to: {}", output_path.display());
    Ok(())
}

fn draw_sfa_transform<DB>(
    root: DrawingArea<DB, Shift>,
    dump: &DictionaryDump,
) -> Result<(), Box<dyn std::error::Error>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    let (width, height) = root.dim_in_pixel();
    let quarter = (height / 4) as i32;
    let (top, rest) = root.split_vertically(quarter);
    let (middle, bottom) = rest.split_vertically(quarter);
    let (window_area, dft_area) = middle.split_horizontally((width / 2) as i32);

    draw_line_panel(&top, "Time Series", &dump.series)?;
    draw_line_panel(&window_area, "1st Window", dump.first_window())?;
    draw_line_panel(&dft_area, "Window DFT", &dump.dft)?;
    draw_word_breakpoints(&bottom, dump)?;

    root.present()?;
    Ok(())
}

fn draw_line_panel<DB>(
    area: &DrawingArea<DB, Shift>,
    caption: &str,
    values: &[f64],
) -> Result<(), Box<dyn std::error::Error>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (y_min, y_max) = value_range(values);
    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", 18).into_font())
        .margin(10)
        .x_label_area_size(25)
        .build_cartesian_2d(1f64..values.len().max(2) as f64, y_min..y_max)?;

    chart.configure_mesh().disable_y_mesh().draw()?;
    chart.draw_series(LineSeries::new(
        values.iter().enumerate().map(|(i, v)| ((i + 1) as f64, *v)),
        &BLUE,
    ))?;
    Ok(())
}

fn draw_word_breakpoints<DB>(
    area: &DrawingArea<DB, Shift>,
    dump: &DictionaryDump,
) -> Result<(), Box<dyn std::error::Error>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let word_length = dump.word.chars().count();
    let (y_min, y_max) = dump.breakpoint_range();
    let x_max = word_length.max(dump.dft.len()).max(1) as f64 + 0.5;

    let mut chart = ChartBuilder::on(area)
        .caption(
            format!("Word Breakpoints: {}", dump.word),
            ("sans-serif", 20).into_font(),
        )
        .margin(10)
        .x_label_area_size(25)
        .build_cartesian_2d(0.5f64..x_max, y_min..y_max)?;

    chart.configure_mesh().disable_mesh().draw()?;

    let mut rules = Vec::new();
    let mut labels = Vec::new();
    for (position, row) in dump.breakpoints.iter().take(word_length).enumerate() {
        let x = (position + 1) as f64;
        if position + 1 < word_length {
            rules.push(PathElement::new(vec![(x + 0.5, y_min), (x + 0.5, y_max)], &RED));
        }

        let mut floor = y_min;
        for (idx, bound) in letter_bounds(row) {
            rules.push(PathElement::new(vec![(x - 0.5, bound), (x + 0.5, bound)], &RED));
            labels.push(Text::new(
                letter(idx).to_string(),
                (x, (floor + bound) / 2.0),
                ("sans-serif", 16).into_font(),
            ));
            floor = bound;
        }
        labels.push(Text::new(
            letter(row.len().saturating_sub(1)).to_string(),
            (x, (floor + y_max) / 2.0),
            ("sans-serif", 16).into_font(),
        ));
    }

    chart.draw_series(rules)?;
    chart.draw_series(labels)?;
    chart.draw_series(LineSeries::new(
        dump.dft.iter().enumerate().map(|(i, v)| ((i + 1) as f64, *v)),
        &BLUE,
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::TargetWindow;
    use crate::data::{Comparison, DecisionNode};

    #[test]
    fn plotting_functions_have_expected_signatures() {
        let _: fn(&[f64], &[Selection], &str, &Path, &VisConfig) -> Result<(), Box<dyn std::error::Error>> =
            plot_prediction_explanation;
        let _: fn(&ImportanceCurves, usize, &Path, &VisConfig) -> Result<(), Box<dyn std::error::Error>> =
            plot_importance_curves;
        let _: fn(&DictionaryDump, &Path, &VisConfig) -> Result<(), Box<dyn std::error::Error>> =
            plot_word_histograms;
        let _: fn(&DictionaryDump, &Path, &VisConfig) -> Result<(), Box<dyn std::error::Error>> =
            plot_sfa_transform;
    }

    #[test]
    fn value_range_pads_and_handles_flat_series() {
        let (lo, hi) = value_range(&[0.0, 10.0]);
        assert!(lo < 0.0 && hi > 10.0);

        assert_eq!(value_range(&[2.0, 2.0]), (1.0, 3.0));
        assert_eq!(value_range(&[f64::NAN]), (0.0, 1.0));
    }

    #[test]
    fn stacked_bar_height_spans_all_classes() {
        let stacks = vec![vec![0.5, 2.0], vec![1.0, 0.25]];
        assert_eq!(max_total(&stacks), 2.25);
        assert_eq!(max_total(&[]), 0.0);
    }

    #[test]
    fn single_point_interval_is_still_shaded() {
        assert_eq!(shaded_span(4, 4), (3.5, 4.5));
        assert_eq!(shaded_span(0, 3), (-0.5, 3.5));

        let (lo, hi) = shaded_span(7, 7);
        assert!(hi - lo >= 1.0);
    }

    #[test]
    fn caption_shows_branch_and_interval() {
        let selection = Selection {
            attribute: 22,
            name: "Mean".to_string(),
            peak_time: 12,
            peak_count: 4,
            target: TargetWindow { start: 10.0, end: 25.0 },
            node: DecisionNode::new(22, 10, 25, 0.42, Comparison::Greater),
        };
        assert_eq!(selection_caption(&selection), "Mean > 0.4200 (t=10..25)");
    }
}
