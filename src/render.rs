//! Coefficient plots: strip plots of a snapshot and line plots of checkpoint
//! series.
//!
//! The output format follows the path extension: `.svg` or `.png`.

use std::path::{Path, PathBuf};

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::checkpoint::CheckpointStore;
use crate::error::{RenderError, Result};
use crate::selection::DerivativeOrder;
use crate::snapshot::{Snapshot, SnapshotEntry};
use crate::tape::TapeThreadLocal;

/// Presentation options shared by both plot kinds.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderConfig {
    title: String,
    size: (u32, u32),
    sorted: bool,
    per_plot: Option<usize>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            title: "Taylor coefficients".to_owned(),
            size: (1200, 800),
            sorted: false,
            per_plot: None,
        }
    }
}

impl RenderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Image size in pixels.
    #[must_use]
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }

    /// Order snapshot coefficients by descending magnitude.
    #[must_use]
    pub fn sorted(mut self, sorted: bool) -> Self {
        self.sorted = sorted;
        self
    }

    /// Split a snapshot into pages of at most `n` coefficients.
    /// `0` means a single page.
    #[must_use]
    pub fn per_plot(mut self, n: usize) -> Self {
        self.per_plot = (n > 0).then_some(n);
        self
    }
}

/// Draw `snapshot` as strip plots: labels on x, magnitude on y.
///
/// With `split`, each order goes to its own figure with an `_order<k>`
/// file-name suffix. A figure split over several pages (see
/// [`RenderConfig::per_plot`]) adds a `_<page>` suffix to each page. Each
/// figure is written once per path in `paths`.
///
/// Returns the files written.
pub fn render_snapshot<F: TapeThreadLocal, P: AsRef<Path>>(
    snapshot: &Snapshot<F>,
    paths: &[P],
    split: bool,
    config: &RenderConfig,
) -> Result<Vec<PathBuf>> {
    if snapshot.is_empty() {
        return Err(RenderError::Empty.into());
    }
    for path in paths {
        Format::of(path.as_ref())?;
    }

    let snapshot = if config.sorted {
        snapshot.sorted()
    } else {
        snapshot.clone()
    };
    let groups: Vec<(Option<DerivativeOrder>, Snapshot<F>)> = if split {
        snapshot
            .orders()
            .into_iter()
            .map(|order| (Some(order), snapshot.filter_order(order)))
            .collect()
    } else {
        vec![(None, snapshot)]
    };

    let mut written = Vec::new();
    for (order, group) in &groups {
        let per_page = config.per_plot.unwrap_or(group.len()).max(1);
        let pages: Vec<&[SnapshotEntry<F>]> = group.entries().chunks(per_page).collect();
        for (page, entries) in pages.iter().copied().enumerate() {
            let mut suffix = String::new();
            let mut title = config.title.clone();
            if let Some(order) = order {
                suffix.push_str(&format!("_order{order}"));
                title.push_str(&format!(" (order {order})"));
            }
            if pages.len() > 1 {
                suffix.push_str(&format!("_{page}"));
            }
            let strip = Strip {
                title: &title,
                entries,
            };
            for path in paths {
                let target = with_suffix(path.as_ref(), &suffix);
                save(&strip, &target, config.size)?;
                written.push(target);
            }
        }
    }
    Ok(written)
}

/// Draw every series of `store` as a line over the recorded time steps.
///
/// Returns the files written.
pub fn render_series<F: TapeThreadLocal, P: AsRef<Path>>(
    store: &CheckpointStore<F>,
    paths: &[P],
    config: &RenderConfig,
) -> Result<Vec<PathBuf>> {
    if store.is_empty() {
        return Err(RenderError::Empty.into());
    }
    for path in paths {
        Format::of(path.as_ref())?;
    }

    let steps = store.time_steps();
    let lines: Vec<(&str, Vec<(f64, f64)>)> = store
        .labeled_series()
        .into_iter()
        .map(|(label, values)| {
            let offset = steps.len().saturating_sub(values.len());
            let points = steps[offset..]
                .iter()
                .zip(values)
                .map(|(&t, v)| (t as f64, v.to_f64().unwrap_or(f64::NAN)))
                .collect();
            (label, points)
        })
        .collect();
    let figure = Lines {
        title: &config.title,
        lines: &lines,
    };

    let mut written = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        save(&figure, path, config.size)?;
        written.push(path.to_path_buf());
    }
    Ok(written)
}

#[derive(Clone, Copy, Debug)]
enum Format {
    Svg,
    Png,
}

impl Format {
    fn of(path: &Path) -> Result<Self, RenderError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("svg") => Ok(Format::Svg),
            Some("png") => Ok(Format::Png),
            _ => Err(RenderError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Something drawable onto any plotters backend.
trait Figure {
    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> Result<(), RenderError>;
}

fn save(figure: &impl Figure, path: &Path, size: (u32, u32)) -> Result<()> {
    match Format::of(path)? {
        Format::Svg => {
            let root = SVGBackend::new(path, size).into_drawing_area();
            figure.draw(&root)?;
            root.present().map_err(backend)?;
        }
        Format::Png => {
            let root = BitMapBackend::new(path, size).into_drawing_area();
            figure.draw(&root)?;
            root.present().map_err(backend)?;
        }
    }
    log::info!("wrote {}", path.display());
    Ok(())
}

fn backend<E: std::error::Error + Send + Sync>(err: DrawingAreaErrorKind<E>) -> RenderError {
    RenderError::Backend(err.to_string())
}

/// `out.svg` + `_order2` -> `out_order2.svg`.
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    if suffix.is_empty() {
        return path.to_path_buf();
    }
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let mut name = format!("{stem}{suffix}");
    if let Some(ext) = path.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    path.with_file_name(name)
}

/// Upper end of a magnitude axis over `values`, ignoring non-finite ones.
fn y_max(values: impl Iterator<Item = f64>) -> f64 {
    let max = values.filter(|v| v.is_finite()).fold(0.0, f64::max);
    if max > 0.0 {
        max * 1.1
    } else {
        1.0
    }
}

struct Strip<'a, F> {
    title: &'a str,
    entries: &'a [SnapshotEntry<F>],
}

impl<F: TapeThreadLocal> Figure for Strip<'_, F> {
    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> Result<(), RenderError> {
        root.fill(&WHITE).map_err(backend)?;
        let values: Vec<f64> = self
            .entries
            .iter()
            .map(|e| e.value.to_f64().unwrap_or(f64::NAN))
            .collect();
        let labels: Vec<&str> = self.entries.iter().map(|e| e.label.as_str()).collect();

        let mut chart = ChartBuilder::on(root)
            .caption(self.title, ("sans-serif", 24))
            .margin(15)
            .x_label_area_size(120)
            .y_label_area_size(70)
            .build_cartesian_2d(
                (0..values.len()).into_segmented(),
                0.0..y_max(values.iter().copied()),
            )
            .map_err(backend)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(labels.len())
            .x_label_style(("sans-serif", 12).into_font().transform(FontTransform::Rotate90))
            .x_label_formatter(&|v| match v {
                SegmentValue::CenterOf(i) => labels.get(*i).map_or(String::new(), |l| (*l).to_owned()),
                _ => String::new(),
            })
            .y_desc("mean |derivative|")
            .draw()
            .map_err(backend)?;

        chart
            .draw_series(
                values
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| v.is_finite())
                    .map(|(i, &v)| Cross::new((SegmentValue::CenterOf(i), v), 6, BLUE.stroke_width(2))),
            )
            .map_err(backend)?;
        Ok(())
    }
}

struct Lines<'a> {
    title: &'a str,
    lines: &'a [(&'a str, Vec<(f64, f64)>)],
}

impl Lines<'_> {
    fn color(&self, i: usize) -> HSLColor {
        HSLColor(i as f64 / self.lines.len().max(1) as f64, 0.75, 0.45)
    }
}

impl Figure for Lines<'_> {
    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> Result<(), RenderError> {
        root.fill(&WHITE).map_err(backend)?;
        let (width, _) = root.dim_in_pixel();
        let (plot_area, legend_area) = root.split_horizontally(width * 3 / 4);

        let xs = self.lines.iter().flat_map(|(_, pts)| pts.iter().map(|p| p.0));
        let (x_lo, x_hi) = xs.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
            (lo.min(x), hi.max(x))
        });
        let (x_lo, x_hi) = match (x_lo.is_finite(), x_lo < x_hi) {
            (true, true) => (x_lo, x_hi),
            (true, false) => (x_lo - 0.5, x_lo + 0.5),
            (false, _) => (0.0, 1.0),
        };
        let y_hi = y_max(self.lines.iter().flat_map(|(_, pts)| pts.iter().map(|p| p.1)));

        let mut chart = ChartBuilder::on(&plot_area)
            .caption(self.title, ("sans-serif", 24))
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(70)
            .build_cartesian_2d(x_lo..x_hi, 0.0..y_hi)
            .map_err(backend)?;
        chart
            .configure_mesh()
            .x_desc("time step")
            .y_desc("mean |derivative|")
            .draw()
            .map_err(backend)?;

        for (i, (_, points)) in self.lines.iter().enumerate() {
            let finite = points.iter().copied().filter(|p| p.1.is_finite());
            chart
                .draw_series(LineSeries::new(finite, self.color(i).stroke_width(2)))
                .map_err(backend)?;
        }

        let grid = LegendGrid::fit(self.lines.len(), legend_area.dim_in_pixel());
        let font = ("sans-serif", f64::from(grid.font_size()));
        for (i, (label, _)) in self.lines.iter().enumerate() {
            let (x, y) = grid.anchor(i);
            legend_area
                .draw(&PathElement::new(
                    vec![(x, y), (x + 25, y)],
                    self.color(i).stroke_width(2),
                ))
                .map_err(backend)?;
            legend_area
                .draw(&Text::new(*label, (x + 32, y - grid.font_size() / 2), font))
                .map_err(backend)?;
        }
        Ok(())
    }
}

const LEGEND_TOP: i32 = 30;
const LEGEND_BOTTOM: i32 = 10;
const MIN_PITCH: i32 = 10;
const MAX_PITCH: i32 = 18;

/// Legend entries fill columns top to bottom, shrinking the row pitch down
/// to [`MIN_PITCH`] before opening another column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct LegendGrid {
    rows: usize,
    pitch: i32,
    column_width: i32,
}

impl LegendGrid {
    fn fit(entries: usize, (width, height): (u32, u32)) -> Self {
        let usable = (height as i32 - LEGEND_TOP - LEGEND_BOTTOM).max(MIN_PITCH);
        let entries = entries.max(1);
        let pitch = (usable / entries as i32).clamp(MIN_PITCH, MAX_PITCH);
        let rows = (usable / pitch).max(1) as usize;
        let columns = entries.div_ceil(rows) as i32;
        LegendGrid {
            rows,
            pitch,
            column_width: (width as i32 / columns).max(1),
        }
    }

    /// Left end of the line sample of entry `i`.
    fn anchor(&self, i: usize) -> (i32, i32) {
        let (column, row) = (i / self.rows, i % self.rows);
        (
            10 + column as i32 * self.column_width,
            LEGEND_TOP + row as i32 * self.pitch,
        )
    }

    fn font_size(&self) -> i32 {
        (self.pitch * 3 / 4).max(8)
    }
}
