//! Charting capability: Chart.js-shaped configs drawn as SVG onto a surface.

use crate::error::RenderResult;
use crate::mount::escape_html;
use crate::surface::{ElementResolver, Surface, SurfaceBinding};
use mlua::{AnyUserData, Lua, LuaSerdeExt, UserData, UserDataFields, UserDataMethods, Value};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::fmt::Write;
use std::rc::Rc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChartId(pub Uuid);

impl fmt::Display for ChartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Doughnut,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartConfig {
    #[serde(rename = "type")]
    pub kind: ChartKind,
    #[serde(default)]
    pub data: ChartData,
    /// Accepted for compatibility, not interpreted.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub options: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChartData {
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub datasets: Vec<Dataset>,
}

/// Axis labels may be written as strings or numbers (years, for instance).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Text(String),
    Number(f64),
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Text(s) => f.write_str(s),
            Label::Number(n) => write!(f, "{}", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub data: Vec<f64>,
    #[serde(default, rename = "backgroundColor")]
    pub background_color: Option<Colors>,
    #[serde(default, rename = "borderColor")]
    pub border_color: Option<Colors>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Colors {
    One(String),
    Many(Vec<String>),
}

impl Colors {
    fn pick(&self, i: usize) -> Option<&str> {
        match self {
            Colors::One(c) => Some(c.as_str()),
            Colors::Many(cs) if !cs.is_empty() => Some(cs[i % cs.len()].as_str()),
            Colors::Many(_) => None,
        }
    }
}

const PALETTE: &[&str] = &[
    "#36a2eb", "#ff6384", "#ff9f40", "#ffcd56", "#4bc0c0", "#9966ff", "#c9cbcf",
];

/// A chart drawing on a surface. Destroying it releases the surface; dropping
/// an undestroyed instance destroys it.
#[derive(Debug)]
pub struct ChartInstance {
    id: ChartId,
    config: ChartConfig,
    surface: Surface,
    destroyed: bool,
}

impl ChartInstance {
    pub fn id(&self) -> ChartId {
        self.id
    }

    pub fn config(&self) -> &ChartConfig {
        &self.config
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.surface.detach(self.id);
        tracing::debug!(chart = %self.id, surface = %self.surface.id(), "chart destroyed");
    }
}

impl Drop for ChartInstance {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// The charting library handle injected into chart scripts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChartLibrary;

impl ChartLibrary {
    /// Draws `config` on `surface`. Fails if the surface is still in use.
    pub fn create(&self, surface: &Surface, config: ChartConfig) -> RenderResult<ChartInstance> {
        let id = ChartId(Uuid::new_v4());
        let svg = draw_svg(&config, surface.width(), surface.height());
        surface.attach(id, svg)?;
        tracing::debug!(chart = %id, kind = ?config.kind, surface = %surface.id(), "chart created");
        Ok(ChartInstance {
            id,
            config,
            surface: surface.clone(),
            destroyed: false,
        })
    }
}

/// Holds the chart a script created. One per execution.
#[derive(Clone, Default)]
pub struct ChartSlot(Rc<RefCell<Option<ChartInstance>>>);

impl ChartSlot {
    pub fn take(&self) -> Option<ChartInstance> {
        self.0.borrow_mut().take()
    }

    /// Destroys the current chart (if any) before storing the next one.
    fn replace(&self, chart: ChartInstance) {
        let mut slot = self.0.borrow_mut();
        if let Some(mut old) = slot.take() {
            old.destroy();
        }
        *slot = Some(chart);
    }

    fn destroy_current(&self) -> bool {
        match self.0.borrow_mut().take() {
            Some(mut chart) => {
                chart.destroy();
                true
            }
            None => false,
        }
    }
}

/// Script-side handle returned by `Chart.new`.
struct ChartRef {
    id: ChartId,
    slot: ChartSlot,
}

impl UserData for ChartRef {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("id", |_, this| Ok(this.id.to_string()));
    }

    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method("destroy", |_, this, ()| {
            let current = this.slot.0.borrow().as_ref().map(|c| c.id);
            if current == Some(this.id) {
                this.slot.destroy_current();
            }
            Ok(())
        });
    }
}

/// `Chart` and `document` globals for one chart execution.
pub struct ChartCapability {
    library: ChartLibrary,
    binding: SurfaceBinding,
    slot: ChartSlot,
}

impl ChartCapability {
    pub fn new(library: ChartLibrary, binding: SurfaceBinding, slot: ChartSlot) -> Self {
        Self {
            library,
            binding,
            slot,
        }
    }

    pub(crate) fn register(self, lua: &Lua) -> mlua::Result<()> {
        let chart = lua.create_table()?;
        let library = self.library;
        let binding = self.binding.clone();
        let slot = self.slot.clone();
        chart.set(
            "new",
            lua.create_function(move |lua, (target, config): (Value, Value)| {
                let surface = resolve_target(&binding, &target)?;
                let config: ChartConfig = lua.from_value(config)?;
                // Release the surface before drawing again on it. A failed
                // create leaves the slot empty.
                slot.destroy_current();
                let instance = library
                    .create(&surface, config)
                    .map_err(|e| mlua::Error::runtime(e.to_string()))?;
                let id = instance.id();
                slot.replace(instance);
                Ok(ChartRef {
                    id,
                    slot: slot.clone(),
                })
            })?,
        )?;
        let slot = self.slot.clone();
        chart.set(
            "destroy",
            lua.create_function(move |_, ()| Ok(slot.destroy_current()))?,
        )?;
        lua.globals().set("Chart", chart)?;

        let document = lua.create_table()?;
        let binding = self.binding;
        document.set(
            "getElementById",
            lua.create_function(move |_, id: String| Ok(binding.resolve(&id)))?,
        )?;
        lua.globals().set("document", document)?;
        Ok(())
    }
}

fn resolve_target(binding: &SurfaceBinding, target: &Value) -> mlua::Result<Surface> {
    match target {
        Value::String(s) => {
            let id = s.to_str()?.to_string();
            binding.resolve(&id).ok_or_else(|| {
                mlua::Error::runtime(format!("Failed to create chart: no element with id '{}'", id))
            })
        }
        Value::UserData(ud) => surface_from_userdata(ud),
        other => Err(mlua::Error::runtime(format!(
            "Failed to create chart: expected an element id or surface, got {}",
            other.type_name()
        ))),
    }
}

fn surface_from_userdata(ud: &AnyUserData) -> mlua::Result<Surface> {
    let surface = ud.borrow::<Surface>()?;
    Ok(surface.clone())
}

// ─── SVG drawing ────────────────────────────────────────────────────────────

const MARGIN: f64 = 40.0;

fn dataset_color(ds: &Dataset, dataset_index: usize, point_index: usize, per_point: bool) -> String {
    let idx = if per_point { point_index } else { dataset_index };
    ds.background_color
        .as_ref()
        .and_then(|c| c.pick(idx))
        .map(escape_html)
        .unwrap_or_else(|| PALETTE[idx % PALETTE.len()].to_string())
}

/// Renders the whole chart as a standalone SVG document.
pub fn draw_svg(config: &ChartConfig, width: u32, height: u32) -> String {
    let (w, h) = (width as f64, height as f64);
    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" class="jv-chart jv-chart-{kind}">"#,
        w = width,
        h = height,
        kind = format!("{:?}", config.kind).to_lowercase()
    );
    match config.kind {
        ChartKind::Bar => draw_bars(&mut svg, &config.data, w, h),
        ChartKind::Line => draw_lines(&mut svg, &config.data, w, h),
        ChartKind::Pie => draw_pie(&mut svg, &config.data, w, h, 0.0),
        ChartKind::Doughnut => draw_pie(&mut svg, &config.data, w, h, 0.5),
    }
    draw_legend(&mut svg, config, w);
    svg.push_str("</svg>");
    svg
}

fn max_value(data: &ChartData) -> f64 {
    let max = data
        .datasets
        .iter()
        .flat_map(|d| d.data.iter().copied())
        .filter(|v| v.is_finite())
        .fold(0.0_f64, f64::max);
    if max <= 0.0 {
        1.0
    } else {
        max
    }
}

fn point_count(data: &ChartData) -> usize {
    data.datasets
        .iter()
        .map(|d| d.data.len())
        .max()
        .unwrap_or(0)
        .max(data.labels.len())
}

fn draw_axes(svg: &mut String, data: &ChartData, w: f64, h: f64, slot: f64) {
    let _ = write!(
        svg,
        r##"<line x1="{m}" y1="{b}" x2="{r}" y2="{b}" stroke="#888"/><line x1="{m}" y1="{m}" x2="{m}" y2="{b}" stroke="#888"/>"##,
        m = MARGIN,
        b = h - MARGIN,
        r = w - MARGIN
    );
    for (i, label) in data.labels.iter().enumerate() {
        let x = MARGIN + slot * (i as f64 + 0.5);
        let _ = write!(
            svg,
            r##"<text x="{:.1}" y="{:.1}" font-size="12" text-anchor="middle" fill="#aaa">{}</text>"##,
            x,
            h - MARGIN + 16.0,
            escape_html(&label.to_string())
        );
    }
}

fn draw_bars(svg: &mut String, data: &ChartData, w: f64, h: f64) {
    let n = point_count(data);
    if n == 0 {
        return;
    }
    let plot_h = h - 2.0 * MARGIN;
    let slot = (w - 2.0 * MARGIN) / n as f64;
    draw_axes(svg, data, w, h, slot);
    let max = max_value(data);
    let groups = data.datasets.len().max(1) as f64;
    let bar_w = slot * 0.8 / groups;
    let per_point = data.datasets.len() == 1;
    for (di, ds) in data.datasets.iter().enumerate() {
        for (i, v) in ds.data.iter().enumerate() {
            let bh = (v.max(0.0) / max) * plot_h;
            let x = MARGIN + slot * i as f64 + slot * 0.1 + bar_w * di as f64;
            let _ = write!(
                svg,
                r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}"/>"#,
                x,
                h - MARGIN - bh,
                bar_w,
                bh,
                dataset_color(ds, di, i, per_point)
            );
        }
    }
}

fn draw_lines(svg: &mut String, data: &ChartData, w: f64, h: f64) {
    let n = point_count(data);
    if n == 0 {
        return;
    }
    let plot_h = h - 2.0 * MARGIN;
    let slot = (w - 2.0 * MARGIN) / n as f64;
    draw_axes(svg, data, w, h, slot);
    let max = max_value(data);
    for (di, ds) in data.datasets.iter().enumerate() {
        let points: Vec<String> = ds
            .data
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let x = MARGIN + slot * (i as f64 + 0.5);
                let y = h - MARGIN - (v.max(0.0) / max) * plot_h;
                format!("{:.1},{:.1}", x, y)
            })
            .collect();
        let stroke = ds
            .border_color
            .as_ref()
            .and_then(|c| c.pick(0))
            .map(escape_html)
            .unwrap_or_else(|| dataset_color(ds, di, 0, false));
        let _ = write!(
            svg,
            r#"<polyline points="{}" fill="none" stroke="{}" stroke-width="2"/>"#,
            points.join(" "),
            stroke
        );
    }
}

fn draw_pie(svg: &mut String, data: &ChartData, w: f64, h: f64, hole: f64) {
    let Some(ds) = data.datasets.first() else {
        return;
    };
    let total: f64 = ds.data.iter().filter(|v| v.is_finite() && **v > 0.0).sum();
    if total <= 0.0 {
        return;
    }
    let (cx, cy) = (w / 2.0, h / 2.0);
    let r = (w.min(h) / 2.0 - MARGIN).max(1.0);
    let mut angle = -std::f64::consts::FRAC_PI_2;
    for (i, v) in ds.data.iter().enumerate() {
        if !v.is_finite() || *v <= 0.0 {
            continue;
        }
        let sweep = v / total * std::f64::consts::TAU;
        let color = dataset_color(ds, 0, i, true);
        if (sweep - std::f64::consts::TAU).abs() < 1e-9 {
            let _ = write!(svg, r#"<circle cx="{:.1}" cy="{:.1}" r="{:.1}" fill="{}"/>"#, cx, cy, r, color);
        } else {
            let (x0, y0) = (cx + r * angle.cos(), cy + r * angle.sin());
            let end = angle + sweep;
            let (x1, y1) = (cx + r * end.cos(), cy + r * end.sin());
            let large = if sweep > std::f64::consts::PI { 1 } else { 0 };
            let _ = write!(
                svg,
                r#"<path d="M{:.1},{:.1} L{:.1},{:.1} A{:.1},{:.1} 0 {} 1 {:.1},{:.1} Z" fill="{}"/>"#,
                cx, cy, x0, y0, r, r, large, x1, y1, color
            );
        }
        angle += sweep;
    }
    if hole > 0.0 {
        let _ = write!(
            svg,
            r##"<circle cx="{:.1}" cy="{:.1}" r="{:.1}" fill="#18181b"/>"##,
            cx,
            cy,
            r * hole
        );
    }
}

fn draw_legend(svg: &mut String, config: &ChartConfig, w: f64) {
    let entries: Vec<String> = match config.kind {
        ChartKind::Pie | ChartKind::Doughnut => {
            config.data.labels.iter().map(|l| l.to_string()).collect()
        }
        ChartKind::Bar | ChartKind::Line => config
            .data
            .datasets
            .iter()
            .filter_map(|d| d.label.clone())
            .collect(),
    };
    for (i, entry) in entries.iter().enumerate() {
        let _ = write!(
            svg,
            r##"<text x="{:.1}" y="{:.1}" font-size="12" text-anchor="end" fill="{}">{}</text>"##,
            w - 8.0,
            16.0 + 14.0 * i as f64,
            PALETTE[i % PALETTE.len()],
            escape_html(entry)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar_config() -> ChartConfig {
        serde_json::from_str(
            r#"{"type":"bar","data":{"labels":["Q1","Q2",2024],"datasets":[{"label":"Sales","data":[3,5,2]}]}}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_config_accepts_mixed_labels() {
        let config = bar_config();
        assert_eq!(config.kind, ChartKind::Bar);
        assert_eq!(config.data.labels[2].to_string(), "2024");
    }

    #[test]
    fn test_bar_svg_has_one_rect_per_point() {
        let svg = draw_svg(&bar_config(), 800, 400);
        assert!(svg.starts_with("<svg"));
        assert_eq!(svg.matches("<rect").count(), 3);
        assert!(svg.contains(">Sales</text>"));
    }

    #[test]
    fn test_pie_skips_non_positive_slices() {
        let config: ChartConfig = serde_json::from_str(
            r#"{"type":"doughnut","data":{"labels":["a","b","c"],"datasets":[{"data":[1,0,3]}]}}"#,
        )
        .unwrap();
        let svg = draw_svg(&config, 400, 400);
        assert_eq!(svg.matches("<path").count(), 2);
        assert!(svg.contains("<circle"));
    }

    #[test]
    fn test_create_and_destroy_releases_surface() {
        let surface = Surface::new("s", 800, 400);
        let mut chart = ChartLibrary.create(&surface, bar_config()).unwrap();
        assert_eq!(surface.attached(), Some(chart.id()));
        assert!(surface.drawing().is_some());
        chart.destroy();
        assert!(chart.is_destroyed());
        assert_eq!(surface.attached(), None);
        assert!(surface.drawing().is_none());
    }

    #[test]
    fn test_drop_destroys() {
        let surface = Surface::new("s", 800, 400);
        {
            let _chart = ChartLibrary.create(&surface, bar_config()).unwrap();
        }
        assert_eq!(surface.attached(), None);
    }

    #[test]
    fn test_labels_are_escaped() {
        let config: ChartConfig = serde_json::from_str(
            r#"{"type":"line","data":{"labels":["<b>"],"datasets":[{"label":"x&y","data":[1]}]}}"#,
        )
        .unwrap();
        let svg = draw_svg(&config, 200, 100);
        assert!(svg.contains("&lt;b&gt;"));
        assert!(svg.contains("x&amp;y"));
    }
}
