//! Per-bubble chart lifecycle.
//!
//! A bubble owns at most one chart. Binding is keyed on the identity of the
//! content value: rebinding the same content does nothing, new content
//! disposes the old chart before its script runs.

use crate::chart::{ChartCapability, ChartId, ChartInstance, ChartLibrary, ChartSlot};
use crate::error::RenderError;
use crate::sandbox::{Capabilities, Sandbox};
use crate::surface::{ElementResolver, Surface, SurfaceBinder};
use crate::transpile::Chunk;
use jarvis_blocks::{Content, ScriptExtractor};
use std::rc::Rc;
use std::sync::Arc;

/// Everything one bind needs from the engine and the bubble.
pub struct ChartContext<'a> {
    pub sandbox: &'a Sandbox,
    pub extractor: &'a ScriptExtractor,
    pub binder: &'a SurfaceBinder,
    pub library: ChartLibrary,
    pub resolver: Rc<dyn ElementResolver>,
    /// The bubble's surface, once mounted.
    pub surface: Option<&'a Surface>,
    /// Used in log lines and errors.
    pub bubble: &'a str,
}

#[derive(Debug)]
pub enum ChartOutcome {
    /// Same content as the last bind.
    Unchanged,
    /// No chart script in the content; any previous chart was disposed.
    NoScript,
    /// A chart script exists but the surface is not mounted yet. Nothing was
    /// recorded, so the next bind retries.
    SurfaceUnavailable(RenderError),
    /// The script ran; `chart` is set if it created one.
    Bound { chart: Option<ChartId> },
    /// The script failed. A chart it created before failing stays bound.
    Failed(RenderError),
}

impl ChartOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ChartOutcome::Failed(_) | ChartOutcome::SurfaceUnavailable(_)
        )
    }
}

#[derive(Debug, Default)]
pub struct ChartLifecycle {
    chart: Option<ChartInstance>,
    last_content: Option<Arc<Content>>,
}

impl ChartLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_bound(&self) -> bool {
        self.chart.is_some()
    }

    pub fn chart_id(&self) -> Option<ChartId> {
        self.chart.as_ref().map(|c| c.id())
    }

    pub fn chart(&self) -> Option<&ChartInstance> {
        self.chart.as_ref()
    }

    pub fn bind(&mut self, content: &Arc<Content>, ctx: &ChartContext<'_>) -> ChartOutcome {
        if let Some(last) = &self.last_content {
            if Arc::ptr_eq(last, content) {
                return ChartOutcome::Unchanged;
            }
        }

        let Some(script) = ctx.extractor.extract_from_content(content) else {
            self.dispose();
            self.last_content = Some(content.clone());
            return ChartOutcome::NoScript;
        };

        let Some(surface) = ctx.surface else {
            let err = RenderError::SurfaceUnavailable {
                bubble: ctx.bubble.to_string(),
            };
            tracing::warn!(bubble = %ctx.bubble, "chart script found but no surface is mounted");
            return ChartOutcome::SurfaceUnavailable(err);
        };

        self.dispose();
        self.last_content = Some(content.clone());

        let slot = ChartSlot::default();
        let chunk = Chunk::chart_script(script.block_index, script.source);
        let result = {
            let guard = ctx.binder.bind(ctx.resolver.clone(), surface.clone());
            let capability = ChartCapability::new(ctx.library, guard.binding(), slot.clone());
            ctx.sandbox.execute(&chunk, Capabilities::chart(capability))
        };
        self.chart = slot.take();

        match result {
            Ok(exec) => {
                tracing::debug!(
                    bubble = %ctx.bubble,
                    chart = ?self.chart_id(),
                    printed = exec.printed.len(),
                    "chart script bound"
                );
                ChartOutcome::Bound {
                    chart: self.chart_id(),
                }
            }
            Err(err) => {
                tracing::error!(bubble = %ctx.bubble, error = %err, "chart script failed");
                ChartOutcome::Failed(err)
            }
        }
    }

    /// Destroys the bound chart, if any. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if let Some(mut chart) = self.chart.take() {
            chart.destroy();
        }
    }

    /// Disposes and forgets the last content so the next bind runs again.
    pub fn reset(&mut self) {
        self.dispose();
        self.last_content = None;
    }
}

impl Drop for ChartLifecycle {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{HostElements, SurfaceEvent};
    use jarvis_blocks::{Block, BlockSequence};

    const SCRIPT: &str = "--[[\n```lua\nlocal ctx = document.getElementById('myChart')\nChart.new(ctx, { type = 'bar', data = { labels = {'a'}, datasets = {{ data = {1} }} } })\n```\n]]\nexport default '<Divider />'";

    fn chart_content(code: &str) -> Arc<Content> {
        Arc::new(Content::Blocks(BlockSequence {
            blocks: vec![Block::code(code)],
        }))
    }

    struct Fixture {
        sandbox: Sandbox,
        extractor: ScriptExtractor,
        binder: SurfaceBinder,
        host: Rc<HostElements>,
        surface: Surface,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                sandbox: Sandbox::default(),
                extractor: ScriptExtractor::default(),
                binder: SurfaceBinder::new("myChart"),
                host: Rc::new(HostElements::new()),
                surface: Surface::new("chart-1", 800, 400),
            }
        }

        fn ctx(&self, mounted: bool) -> ChartContext<'_> {
            ChartContext {
                sandbox: &self.sandbox,
                extractor: &self.extractor,
                binder: &self.binder,
                library: ChartLibrary,
                resolver: self.host.clone(),
                surface: mounted.then_some(&self.surface),
                bubble: "bubble-1",
            }
        }
    }

    #[test]
    fn test_bind_creates_one_chart_on_bubble_surface() {
        let fx = Fixture::new();
        let mut lifecycle = ChartLifecycle::new();
        let outcome = lifecycle.bind(&chart_content(SCRIPT), &fx.ctx(true));
        assert!(matches!(outcome, ChartOutcome::Bound { chart: Some(_) }));
        assert_eq!(fx.surface.attached(), lifecycle.chart_id());
        assert!(fx.host.resolve("myChart").is_none());
    }

    #[test]
    fn test_same_content_is_idempotent() {
        let fx = Fixture::new();
        let mut lifecycle = ChartLifecycle::new();
        let content = chart_content(SCRIPT);
        lifecycle.bind(&content, &fx.ctx(true));
        let first = lifecycle.chart_id();
        assert!(matches!(lifecycle.bind(&content, &fx.ctx(true)), ChartOutcome::Unchanged));
        assert_eq!(lifecycle.chart_id(), first);
        assert_eq!(fx.surface.events().len(), 1);
    }

    #[test]
    fn test_new_content_disposes_before_creating() {
        let fx = Fixture::new();
        let mut lifecycle = ChartLifecycle::new();
        lifecycle.bind(&chart_content(SCRIPT), &fx.ctx(true));
        let first = lifecycle.chart_id().unwrap();
        lifecycle.bind(&chart_content(SCRIPT), &fx.ctx(true));
        let second = lifecycle.chart_id().unwrap();
        assert_ne!(first, second);
        assert_eq!(
            fx.surface.events(),
            vec![
                SurfaceEvent::Attached(first),
                SurfaceEvent::Detached(first),
                SurfaceEvent::Attached(second)
            ]
        );
    }

    #[test]
    fn test_missing_surface_is_retried() {
        let fx = Fixture::new();
        let mut lifecycle = ChartLifecycle::new();
        let content = chart_content(SCRIPT);
        assert!(matches!(
            lifecycle.bind(&content, &fx.ctx(false)),
            ChartOutcome::SurfaceUnavailable(_)
        ));
        assert!(matches!(
            lifecycle.bind(&content, &fx.ctx(true)),
            ChartOutcome::Bound { chart: Some(_) }
        ));
    }

    #[test]
    fn test_content_without_script_disposes() {
        let fx = Fixture::new();
        let mut lifecycle = ChartLifecycle::new();
        lifecycle.bind(&chart_content(SCRIPT), &fx.ctx(true));
        let outcome = lifecycle.bind(&chart_content("export default '<Divider />'"), &fx.ctx(true));
        assert!(matches!(outcome, ChartOutcome::NoScript));
        assert!(!lifecycle.is_bound());
        assert_eq!(fx.surface.attached(), None);
    }

    #[test]
    fn test_failing_script_keeps_chart_created_before_error() {
        let fx = Fixture::new();
        let mut lifecycle = ChartLifecycle::new();
        let code = "```lua\nChart.new('myChart', { type = 'line' })\nerror('late failure')\n```";
        let outcome = lifecycle.bind(&chart_content(code), &fx.ctx(true));
        assert!(matches!(outcome, ChartOutcome::Failed(RenderError::Execution { .. })));
        assert!(lifecycle.is_bound());
    }

    #[test]
    fn test_failed_second_chart_leaves_nothing_bound() {
        let fx = Fixture::new();
        let sidebar = Surface::new("sidebar", 200, 100);
        fx.host.register(sidebar.clone());
        let config = serde_json::from_str(r#"{"type":"bar","data":{"labels":["a"],"datasets":[{"data":[1]}]}}"#).unwrap();
        let held = ChartLibrary.create(&sidebar, config).unwrap();

        let code = "```lua\nlocal cfg = { type = 'pie', data = { labels = {'a'}, datasets = {{ data = {1} }} } }\nChart.new('myChart', cfg)\nassert(not pcall(Chart.new, 'sidebar', cfg))\n```";
        let mut lifecycle = ChartLifecycle::new();
        let outcome = lifecycle.bind(&chart_content(code), &fx.ctx(true));
        assert!(matches!(outcome, ChartOutcome::Bound { chart: None }), "{:?}", outcome);
        assert!(!lifecycle.is_bound());
        assert_eq!(fx.surface.attached(), None);
        assert_eq!(sidebar.attached(), Some(held.id()));
    }

    #[test]
    fn test_designated_id_released_after_throw() {
        let fx = Fixture::new();
        let mut lifecycle = ChartLifecycle::new();
        let code = "```lua\nerror('early failure')\n```";
        assert!(lifecycle.bind(&chart_content(code), &fx.ctx(true)).is_failure());
        assert!(fx.host.resolve("myChart").is_none());
        assert_eq!(fx.surface.attached(), None);
    }

    #[test]
    fn test_drop_disposes() {
        let fx = Fixture::new();
        {
            let mut lifecycle = ChartLifecycle::new();
            lifecycle.bind(&chart_content(SCRIPT), &fx.ctx(true));
            assert!(fx.surface.attached().is_some());
        }
        assert_eq!(fx.surface.attached(), None);
    }
}
