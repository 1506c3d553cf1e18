//! Host view object for one chat message.
//!
//! Rendering is a pure pass over the message. Side effects (running the chart
//! script against the bubble's surface) happen in `commit`, which the host
//! calls after the rendered output is in place. `unmount` releases the chart.

use crate::engine::{Engine, RenderedBlock};
use crate::lifecycle::{ChartLifecycle, ChartOutcome};
use crate::mount::escape_html;
use crate::surface::Surface;
use crate::tool_calls::ToolCallDisclosure;
use jarvis_blocks::{Message, Role};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceRequest {
    NotNeeded,
    /// Some code block constructs a chart.
    Required,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    pub bubble_id: Uuid,
    pub role: Role,
    pub sender: String,
    pub blocks: Vec<RenderedBlock>,
    pub surface: SurfaceRequest,
    pub tool_calls: Option<String>,
}

#[derive(Debug)]
pub struct MessageBubble {
    id: Uuid,
    message: Message,
    charts: ChartLifecycle,
    disclosure: ToolCallDisclosure,
    surface: Option<Surface>,
}

impl MessageBubble {
    pub fn new(message: Message) -> Self {
        Self {
            id: Uuid::new_v4(),
            message,
            charts: ChartLifecycle::new(),
            disclosure: ToolCallDisclosure::new(),
            surface: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn surface(&self) -> Option<&Surface> {
        self.surface.as_ref()
    }

    pub fn charts(&self) -> &ChartLifecycle {
        &self.charts
    }

    pub fn render(&self, engine: &Engine) -> RenderedMessage {
        let surface = if jarvis_blocks::needs_surface(&self.message.content) {
            SurfaceRequest::Required
        } else {
            SurfaceRequest::NotNeeded
        };
        RenderedMessage {
            bubble_id: self.id,
            role: self.message.role,
            sender: engine.sender_label(self.message.role).to_string(),
            blocks: engine.render_content(&self.message.content),
            surface,
            tool_calls: self.disclosure.render(self.message.tool_calls()),
        }
    }

    pub fn mount_surface(&mut self, surface: Surface) {
        if let Some(current) = &self.surface {
            if current.is_same(&surface) {
                return;
            }
        }
        self.unmount_surface();
        tracing::debug!(bubble = %self.id, surface = %surface.id(), "surface mounted");
        self.surface = Some(surface);
    }

    /// Detaches the surface. The chart drawn on it is destroyed and the next
    /// commit runs the chart script again.
    pub fn unmount_surface(&mut self) -> Option<Surface> {
        let surface = self.surface.take()?;
        self.charts.reset();
        Some(surface)
    }

    /// Binds the chart for the current content.
    pub fn commit(&mut self, engine: &Engine) -> ChartOutcome {
        let bubble = self.id.to_string();
        let ctx = engine.chart_context(self.surface.as_ref(), &bubble);
        self.charts.bind(&self.message.content, &ctx)
    }

    /// Render, allocate or drop the surface to match the content, then commit.
    pub fn render_and_commit(&mut self, engine: &Engine) -> (RenderedMessage, ChartOutcome) {
        let rendered = self.render(engine);
        match rendered.surface {
            SurfaceRequest::Required if self.surface.is_none() => {
                self.mount_surface(engine.new_surface());
            }
            SurfaceRequest::NotNeeded => {
                self.unmount_surface();
            }
            SurfaceRequest::Required => {}
        }
        let outcome = self.commit(engine);
        (rendered, outcome)
    }

    /// Replaces the message. The next commit sees new content and rebinds.
    pub fn update(&mut self, message: Message) {
        self.message = message;
    }

    pub fn toggle_tool_calls(&mut self) {
        self.disclosure.toggle();
    }

    pub fn to_html(&self, rendered: &RenderedMessage) -> String {
        let role = match rendered.role {
            Role::Assistant => "assistant",
            Role::User => "user",
        };
        let mut html = format!(
            "<article class=\"jv-bubble jv-{}\" data-bubble=\"{}\"><header class=\"jv-sender\">{}</header><div class=\"jv-blocks\">",
            role,
            rendered.bubble_id,
            escape_html(&rendered.sender)
        );
        for block in &rendered.blocks {
            html.push_str(&block.to_html());
        }
        html.push_str("</div>");
        let surface = self
            .surface
            .as_ref()
            .filter(|_| rendered.surface == SurfaceRequest::Required);
        if let Some(surface) = surface {
            html.push_str(&format!(
                "<div class=\"jv-chart-surface\" id=\"{}\" style=\"width:{}px;height:{}px\">{}</div>",
                escape_html(surface.id()),
                surface.width(),
                surface.height(),
                surface.drawing().unwrap_or_default()
            ));
        }
        if let Some(tools) = &rendered.tool_calls {
            html.push_str(tools);
        }
        html.push_str("</article>");
        html
    }

    /// Disposes the chart and lets go of the surface.
    pub fn unmount(&mut self) {
        self.charts.dispose();
        self.surface = None;
        tracing::debug!(bubble = %self.id, "bubble unmounted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use jarvis_blocks::{Block, Content, ToolCall};

    const CHART_BLOCK: &str = "--[[\n```lua\nChart.new('myChart', { type = 'pie', data = { labels = {'a', 'b'}, datasets = {{ data = {1, 2} }} } })\n```\n]]\nexport default '<Text>chart below</Text>'";

    fn engine() -> Engine {
        Engine::new(EngineConfig::default()).unwrap()
    }

    fn chart_message() -> Message {
        Message::new(
            Role::Assistant,
            Content::blocks(vec![Block::text("Here:"), Block::code(CHART_BLOCK)]),
        )
    }

    #[test]
    fn test_render_is_pure() {
        let engine = engine();
        let bubble = MessageBubble::new(chart_message());
        let rendered = bubble.render(&engine);
        assert_eq!(rendered.surface, SurfaceRequest::Required);
        assert_eq!(rendered.sender, "Jarvis");
        assert_eq!(rendered.blocks.len(), 2);
        assert!(bubble.surface().is_none());
        assert!(!bubble.charts().is_bound());
    }

    #[test]
    fn test_render_and_commit_draws_chart() {
        let engine = engine();
        let mut bubble = MessageBubble::new(chart_message());
        let (rendered, outcome) = bubble.render_and_commit(&engine);
        assert!(matches!(outcome, ChartOutcome::Bound { chart: Some(_) }));
        let surface = bubble.surface().unwrap();
        assert!(surface.id().starts_with("chart-"));
        let html = bubble.to_html(&rendered);
        assert!(html.contains("<svg"));
        assert!(html.contains("chart below"));
    }

    #[test]
    fn test_update_rebinds_and_unmount_disposes() {
        let engine = engine();
        let mut bubble = MessageBubble::new(chart_message());
        bubble.render_and_commit(&engine);
        let first = bubble.charts().chart_id();

        assert!(matches!(bubble.commit(&engine), ChartOutcome::Unchanged));
        bubble.update(chart_message());
        bubble.render_and_commit(&engine);
        assert_ne!(bubble.charts().chart_id(), first);

        let surface = bubble.surface().cloned().unwrap();
        bubble.unmount();
        assert_eq!(surface.attached(), None);
    }

    #[test]
    fn test_update_without_chart_drops_surface() {
        let engine = engine();
        let mut bubble = MessageBubble::new(chart_message());
        bubble.render_and_commit(&engine);
        let old = bubble.surface().cloned().unwrap();

        bubble.update(Message::new(
            Role::Assistant,
            Content::blocks(vec![Block::text("no chart now")]),
        ));
        let (rendered, outcome) = bubble.render_and_commit(&engine);
        assert!(matches!(outcome, ChartOutcome::NoScript), "{:?}", outcome);
        assert!(bubble.surface().is_none());
        assert_eq!(old.attached(), None);
        let html = bubble.to_html(&rendered);
        assert!(!html.contains("jv-chart-surface"));
        assert!(html.contains("no chart now"));
    }

    #[test]
    fn test_commit_without_surface_reports_unavailable() {
        let engine = engine();
        let mut bubble = MessageBubble::new(chart_message());
        assert!(matches!(bubble.commit(&engine), ChartOutcome::SurfaceUnavailable(_)));
    }

    #[test]
    fn test_tool_calls_toggle() {
        let engine = engine();
        let message = Message::new(Role::Assistant, Content::text("done")).with_tool_calls(vec![ToolCall {
            name: "lookup".to_string(),
            input: serde_json::json!({}),
            output: None,
        }]);
        let mut bubble = MessageBubble::new(message);
        let collapsed = bubble.render(&engine).tool_calls.unwrap();
        assert!(!collapsed.contains("lookup"));
        bubble.toggle_tool_calls();
        let expanded = bubble.render(&engine).tool_calls.unwrap();
        assert!(expanded.contains("lookup"));
    }

    #[test]
    fn test_user_bubble_label() {
        let engine = engine();
        let bubble = MessageBubble::new(Message::new(Role::User, Content::text("hi")));
        let rendered = bubble.render(&engine);
        assert_eq!(rendered.sender, "You");
        assert_eq!(rendered.surface, SurfaceRequest::NotNeeded);
        assert!(bubble.to_html(&rendered).contains("jv-user"));
    }
}
