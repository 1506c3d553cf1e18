//! Collapsible summary of the tools an assistant message used.

use crate::mount::escape_html;
use jarvis_blocks::ToolCall;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisclosureState {
    #[default]
    Collapsed,
    Expanded,
}

#[derive(Debug, Clone, Default)]
pub struct ToolCallDisclosure {
    state: DisclosureState,
}

impl ToolCallDisclosure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DisclosureState {
        self.state
    }

    pub fn is_expanded(&self) -> bool {
        self.state == DisclosureState::Expanded
    }

    pub fn toggle(&mut self) {
        self.state = match self.state {
            DisclosureState::Collapsed => DisclosureState::Expanded,
            DisclosureState::Expanded => DisclosureState::Collapsed,
        };
    }

    /// `None` when there is nothing to disclose.
    pub fn render(&self, calls: &[ToolCall]) -> Option<String> {
        if calls.is_empty() {
            return None;
        }
        let noun = if calls.len() == 1 { "tool" } else { "tools" };
        let mut out = String::new();
        let _ = write!(
            out,
            "<div class=\"jv-tools\" data-expanded=\"{}\"><button class=\"jv-tools-summary\">Used {} {}</button>",
            self.is_expanded(),
            calls.len(),
            noun
        );
        if self.is_expanded() {
            out.push_str("<ul class=\"jv-tools-list\">");
            for call in calls {
                let input = serde_json::to_string_pretty(&call.input)
                    .unwrap_or_else(|_| call.input.to_string());
                let _ = write!(
                    out,
                    "<li><span class=\"jv-tool-name\">{}</span><pre class=\"jv-tool-input\">{}</pre>",
                    escape_html(&call.name),
                    escape_html(&input)
                );
                if let Some(output) = &call.output {
                    let _ = write!(out, "<pre class=\"jv-tool-output\">{}</pre>", escape_html(output));
                }
                out.push_str("</li>");
            }
            out.push_str("</ul>");
        }
        out.push_str("</div>");
        Some(out)
    }
}
