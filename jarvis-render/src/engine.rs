//! Shared rendering services and the per-block dispatch.

use crate::chart::ChartLibrary;
use crate::config::EngineConfig;
use crate::error::{RenderError, RenderResult};
use crate::lifecycle::ChartContext;
use crate::markdown::{FormattedText, MarkdownRenderer};
use crate::mount::{escape_html, mount, MountedComponent};
use crate::sandbox::{Capabilities, Sandbox};
use crate::surface::{ElementResolver, HostElements, Surface, SurfaceBinder};
use crate::transpile::Transpiler;
use jarvis_blocks::{Block, CodeBlock, Content, Role, ScriptExtractor};
use std::rc::Rc;
use uuid::Uuid;

/// Text shown in place of a block whose code failed at any stage.
pub const PLACEHOLDER_TEXT: &str = "Error rendering component.";

/// What to do with one block. Produced without side effects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderInstruction<'a> {
    Markdown { text: &'a str },
    Execute { index: usize, block: &'a CodeBlock },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderedBlock {
    Formatted(FormattedText),
    Component(MountedComponent),
    Placeholder { block_index: usize },
}

impl RenderedBlock {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, RenderedBlock::Placeholder { .. })
    }

    pub fn to_html(&self) -> String {
        match self {
            RenderedBlock::Formatted(text) => text.html.clone(),
            RenderedBlock::Component(component) => format!(
                "<div class=\"jv-component\" data-root=\"{}\">{}</div>",
                component.root_tag, component.html
            ),
            RenderedBlock::Placeholder { block_index } => format!(
                "<div class=\"jv-placeholder\" data-block=\"{}\">{}</div>",
                block_index,
                escape_html(PLACEHOLDER_TEXT)
            ),
        }
    }
}

pub struct Engine {
    config: EngineConfig,
    transpiler: Transpiler,
    sandbox: Sandbox,
    extractor: ScriptExtractor,
    binder: SurfaceBinder,
    markdown: MarkdownRenderer,
    charts: ChartLibrary,
    resolver: Rc<dyn ElementResolver>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> RenderResult<Self> {
        config.validate()?;
        let extractor = ScriptExtractor::new(&config.fence_marker)?;
        Ok(Self {
            transpiler: Transpiler::new(),
            sandbox: Sandbox::new(config.sandbox.clone()),
            extractor,
            binder: SurfaceBinder::new(&config.surface_id),
            markdown: MarkdownRenderer::with_theme(&config.syntax_theme),
            charts: ChartLibrary,
            resolver: Rc::new(HostElements::new()),
            config,
        })
    }

    /// Replaces the host's element resolver (an empty one by default).
    pub fn with_resolver(mut self, resolver: Rc<dyn ElementResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Swaps the markdown renderer, e.g. for one with a different highlighter.
    pub fn with_markdown(mut self, markdown: MarkdownRenderer) -> Self {
        self.markdown = markdown;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn markdown(&self) -> &MarkdownRenderer {
        &self.markdown
    }

    pub fn sender_label(&self, role: Role) -> &str {
        match role {
            Role::Assistant => &self.config.assistant_name,
            Role::User => &self.config.user_name,
        }
    }

    /// One instruction per block, in block order; a text unit is one
    /// instruction.
    pub fn plan<'a>(&self, content: &'a Content) -> Vec<RenderInstruction<'a>> {
        match content {
            Content::Text(unit) => vec![RenderInstruction::Markdown { text: &unit.text }],
            Content::Blocks(seq) => seq
                .blocks
                .iter()
                .enumerate()
                .map(|(index, block)| match block {
                    Block::Text(text) => RenderInstruction::Markdown { text: &text.text },
                    Block::Code(code) => RenderInstruction::Execute { index, block: code },
                })
                .collect(),
        }
    }

    pub fn render_content(&self, content: &Content) -> Vec<RenderedBlock> {
        self.plan(content)
            .into_iter()
            .map(|instruction| match instruction {
                RenderInstruction::Markdown { text } => {
                    RenderedBlock::Formatted(self.markdown.render(text))
                }
                RenderInstruction::Execute { index, block } => {
                    self.render_code_block(index, block)
                }
            })
            .collect()
    }

    /// Transpile, execute and mount one code block. Any failure becomes the
    /// placeholder for this block only.
    pub fn render_code_block(&self, index: usize, block: &CodeBlock) -> RenderedBlock {
        match self.try_render_code_block(index, block) {
            Ok(component) => RenderedBlock::Component(component),
            Err(err) => {
                tracing::warn!(
                    block = index,
                    description = block.description.as_deref().unwrap_or(""),
                    error = %err,
                    "code block failed to render"
                );
                RenderedBlock::Placeholder { block_index: index }
            }
        }
    }

    fn try_render_code_block(&self, index: usize, block: &CodeBlock) -> RenderResult<MountedComponent> {
        let chunk = self.transpiler.transpile(block, index)?;
        let execution = self.sandbox.execute(&chunk, Capabilities::component())?;
        let handle = execution
            .export
            .ok_or_else(|| RenderError::execution(&chunk.name, "script has no default export"))?;
        mount(&handle)
    }

    /// A fresh surface with the configured size.
    pub fn new_surface(&self) -> Surface {
        Surface::new(
            format!("chart-{}", Uuid::new_v4()),
            self.config.surface_width,
            self.config.surface_height,
        )
    }

    pub fn chart_context<'a>(&'a self, surface: Option<&'a Surface>, bubble: &'a str) -> ChartContext<'a> {
        ChartContext {
            sandbox: &self.sandbox,
            extractor: &self.extractor,
            binder: &self.binder,
            library: self.charts,
            resolver: self.resolver.clone(),
            surface,
            bubble,
        }
    }
}
