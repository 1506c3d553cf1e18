//! # Jarvis message renderer
//!
//! Turns a decoded message body into HTML. Text blocks are rendered as
//! markdown. Code blocks are component scripts: each one is transpiled to
//! Luau, run in a fresh sandboxed interpreter and the markup it exports is
//! mounted in the block's slot. A failure in one block only replaces that
//! block with a placeholder.
//!
//! A chart script fenced inside a code block is run once per message body,
//! during [`MessageBubble::commit`], against the bubble's own drawing surface.
//!
//! ## Example
//! ```
//! use jarvis_blocks::{Content, Message, Role};
//! use jarvis_render::{Engine, EngineConfig, MessageBubble};
//!
//! let engine = Engine::new(EngineConfig::default()).expect("default config is valid");
//! let mut bubble = MessageBubble::new(Message::new(Role::Assistant, Content::text("**hi**")));
//! let (rendered, _) = bubble.render_and_commit(&engine);
//! assert!(bubble.to_html(&rendered).contains("<strong>hi</strong>"));
//! ```

pub mod bubble;
pub mod chart;
pub mod config;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod markdown;
pub mod mount;
pub mod sandbox;
pub mod surface;
pub mod tool_calls;
pub mod transpile;

pub use bubble::{MessageBubble, RenderedMessage, SurfaceRequest};
pub use chart::{ChartConfig, ChartId, ChartInstance, ChartKind, ChartLibrary};
pub use config::{EngineConfig, SandboxConfig};
pub use engine::{Engine, RenderInstruction, RenderedBlock, PLACEHOLDER_TEXT};
pub use error::{RenderError, RenderResult};
pub use lifecycle::{ChartLifecycle, ChartOutcome};
pub use markdown::{CodeHighlighter, FormattedText, MarkdownRenderer, SyntectHighlighter};
pub use mount::MountedComponent;
pub use sandbox::{Capabilities, ComponentHandle, Execution, Sandbox};
pub use surface::{BindingGuard, ElementResolver, HostElements, Surface, SurfaceBinder, SurfaceBinding};
pub use tool_calls::ToolCallDisclosure;
pub use transpile::{Chunk, Transpiler};
