//! # Jarvis content blocks
//!
//! Data layer for assistant messages: the typed message body and its JSON
//! wire schema, the Jarvis markup language that live components render to,
//! and extraction of the chart script fenced inside a code block.
//!
//! Nothing in this crate runs code; execution lives in `jarvis-render`.
//!
//! ## Example: decoding a message body
//! ```
//! use jarvis_blocks::{Block, Content};
//!
//! let content = Content::from_json(r#"{"blocks":[{"block_type":"text","text":"**hi**"}]}"#)
//!     .expect("valid content");
//! assert_eq!(content.block_list().map(|b| b.len()), Some(1));
//! assert!(matches!(content.block_list().unwrap()[0], Block::Text(_)));
//! ```
//!
//! ## Example: markup
//! ```
//! use jarvis_blocks::parse_markup;
//!
//! let tree = parse_markup(r#"<Column gap="8"><Heading level="2" text="Totals" /><Progress value="40" /></Column>"#)
//!     .expect("valid markup");
//! assert_eq!(tree.children().len(), 2);
//! ```

pub mod components;
pub mod content;
pub mod error;
pub mod extract;
pub mod parser;
pub mod validator;

pub use components::Component;
pub use content::{Block, BlockSequence, CodeBlock, Content, Message, Role, TextBlock, TextUnit, ToolCall};
pub use error::{BlocksError, BlocksResult};
pub use extract::{needs_surface, ChartScript, ScriptExtractor, CHART_CONSTRUCTOR, DEFAULT_FENCE_MARKER};

/// Parse and validate Jarvis markup (one root component).
pub fn parse_markup(xml: &str) -> BlocksResult<Component> {
    parser::parse_markup(xml)
}
