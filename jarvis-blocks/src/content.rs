//! Message body model and its JSON wire schema.
//!
//! The wire format distinguishes a plain text body from a block sequence only
//! by which field is present (`text` or `blocks`). That decision is made once,
//! while decoding, and from then on [`Content`] is an ordinary tagged enum.

use crate::error::{BlocksError, BlocksResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    /// The chat backend historically sends `"ai"` for assistant turns.
    #[serde(alias = "ai")]
    Assistant,
}

/// One message as handed over by the chat-state layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub role: Role,
    /// Shared so that views can detect a content change by reference.
    pub content: Arc<Content>,
    #[serde(default, alias = "toolCalls", skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl Message {
    pub fn new(role: Role, content: Content) -> Self {
        Self {
            id: None,
            role,
            content: Arc::new(content),
            tool_calls: None,
        }
    }

    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = Some(calls);
        self
    }

    /// Decode a message from its JSON wire form.
    pub fn from_json(json: &str) -> BlocksResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Tool calls attached to this message (empty when absent).
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }
}

/// Full body of one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireContent", into = "WireContent")]
pub enum Content {
    Text(TextUnit),
    Blocks(BlockSequence),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextUnit {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockSequence {
    pub blocks: Vec<Block>,
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text(TextUnit { text: text.into() })
    }

    pub fn blocks(blocks: Vec<Block>) -> Self {
        Content::Blocks(BlockSequence { blocks })
    }

    /// Decode content from its JSON wire form.
    pub fn from_json(json: &str) -> BlocksResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The block sequence, if this body has one.
    pub fn block_list(&self) -> Option<&[Block]> {
        match self {
            Content::Blocks(seq) => Some(&seq.blocks),
            Content::Text(_) => None,
        }
    }

    /// Code blocks in display order, paired with their block index.
    pub fn code_blocks(&self) -> impl Iterator<Item = (usize, &CodeBlock)> {
        self.block_list()
            .unwrap_or(&[])
            .iter()
            .enumerate()
            .filter_map(|(i, b)| match b {
                Block::Code(code) => Some((i, code)),
                Block::Text(_) => None,
            })
    }
}

/// One unit of a structured body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "block_type")]
pub enum Block {
    #[serde(rename = "text")]
    Text(TextBlock),
    /// Executable block. The wire tag is kept from the original web client.
    #[serde(rename = "react")]
    Code(CodeBlock),
}

impl Block {
    pub fn text(text: impl Into<String>) -> Self {
        Block::Text(TextBlock { text: text.into() })
    }

    pub fn code(code: impl Into<String>) -> Self {
        Block::Code(CodeBlock {
            description: None,
            code: code.into(),
        })
    }

    pub fn is_code(&self) -> bool {
        matches!(self, Block::Code(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
}

/// Source for a live component, possibly embedding a fenced chart script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub code: String,
}

impl CodeBlock {
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A tool invocation record attached to an assistant turn. Display only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub input: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Wire shape of [`Content`]: the variant is whichever field is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    blocks: Option<Vec<Block>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    /// Text-only bodies sometimes arrive shaped like a text block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    block_type: Option<String>,
}

impl TryFrom<WireContent> for Content {
    type Error = BlocksError;

    fn try_from(wire: WireContent) -> Result<Self, Self::Error> {
        match (wire.blocks, wire.text) {
            (Some(blocks), _) => Ok(Content::blocks(blocks)),
            (None, Some(text)) => Ok(Content::text(text)),
            (None, None) => Err(BlocksError::InvalidContent(
                "content must have either a 'blocks' or a 'text' field".to_string(),
            )),
        }
    }
}

impl From<Content> for WireContent {
    fn from(content: Content) -> Self {
        match content {
            Content::Text(unit) => WireContent {
                blocks: None,
                text: Some(unit.text),
                block_type: None,
            },
            Content::Blocks(seq) => WireContent {
                blocks: Some(seq.blocks),
                text: None,
                block_type: None,
            },
        }
    }
}
