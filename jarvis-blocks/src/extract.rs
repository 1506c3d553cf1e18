//! Locates the chart script fenced inside a message's code blocks.

use crate::content::{Block, Content};
use crate::error::{BlocksError, BlocksResult};
use regex::Regex;

/// Fence marker used when none is configured.
pub const DEFAULT_FENCE_MARKER: &str = "lua";

/// Call that marks a code block as drawing a chart.
pub const CHART_CONSTRUCTOR: &str = "Chart.new";

/// A chart script lifted verbatim out of a code block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartScript {
    /// Index of the block the script was found in.
    pub block_index: usize,
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct ScriptExtractor {
    marker: String,
    pattern: Regex,
}

impl ScriptExtractor {
    /// Extractor for ```` ```<marker> ```` fences.
    pub fn new(marker: &str) -> BlocksResult<Self> {
        if marker.is_empty()
            || !marker
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(BlocksError::InvalidFenceMarker {
                marker: marker.to_string(),
                reason: "must be non-empty and contain only letters, digits, '-' or '_'"
                    .to_string(),
            });
        }
        let pattern = Regex::new(&format!(
            r"(?s)```{}\r?\n(.*?)\r?\n```",
            regex::escape(marker)
        ))
        .map_err(|e| BlocksError::InvalidFenceMarker {
            marker: marker.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            marker: marker.to_string(),
            pattern,
        })
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// First fenced script in a single piece of source text.
    pub fn extract(&self, code: &str) -> Option<String> {
        self.pattern
            .captures(code)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// First fenced script across the code blocks of a sequence. Later
    /// scripts, in the same block or in others, are ignored.
    pub fn extract_first(&self, blocks: &[Block]) -> Option<ChartScript> {
        blocks.iter().enumerate().find_map(|(block_index, block)| match block {
            Block::Code(code) => self.extract(&code.code).map(|source| ChartScript {
                block_index,
                source,
            }),
            Block::Text(_) => None,
        })
    }

    /// Same as [`extract_first`](Self::extract_first) for a whole body.
    pub fn extract_from_content(&self, content: &Content) -> Option<ChartScript> {
        content.block_list().and_then(|blocks| self.extract_first(blocks))
    }
}

impl Default for ScriptExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_FENCE_MARKER).expect("default fence marker is valid")
    }
}

/// True when some code block constructs a chart, i.e. the message needs a
/// drawing surface.
pub fn needs_surface(content: &Content) -> bool {
    content
        .code_blocks()
        .any(|(_, code)| code.code.contains(CHART_CONSTRUCTOR))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHART_BLOCK: &str = "export default \"<Text text='x' />\"\n--[[\n```lua\nChart.new(\"myChart\", {})\n```\n]]";

    #[test]
    fn test_extracts_inner_text_verbatim() {
        let ex = ScriptExtractor::default();
        assert_eq!(
            ex.extract(CHART_BLOCK).as_deref(),
            Some("Chart.new(\"myChart\", {})")
        );
    }

    #[test]
    fn test_other_fence_languages_ignored() {
        let ex = ScriptExtractor::default();
        assert_eq!(ex.extract("```python\nprint(1)\n```"), None);
    }

    #[test]
    fn test_first_match_wins_across_blocks() {
        let ex = ScriptExtractor::default();
        let blocks = vec![
            Block::text("```lua\nnot_code()\n```"),
            Block::code("no fence here"),
            Block::code("```lua\nfirst()\n```\n```lua\nsecond()\n```"),
            Block::code("```lua\nthird()\n```"),
        ];
        let script = ex.extract_first(&blocks).unwrap();
        assert_eq!(script.block_index, 2);
        assert_eq!(script.source, "first()");
    }

    #[test]
    fn test_custom_marker() {
        let ex = ScriptExtractor::new("chart").unwrap();
        assert_eq!(ex.extract("```chart\ndraw()\n```").as_deref(), Some("draw()"));
        assert!(ScriptExtractor::new("a b").is_err());
    }

    #[test]
    fn test_needs_surface() {
        assert!(needs_surface(&Content::blocks(vec![Block::code(CHART_BLOCK)])));
        assert!(!needs_surface(&Content::blocks(vec![Block::text("Chart.new")])));
        assert!(!needs_surface(&Content::text("Chart.new")));
    }
}
