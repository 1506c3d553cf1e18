//! Component script to runnable Luau.
//!
//! Scripts run outside any module system, so the single `export default`
//! declaration is rewritten into an assignment on the `exports` slot that the
//! sandbox injects. The result is compiled (never run) to reject syntax errors
//! before execution.

use crate::error::{RenderError, RenderResult};
use jarvis_blocks::CodeBlock;
use mlua::Lua;
use regex::Regex;
use std::sync::OnceLock;

/// A runnable unit of Luau source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Shown in error messages, e.g. `block[2]`.
    pub name: String,
    pub source: String,
}

impl Chunk {
    /// Chunk for a chart script found in block `index`; chart scripts are not
    /// transpiled.
    pub fn chart_script(index: usize, source: impl Into<String>) -> Self {
        Self {
            name: format!("chart[{}]", index),
            source: source.into(),
        }
    }

    /// Name in the form Luau prints verbatim in tracebacks.
    pub(crate) fn lua_name(&self) -> String {
        format!("={}", self.name)
    }
}

static EXPORT_DEFAULT: OnceLock<Regex> = OnceLock::new();
static NAMED_FUNCTION: OnceLock<Regex> = OnceLock::new();

fn export_default_re() -> &'static Regex {
    EXPORT_DEFAULT.get_or_init(|| {
        Regex::new(r"(?m)^([ \t]*)export[ \t]+default\b[ \t]*").expect("valid export pattern")
    })
}

fn named_function_re() -> &'static Regex {
    NAMED_FUNCTION.get_or_init(|| {
        Regex::new(r"^function[ \t]+([A-Za-z_][A-Za-z0-9_]*)[ \t]*\(").expect("valid function pattern")
    })
}

/// Rewrites the first `export default` statement onto `exports.default`.
/// Source without one is returned unchanged.
pub fn rewrite_export(source: &str) -> String {
    let Some(caps) = export_default_re().captures(source) else {
        return source.to_string();
    };
    let (Some(whole), Some(indent)) = (caps.get(0), caps.get(1)) else {
        return source.to_string();
    };
    let before = &source[..whole.start()];
    let rest = &source[whole.end()..];

    match named_function_re().captures(rest).and_then(|c| c.get(1)) {
        // Keep the name bound locally so the function can recurse.
        Some(name) => format!(
            "{}{}local {}\nexports.default = {}\n",
            before,
            indent.as_str(),
            rest,
            name.as_str()
        ),
        None => format!("{}{}exports.default = {}", before, indent.as_str(), rest),
    }
}

/// Per-block translation with a syntax check.
pub struct Transpiler {
    compiler: Lua,
}

impl Transpiler {
    pub fn new() -> Self {
        Self { compiler: Lua::new() }
    }

    /// Transpile the code of block `index`. Each block is independent: a
    /// failure here says nothing about sibling blocks.
    pub fn transpile(&self, block: &CodeBlock, index: usize) -> RenderResult<Chunk> {
        let chunk = Chunk {
            name: format!("block[{}]", index),
            source: rewrite_export(&block.code),
        };
        self.compiler
            .load(chunk.source.as_str())
            .set_name(chunk.lua_name())
            .into_function()
            .map_err(|e| RenderError::Transpile {
                chunk: chunk.name.clone(),
                message: match e {
                    mlua::Error::SyntaxError { message, .. } => message,
                    other => other.to_string(),
                },
            })?;
        Ok(chunk)
    }
}

impl Default for Transpiler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(src: &str) -> CodeBlock {
        CodeBlock {
            description: None,
            code: src.to_string(),
        }
    }

    #[test]
    fn test_rewrites_expression_export() {
        assert_eq!(
            rewrite_export("export default \"<Divider />\""),
            "exports.default = \"<Divider />\""
        );
    }

    #[test]
    fn test_rewrites_anonymous_function_export() {
        let out = rewrite_export("local x = 1\nexport default function()\n  return x\nend");
        assert_eq!(out, "local x = 1\nexports.default = function()\n  return x\nend");
    }

    #[test]
    fn test_rewrites_named_function_export() {
        let out = rewrite_export("export default function App()\n  return \"\"\nend");
        assert_eq!(
            out,
            "local function App()\n  return \"\"\nend\nexports.default = App\n"
        );
    }

    #[test]
    fn test_only_first_export_rewritten() {
        let out = rewrite_export("export default 1\nexport default 2");
        assert_eq!(out, "exports.default = 1\nexport default 2");
    }

    #[test]
    fn test_source_without_export_unchanged() {
        assert_eq!(rewrite_export("local a = 1"), "local a = 1");
    }

    #[test]
    fn test_transpile_valid_block() {
        let t = Transpiler::new();
        let chunk = t.transpile(&code("export default function App()\n  return 'x'\nend"), 3).unwrap();
        assert_eq!(chunk.name, "block[3]");
        assert!(chunk.source.contains("exports.default = App"));
    }

    #[test]
    fn test_transpile_syntax_error() {
        let t = Transpiler::new();
        let err = t.transpile(&code("export default function(\n"), 0).unwrap_err();
        match err {
            RenderError::Transpile { chunk, .. } => assert_eq!(chunk, "block[0]"),
            other => panic!("expected transpile failure, got {:?}", other),
        }
    }

    #[test]
    fn test_second_export_is_a_syntax_error() {
        let t = Transpiler::new();
        assert!(t.transpile(&code("export default 1\nexport default 2"), 0).is_err());
    }
}
