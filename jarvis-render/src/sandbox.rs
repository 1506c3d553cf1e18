//! Luau sandbox for generated scripts.
//!
//! Every execution gets a fresh Lua state in sandbox mode with a heap limit,
//! a wall-clock budget and only the globals its capability set grants.
//! Component scripts see `ui` and `exports`; chart scripts see `Chart` and
//! `document`. Nothing else from the host is reachable.

use crate::chart::ChartCapability;
use crate::config::SandboxConfig;
use crate::error::{RenderError, RenderResult};
use crate::mount::escape_html;
use crate::transpile::Chunk;
use mlua::{
    Function, Lua, MetaMethod, Table, UserData, UserDataMethods, Value, Variadic, VmState,
};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Globals replaced by functions that raise.
pub const BLOCKED_GLOBALS: &[&str] = &[
    "io",
    "os",
    "require",
    "loadfile",
    "dofile",
    "load",
    "loadstring",
    "getfenv",
    "setfenv",
    "debug",
    "coroutine",
    "collectgarbage",
];

/// Host functionality granted to one execution.
pub struct Capabilities {
    component: bool,
    chart: Option<ChartCapability>,
}

impl Capabilities {
    /// `ui` builders and the `exports` slot.
    pub fn component() -> Self {
        Self {
            component: true,
            chart: None,
        }
    }

    /// `Chart` and `document`, bound to one surface.
    pub fn chart(capability: ChartCapability) -> Self {
        Self {
            component: false,
            chart: Some(capability),
        }
    }

    pub fn none() -> Self {
        Self {
            component: false,
            chart: None,
        }
    }
}

/// Markup built by `ui.el`. Kept apart from plain strings so that nested
/// elements are not escaped a second time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markup(pub String);

impl UserData for Markup {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| Ok(this.0.clone()));
    }
}

#[derive(Clone)]
struct Budget {
    started: Rc<Cell<Instant>>,
    limit: Option<Duration>,
}

impl Budget {
    fn new(timeout_ms: Option<u64>) -> Self {
        Self {
            started: Rc::new(Cell::new(Instant::now())),
            limit: timeout_ms.map(Duration::from_millis),
        }
    }

    fn restart(&self) {
        self.started.set(Instant::now());
    }

    fn exceeded(&self) -> Option<Duration> {
        let limit = self.limit?;
        (self.started.get().elapsed() > limit).then_some(limit)
    }
}

/// The component a script exported, callable until the handle is dropped.
pub struct ComponentHandle {
    chunk: String,
    export: Export,
    budget: Budget,
    // Keeps the state alive alongside the function reference.
    _lua: Lua,
}

enum Export {
    Function(Function),
    Markup(String),
}

impl std::fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("chunk", &self.chunk)
            .finish_non_exhaustive()
    }
}

impl ComponentHandle {
    pub fn chunk(&self) -> &str {
        &self.chunk
    }

    /// Calls the exported component with no props and returns its markup.
    pub fn render(&self) -> RenderResult<String> {
        match &self.export {
            Export::Markup(markup) => Ok(markup.clone()),
            Export::Function(f) => {
                self.budget.restart();
                let value: Value = f
                    .call(())
                    .map_err(|e| RenderError::execution(&self.chunk, e))?;
                markup_from_value(&value).ok_or_else(|| {
                    RenderError::execution(
                        &self.chunk,
                        format!("component returned {}, expected markup", value.type_name()),
                    )
                })
            }
        }
    }
}

/// Outcome of one successful script run.
#[derive(Debug)]
pub struct Execution {
    /// Set for component scripts that assigned `exports.default`.
    pub export: Option<ComponentHandle>,
    /// Lines passed to `print`, in order.
    pub printed: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Sandbox {
    config: SandboxConfig,
}

impl Sandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Runs `chunk` to completion with the given capabilities.
    pub fn execute(&self, chunk: &Chunk, capabilities: Capabilities) -> RenderResult<Execution> {
        let printed = Rc::new(RefCell::new(Vec::<String>::new()));
        let budget = Budget::new(self.config.timeout_ms);
        let lua = self
            .create_lua(&chunk.name, printed.clone(), budget.clone())
            .map_err(|e| RenderError::execution(&chunk.name, e))?;

        let exports = if capabilities.component {
            register_ui(&lua).map_err(|e| RenderError::execution(&chunk.name, e))?;
            let exports = lua
                .create_table()
                .map_err(|e| RenderError::execution(&chunk.name, e))?;
            lua.globals()
                .set("exports", exports.clone())
                .map_err(|e| RenderError::execution(&chunk.name, e))?;
            Some(exports)
        } else {
            None
        };
        if let Some(chart) = capabilities.chart {
            chart
                .register(&lua)
                .map_err(|e| RenderError::execution(&chunk.name, e))?;
        }

        budget.restart();
        lua.load(chunk.source.as_str())
            .set_name(chunk.lua_name())
            .exec()
            .map_err(|e| RenderError::execution(&chunk.name, e))?;

        let export = match exports {
            Some(exports) => read_export(&lua, &chunk.name, &exports, budget)?,
            None => None,
        };
        let printed = printed.borrow().clone();
        tracing::debug!(chunk = %chunk.name, printed = printed.len(), "script finished");
        Ok(Execution { export, printed })
    }

    fn create_lua(
        &self,
        chunk: &str,
        printed: Rc<RefCell<Vec<String>>>,
        budget: Budget,
    ) -> mlua::Result<Lua> {
        let lua = Lua::new();
        lua.sandbox(true)?;

        for name in BLOCKED_GLOBALS {
            let msg = format!("{} is not available in generated scripts", name);
            lua.globals().set(
                *name,
                lua.create_function(move |_, _: Variadic<Value>| {
                    Err::<(), _>(mlua::Error::runtime(msg.clone()))
                })?,
            )?;
        }

        let chunk_name = chunk.to_string();
        let print_fn = lua.create_function(move |_, args: Variadic<Value>| {
            let line = args.iter().map(display_value).collect::<Vec<_>>().join("\t");
            tracing::info!(chunk = %chunk_name, "{}", line);
            printed.borrow_mut().push(line);
            Ok(())
        })?;
        lua.globals().set("print", print_fn)?;

        lua.set_interrupt(move |_| {
            if let Some(limit) = budget.exceeded() {
                return Err(mlua::Error::runtime(format!(
                    "script exceeded its time budget of {} ms",
                    limit.as_millis()
                )));
            }
            Ok(VmState::Continue)
        });

        lua.set_memory_limit(self.config.memory_limit_bytes)?;
        Ok(lua)
    }
}

fn read_export(
    lua: &Lua,
    chunk: &str,
    exports: &Table,
    budget: Budget,
) -> RenderResult<Option<ComponentHandle>> {
    let value: Value = exports
        .get("default")
        .map_err(|e| RenderError::execution(chunk, e))?;
    let export = match value {
        Value::Nil => return Ok(None),
        Value::Function(f) => Export::Function(f),
        other => match markup_from_value(&other) {
            Some(markup) => Export::Markup(markup),
            None => {
                return Err(RenderError::execution(
                    chunk,
                    format!("default export is a {}, expected a component", other.type_name()),
                ))
            }
        },
    };
    Ok(Some(ComponentHandle {
        chunk: chunk.to_string(),
        export,
        budget,
        _lua: lua.clone(),
    }))
}

fn markup_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.to_string_lossy()),
        Value::UserData(ud) => ud.borrow::<Markup>().ok().map(|m| m.0.clone()),
        _ => None,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.to_string_lossy(),
        Value::UserData(ud) => match ud.borrow::<Markup>() {
            Ok(m) => m.0.clone(),
            Err(_) => format!("userdata: {:p}", value.to_pointer()),
        },
        other => format!("{}: {:p}", other.type_name(), other.to_pointer()),
    }
}

fn valid_tag(tag: &str) -> bool {
    let mut chars = tag.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric())
}

fn valid_attr(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn attr_value(value: &Value) -> mlua::Result<Option<String>> {
    Ok(match value {
        Value::Nil | Value::Boolean(false) => None,
        Value::Boolean(true) => Some("true".to_string()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.to_str()?.to_string()),
        other => {
            return Err(mlua::Error::runtime(format!(
                "attribute values must be strings, numbers or booleans, got {}",
                other.type_name()
            )))
        }
    })
}

fn push_child(out: &mut String, child: &Value, depth: usize) -> mlua::Result<()> {
    if depth > 32 {
        return Err(mlua::Error::runtime("children nested too deeply"));
    }
    match child {
        Value::Nil | Value::Boolean(_) => {}
        Value::Integer(i) => out.push_str(&i.to_string()),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => out.push_str(&escape_html(&s.to_str()?)),
        Value::UserData(ud) => out.push_str(&ud.borrow::<Markup>()?.0),
        Value::Table(t) => {
            for item in t.sequence_values::<Value>() {
                push_child(out, &item?, depth + 1)?;
            }
        }
        other => {
            return Err(mlua::Error::runtime(format!(
                "cannot render a {} as a child",
                other.type_name()
            )))
        }
    }
    Ok(())
}

/// Builds `<Tag a="1" b="2">children</Tag>`; attributes are sorted by name.
fn build_element(tag: &str, props: Option<Table>, children: &[Value]) -> mlua::Result<Markup> {
    if !valid_tag(tag) {
        return Err(mlua::Error::runtime(format!("invalid element name '{}'", tag)));
    }
    let mut attrs = BTreeMap::new();
    if let Some(props) = props {
        for pair in props.pairs::<String, Value>() {
            let (name, value) = pair?;
            if !valid_attr(&name) {
                return Err(mlua::Error::runtime(format!("invalid attribute name '{}'", name)));
            }
            if let Some(v) = attr_value(&value)? {
                attrs.insert(name, v);
            }
        }
    }
    let mut out = format!("<{}", tag);
    for (name, value) in &attrs {
        out.push_str(&format!(" {}=\"{}\"", name, escape_html(value)));
    }
    let mut inner = String::new();
    for child in children {
        push_child(&mut inner, child, 0)?;
    }
    if inner.is_empty() {
        out.push_str(" />");
    } else {
        out.push('>');
        out.push_str(&inner);
        out.push_str(&format!("</{}>", tag));
    }
    Ok(Markup(out))
}

fn register_ui(lua: &Lua) -> mlua::Result<()> {
    let ui = lua.create_table()?;
    ui.set(
        "el",
        lua.create_function(
            |_, (tag, props, children): (String, Option<Table>, Variadic<Value>)| {
                build_element(&tag, props, &children)
            },
        )?,
    )?;
    ui.set(
        "fragment",
        lua.create_function(|_, children: Variadic<Value>| {
            let mut out = String::new();
            for child in children.iter() {
                push_child(&mut out, child, 0)?;
            }
            Ok(Markup(out))
        })?,
    )?;
    ui.set(
        "escape",
        lua.create_function(|_, s: String| Ok(escape_html(&s)))?,
    )?;
    ui.set("raw", lua.create_function(|_, s: String| Ok(Markup(s)))?)?;
    lua.globals().set("ui", ui)?;
    Ok(())
}
