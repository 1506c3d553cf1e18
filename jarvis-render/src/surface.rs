//! Drawing surfaces and the binding that lets chart scripts find theirs.
//!
//! Generated chart scripts address one fixed identifier (`myChart`). Instead
//! of redirecting a shared lookup function for the duration of a script, the
//! chart capability is handed a [`SurfaceBinding`] that maps that identifier
//! to the current bubble's surface and defers everything else to the host's
//! resolver. The host resolver is never mutated.

use crate::chart::ChartId;
use crate::error::{RenderError, RenderResult};
use mlua::{UserData, UserDataFields, UserDataMethods};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Attachment history entry, oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    Attached(ChartId),
    Detached(ChartId),
}

#[derive(Debug, Default)]
struct SurfaceState {
    attached: Option<ChartId>,
    /// SVG document of the attached chart.
    drawing: Option<String>,
    events: Vec<SurfaceEvent>,
}

/// One drawing area owned by a message bubble. Cloning shares the surface.
#[derive(Debug, Clone)]
pub struct Surface {
    id: Rc<str>,
    width: u32,
    height: u32,
    state: Rc<RefCell<SurfaceState>>,
}

impl Surface {
    pub fn new(id: impl Into<String>, width: u32, height: u32) -> Self {
        let id: String = id.into();
        Self {
            id: Rc::from(id),
            width,
            height,
            state: Rc::new(RefCell::new(SurfaceState::default())),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Same underlying surface (not just the same id).
    pub fn is_same(&self, other: &Surface) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    /// Chart currently drawing on this surface.
    pub fn attached(&self) -> Option<ChartId> {
        self.state.borrow().attached
    }

    pub fn drawing(&self) -> Option<String> {
        self.state.borrow().drawing.clone()
    }

    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.state.borrow().events.clone()
    }

    /// Claims the surface for `chart`. A surface serves one chart at a time;
    /// the previous one must be destroyed first.
    pub(crate) fn attach(&self, chart: ChartId, drawing: String) -> RenderResult<()> {
        let mut state = self.state.borrow_mut();
        if let Some(current) = state.attached {
            return Err(RenderError::Chart(format!(
                "surface '{}' is already in use by chart {}; destroy it first",
                self.id, current
            )));
        }
        state.attached = Some(chart);
        state.drawing = Some(drawing);
        state.events.push(SurfaceEvent::Attached(chart));
        Ok(())
    }

    /// Releases the surface if `chart` holds it. Returns whether it did.
    pub(crate) fn detach(&self, chart: ChartId) -> bool {
        let mut state = self.state.borrow_mut();
        if state.attached != Some(chart) {
            return false;
        }
        state.attached = None;
        state.drawing = None;
        state.events.push(SurfaceEvent::Detached(chart));
        true
    }
}

/// Scripts see a surface as an element with `id`, `width`, `height` and a
/// Chart.js-style `getContext`.
impl UserData for Surface {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("id", |_, this| Ok(this.id().to_string()));
        fields.add_field_method_get("width", |_, this| Ok(this.width));
        fields.add_field_method_get("height", |_, this| Ok(this.height));
    }

    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        // The context is the surface itself; Chart.new accepts either.
        methods.add_method("getContext", |_, this, _kind: Option<String>| Ok(this.clone()));
    }
}

/// The host's "resolve element by identifier" capability.
pub trait ElementResolver {
    fn resolve(&self, id: &str) -> Option<Surface>;
}

/// Resolver over surfaces the host registered by id. The default instance
/// knows no elements.
#[derive(Debug, Default)]
pub struct HostElements {
    elements: RefCell<HashMap<String, Surface>>,
}

impl HostElements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, surface: Surface) {
        self.elements
            .borrow_mut()
            .insert(surface.id().to_string(), surface);
    }

    pub fn remove(&self, id: &str) -> Option<Surface> {
        self.elements.borrow_mut().remove(id)
    }
}

impl ElementResolver for HostElements {
    fn resolve(&self, id: &str) -> Option<Surface> {
        self.elements.borrow().get(id).cloned()
    }
}

/// Resolver handed to one chart execution.
#[derive(Clone)]
pub struct SurfaceBinding {
    designated: Rc<str>,
    surface: Surface,
    fallback: Rc<dyn ElementResolver>,
    active: Rc<Cell<bool>>,
}

impl SurfaceBinding {
    pub fn designated_id(&self) -> &str {
        &self.designated
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }
}

impl ElementResolver for SurfaceBinding {
    fn resolve(&self, id: &str) -> Option<Surface> {
        if self.active.get() && id == &*self.designated {
            return Some(self.surface.clone());
        }
        self.fallback.resolve(id)
    }
}

/// Keeps a binding live. Dropping it, on any exit path, turns the designated
/// identifier back over to the host resolver.
pub struct BindingGuard {
    binding: SurfaceBinding,
}

impl BindingGuard {
    pub fn binding(&self) -> SurfaceBinding {
        self.binding.clone()
    }
}

impl Drop for BindingGuard {
    fn drop(&mut self) {
        self.binding.active.set(false);
    }
}

/// Creates bindings for one fixed identifier.
#[derive(Debug, Clone)]
pub struct SurfaceBinder {
    designated: Rc<str>,
}

impl SurfaceBinder {
    pub fn new(designated: &str) -> Self {
        Self {
            designated: Rc::from(designated),
        }
    }

    pub fn designated_id(&self) -> &str {
        &self.designated
    }

    pub fn bind(&self, fallback: Rc<dyn ElementResolver>, surface: Surface) -> BindingGuard {
        tracing::debug!(designated = %self.designated, surface = %surface.id(), "binding surface");
        BindingGuard {
            binding: SurfaceBinding {
                designated: self.designated.clone(),
                surface,
                fallback,
                active: Rc::new(Cell::new(true)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn host_with(ids: &[&str]) -> Rc<HostElements> {
        let host = HostElements::new();
        for id in ids {
            host.register(Surface::new(*id, 10, 10));
        }
        Rc::new(host)
    }

    #[test]
    fn test_designated_id_resolves_to_bubble_surface_while_bound() {
        let host = host_with(&["myChart", "other"]);
        let surface = Surface::new("bubble-1", 800, 400);
        let binder = SurfaceBinder::new("myChart");

        let guard = binder.bind(host.clone(), surface.clone());
        let binding = guard.binding();
        assert!(binding.resolve("myChart").unwrap().is_same(&surface));
        assert_eq!(binding.resolve("other").unwrap().id(), "other");
        assert!(binding.resolve("missing").is_none());

        drop(guard);
        let after = binding.resolve("myChart").unwrap();
        assert!(!after.is_same(&surface));
        assert!(after.is_same(&host.resolve("myChart").unwrap()));
    }

    #[test]
    fn test_host_resolver_untouched_by_binding() {
        let host = host_with(&[]);
        let binder = SurfaceBinder::new("myChart");
        let _guard = binder.bind(host.clone(), Surface::new("s", 1, 1));
        assert!(host.resolve("myChart").is_none());
    }

    #[test]
    fn test_concurrent_bindings_are_independent() {
        let host = host_with(&[]);
        let binder = SurfaceBinder::new("myChart");
        let a = Surface::new("a", 1, 1);
        let b = Surface::new("b", 1, 1);
        let ga = binder.bind(host.clone(), a.clone());
        let gb = binder.bind(host.clone(), b.clone());
        assert!(ga.binding().resolve("myChart").unwrap().is_same(&a));
        assert!(gb.binding().resolve("myChart").unwrap().is_same(&b));
    }

    #[test]
    fn test_surface_refuses_second_chart() {
        let surface = Surface::new("s", 1, 1);
        let first = ChartId(Uuid::new_v4());
        let second = ChartId(Uuid::new_v4());
        surface.attach(first, "<svg/>".to_string()).unwrap();
        assert!(surface.attach(second, "<svg/>".to_string()).is_err());
        assert!(!surface.detach(second));
        assert!(surface.detach(first));
        surface.attach(second, "<svg/>".to_string()).unwrap();
        assert_eq!(
            surface.events(),
            vec![
                SurfaceEvent::Attached(first),
                SurfaceEvent::Detached(first),
                SurfaceEvent::Attached(second)
            ]
        );
    }
}
