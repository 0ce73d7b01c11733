// ── Host surfaces and environment ──
//
// A grid never touches a real DOM. It asks a `Document` for the surface with
// a given id once at mount time and then only replaces its contents.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::format::Locale;

/// Container element a grid renders into.
pub trait Surface: Send + Sync {
    /// Replace everything inside the container with `html`.
    fn replace_contents(&self, html: &str);

    fn clear(&self) {
        self.replace_contents("");
    }
}

/// Lookup of mount points by identifier.
pub trait Document: Send + Sync {
    fn surface(&self, id: &str) -> Option<Arc<dyn Surface>>;
}

/// In-memory surface that keeps the last markup written to it.
#[derive(Debug, Default)]
pub struct MemorySurface {
    contents: Mutex<String>,
    writes: Mutex<usize>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.contents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of times the contents were replaced.
    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Surface for MemorySurface {
    fn replace_contents(&self, html: &str) {
        html.clone_into(&mut self.contents.lock().unwrap_or_else(PoisonError::into_inner));
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }
}

/// Document backed by a fixed set of `MemorySurface`s.
#[derive(Debug, Default)]
pub struct MemoryDocument {
    surfaces: HashMap<String, Arc<MemorySurface>>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mount point and return a handle for inspecting it.
    pub fn add_surface(&mut self, id: impl Into<String>) -> Arc<MemorySurface> {
        let surface = Arc::new(MemorySurface::new());
        self.surfaces.insert(id.into(), Arc::clone(&surface));
        surface
    }

    pub fn get(&self, id: &str) -> Option<Arc<MemorySurface>> {
        self.surfaces.get(id).cloned()
    }
}

impl Document for MemoryDocument {
    fn surface(&self, id: &str) -> Option<Arc<dyn Surface>> {
        self.surfaces
            .get(id)
            .map(|s| Arc::clone(s) as Arc<dyn Surface>)
    }
}

// ── Environment ─────────────────────────────────────────────────────

/// Viewport widths below this are treated as mobile.
pub const MOBILE_BREAKPOINT: u32 = 768;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceClass {
    Mobile,
    #[default]
    Desktop,
}

impl DeviceClass {
    pub fn from_viewport_width(width: u32) -> Self {
        if width < MOBILE_BREAKPOINT {
            Self::Mobile
        } else {
            Self::Desktop
        }
    }

    pub fn is_mobile(self) -> bool {
        self == Self::Mobile
    }
}

/// Admin predicate supplied by the auth layer.
pub type AdminCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// Collaborators a grid reads from its host. The device class is read once
/// at mount; a device change requires building a new grid.
#[derive(Clone)]
pub struct GridEnv {
    pub device: DeviceClass,
    /// Without a predicate the user is treated as a non-admin.
    pub is_admin: Option<AdminCheck>,
    pub locale: Locale,
}

impl GridEnv {
    pub fn new(device: DeviceClass) -> Self {
        Self {
            device,
            is_admin: None,
            locale: Locale::default(),
        }
    }

    pub fn admin(mut self, check: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.is_admin = Some(Arc::new(check));
        self
    }

    pub fn locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    pub(crate) fn user_is_admin(&self) -> bool {
        self.is_admin.as_ref().is_some_and(|check| check())
    }
}

impl Default for GridEnv {
    fn default() -> Self {
        Self::new(DeviceClass::Desktop)
    }
}

impl fmt::Debug for GridEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridEnv")
            .field("device", &self.device)
            .field("is_admin", &self.is_admin.as_ref().map(|_| ".."))
            .field("locale", &self.locale.tag)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakpoint_splits_mobile_and_desktop() {
        assert_eq!(DeviceClass::from_viewport_width(767), DeviceClass::Mobile);
        assert_eq!(DeviceClass::from_viewport_width(768), DeviceClass::Desktop);
    }

    #[test]
    fn memory_document_resolves_registered_surfaces() {
        let mut doc = MemoryDocument::new();
        let handle = doc.add_surface("owners-grid");
        let surface = doc.surface("owners-grid");
        assert!(surface.is_some());
        assert!(doc.surface("missing").is_none());

        if let Some(s) = surface {
            s.replace_contents("<p>hi</p>");
        }
        assert_eq!(handle.contents(), "<p>hi</p>");
        assert_eq!(handle.write_count(), 1);
    }

    #[test]
    fn admin_defaults_to_false() {
        assert!(!GridEnv::default().user_is_admin());
        assert!(GridEnv::default().admin(|| true).user_is_admin());
    }
}
