//! The display-server agnostic facade consumed by the renderer and the event loop.

use std::ffi::{c_void, OsString};

use raw_window_handle::{
    HasRawDisplayHandle, HasRawWindowHandle, RawDisplayHandle, RawWindowHandle, WaylandDisplayHandle,
    WaylandWindowHandle,
};
use scterm_core::WindowConfig;
use tracing::info;

use crate::error::BackendError;
use crate::keyboard::KeyInput;
use crate::shell::WindowState;
use crate::wayland::WaylandBackend;

/// Environment variable whose presence selects the Wayland backend.
pub const WAYLAND_DISPLAY_ENV: &str = "WAYLAND_DISPLAY";

/// A windowing backend: one connection, one window.
///
/// The backend is torn down exactly once, by [`Backend::destroy`] or by dropping it.
/// `destroy` consumes the box, so a second call is rejected at compile time:
///
/// ```compile_fail
/// fn shutdown(backend: Box<dyn scterm_backend::Backend>) {
///     backend.destroy();
///     backend.destroy();
/// }
/// ```
pub trait Backend {
    /// Creates the window and blocks until the compositor has shown it.
    ///
    /// Returns [`BackendError::AlreadyMapped`] on a second call.
    fn map(&mut self) -> Result<(), BackendError>;

    /// Raw handles of the mapped surface, for GPU surface creation.
    fn create_surface_handle(&self) -> Result<SurfaceHandle, BackendError>;

    /// Blocks for one batch of compositor events and runs their handlers.
    fn dispatch(&mut self) -> Result<(), BackendError>;

    fn window_state(&self) -> WindowState;

    /// Drains the key presses translated since the last call.
    fn take_key_input(&mut self) -> Vec<KeyInput>;

    /// Releases every protocol object and closes the connection.
    fn destroy(self: Box<Self>);
}

/// Display servers a backend exists for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Wayland,
}

impl BackendKind {
    /// Picks a backend from the environment, read through `lookup`.
    pub fn detect(lookup: impl Fn(&str) -> Option<OsString>) -> Option<BackendKind> {
        match lookup(WAYLAND_DISPLAY_ENV) {
            Some(value) if !value.is_empty() => Some(BackendKind::Wayland),
            _ => None,
        }
    }
}

/// Probes the process environment and constructs the matching backend.
///
/// # Errors
///
/// [`BackendError::Unavailable`] when no supported session is detected or the connection
/// cannot be established. Callers must not attempt to render in that case.
pub fn create_backend(config: &WindowConfig) -> Result<Box<dyn Backend>, BackendError> {
    match BackendKind::detect(|key| std::env::var_os(key)) {
        Some(BackendKind::Wayland) => {
            info!("{} is set, using the Wayland backend", WAYLAND_DISPLAY_ENV);
            Ok(Box::new(WaylandBackend::connect(config)?))
        }
        None => Err(BackendError::Unavailable(format!(
            "{} is not set; no supported display server session",
            WAYLAND_DISPLAY_ENV
        ))),
    }
}

/// Raw display and surface pointers plus the surface size at the time of the call.
///
/// The pointers stay valid only while the backend that produced them is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceHandle {
    display: *mut c_void,
    surface: *mut c_void,
    pub width: u32,
    pub height: u32,
}

impl SurfaceHandle {
    pub(crate) fn wayland(display: *mut c_void, surface: *mut c_void, width: u32, height: u32) -> Self {
        Self {
            display,
            surface,
            width,
            height,
        }
    }
}

unsafe impl HasRawDisplayHandle for SurfaceHandle {
    fn raw_display_handle(&self) -> RawDisplayHandle {
        let mut handle = WaylandDisplayHandle::empty();
        handle.display = self.display;
        RawDisplayHandle::Wayland(handle)
    }
}

unsafe impl HasRawWindowHandle for SurfaceHandle {
    fn raw_window_handle(&self) -> RawWindowHandle {
        let mut handle = WaylandWindowHandle::empty();
        handle.surface = self.surface;
        RawWindowHandle::Wayland(handle)
    }
}
