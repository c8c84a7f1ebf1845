//! Wayland windowing backend for scterm.
//!
//! Connects to the compositor, binds `wl_compositor`, `wl_shm`, `xdg_wm_base` and
//! `wl_seat`, negotiates one xdg toplevel backed by a shared-memory buffer, binds input
//! devices as the seat announces them and translates key presses through xkbcommon.
//! The result is exposed through the [`Backend`] trait and a [`SurfaceHandle`] that a
//! GPU renderer can turn into a presentable surface.

pub mod backend;
pub mod error;
pub mod keyboard;
pub mod registry;
pub mod seat;
pub mod shell;
pub mod shm;
pub mod wayland;

pub use backend::{create_backend, Backend, BackendKind, SurfaceHandle, WAYLAND_DISPLAY_ENV};
pub use error::BackendError;
pub use keyboard::{KeyInput, KeyboardTranslator};
pub use registry::RecognizedGlobal;
pub use seat::DeviceSelection;
pub use shell::{NegotiationState, WindowState};
pub use shm::ShmBacking;
pub use wayland::WaylandBackend;
