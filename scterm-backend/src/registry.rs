//! Global advertisement handling: binds the four globals the backend uses and
//! ignores everything else.

use tracing::{debug, trace};
use wayland_client::protocol::{wl_compositor, wl_registry, wl_seat, wl_shm};
use wayland_client::{Connection, Dispatch, Proxy, QueueHandle};
use wayland_protocols::xdg::shell::client::xdg_wm_base;

use crate::wayland::WaylandState;

/// Globals the backend knows how to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecognizedGlobal {
    /// `wl_compositor`, the surface factory. Mandatory.
    Compositor,
    /// `wl_shm`, the shared-memory buffer allocator.
    Shm,
    /// `xdg_wm_base`, the window-shell factory.
    WmBase,
    /// `wl_seat`, the input-seat factory.
    Seat,
}

impl RecognizedGlobal {
    pub const ALL: [RecognizedGlobal; 4] = [
        RecognizedGlobal::Compositor,
        RecognizedGlobal::Shm,
        RecognizedGlobal::WmBase,
        RecognizedGlobal::Seat,
    ];

    /// Exact, case-sensitive match against the advertised interface string.
    pub fn from_interface(interface: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|global| global.interface_name() == interface)
    }

    pub fn interface_name(self) -> &'static str {
        match self {
            RecognizedGlobal::Compositor => wl_compositor::WlCompositor::interface().name,
            RecognizedGlobal::Shm => wl_shm::WlShm::interface().name,
            RecognizedGlobal::WmBase => xdg_wm_base::XdgWmBase::interface().name,
            RecognizedGlobal::Seat => wl_seat::WlSeat::interface().name,
        }
    }

    /// Highest version of the interface this client was generated against.
    pub fn max_version(self) -> u32 {
        match self {
            RecognizedGlobal::Compositor => wl_compositor::WlCompositor::interface().version,
            RecognizedGlobal::Shm => wl_shm::WlShm::interface().version,
            RecognizedGlobal::WmBase => xdg_wm_base::XdgWmBase::interface().version,
            RecognizedGlobal::Seat => wl_seat::WlSeat::interface().version,
        }
    }

    /// Version to bind at: the advertised one, capped to what this client implements.
    pub fn bind_version(self, advertised: u32) -> u32 {
        advertised.min(self.max_version())
    }
}

/// Handles bound from the registry.
#[derive(Debug, Default)]
pub(crate) struct Globals {
    pub(crate) compositor: Option<wl_compositor::WlCompositor>,
    pub(crate) shm: Option<wl_shm::WlShm>,
    pub(crate) wm_base: Option<xdg_wm_base::XdgWmBase>,
    pub(crate) seat: Option<wl_seat::WlSeat>,
}

impl Globals {
    pub(crate) fn is_bound(&self, global: RecognizedGlobal) -> bool {
        match global {
            RecognizedGlobal::Compositor => self.compositor.is_some(),
            RecognizedGlobal::Shm => self.shm.is_some(),
            RecognizedGlobal::WmBase => self.wm_base.is_some(),
            RecognizedGlobal::Seat => self.seat.is_some(),
        }
    }

    /// Sends the destructor requests the bound interfaces offer and drops the rest.
    pub(crate) fn release(&mut self) {
        if let Some(wm_base) = self.wm_base.take() {
            wm_base.destroy();
        }
        if let Some(seat) = self.seat.take() {
            if seat.version() >= 5 {
                seat.release();
            }
        }
        if let Some(shm) = self.shm.take() {
            if shm.version() >= 2 {
                shm.release();
            }
        }
        self.compositor = None;
    }
}

impl Dispatch<wl_registry::WlRegistry, ()> for WaylandState {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => {
                let Some(global) = RecognizedGlobal::from_interface(&interface) else {
                    trace!("Skipping global {} (name {}, version {})", interface, name, version);
                    return;
                };
                if state.globals.is_bound(global) {
                    debug!("Ignoring additional {} global (name {})", interface, name);
                    return;
                }

                let version = global.bind_version(version);
                debug!("Binding {} (name {}) at version {}", interface, name, version);
                match global {
                    RecognizedGlobal::Compositor => {
                        state.globals.compositor = Some(registry.bind(name, version, qh, ()));
                    }
                    RecognizedGlobal::Shm => {
                        state.globals.shm = Some(registry.bind(name, version, qh, ()));
                    }
                    RecognizedGlobal::WmBase => {
                        state.globals.wm_base = Some(registry.bind(name, version, qh, ()));
                    }
                    RecognizedGlobal::Seat => {
                        state.globals.seat = Some(registry.bind(name, version, qh, ()));
                    }
                }
            }
            wl_registry::Event::GlobalRemove { name } => {
                // Removal is not acted upon; bound objects stay in use until destroy.
                debug!("Global {} removed by the compositor", name);
            }
            _ => {}
        }
    }
}

impl Dispatch<xdg_wm_base::XdgWmBase, ()> for WaylandState {
    fn event(
        _state: &mut Self,
        wm_base: &xdg_wm_base::XdgWmBase,
        event: xdg_wm_base::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let xdg_wm_base::Event::Ping { serial } = event {
            trace!("xdg_wm_base ping {}", serial);
            wm_base.pong(serial);
        }
    }
}

impl Dispatch<wl_shm::WlShm, ()> for WaylandState {
    fn event(
        _state: &mut Self,
        _shm: &wl_shm::WlShm,
        event: wl_shm::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let wl_shm::Event::Format { format } = event {
            trace!("wl_shm supports format {:?}", format);
        }
    }
}

wayland_client::delegate_noop!(WaylandState: wl_compositor::WlCompositor);
