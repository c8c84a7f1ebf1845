//! xdg-shell negotiation for the single top-level window.
//!
//! [`ShellNegotiator`] is the protocol-independent state machine; the `Dispatch` impls
//! below feed it compositor events and perform the buffer/ack/commit sequence it asks for.

use std::os::fd::AsFd;

use tracing::{debug, error, info, trace};
use wayland_client::protocol::{wl_buffer, wl_shm, wl_shm_pool, wl_surface};
use wayland_client::{Connection, Dispatch, Proxy, QueueHandle};
use wayland_protocols::xdg::shell::client::{xdg_surface, xdg_toplevel};

use crate::error::BackendError;
use crate::shm::ShmBacking;
use crate::wayland::WaylandState;

/// Window geometry and close request as last reported by the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    pub width: u32,
    pub height: u32,
    /// Advisory: the compositor asked the window to close. Nothing is torn down.
    pub close: bool,
}

/// Lifecycle of the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Created,
    AwaitingConfigure,
    Mapped,
    Closed,
}

/// What to do in response to one `xdg_surface.configure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigureAck {
    /// Serial to acknowledge; always the one just received.
    pub serial: u32,
    /// Size of the buffer to commit, if a toplevel configure preceded this one.
    pub content: Option<(u32, u32)>,
}

#[derive(Debug)]
pub struct ShellNegotiator {
    default_width: u32,
    default_height: u32,
    window: WindowState,
    state: NegotiationState,
    toplevel_configured: bool,
    last_serial: Option<u32>,
}

impl ShellNegotiator {
    pub fn new(default_width: u32, default_height: u32) -> Self {
        Self {
            default_width,
            default_height,
            window: WindowState {
                width: default_width,
                height: default_height,
                close: false,
            },
            state: NegotiationState::Created,
            toplevel_configured: false,
            last_serial: None,
        }
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn window(&self) -> WindowState {
        self.window
    }

    /// Serial of the most recent shell configure.
    pub fn last_serial(&self) -> Option<u32> {
        self.last_serial
    }

    /// The surface got its xdg_surface and xdg_toplevel roles.
    pub fn roles_requested(&mut self) {
        if self.state == NegotiationState::Created {
            self.state = NegotiationState::AwaitingConfigure;
        }
    }

    fn apply_size(&mut self, width: i32, height: i32) {
        self.window.width = positive_or(width, self.default_width);
        self.window.height = positive_or(height, self.default_height);
    }

    pub fn on_toplevel_configure(&mut self, width: i32, height: i32) {
        self.apply_size(width, height);
        self.toplevel_configured = true;
    }

    pub fn on_configure_bounds(&mut self, width: i32, height: i32) {
        self.apply_size(width, height);
    }

    /// Ends a configure cycle.
    pub fn on_surface_configure(&mut self, serial: u32) -> ConfigureAck {
        self.last_serial = Some(serial);
        let content = if std::mem::take(&mut self.toplevel_configured) && self.state != NegotiationState::Closed {
            Some((self.window.width, self.window.height))
        } else {
            None
        };
        ConfigureAck { serial, content }
    }

    /// A buffer for the current cycle was attached and committed.
    pub fn content_committed(&mut self) {
        if self.state == NegotiationState::AwaitingConfigure {
            self.state = NegotiationState::Mapped;
        }
    }

    pub fn on_close(&mut self) {
        self.window.close = true;
    }

    pub fn destroyed(&mut self) {
        self.state = NegotiationState::Closed;
    }
}

fn positive_or(value: i32, default: u32) -> u32 {
    u32::try_from(value).ok().filter(|v| *v > 0).unwrap_or(default)
}

impl WaylandState {
    /// Allocates a filled buffer of `width` x `height`, acknowledges `serial`, then attaches,
    /// damages and commits it. The previously attached buffer is destroyed afterwards.
    fn commit_content(
        &mut self,
        xdg_surface: &xdg_surface::XdgSurface,
        serial: u32,
        width: u32,
        height: u32,
        qh: &QueueHandle<Self>,
    ) -> Result<(), BackendError> {
        let (Some(shm), Some(surface)) = (self.globals.shm.as_ref(), self.surface.as_ref()) else {
            return Err(BackendError::Unavailable(
                "wl_shm was not advertised; cannot allocate a window buffer".to_string(),
            ));
        };
        let surface = surface.wl_surface.clone();

        let backing = ShmBacking::create(&self.shm_name, width, height, self.window_config.background)?;
        let pool = shm.create_pool(backing.as_fd(), backing.len() as i32, qh, ());
        trace!("Attaching {} as a {}x{} buffer", backing.name(), backing.width(), backing.height());
        let buffer = pool.create_buffer(
            0,
            backing.width() as i32,
            backing.height() as i32,
            backing.stride() as i32,
            wl_shm::Format::Argb8888,
            qh,
            (),
        );
        pool.destroy();
        drop(backing);

        xdg_surface.ack_configure(serial);
        surface.attach(Some(&buffer), 0, 0);
        if surface.version() >= 4 {
            surface.damage_buffer(0, 0, width as i32, height as i32);
        } else {
            surface.damage(0, 0, width as i32, height as i32);
        }
        surface.commit();

        if let Some(previous) = self.attached_buffer.replace(buffer) {
            previous.destroy();
        }
        Ok(())
    }
}

/// Proxies owned by a mapped window.
#[derive(Debug)]
pub(crate) struct SurfaceObjects {
    pub(crate) wl_surface: wl_surface::WlSurface,
    pub(crate) xdg_surface: xdg_surface::XdgSurface,
    pub(crate) toplevel: xdg_toplevel::XdgToplevel,
}

impl SurfaceObjects {
    /// Destroys the role objects before the surface they are attached to.
    pub(crate) fn destroy(self) {
        self.toplevel.destroy();
        self.xdg_surface.destroy();
        self.wl_surface.destroy();
    }
}

impl Dispatch<xdg_surface::XdgSurface, ()> for WaylandState {
    fn event(
        state: &mut Self,
        xdg_surface: &xdg_surface::XdgSurface,
        event: xdg_surface::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        let xdg_surface::Event::Configure { serial } = event else {
            return;
        };
        let ack = state.shell.on_surface_configure(serial);
        debug!("xdg_surface configure (serial {}), content {:?}", serial, ack.content);

        match ack.content {
            Some((width, height)) => match state.commit_content(xdg_surface, ack.serial, width, height, qh) {
                Ok(()) => {
                    if state.shell.state() == NegotiationState::AwaitingConfigure {
                        info!("Window mapped at {}x{}", width, height);
                    }
                    state.shell.content_committed();
                }
                Err(e) => {
                    error!("Failed to present window buffer: {}", e);
                    state.fatal.get_or_insert(e);
                }
            },
            None => xdg_surface.ack_configure(ack.serial),
        }
    }
}

impl Dispatch<xdg_toplevel::XdgToplevel, ()> for WaylandState {
    fn event(
        state: &mut Self,
        _toplevel: &xdg_toplevel::XdgToplevel,
        event: xdg_toplevel::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            xdg_toplevel::Event::Configure { width, height, .. } => {
                state.shell.on_toplevel_configure(width, height);
                let window = state.shell.window();
                debug!(
                    "Toplevel configure {}x{} -> {}x{}",
                    width, height, window.width, window.height
                );
            }
            xdg_toplevel::Event::ConfigureBounds { width, height } => {
                state.shell.on_configure_bounds(width, height);
                debug!("Toplevel bounds {}x{}", width, height);
            }
            xdg_toplevel::Event::Close => {
                info!("Compositor requested the window to close");
                state.shell.on_close();
            }
            xdg_toplevel::Event::WmCapabilities { capabilities } => {
                trace!("Toplevel wm capabilities {:?}", capabilities);
            }
            _ => {}
        }
    }
}

impl Dispatch<wl_buffer::WlBuffer, ()> for WaylandState {
    fn event(
        _state: &mut Self,
        buffer: &wl_buffer::WlBuffer,
        event: wl_buffer::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let wl_buffer::Event::Release = event {
            trace!("Compositor released {}", buffer.id());
        }
    }
}

impl Dispatch<wl_surface::WlSurface, ()> for WaylandState {
    fn event(
        _state: &mut Self,
        _surface: &wl_surface::WlSurface,
        event: wl_surface::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        trace!("wl_surface event {:?}", event);
    }
}

wayland_client::delegate_noop!(WaylandState: ignore wl_shm_pool::WlShmPool);
