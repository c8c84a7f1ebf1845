//! The Wayland implementation of [`Backend`].

use std::ffi::c_void;

use scterm_core::WindowConfig;
use tracing::{debug, info, warn};
use wayland_client::protocol::{wl_buffer, wl_registry};
use wayland_client::{Connection, EventQueue, Proxy};

use crate::backend::{Backend, SurfaceHandle};
use crate::error::BackendError;
use crate::keyboard::{KeyInput, KeyboardTranslator};
use crate::registry::Globals;
use crate::seat::{DeviceSelection, InputDeviceSet};
use crate::shell::{NegotiationState, ShellNegotiator, SurfaceObjects, WindowState};
use crate::shm::process_shm_name;

/// Everything the protocol callbacks read or write.
pub(crate) struct WaylandState {
    pub(crate) globals: Globals,
    pub(crate) shell: ShellNegotiator,
    pub(crate) surface: Option<SurfaceObjects>,
    pub(crate) devices: InputDeviceSet,
    pub(crate) keyboard: KeyboardTranslator,
    pub(crate) key_input: Vec<KeyInput>,
    pub(crate) window_config: WindowConfig,
    pub(crate) shm_name: String,
    pub(crate) attached_buffer: Option<wl_buffer::WlBuffer>,
    /// First error raised inside a callback; returned by the next dispatch.
    pub(crate) fatal: Option<BackendError>,
}

impl WaylandState {
    fn new(config: &WindowConfig) -> Self {
        Self {
            globals: Globals::default(),
            shell: ShellNegotiator::new(config.default_width, config.default_height),
            surface: None,
            devices: InputDeviceSet::default(),
            keyboard: KeyboardTranslator::new(),
            key_input: Vec::new(),
            window_config: config.clone(),
            shm_name: process_shm_name(&config.shm_name),
            attached_buffer: None,
            fatal: None,
        }
    }

    fn take_fatal(&mut self) -> Result<(), BackendError> {
        match self.fatal.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// A connection to a Wayland compositor and the single window negotiated over it.
///
/// Dropping the backend (or calling [`Backend::destroy`]) releases the protocol objects
/// in dependency order and then closes the connection.
pub struct WaylandBackend {
    state: WaylandState,
    queue: EventQueue<WaylandState>,
    // wl_registry has no destructor request; the proxy is dropped with the backend.
    _registry: wl_registry::WlRegistry,
    connection: Connection,
}

impl WaylandBackend {
    /// Connects to the compositor named by the environment and binds its globals.
    pub fn connect(config: &WindowConfig) -> Result<Self, BackendError> {
        let connection = Connection::connect_to_env()
            .map_err(|e| BackendError::Unavailable(format!("Failed to connect to the Wayland display: {}", e)))?;
        Self::from_connection(connection, config)
    }

    /// Binds the globals advertised on an already established connection.
    ///
    /// # Errors
    ///
    /// [`BackendError::Unavailable`] if the compositor does not advertise `wl_compositor`;
    /// any protocol or I/O error raised during the two initial round-trips.
    pub fn from_connection(connection: Connection, config: &WindowConfig) -> Result<Self, BackendError> {
        let mut queue = connection.new_event_queue();
        let qh = queue.handle();
        let registry = connection.display().get_registry(&qh, ());
        let mut state = WaylandState::new(config);

        queue.roundtrip(&mut state)?;
        if state.globals.compositor.is_none() {
            return Err(BackendError::Unavailable(
                "the compositor does not advertise wl_compositor".to_string(),
            ));
        }
        // Second round-trip: initial events of the globals bound above.
        queue.roundtrip(&mut state)?;
        state.take_fatal()?;

        if state.globals.wm_base.is_none() {
            warn!("xdg_wm_base is not advertised; the window cannot be mapped");
        }
        info!("Connected to Wayland compositor");
        Ok(Self {
            state,
            queue,
            _registry: registry,
            connection,
        })
    }

    /// Blocks until the compositor has processed every request sent so far.
    pub fn roundtrip(&mut self) -> Result<(), BackendError> {
        self.queue.roundtrip(&mut self.state)?;
        self.state.take_fatal()
    }

    pub fn input_devices(&self) -> DeviceSelection {
        self.state.devices.bound()
    }

    pub fn negotiation_state(&self) -> NegotiationState {
        self.state.shell.state()
    }

    pub fn has_keymap(&self) -> bool {
        self.state.keyboard.has_keymap()
    }
}

impl Backend for WaylandBackend {
    fn map(&mut self) -> Result<(), BackendError> {
        if self.state.surface.is_some() {
            return Err(BackendError::AlreadyMapped);
        }
        let compositor = self
            .state
            .globals
            .compositor
            .as_ref()
            .ok_or_else(|| BackendError::Unavailable("wl_compositor is not bound".to_string()))?;
        let wm_base = self
            .state
            .globals
            .wm_base
            .as_ref()
            .ok_or_else(|| BackendError::Unavailable("the compositor does not advertise xdg_wm_base".to_string()))?;

        let qh = self.queue.handle();
        let wl_surface = compositor.create_surface(&qh, ());
        let xdg_surface = wm_base.get_xdg_surface(&wl_surface, &qh, ());
        let toplevel = xdg_surface.get_toplevel(&qh, ());
        toplevel.set_title(self.state.window_config.title.clone());
        toplevel.set_app_id(self.state.window_config.app_id.clone());
        // Role-assigning commit without a buffer; the compositor answers with the first configure.
        wl_surface.commit();

        self.state.surface = Some(SurfaceObjects {
            wl_surface,
            xdg_surface,
            toplevel,
        });
        self.state.shell.roles_requested();
        debug!("Surface roles requested, waiting for configure");

        while self.state.shell.state() != NegotiationState::Mapped {
            if self.state.shell.window().close {
                warn!("Window closed before it was mapped");
                break;
            }
            self.queue.blocking_dispatch(&mut self.state)?;
            self.state.take_fatal()?;
        }
        self.connection.flush()?;
        Ok(())
    }

    fn create_surface_handle(&self) -> Result<SurfaceHandle, BackendError> {
        if self.state.shell.state() != NegotiationState::Mapped {
            return Err(BackendError::NotMapped);
        }
        let surface = self.state.surface.as_ref().ok_or(BackendError::NotMapped)?;
        let window = self.state.shell.window();

        let display = self.connection.backend().display_ptr() as *mut c_void;
        let surface_ptr = surface.wl_surface.id().as_ptr() as *mut c_void;
        Ok(SurfaceHandle::wayland(display, surface_ptr, window.width, window.height))
    }

    fn dispatch(&mut self) -> Result<(), BackendError> {
        self.queue.blocking_dispatch(&mut self.state)?;
        self.state.take_fatal()?;
        // Requests issued from callbacks (pong, acks, commits).
        self.connection.flush()?;
        Ok(())
    }

    fn window_state(&self) -> WindowState {
        self.state.shell.window()
    }

    fn take_key_input(&mut self) -> Vec<KeyInput> {
        std::mem::take(&mut self.state.key_input)
    }

    fn destroy(self: Box<Self>) {
        drop(self);
    }
}

impl Drop for WaylandBackend {
    fn drop(&mut self) {
        self.state.devices.release();
        if let Some(surface) = self.state.surface.take() {
            surface.destroy();
        }
        if let Some(buffer) = self.state.attached_buffer.take() {
            buffer.destroy();
        }
        self.state.globals.release();
        self.state.shell.destroyed();

        if let Err(e) = self.connection.flush() {
            debug!("Final flush to the compositor failed: {}", e);
        }
        info!("Wayland backend destroyed");
        // The registry and then the connection are dropped after this body.
    }
}
