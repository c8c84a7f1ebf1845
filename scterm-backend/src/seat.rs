use tracing::{debug, trace};
use wayland_client::protocol::{wl_keyboard, wl_pointer, wl_seat, wl_touch};
use wayland_client::{Connection, Dispatch, Proxy, QueueHandle, WEnum};

use crate::wayland::WaylandState;

/// Which input devices have been bound, as plain flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceSelection {
    pub pointer: bool,
    pub keyboard: bool,
    pub touch: bool,
}

/// Devices that `capabilities` offers and that are not bound yet.
pub fn pending_devices(capabilities: wl_seat::Capability, bound: DeviceSelection) -> DeviceSelection {
    DeviceSelection {
        pointer: capabilities.contains(wl_seat::Capability::Pointer) && !bound.pointer,
        keyboard: capabilities.contains(wl_seat::Capability::Keyboard) && !bound.keyboard,
        touch: capabilities.contains(wl_seat::Capability::Touch) && !bound.touch,
    }
}

/// Input devices obtained from the seat. Each is bound at most once.
#[derive(Debug, Default)]
pub(crate) struct InputDeviceSet {
    pub(crate) keyboard: Option<wl_keyboard::WlKeyboard>,
    pub(crate) pointer: Option<wl_pointer::WlPointer>,
    pub(crate) touch: Option<wl_touch::WlTouch>,
}

impl InputDeviceSet {
    pub(crate) fn bound(&self) -> DeviceSelection {
        DeviceSelection {
            pointer: self.pointer.is_some(),
            keyboard: self.keyboard.is_some(),
            touch: self.touch.is_some(),
        }
    }

    /// Releases every bound device. `release` exists from version 3 on; older
    /// proxies are simply dropped.
    pub(crate) fn release(&mut self) {
        if let Some(keyboard) = self.keyboard.take() {
            if keyboard.version() >= 3 {
                keyboard.release();
            }
        }
        if let Some(pointer) = self.pointer.take() {
            if pointer.version() >= 3 {
                pointer.release();
            }
        }
        if let Some(touch) = self.touch.take() {
            if touch.version() >= 3 {
                touch.release();
            }
        }
    }
}

impl Dispatch<wl_seat::WlSeat, ()> for WaylandState {
    fn event(
        state: &mut Self,
        seat: &wl_seat::WlSeat,
        event: wl_seat::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_seat::Event::Capabilities { capabilities } => {
                let capabilities = match capabilities {
                    WEnum::Value(caps) => caps,
                    WEnum::Unknown(bits) => wl_seat::Capability::from_bits_truncate(bits),
                };
                debug!("Seat capabilities: {:?}", capabilities);

                let pending = pending_devices(capabilities, state.devices.bound());
                if pending.pointer {
                    debug!("Binding pointer");
                    state.devices.pointer = Some(seat.get_pointer(qh, ()));
                }
                if pending.keyboard {
                    debug!("Binding keyboard");
                    state.devices.keyboard = Some(seat.get_keyboard(qh, ()));
                }
                if pending.touch {
                    debug!("Binding touch");
                    state.devices.touch = Some(seat.get_touch(qh, ()));
                }
            }
            wl_seat::Event::Name { name } => debug!("Seat name: {}", name),
            _ => {}
        }
    }
}

impl Dispatch<wl_pointer::WlPointer, ()> for WaylandState {
    fn event(
        _state: &mut Self,
        _pointer: &wl_pointer::WlPointer,
        event: wl_pointer::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        trace!("Pointer event: {:?}", event);
    }
}

impl Dispatch<wl_touch::WlTouch, ()> for WaylandState {
    fn event(
        _state: &mut Self,
        _touch: &wl_touch::WlTouch,
        event: wl_touch::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        trace!("Touch event: {:?}", event);
    }
}
