//! Keymap loading and key translation through libxkbcommon.

use std::fs::File;
use std::os::fd::OwnedFd;

use memmap2::MmapOptions;
use tracing::{debug, trace, warn};
use wayland_client::protocol::wl_keyboard;
use wayland_client::{Connection, Dispatch, QueueHandle, WEnum};
use xkbcommon::xkb;

use crate::error::BackendError;
use crate::wayland::WaylandState;

/// Offset between evdev scancodes (what wl_keyboard sends) and XKB keycodes.
pub const EVDEV_KEYCODE_OFFSET: u32 = 8;

/// Upper bound on the UTF-8 text produced for a single key press.
pub const MAX_KEY_TEXT_BYTES: usize = 16;

/// One translated key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInput {
    /// XKB keycode (`raw + 8`).
    pub keycode: u32,
    pub keysym: u32,
    /// UTF-8 text, empty for keys that produce none (modifiers, function keys).
    pub text: String,
}

struct CompiledKeymap {
    // Kept alongside the state it was compiled into; both are replaced together.
    _keymap: xkb::Keymap,
    state: xkb::State,
}

/// Owns the xkb context and the current keymap/state pair.
pub struct KeyboardTranslator {
    context: xkb::Context,
    compiled: Option<CompiledKeymap>,
}

impl Default for KeyboardTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardTranslator {
    pub fn new() -> Self {
        Self {
            context: xkb::Context::new(xkb::CONTEXT_NO_FLAGS),
            compiled: None,
        }
    }

    pub fn has_keymap(&self) -> bool {
        self.compiled.is_some()
    }

    /// Maps `size` bytes of `fd` read-only, compiles them as a text keymap and swaps in
    /// the new keymap and state. The mapping and the descriptor are released before
    /// returning, whatever the outcome. On error the previous keymap stays active.
    pub fn load_keymap_fd(&mut self, fd: OwnedFd, size: u32) -> Result<(), BackendError> {
        let file = File::from(fd);
        // SAFETY: the compositor hands us a private, read-only keymap descriptor.
        let map = unsafe { MmapOptions::new().len(size as usize).map(&file) }
            .map_err(|e| BackendError::resource("keymap mapping", e))?;

        // The text is NUL-terminated inside the mapping.
        let end = map.iter().position(|&b| b == 0).unwrap_or(map.len());
        let text = std::str::from_utf8(&map[..end])
            .map_err(|e| BackendError::InvalidKeymap(format!("keymap is not UTF-8: {}", e)))?;
        self.load_keymap_str(text)
    }

    /// Compiles `text` (xkb text format v1) and replaces keymap and state as a unit.
    pub fn load_keymap_str(&mut self, text: &str) -> Result<(), BackendError> {
        let keymap = xkb::Keymap::new_from_string(
            &self.context,
            text.to_owned(),
            xkb::KEYMAP_FORMAT_TEXT_V1,
            xkb::KEYMAP_COMPILE_NO_FLAGS,
        )
        .ok_or_else(|| BackendError::InvalidKeymap("libxkbcommon rejected the keymap".to_string()))?;
        let state = xkb::State::new(&keymap);

        self.compiled = Some(CompiledKeymap {
            _keymap: keymap,
            state,
        });
        Ok(())
    }

    /// Translates a key event. Only events whose own state is `pressed` produce output.
    pub fn handle_key(&self, raw_code: u32, key_state: WEnum<wl_keyboard::KeyState>) -> Option<KeyInput> {
        if !matches!(key_state, WEnum::Value(wl_keyboard::KeyState::Pressed)) {
            return None;
        }
        let compiled = self.compiled.as_ref()?;

        let keycode = raw_code.checked_add(EVDEV_KEYCODE_OFFSET)?;
        let xkb_keycode = xkb::Keycode::from(keycode);
        let keysym = compiled.state.key_get_one_sym(xkb_keycode);
        let mut text = compiled.state.key_get_utf8(xkb_keycode);
        truncate_utf8(&mut text, MAX_KEY_TEXT_BYTES);

        Some(KeyInput {
            keycode,
            keysym: keysym.raw(),
            text,
        })
    }

    /// Applies the compositor's modifier masks, always in layout group 0.
    pub fn update_modifiers(&mut self, depressed: u32, latched: u32, locked: u32) {
        if let Some(compiled) = self.compiled.as_mut() {
            compiled.state.update_mask(depressed, latched, locked, 0, 0, 0);
        }
    }
}

fn truncate_utf8(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}

impl Dispatch<wl_keyboard::WlKeyboard, ()> for WaylandState {
    fn event(
        state: &mut Self,
        _keyboard: &wl_keyboard::WlKeyboard,
        event: wl_keyboard::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_keyboard::Event::Keymap { format, fd, size } => match format {
                WEnum::Value(wl_keyboard::KeymapFormat::XkbV1) => {
                    debug!("Keyboard keymap fd {:?}, size {}", fd, size);
                    if let Err(e) = state.keyboard.load_keymap_fd(fd, size) {
                        warn!("Keeping previous keymap: {}", e);
                    }
                }
                other => warn!("Ignoring keymap in unsupported format {:?}", other),
            },
            wl_keyboard::Event::Key {
                key,
                state: key_state,
                ..
            } => {
                if let Some(input) = state.keyboard.handle_key(key, key_state) {
                    trace!("Key {} -> keysym {:#x} {:?}", input.keycode, input.keysym, input.text);
                    state.key_input.push(input);
                }
            }
            wl_keyboard::Event::Modifiers {
                mods_depressed,
                mods_latched,
                mods_locked,
                ..
            } => {
                trace!(
                    "Keyboard modifiers depressed {:#x} latched {:#x} locked {:#x}",
                    mods_depressed,
                    mods_latched,
                    mods_locked
                );
                state
                    .keyboard
                    .update_modifiers(mods_depressed, mods_latched, mods_locked);
            }
            wl_keyboard::Event::Enter { serial, .. } => debug!("Keyboard enter (serial {})", serial),
            wl_keyboard::Event::Leave { serial, .. } => debug!("Keyboard leave (serial {})", serial),
            wl_keyboard::Event::RepeatInfo { rate, delay } => {
                debug!("Keyboard repeat info: rate {}, delay {}", rate, delay)
            }
            _ => {}
        }
    }
}
