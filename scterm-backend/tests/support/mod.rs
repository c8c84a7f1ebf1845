//! In-process fake compositor speaking the Wayland wire protocol over a socket pair.
//!
//! The client side is a real `wayland_client::Connection`. The server thread decodes
//! every request it receives, records it, answers `wl_display.sync` and
//! `wl_display.get_registry` itself and hands everything else to a per-test hook.
//! File descriptors attached to requests are discarded; events can carry one through
//! [`Responder::send_with_fd`].

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{IoSlice, Read, Seek, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::os::unix::net::UnixStream;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use byteorder::{ByteOrder, NativeEndian};
use nix::sys::socket::{sendmsg, ControlMessage, MsgFlags, UnixAddr};
use wayland_client::Connection;

const DISPLAY_ID: u32 = 1;

/// Decoded request or event argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Uint(u32),
    Int(i32),
    Str(String),
    Object(u32),
    NewId(u32),
    Fd,
    Array(Vec<u8>),
}

impl Arg {
    pub fn uint(&self) -> u32 {
        match self {
            Arg::Uint(v) | Arg::Object(v) | Arg::NewId(v) => *v,
            other => panic!("expected an integer argument, got {:?}", other),
        }
    }

    pub fn int(&self) -> i32 {
        match self {
            Arg::Int(v) => *v,
            other => panic!("expected an int argument, got {:?}", other),
        }
    }

    pub fn str(&self) -> &str {
        match self {
            Arg::Str(s) => s,
            other => panic!("expected a string argument, got {:?}", other),
        }
    }
}

/// One request received from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub object_id: u32,
    pub interface: String,
    pub name: &'static str,
    pub args: Vec<Arg>,
}

impl Request {
    pub fn is(&self, interface: &str, name: &str) -> bool {
        self.interface == interface && self.name == name
    }

    /// Interface named by a `wl_registry.bind`.
    pub fn bound_interface(&self) -> Option<&str> {
        if self.is("wl_registry", "bind") {
            Some(self.args[1].str())
        } else {
            None
        }
    }

    /// Object id created by this request, if any.
    pub fn new_id(&self) -> Option<u32> {
        self.args.iter().find_map(|arg| match arg {
            Arg::NewId(id) => Some(*id),
            _ => None,
        })
    }
}

#[derive(Clone, Copy)]
enum Sig {
    Uint,
    Int,
    Str,
    Obj,
    New(&'static str),
    UntypedNew,
    Fd,
}

fn signature(interface: &str, opcode: u16) -> Option<(&'static str, &'static [Sig])> {
    use Sig::*;
    let sig: (&'static str, &'static [Sig]) = match (interface, opcode) {
        ("wl_display", 0) => ("sync", &[New("wl_callback")]),
        ("wl_display", 1) => ("get_registry", &[New("wl_registry")]),
        ("wl_registry", 0) => ("bind", &[Uint, UntypedNew]),
        ("wl_compositor", 0) => ("create_surface", &[New("wl_surface")]),
        ("wl_compositor", 1) => ("create_region", &[New("wl_region")]),
        ("wl_surface", 0) => ("destroy", &[]),
        ("wl_surface", 1) => ("attach", &[Obj, Int, Int]),
        ("wl_surface", 2) => ("damage", &[Int, Int, Int, Int]),
        ("wl_surface", 3) => ("frame", &[New("wl_callback")]),
        ("wl_surface", 6) => ("commit", &[]),
        ("wl_surface", 9) => ("damage_buffer", &[Int, Int, Int, Int]),
        ("wl_shm", 0) => ("create_pool", &[New("wl_shm_pool"), Fd, Int]),
        ("wl_shm", 1) => ("release", &[]),
        ("wl_shm_pool", 0) => ("create_buffer", &[New("wl_buffer"), Int, Int, Int, Int, Uint]),
        ("wl_shm_pool", 1) => ("destroy", &[]),
        ("wl_buffer", 0) => ("destroy", &[]),
        ("xdg_wm_base", 0) => ("destroy", &[]),
        ("xdg_wm_base", 1) => ("create_positioner", &[New("xdg_positioner")]),
        ("xdg_wm_base", 2) => ("get_xdg_surface", &[New("xdg_surface"), Obj]),
        ("xdg_wm_base", 3) => ("pong", &[Uint]),
        ("xdg_surface", 0) => ("destroy", &[]),
        ("xdg_surface", 1) => ("get_toplevel", &[New("xdg_toplevel")]),
        ("xdg_surface", 4) => ("ack_configure", &[Uint]),
        ("xdg_toplevel", 0) => ("destroy", &[]),
        ("xdg_toplevel", 2) => ("set_title", &[Str]),
        ("xdg_toplevel", 3) => ("set_app_id", &[Str]),
        ("wl_seat", 0) => ("get_pointer", &[New("wl_pointer")]),
        ("wl_seat", 1) => ("get_keyboard", &[New("wl_keyboard")]),
        ("wl_seat", 2) => ("get_touch", &[New("wl_touch")]),
        ("wl_seat", 3) => ("release", &[]),
        ("wl_pointer", 1) => ("release", &[]),
        ("wl_keyboard", 0) => ("release", &[]),
        ("wl_touch", 0) => ("release", &[]),
        _ => return None,
    };
    Some(sig)
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn u32(&mut self) -> u32 {
        let value = NativeEndian::read_u32(&self.data[self.pos..self.pos + 4]);
        self.pos += 4;
        value
    }

    fn string(&mut self) -> String {
        let len = self.u32() as usize;
        let raw = &self.data[self.pos..self.pos + len];
        self.pos += (len + 3) & !3;
        String::from_utf8_lossy(raw.strip_suffix(&[0]).unwrap_or(raw)).into_owned()
    }
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    let mut word = [0u8; 4];
    NativeEndian::write_u32(&mut word, value);
    out.extend_from_slice(&word);
}

fn push_i32(out: &mut Vec<u8>, value: i32) {
    let mut word = [0u8; 4];
    NativeEndian::write_i32(&mut word, value);
    out.extend_from_slice(&word);
}

fn encode(object: u32, opcode: u16, args: &[Arg]) -> Vec<u8> {
    let mut body = Vec::new();
    for arg in args {
        match arg {
            Arg::Uint(v) | Arg::Object(v) | Arg::NewId(v) => push_u32(&mut body, *v),
            Arg::Int(v) => push_i32(&mut body, *v),
            Arg::Str(s) => {
                push_u32(&mut body, s.len() as u32 + 1);
                body.extend_from_slice(s.as_bytes());
                body.push(0);
                while body.len() % 4 != 0 {
                    body.push(0);
                }
            }
            Arg::Array(bytes) => {
                push_u32(&mut body, bytes.len() as u32);
                body.extend_from_slice(bytes);
                while body.len() % 4 != 0 {
                    body.push(0);
                }
            }
            // Descriptors travel out of band as SCM_RIGHTS.
            Arg::Fd => {}
        }
    }
    let size = (body.len() + 8) as u32;
    let mut message = Vec::with_capacity(size as usize);
    push_u32(&mut message, object);
    push_u32(&mut message, (size << 16) | opcode as u32);
    message.extend_from_slice(&body);
    message
}

/// Server side of the socket, handed to hooks for sending events.
pub struct Responder {
    stream: UnixStream,
    objects: HashMap<u32, String>,
    created: Vec<(u32, String)>,
    callback_serial: u32,
}

impl Responder {
    pub fn send(&mut self, object: u32, opcode: u16, args: &[Arg]) {
        // The client may already be gone in teardown tests.
        let _ = self.stream.write_all(&encode(object, opcode, args));
    }

    /// Sends an event whose single `Arg::Fd` is filled with `fd`.
    pub fn send_with_fd(&mut self, object: u32, opcode: u16, args: &[Arg], fd: BorrowedFd<'_>) {
        let message = encode(object, opcode, args);
        let fds = [fd.as_raw_fd()];
        let _ = sendmsg::<UnixAddr>(
            self.stream.as_raw_fd(),
            &[IoSlice::new(&message)],
            &[ControlMessage::ScmRights(&fds)],
            MsgFlags::empty(),
            None,
        );
    }

    /// Most recently created object implementing `interface`.
    pub fn object_of(&self, interface: &str) -> Option<u32> {
        self.created
            .iter()
            .rev()
            .find(|(_, iface)| iface == interface)
            .map(|(id, _)| *id)
    }

    fn require(&self, interface: &str) -> u32 {
        self.object_of(interface)
            .unwrap_or_else(|| panic!("client has no {} yet", interface))
    }

    pub fn configure_toplevel(&mut self, width: i32, height: i32) {
        let toplevel = self.require("xdg_toplevel");
        self.send(toplevel, 0, &[Arg::Int(width), Arg::Int(height), Arg::Array(Vec::new())]);
    }

    pub fn configure_surface(&mut self, serial: u32) {
        let surface = self.require("xdg_surface");
        self.send(surface, 0, &[Arg::Uint(serial)]);
    }

    pub fn close_toplevel(&mut self) {
        let toplevel = self.require("xdg_toplevel");
        self.send(toplevel, 1, &[]);
    }

    pub fn seat_capabilities(&mut self, capabilities: u32) {
        let seat = self.require("wl_seat");
        self.send(seat, 0, &[Arg::Uint(capabilities)]);
    }

    /// Sends `wl_keyboard.keymap` with `text` (NUL-terminated) in a fresh file.
    pub fn keyboard_keymap(&mut self, format: u32, text: &str) {
        let keyboard = self.require("wl_keyboard");
        let mut file = tempfile::tempfile().expect("keymap file");
        file.write_all(text.as_bytes()).expect("write keymap");
        file.write_all(&[0]).expect("write keymap");
        let size = file.stream_position().expect("keymap size") as u32;
        self.send_with_fd(
            keyboard,
            0,
            &[Arg::Uint(format), Arg::Fd, Arg::Uint(size)],
            file.as_fd(),
        );
    }

    /// Sends `wl_keyboard.modifiers` with group 0.
    pub fn keyboard_modifiers(&mut self, serial: u32, depressed: u32) {
        let keyboard = self.require("wl_keyboard");
        self.send(
            keyboard,
            4,
            &[Arg::Uint(serial), Arg::Uint(depressed), Arg::Uint(0), Arg::Uint(0), Arg::Uint(0)],
        );
    }

    /// Sends `wl_keyboard.key` for an evdev scancode.
    pub fn key(&mut self, serial: u32, code: u32, state: u32) {
        let keyboard = self.require("wl_keyboard");
        self.send(keyboard, 3, &[Arg::Uint(serial), Arg::Uint(0), Arg::Uint(code), Arg::Uint(state)]);
    }

    pub fn ping(&mut self, serial: u32) {
        let wm_base = self.require("xdg_wm_base");
        self.send(wm_base, 0, &[Arg::Uint(serial)]);
    }

    /// Sends `wl_display.error` for the latest object of `interface`.
    pub fn protocol_error(&mut self, interface: &str, code: u32, message: &str) {
        let object = self.require(interface);
        self.send(
            DISPLAY_ID,
            0,
            &[Arg::Object(object), Arg::Uint(code), Arg::Str(message.to_string())],
        );
    }

    fn register(&mut self, id: u32, interface: &str) {
        self.objects.insert(id, interface.to_string());
        self.created.push((id, interface.to_string()));
    }

    fn decode(&mut self, message: &[u8]) -> Request {
        let mut cursor = Cursor { data: message, pos: 0 };
        let object_id = cursor.u32();
        let opcode = (cursor.u32() & 0xffff) as u16;
        let interface = self
            .objects
            .get(&object_id)
            .cloned()
            .unwrap_or_else(|| "unknown".to_string());

        let Some((name, sig)) = signature(&interface, opcode) else {
            return Request {
                object_id,
                interface,
                name: "unrecognized",
                args: Vec::new(),
            };
        };

        let mut args = Vec::new();
        for kind in sig {
            match *kind {
                Sig::Uint => args.push(Arg::Uint(cursor.u32())),
                Sig::Int => args.push(Arg::Int(cursor.u32() as i32)),
                Sig::Str => args.push(Arg::Str(cursor.string())),
                Sig::Obj => args.push(Arg::Object(cursor.u32())),
                Sig::Fd => args.push(Arg::Fd),
                Sig::New(new_interface) => {
                    let id = cursor.u32();
                    self.register(id, new_interface);
                    args.push(Arg::NewId(id));
                }
                Sig::UntypedNew => {
                    let new_interface = cursor.string();
                    let version = cursor.u32();
                    let id = cursor.u32();
                    self.register(id, &new_interface);
                    args.push(Arg::Str(new_interface));
                    args.push(Arg::Uint(version));
                    args.push(Arg::NewId(id));
                }
            }
        }
        Request {
            object_id,
            interface,
            name,
            args,
        }
    }
}

pub type Hook = Box<dyn FnMut(&Request, &mut Responder) + Send>;

/// A running fake compositor. Join it with [`FakeCompositor::finish`] after the client
/// side connection has been dropped.
pub struct FakeCompositor {
    requests: Arc<Mutex<Vec<Request>>>,
    thread: Option<JoinHandle<()>>,
}

impl FakeCompositor {
    /// Starts a compositor advertising `globals` (interface, version) and returns the
    /// client connection to it.
    pub fn start(
        globals: &[(&str, u32)],
        hook: impl FnMut(&Request, &mut Responder) + Send + 'static,
    ) -> (Connection, FakeCompositor) {
        let (client, server) = UnixStream::pair().expect("socket pair");
        let globals: Vec<(String, u32)> = globals.iter().map(|(i, v)| (i.to_string(), *v)).collect();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);
        let mut hook: Hook = Box::new(hook);

        let thread = std::thread::spawn(move || {
            let mut reader = server.try_clone().expect("clone server socket");
            let mut responder = Responder {
                stream: server,
                objects: HashMap::from([(DISPLAY_ID, "wl_display".to_string())]),
                created: Vec::new(),
                callback_serial: 0,
            };

            let mut pending = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let read = match reader.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => n,
                };
                pending.extend_from_slice(&chunk[..read]);

                while pending.len() >= 8 {
                    let header = NativeEndian::read_u32(&pending[4..8]);
                    let size = (header >> 16) as usize;
                    if pending.len() < size {
                        break;
                    }
                    let message: Vec<u8> = pending.drain(..size).collect();
                    let request = responder.decode(&message);
                    log.lock().unwrap().push(request.clone());

                    if request.is("wl_display", "sync") {
                        let callback = request.args[0].uint();
                        responder.callback_serial += 1;
                        let serial = responder.callback_serial;
                        responder.send(callback, 0, &[Arg::Uint(serial)]);
                        responder.send(DISPLAY_ID, 1, &[Arg::Uint(callback)]);
                        continue;
                    }
                    if request.is("wl_display", "get_registry") {
                        let registry = request.args[0].uint();
                        for (index, (interface, version)) in globals.iter().enumerate() {
                            responder.send(
                                registry,
                                0,
                                &[
                                    Arg::Uint(index as u32 + 1),
                                    Arg::Str(interface.clone()),
                                    Arg::Uint(*version),
                                ],
                            );
                        }
                        continue;
                    }
                    hook(&request, &mut responder);
                }
            }
        });

        let connection = Connection::from_socket(client).expect("client connection");
        (
            connection,
            FakeCompositor {
                requests,
                thread: Some(thread),
            },
        )
    }

    /// Snapshot of the requests received so far.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    /// Waits for the client to disconnect and returns every request it sent.
    pub fn finish(mut self) -> Vec<Request> {
        if let Some(thread) = self.thread.take() {
            thread.join().expect("fake compositor thread panicked");
        }
        self.requests()
    }
}

/// The globals a typical desktop compositor advertises, in an arbitrary order.
pub const DESKTOP_GLOBALS: &[(&str, u32)] = &[
    ("wl_output", 4),
    ("wl_seat", 7),
    ("zwp_linux_dmabuf_v1", 4),
    ("wl_shm", 1),
    ("wl_subcompositor", 1),
    ("xdg_wm_base", 5),
    ("wl_data_device_manager", 3),
    ("wl_compositor", 5),
];

/// `wl_seat` capability bits.
pub const CAP_POINTER: u32 = 1;
pub const CAP_KEYBOARD: u32 = 2;
pub const CAP_TOUCH: u32 = 4;

/// `wl_keyboard` keymap formats and key states.
pub const KEYMAP_NO_KEYMAP: u32 = 0;
pub const KEYMAP_XKB_V1: u32 = 1;
pub const KEY_RELEASED: u32 = 0;
pub const KEY_PRESSED: u32 = 1;

/// Self-contained keymap so tests do not depend on installed xkeyboard-config data.
/// Evdev scancodes 30 and 31 produce `a`/`A` and `s`/`S`; modifier mask 1 is Shift.
pub const TEST_KEYMAP: &str = r#"xkb_keymap {
    xkb_keycodes "scterm-test" {
        minimum = 8;
        maximum = 255;
        <AC01> = 38;
        <AC02> = 39;
        <LFSH> = 50;
    };
    xkb_types "scterm-test" {
        type "ONE_LEVEL" {
            modifiers = none;
            level_name[Level1] = "Any";
        };
        type "TWO_LEVEL" {
            modifiers = Shift;
            map[Shift] = Level2;
            level_name[Level1] = "Base";
            level_name[Level2] = "Shift";
        };
    };
    xkb_compatibility "scterm-test" {
    };
    xkb_symbols "scterm-test" {
        key <AC01> { type = "TWO_LEVEL", [ a, A ] };
        key <AC02> { type = "TWO_LEVEL", [ s, S ] };
        key <LFSH> { type = "ONE_LEVEL", [ Shift_L ] };
        modifier_map Shift { <LFSH> };
    };
};
"#;

/// Hook that configures the window on the first (bufferless) commit.
pub fn configure_on_first_commit(width: i32, height: i32, serial: u32) -> impl FnMut(&Request, &mut Responder) + Send {
    let mut configured = false;
    move |request, responder| {
        if request.is("wl_surface", "commit") && !configured {
            configured = true;
            responder.configure_toplevel(width, height);
            responder.configure_surface(serial);
        }
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn position(requests: &[Request], interface: &str, name: &str) -> Option<usize> {
    requests.iter().position(|r| r.is(interface, name))
}
