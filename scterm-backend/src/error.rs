use thiserror::Error;
use wayland_backend::client::WaylandError;
use wayland_client::DispatchError;

/// Failures of the windowing backend.
///
/// None of these are retried. Construction failures mean "no backend"; anything raised
/// after construction is fatal for the connection.
#[derive(Debug, Error)]
pub enum BackendError {
    /// No supported display-server session, the connection could not be made, or a
    /// mandatory global was not advertised.
    #[error("No usable display server: {0}")]
    Unavailable(String),

    /// The compositor rejected a request.
    #[error("Protocol error on {interface}@{object_id} (code {code}): {message}")]
    ProtocolViolation {
        interface: String,
        object_id: u32,
        code: u32,
        message: String,
    },

    /// Shared memory, mapping or descriptor allocation failed.
    #[error("Failed to allocate {what}: {source}")]
    ResourceExhaustion {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The compositor sent a keymap that could not be read or compiled.
    #[error("Invalid keymap: {0}")]
    InvalidKeymap(String),

    #[error("The window surface has not been mapped")]
    NotMapped,

    #[error("The window surface is already mapped")]
    AlreadyMapped,

    /// The connection to the compositor failed outside of a protocol error.
    #[error("Display connection I/O error: {0}")]
    Io(#[source] std::io::Error),
}

impl BackendError {
    pub(crate) fn resource(what: &'static str, source: impl Into<std::io::Error>) -> Self {
        BackendError::ResourceExhaustion {
            what,
            source: source.into(),
        }
    }
}

impl From<WaylandError> for BackendError {
    fn from(err: WaylandError) -> Self {
        match err {
            WaylandError::Protocol(protocol) => BackendError::ProtocolViolation {
                interface: protocol.object_interface,
                object_id: protocol.object_id,
                code: protocol.code,
                message: protocol.message,
            },
            WaylandError::Io(io) => BackendError::Io(io),
        }
    }
}

impl From<DispatchError> for BackendError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Backend(backend) => backend.into(),
            DispatchError::BadMessage {
                sender_id,
                interface,
                opcode,
            } => BackendError::ProtocolViolation {
                interface: interface.to_string(),
                object_id: sender_id.protocol_id(),
                code: 0,
                message: format!("malformed event with opcode {}", opcode),
            },
        }
    }
}
