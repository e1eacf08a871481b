use crate::net::{Opcode, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientHandshake {
    #[default]
    Connecting,
    AwaitingHelloAck,
    Active {
        session_id: SessionId,
    },
    Disconnected,
}

impl ClientHandshake {
    /// Returns to `Connecting` for a fresh attempt.
    pub fn restart(&mut self) {
        *self = ClientHandshake::Connecting;
    }

    /// Transport link is up. Returns `true` when a Hello must go out now.
    pub fn on_connected(&mut self) -> bool {
        if *self == ClientHandshake::Connecting {
            *self = ClientHandshake::AwaitingHelloAck;
            true
        } else {
            false
        }
    }

    /// Returns `true` if the ack was accepted and the session is now active.
    pub fn on_hello_ack(&mut self, session_id: SessionId) -> bool {
        if *self == ClientHandshake::AwaitingHelloAck {
            *self = ClientHandshake::Active { session_id };
            true
        } else {
            false
        }
    }

    pub fn on_disconnected(&mut self) {
        *self = ClientHandshake::Disconnected;
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ClientHandshake::Active { .. })
    }

    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            ClientHandshake::Active { session_id } => Some(*session_id),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientHandshake::Connecting => "Connecting",
            ClientHandshake::AwaitingHelloAck => "AwaitingHelloAck",
            ClientHandshake::Active { .. } => "Active",
            ClientHandshake::Disconnected => "Disconnected",
        }
    }
}

/// Per-peer handshake on the server side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerHandshake {
    #[default]
    AwaitingHello,
    Active {
        session_id: SessionId,
    },
    Disconnected,
}

impl ServerHandshake {
    /// The single gate for inbound traffic from this peer.
    ///
    /// Hello only while awaiting it, gameplay only once active, Ping whenever
    /// the link is up. Server-bound copies of HelloAck/Pong are never valid.
    pub fn admits(&self, opcode: Opcode) -> bool {
        match opcode {
            Opcode::Hello => *self == ServerHandshake::AwaitingHello,
            Opcode::Ping => *self != ServerHandshake::Disconnected,
            Opcode::Move | Opcode::Snapshot => self.is_active(),
            Opcode::HelloAck | Opcode::Pong => false,
        }
    }

    pub fn activate(&mut self, session_id: SessionId) -> bool {
        if *self == ServerHandshake::AwaitingHello {
            *self = ServerHandshake::Active { session_id };
            true
        } else {
            false
        }
    }

    pub fn on_disconnected(&mut self) {
        *self = ServerHandshake::Disconnected;
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ServerHandshake::Active { .. })
    }

    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            ServerHandshake::Active { session_id } => Some(*session_id),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerHandshake::AwaitingHello => "AwaitingHello",
            ServerHandshake::Active { .. } => "Active",
            ServerHandshake::Disconnected => "Disconnected",
        }
    }
}
