//! Which side of the connection this endpoint is.

/// The side of the connection, fixed at construction.
///
/// The role decides the masking direction (RFC 6455 Section 5.1): a client
/// masks every frame it writes and rejects masked input, a server writes in
/// the clear and rejects unmasked input. Nothing else in the engine differs
/// between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The endpoint that initiated the connection.
    Client,
    /// The endpoint that accepted the connection.
    Server,
}

impl Role {
    /// Whether outgoing frames get a fresh mask applied.
    #[inline]
    #[must_use]
    pub const fn must_mask(&self) -> bool {
        matches!(self, Role::Client)
    }

    /// Whether incoming frames are required to carry a mask.
    #[inline]
    #[must_use]
    pub const fn expects_masked(&self) -> bool {
        matches!(self, Role::Server)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Role::Client => "Client",
            Role::Server => "Server",
        })
    }
}
