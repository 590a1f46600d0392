//! Non-fatal observations made while processing server messages.
//!
//! Nothing reported here affects the outcome of the handshake. The parser hands every observation
//! to a [`Diagnostics`] sink chosen by the caller instead of writing to a global logger.


use crate::Flags;


/// Something worth knowing about a Challenge message that does not stop the handshake.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Diagnostic {
    /// The DNS domain name announced by the server differs from the configured domain.
    DomainMismatch { expected: String, received: String },

    /// The DNS computer name announced by the server differs from the configured server name.
    ServerMismatch { expected: String, received: String },

    /// The server did not send a timestamp; no MIC will be computed.
    NoTimestamp,

    /// The flags the server answered with.
    ServerFlags(Flags),

    /// The target name the server answered with.
    TargetName(String),
}

impl Diagnostic {
    /// Whether this diagnostic points at a possible misconfiguration.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::DomainMismatch { .. } | Self::ServerMismatch { .. })
    }
}


/// Receives diagnostics.
pub trait Diagnostics {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl<F: FnMut(Diagnostic)> Diagnostics for F {
    fn report(&mut self, diagnostic: Diagnostic) {
        self(diagnostic)
    }
}


/// Forwards diagnostics to [`tracing`]: mismatches as warnings, everything else at debug level.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn report(&mut self, diagnostic: Diagnostic) {
        match diagnostic {
            Diagnostic::DomainMismatch { expected, received } => {
                tracing::warn!(%expected, %received, "server announced a different DNS domain name");
            },
            Diagnostic::ServerMismatch { expected, received } => {
                tracing::warn!(%expected, %received, "server announced a different DNS computer name");
            },
            Diagnostic::NoTimestamp => {
                tracing::debug!("challenge carries no timestamp; authenticating without MIC");
            },
            Diagnostic::ServerFlags(flags) => {
                tracing::debug!(flags = flags.bits(), "server negotiate flags");
            },
            Diagnostic::TargetName(name) => {
                tracing::debug!(target_name = %name, "challenge target name");
            },
        }
    }
}
