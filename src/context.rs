//! The client side of one NTLMv2 authentication attempt.


use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::authenticate::{sign_authenticate, AuthenticateMessage};
use crate::challenge::{ChallengeMessage, Expectations};
use crate::crypto::{utf16_le, CryptoProvider, RustCrypto};
use crate::diagnostics::{Diagnostics, TracingDiagnostics};
use crate::error::Error;
use crate::negotiate::NegotiateMessage;
use crate::ntlmv2::{client_challenge_blob, compute_response, get_ntlm_time, ntowf_v2, password_hash, CLIENT_NONCE_LEN};
use crate::{Flags, CLIENT_FLAGS};


/// Standard NTLM credentials, consisting of username, password and domain.
///
/// The contents are wiped from memory when the value is dropped.
#[derive(Clone, Eq, Hash, PartialEq, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    /// The username part of the credentials.
    pub username: String,

    /// The password part of the credentials.
    pub password: String,

    /// The domain part of the credentials.
    ///
    /// Often specified in combination with the username as `<DOMAIN>\<USERNAME>`. In credentials
    /// without a domain, the domain is an empty string.
    pub domain: String,
}
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("domain", &self.domain)
            .finish()
    }
}


/// Where a handshake currently stands.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum State {
    /// Nothing has been sent yet.
    Init,

    /// The Negotiate message has been produced; the server's challenge is awaited.
    NegotiateSent,

    /// The challenge has been accepted and the response is being computed.
    ChallengeReceived,

    /// The Authenticate message has been produced. Terminal.
    AuthenticateSent,

    /// The attempt was abandoned. Terminal.
    Failed,
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::AuthenticateSent | Self::Failed)
    }
}


/// The result of a successful [`HandshakeContext::advance`] call.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Step {
    /// The token to send to the server.
    pub token: Vec<u8>,

    /// Whether this was the last token of the handshake.
    pub complete: bool,
}


/// Drives one NTLMv2 handshake from the client side.
///
/// Feed it an empty token to obtain the Negotiate message, then the server's Challenge message to
/// obtain the Authenticate message. Any error ends the attempt; create a new context to retry.
///
/// Secret material is overwritten when the attempt fails and when the context is dropped.
pub struct HandshakeContext<C = RustCrypto, D = TracingDiagnostics> {
    server_name: Option<String>,
    domain_name: String,
    user_name: String,

    domain_bytes: Vec<u8>,
    user_name_bytes: Vec<u8>,
    workstation_bytes: Vec<u8>,

    password_hash: Zeroizing<[u8; 16]>,
    flags: Flags,
    state: State,

    timestamp: Option<[u8; 8]>,
    session_base_key: Option<Zeroizing<[u8; 16]>>,

    negotiate_msg: Option<Vec<u8>>,
    challenge_msg: Option<Vec<u8>>,

    crypto: C,
    diagnostics: D,
}

impl HandshakeContext<RustCrypto, TracingDiagnostics> {
    /// Creates a context using the operating system's random source and reporting diagnostics
    /// through [`tracing`].
    ///
    /// `server_name` is only used to check the name the server announces; `workstation` is the
    /// client's hostname.
    pub fn new(server_name: Option<&str>, workstation: Option<&str>, credentials: &Credentials) -> Result<Self, Error> {
        Self::with_parts(server_name, workstation, credentials, RustCrypto, TracingDiagnostics)
    }
}

impl<C: CryptoProvider, D: Diagnostics> HandshakeContext<C, D> {
    /// Creates a context with the given crypto provider and diagnostics sink.
    pub fn with_parts(server_name: Option<&str>, workstation: Option<&str>, credentials: &Credentials, crypto: C, diagnostics: D) -> Result<Self, Error> {
        let domain_name = credentials.domain.to_uppercase();
        let workstation = workstation.unwrap_or("").to_uppercase();

        let domain_bytes = checked_utf16_le("domain name", &domain_name)?;
        let user_name_bytes = checked_utf16_le("user name", &credentials.username)?;
        let workstation_bytes = checked_utf16_le("workstation name", &workstation)?;

        let password_hash = password_hash(&crypto, &credentials.password)?;

        Ok(Self {
            server_name: server_name.map(|s| s.to_uppercase()),
            domain_name,
            user_name: credentials.username.clone(),
            domain_bytes,
            user_name_bytes,
            workstation_bytes,
            password_hash,
            flags: CLIENT_FLAGS,
            state: State::Init,
            timestamp: None,
            session_base_key: None,
            negotiate_msg: None,
            challenge_msg: None,
            crypto,
            diagnostics,
        })
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// The flags sent in both the Negotiate and the Authenticate message.
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// The timestamp from the server's challenge, if one was received.
    pub fn timestamp(&self) -> Option<[u8; 8]> {
        self.timestamp
    }

    /// Whether the Authenticate message carries (or will carry) a MIC.
    pub fn mic_enabled(&self) -> bool {
        self.challenge_msg.is_some()
    }

    /// The session base key, available once the handshake is complete.
    pub fn session_base_key(&self) -> Option<&[u8; 16]> {
        match self.state {
            State::AuthenticateSent => self.session_base_key.as_deref(),
            _ => None,
        }
    }

    /// Processes the last token received from the server and returns the next one to send.
    ///
    /// The first call takes an empty token and yields the Negotiate message. The second call takes
    /// the server's Challenge message and yields the Authenticate message with `complete` set.
    /// Calling in any other pattern is rejected with [`Error::InvalidState`].
    pub fn advance(&mut self, server_token: &[u8]) -> Result<Step, Error> {
        match (self.state, server_token.is_empty()) {
            (State::Init, true) => {
                let result = self.negotiate();
                self.finish_step(result, State::NegotiateSent, false)
            },
            (State::NegotiateSent, false) => {
                let result = self.authenticate(server_token);
                self.finish_step(result, State::AuthenticateSent, true)
            },
            (state, _) => {
                if !state.is_terminal() {
                    self.fail();
                }
                Err(Error::InvalidState { state, input_len: server_token.len() })
            },
        }
    }

    fn finish_step(&mut self, result: Result<Vec<u8>, Error>, next: State, complete: bool) -> Result<Step, Error> {
        match result {
            Ok(token) => {
                tracing::trace!(from = ?self.state, to = ?next, token_len = token.len(), "NTLM handshake advanced");
                self.state = next;
                Ok(Step { token, complete })
            },
            Err(e) => {
                tracing::debug!(state = ?self.state, error = %e, "NTLM handshake failed");
                self.fail();
                Err(e)
            },
        }
    }

    fn negotiate(&mut self) -> Result<Vec<u8>, Error> {
        let msg = NegotiateMessage {
            flags: self.flags,
            supplied_domain: &self.domain_bytes,
            supplied_workstation: &self.workstation_bytes,
        };
        let bytes = msg.to_bytes()?;

        self.negotiate_msg = Some(bytes.clone());
        Ok(bytes)
    }

    fn authenticate(&mut self, challenge_bytes: &[u8]) -> Result<Vec<u8>, Error> {
        let expect = Expectations {
            domain: Some(self.domain_name.as_str()).filter(|d| !d.is_empty()),
            server: self.server_name.as_deref(),
        };
        let challenge = ChallengeMessage::parse(challenge_bytes, expect, &mut self.diagnostics)?;

        self.state = State::ChallengeReceived;
        self.timestamp = challenge.timestamp;
        if challenge.timestamp.is_some() {
            self.challenge_msg = Some(Vec::from(challenge_bytes));
        }

        let response_key_nt = ntowf_v2(&self.crypto, &self.password_hash, &self.user_name, &self.domain_name)?;

        let mut client_nonce = [0u8; CLIENT_NONCE_LEN];
        self.crypto.fill_random(&mut client_nonce)?;

        let temp = if self.mic_enabled() {
            client_challenge_blob(get_ntlm_time(), &client_nonce, challenge.target_info_without_terminator(), true)
        } else {
            client_challenge_blob(get_ntlm_time(), &client_nonce, &challenge.target_info, false)
        };

        let response = compute_response(&self.crypto, &response_key_nt, &challenge.challenge, &temp)?;

        let msg = AuthenticateMessage {
            ntlm_response: &response.nt_challenge_response,
            domain_name: &self.domain_bytes,
            user_name: &self.user_name_bytes,
            workstation_name: &self.workstation_bytes,
            flags: self.flags,
        };
        let mut bytes = msg.to_bytes()?;

        if let (Some(negotiate), Some(saved_challenge)) = (&self.negotiate_msg, &self.challenge_msg) {
            sign_authenticate(&self.crypto, &response.session_base_key, negotiate, saved_challenge, &mut bytes)?;
        }

        self.session_base_key = Some(response.session_base_key);
        Ok(bytes)
    }

    /// Abandons the attempt and scrubs secrets right away.
    fn fail(&mut self) {
        self.state = State::Failed;
        self.password_hash.zeroize();
        self.session_base_key = None;
        self.negotiate_msg = None;
        self.challenge_msg = None;
    }
}

impl<C, D> fmt::Debug for HandshakeContext<C, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeContext")
            .field("server_name", &self.server_name)
            .field("domain_name", &self.domain_name)
            .field("user_name", &self.user_name)
            .field("flags", &self.flags)
            .field("state", &self.state)
            .field("mic_enabled", &self.challenge_msg.is_some())
            .finish_non_exhaustive()
    }
}

fn checked_utf16_le(field: &'static str, s: &str) -> Result<Vec<u8>, Error> {
    let bytes = utf16_le(s);
    if bytes.len() > usize::from(u16::MAX) {
        return Err(Error::FieldTooLong { field, length: bytes.len() });
    }
    Ok(bytes)
}
