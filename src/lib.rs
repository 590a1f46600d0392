//! The client side of the NTLMv2 challenge-response handshake.
//!
//! A [`HandshakeContext`] turns the server's tokens into the client's tokens; moving them between
//! the two parties is up to the caller. Authenticate messages carry a message integrity code (MIC)
//! whenever the server's challenge includes a timestamp.
//!
//! Sample usage:
//! ```
//! use base64::prelude::{BASE64_STANDARD, Engine};
//!
//! const EWS_URL: &str = "https://example.com/EWS/Exchange.asmx";
//!
//! async fn initialize_authed_client(username: &str, password: &str, domain: &str, local_hostname: &str) -> reqwest::Client {
//!     let creds = ntlmv2_client::Credentials {
//!         username: username.to_owned(),
//!         password: password.to_owned(),
//!         domain: domain.to_owned(),
//!     };
//!     let mut ctx = ntlmv2_client::HandshakeContext::new(Some("example.com"), Some(local_hostname), &creds)
//!         .expect("failed to set up NTLM context");
//!
//!     let nego = ctx.advance(&[])
//!         .expect("failed to encode NTLM negotiation message");
//!     let nego_b64 = BASE64_STANDARD.encode(&nego.token);
//!
//!     let client = reqwest::Client::builder()
//!         .cookie_store(true)
//!         .build()
//!         .expect("failed to build client");
//!     let resp = client.get(EWS_URL)
//!         .header("Authorization", format!("NTLM {}", nego_b64))
//!         .send().await
//!         .expect("failed to send challenge request to Exchange");
//!     let challenge_header = resp.headers().get("www-authenticate")
//!         .expect("response missing challenge header");
//!
//!     // we might have been redirected to a specialized authentication URL
//!     let auth_url = resp.url();
//!
//!     let challenge_b64 = challenge_header.to_str()
//!         .expect("challenge header not a string")
//!         .split(' ')
//!         .nth(1).expect("second chunk of challenge header missing");
//!     let challenge_bytes = BASE64_STANDARD.decode(challenge_b64)
//!         .expect("base64 decoding challenge message failed");
//!
//!     let auth = ctx.advance(&challenge_bytes)
//!         .expect("failed to answer NTLM challenge");
//!     assert!(auth.complete);
//!     let auth_b64 = BASE64_STANDARD.encode(&auth.token);
//!
//!     client.get(auth_url.clone())
//!         .header("Authorization", format!("NTLM {}", auth_b64))
//!         .send().await
//!         .expect("failed to send authentication request to Exchange")
//!         .error_for_status()
//!         .expect("error response to authentication message");
//!
//!     client
//! }
//! ```


mod authenticate;
mod challenge;
mod context;
mod crypto;
mod cursor;
mod diagnostics;
mod error;
mod negotiate;
mod ntlmv2;


use bitflags::bitflags;

pub use crate::authenticate::{compute_mic, AuthenticateMessage, AUTHENTICATE_PAYLOAD_OFFSET, MIC_LEN, MIC_OFFSET};
pub use crate::challenge::{ChallengeMessage, Expectations, TargetInfoEntry, TargetInfoType, AV_FLAG_MIC_PROVIDED};
pub use crate::context::{Credentials, HandshakeContext, State, Step};
pub use crate::crypto::{CryptoProvider, RustCrypto};
pub use crate::cursor::{Reader, SecurityBuffer, Writer};
pub use crate::diagnostics::{Diagnostic, Diagnostics, TracingDiagnostics};
pub use crate::error::{CryptoError, Error, ProtocolError};
pub use crate::negotiate::{NegotiateMessage, NEGOTIATE_PAYLOAD_OFFSET};
pub use crate::ntlmv2::{client_challenge_blob, compute_response, get_ntlm_time, ntowf_v2, password_hash, NtlmV2Response};


/// The magic value at the start of every NTLMSSP data packet.
pub const NTLMSSP_MAGIC: [u8; 8] = *b"NTLMSSP\0";

pub const MESSAGE_TYPE_NEGOTIATE: u32 = 0x0000_0001;
pub const MESSAGE_TYPE_CHALLENGE: u32 = 0x0000_0002;
pub const MESSAGE_TYPE_AUTHENTICATE: u32 = 0x0000_0003;


bitflags! {
    /// NTLM operation flags.
    #[derive(Clone, Copy, Debug, Default, Hash, Eq, Ord, PartialEq, PartialOrd)]
    pub struct Flags: u32 {
        const NEGOTIATE_UNICODE = 0x0000_0001;
        const NEGOTIATE_OEM = 0x0000_0002;
        const REQUEST_TARGET = 0x0000_0004;
        const NEGOTIATE_SIGN = 0x0000_0010;
        const NEGOTIATE_SEAL = 0x0000_0020;
        const NEGOTIATE_DATAGRAM = 0x0000_0040;
        const NEGOTIATE_LANMAN_KEY = 0x0000_0080;
        const NEGOTIATE_NTLM = 0x0000_0200;
        const NEGOTIATE_ANONYMOUS = 0x0000_0800;
        const NEGOTIATE_DOMAIN_SUPPLIED = 0x0000_1000;
        const NEGOTIATE_WORKSTATION_SUPPLIED = 0x0000_2000;
        const NEGOTIATE_ALWAYS_SIGN = 0x0000_8000;
        const TARGET_TYPE_DOMAIN = 0x0001_0000;
        const TARGET_TYPE_SERVER = 0x0002_0000;
        const NEGOTIATE_EXTENDED_SESSION_SECURITY = 0x0008_0000;
        const NEGOTIATE_IDENTIFY = 0x0010_0000;
        const REQUEST_NON_NT_SESSION_KEY = 0x0040_0000;
        const NEGOTIATE_TARGET_INFO = 0x0080_0000;
        const NEGOTIATE_VERSION = 0x0200_0000;
        const NEGOTIATE_128BIT = 0x2000_0000;
        const NEGOTIATE_KEY_EXCHANGE = 0x4000_0000;
        const NEGOTIATE_56BIT = 0x8000_0000;
    }
}

/// The flags this client requests in its Negotiate message and repeats in its Authenticate
/// message.
pub const CLIENT_FLAGS: Flags = Flags::NEGOTIATE_UNICODE
    .union(Flags::REQUEST_TARGET)
    .union(Flags::NEGOTIATE_DOMAIN_SUPPLIED)
    .union(Flags::NEGOTIATE_WORKSTATION_SUPPLIED)
    .union(Flags::NEGOTIATE_ALWAYS_SIGN)
    .union(Flags::NEGOTIATE_TARGET_INFO);
