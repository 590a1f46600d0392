use hex_literal::hex;
use ntlmv2_client::{
    CryptoError, CryptoProvider, Credentials, Diagnostic, Error, HandshakeContext, ProtocolError,
    Reader, RustCrypto, State, MIC_LEN, MIC_OFFSET,
};


/// Real digests, but every "random" byte is the same.
struct FixedNonce(u8);
impl CryptoProvider for FixedNonce {
    fn md4(&self, data: &[u8]) -> Result<[u8; 16], CryptoError> {
        RustCrypto.md4(data)
    }
    fn hmac_md5(&self, key: &[u8], parts: &[&[u8]]) -> Result<[u8; 16], CryptoError> {
        RustCrypto.hmac_md5(key, parts)
    }
    fn fill_random(&mut self, dest: &mut [u8]) -> Result<(), CryptoError> {
        dest.fill(self.0);
        Ok(())
    }
}

fn credentials() -> Credentials {
    Credentials {
        username: "User".to_owned(),
        password: "Password".to_owned(),
        domain: "Domain".to_owned(),
    }
}

/// Target info as a Windows server sends it: names, DNS names, timestamp, terminator.
const INFO_WITH_TIMESTAMP: [u8; 58] = hex!(
    "02000c0044004f004d00410049004e00"
    "01000c00530045005200560045005200"
    "0400060064006f006d00"
    "070008000090d336b734c301"
    "00000000");

/// The Davenport sample: NetBIOS and DNS names only.
const INFO_WITHOUT_TIMESTAMP: [u8; 98] = hex!(
    "02000c0044004f004d00410049004e0001000c00530045005200560045005200"
    "0400140064006f006d00610069006e002e0063006f006d000300220073006500"
    "72007600650072002e0064006f006d00610069006e002e0063006f006d000000"
    "0000");

fn challenge(target_info: &[u8]) -> Vec<u8> {
    let target_name = hex!("44004f004d00410049004e00");
    let mut msg = Vec::new();
    msg.extend_from_slice(b"NTLMSSP\0");
    msg.extend_from_slice(&2u32.to_le_bytes());
    msg.extend_from_slice(&(target_name.len() as u16).to_le_bytes());
    msg.extend_from_slice(&(target_name.len() as u16).to_le_bytes());
    msg.extend_from_slice(&56u32.to_le_bytes());
    msg.extend_from_slice(&0x6289_8215u32.to_le_bytes());
    msg.extend_from_slice(&hex!("0123456789abcdef"));
    msg.extend_from_slice(&[0u8; 8]);
    msg.extend_from_slice(&(target_info.len() as u16).to_le_bytes());
    msg.extend_from_slice(&(target_info.len() as u16).to_le_bytes());
    msg.extend_from_slice(&((56 + target_name.len()) as u32).to_le_bytes());
    msg.extend_from_slice(&hex!("0a0063450000000f"));
    msg.extend_from_slice(&target_name);
    msg.extend_from_slice(target_info);
    msg
}

fn context(nonce: u8) -> HandshakeContext<FixedNonce, impl FnMut(Diagnostic)> {
    HandshakeContext::with_parts(Some("server"), Some("workstation"), &credentials(), FixedNonce(nonce), |_d: Diagnostic| {})
        .expect("context setup failed")
}

/// Extracts the NT response named by the Authenticate message's second security buffer.
fn nt_response(auth: &[u8]) -> &[u8] {
    let mut r = Reader::new(&auth[12..]);
    let _lm = r.read_security_buffer("lm").unwrap();
    let nt = r.read_security_buffer("nt").unwrap();
    nt.apply_to_slice("nt", auth).unwrap()
}


#[test]
fn negotiate_has_exact_length() {
    let mut ctx = context(0);
    let step = ctx.advance(&[]).unwrap();

    // "DOMAIN" and "WORKSTATION" in UTF-16LE
    assert_eq!(step.token.len(), 32 + 12 + 22);
    assert!(!step.complete);
    assert_eq!(&step.token[..16], hex!("4e544c4d53535000" "01000000" "05b08000"));
}

#[test]
fn mic_is_present_and_verifiable_with_timestamp() {
    let mut ctx = context(0xAA);
    let negotiate = ctx.advance(&[]).unwrap().token;
    let challenge_bytes = challenge(&INFO_WITH_TIMESTAMP);
    let step = ctx.advance(&challenge_bytes).unwrap();
    assert!(step.complete);
    assert_eq!(ctx.state(), State::AuthenticateSent);

    let auth = step.token;
    let mic = &auth[MIC_OFFSET..MIC_OFFSET + MIC_LEN];
    assert_ne!(mic, &[0u8; MIC_LEN][..]);

    let mut zeroed = auth.clone();
    zeroed[MIC_OFFSET..MIC_OFFSET + MIC_LEN].fill(0);
    let key = ctx.session_base_key().expect("session key after completion");
    let expected = RustCrypto.hmac_md5(key, &[&negotiate[..], &challenge_bytes[..], &zeroed[..]]).unwrap();
    assert_eq!(mic, &expected[..]);

    // the blob announces the MIC right before a fresh terminator
    let blob = &nt_response(&auth)[16..];
    assert_eq!(&blob[16..24], &[0xAA; 8]);
    assert_eq!(&blob[28..28 + 54], &INFO_WITH_TIMESTAMP[..54]);
    assert_eq!(&blob[28 + 54..], hex!("0600040002000000" "00000000"));
}

#[test]
fn mic_is_absent_without_timestamp() {
    let mut ctx = context(0x55);
    ctx.advance(&[]).unwrap();
    let auth = ctx.advance(&challenge(&INFO_WITHOUT_TIMESTAMP)).unwrap().token;

    assert!(!ctx.mic_enabled());
    assert_eq!(&auth[MIC_OFFSET..MIC_OFFSET + MIC_LEN], &[0u8; MIC_LEN][..]);

    let blob = &nt_response(&auth)[16..];
    assert_eq!(&blob[..8], hex!("0101000000000000"));
    assert_eq!(&blob[28..], &INFO_WITHOUT_TIMESTAMP[..]);
}

#[test]
fn authenticate_length_accounts_for_every_field() {
    let mut ctx = context(0);
    ctx.advance(&[]).unwrap();
    let auth = ctx.advance(&challenge(&INFO_WITH_TIMESTAMP)).unwrap().token;

    let nt_len = 16 + 28 + INFO_WITH_TIMESTAMP.len() + 8;
    // "DOMAIN", "User", "WORKSTATION"
    assert_eq!(auth.len(), 88 + 24 + nt_len + 12 + 8 + 22);
    assert_eq!(nt_response(&auth).len(), nt_len);
}

#[test]
fn repeated_attempts_differ_only_in_response_and_mic() {
    let mut first = context(0x11);
    let mut second = context(0x22);

    let negotiate_a = first.advance(&[]).unwrap().token;
    let negotiate_b = second.advance(&[]).unwrap().token;
    assert_eq!(negotiate_a, negotiate_b);

    let auth_a = first.advance(&challenge(&INFO_WITH_TIMESTAMP)).unwrap().token;
    let auth_b = second.advance(&challenge(&INFO_WITH_TIMESTAMP)).unwrap().token;
    assert_eq!(auth_a.len(), auth_b.len());

    let nt_start = 88 + 24;
    let nt_end = nt_start + nt_response(&auth_a).len();
    assert_eq!(&auth_a[..MIC_OFFSET], &auth_b[..MIC_OFFSET]);
    assert_eq!(&auth_a[MIC_OFFSET + MIC_LEN..nt_start], &auth_b[MIC_OFFSET + MIC_LEN..nt_start]);
    assert_eq!(&auth_a[nt_end..], &auth_b[nt_end..]);
    assert_ne!(&auth_a[nt_start..nt_end], &auth_b[nt_start..nt_end]);
}

#[test]
fn bad_signature_fails_the_attempt() {
    let mut ctx = context(0);
    ctx.advance(&[]).unwrap();

    let mut bytes = challenge(&INFO_WITH_TIMESTAMP);
    bytes[..8].copy_from_slice(b"NTLMSSPX");
    let err = ctx.advance(&bytes).unwrap_err();

    assert!(matches!(err, Error::Protocol(ProtocolError::MagicMismatch { .. })));
    assert_eq!(ctx.state(), State::Failed);
    assert!(ctx.session_base_key().is_none());
}

#[test]
fn unknown_av_pair_fails_the_attempt() {
    let mut info = Vec::from(&INFO_WITH_TIMESTAMP[..54]);
    info.extend_from_slice(&hex!("ff00020012340000" "0000"));
    let mut ctx = context(0);
    ctx.advance(&[]).unwrap();

    let err = ctx.advance(&challenge(&info)).unwrap_err();
    assert_eq!(err, Error::Protocol(ProtocolError::UnknownAvPair { av_id: 0x00ff }));
}

#[test]
fn default_context_completes() {
    let mut ctx = HandshakeContext::new(Some("server.domain.com"), None, &credentials()).unwrap();
    let negotiate = ctx.advance(&[]).unwrap();
    assert_eq!(negotiate.token.len(), 32 + 12);

    let auth = ctx.advance(&challenge(&INFO_WITHOUT_TIMESTAMP)).unwrap();
    assert!(auth.complete);
    assert_eq!(ctx.session_base_key().map(|k| k.len()), Some(16));
}
