//! The Authenticate message, the client's answer to the server's challenge.


use crate::crypto::CryptoProvider;
use crate::cursor::{SecurityBuffer, Writer};
use crate::error::Error;
use crate::{Flags, NTLMSSP_MAGIC, MESSAGE_TYPE_AUTHENTICATE};


/// Offset of the message integrity code within an Authenticate message.
pub const MIC_OFFSET: usize
    = 8 // magic
    + 4 // message type
    + 8 // LM response secbuffer
    + 8 // NTLM response secbuffer
    + 8 // domain name secbuffer
    + 8 // user name secbuffer
    + 8 // workstation name secbuffer
    + 8 // session key secbuffer
    + 4 // flags
    + 8 // version
    ;

/// Length of the message integrity code.
pub const MIC_LEN: usize = 16;

/// Offset of the first payload byte in an Authenticate message.
pub const AUTHENTICATE_PAYLOAD_OFFSET: usize = MIC_OFFSET + MIC_LEN;

/// The LM response sent by an NTLMv2 client.
pub const ZERO_LM_RESPONSE: [u8; 24] = [0; 24];


/// The contents of an NTLM Authenticate message.
///
/// String fields are already encoded as UTF-16LE.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct AuthenticateMessage<'a> {
    pub ntlm_response: &'a [u8],
    pub domain_name: &'a [u8],
    pub user_name: &'a [u8],
    pub workstation_name: &'a [u8],
    pub flags: Flags,
}

impl<'a> AuthenticateMessage<'a> {
    /// Serializes the Authenticate message with an all-zero MIC field.
    ///
    /// The 24 zero bytes of the LM response open the payload, but the LM security buffer
    /// describes them with length zero. The session key security buffer is empty and points at
    /// the end of the payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let total = AUTHENTICATE_PAYLOAD_OFFSET
            + ZERO_LM_RESPONSE.len()
            + self.ntlm_response.len()
            + self.domain_name.len()
            + self.user_name.len()
            + self.workstation_name.len();

        let mut sec_buffer_offset = AUTHENTICATE_PAYLOAD_OFFSET;
        let lm_sb = SecurityBuffer::new("LM response", 0, sec_buffer_offset)?;
        sec_buffer_offset += ZERO_LM_RESPONSE.len();
        let ntlm_sb = next_sec_buffer("NT response", self.ntlm_response, &mut sec_buffer_offset)?;
        let domain_sb = next_sec_buffer("domain name", self.domain_name, &mut sec_buffer_offset)?;
        let user_sb = next_sec_buffer("user name", self.user_name, &mut sec_buffer_offset)?;
        let workstation_sb = next_sec_buffer("workstation name", self.workstation_name, &mut sec_buffer_offset)?;
        let session_key_sb = SecurityBuffer::new("session key", 0, sec_buffer_offset)?;

        let mut w = Writer::with_capacity(total);
        w.put_bytes(&NTLMSSP_MAGIC);
        w.put_u32_le(MESSAGE_TYPE_AUTHENTICATE);
        w.put_security_buffer(&lm_sb);
        w.put_security_buffer(&ntlm_sb);
        w.put_security_buffer(&domain_sb);
        w.put_security_buffer(&user_sb);
        w.put_security_buffer(&workstation_sb);
        w.put_security_buffer(&session_key_sb);
        w.put_u32_le(self.flags.bits());
        // an empty version keeps servers from mistaking the MIC for it
        w.put_zeros(8);
        w.put_zeros(MIC_LEN);

        w.put_bytes(&ZERO_LM_RESPONSE);
        w.put_bytes(self.ntlm_response);
        w.put_bytes(self.domain_name);
        w.put_bytes(self.user_name);
        w.put_bytes(self.workstation_name);

        Ok(w.into_inner())
    }
}

/// Describes `data` at the current payload offset and moves the offset past it.
fn next_sec_buffer(field: &'static str, data: &[u8], sec_buffer_offset: &mut usize) -> Result<SecurityBuffer, Error> {
    let sb = SecurityBuffer::new(field, data.len(), *sec_buffer_offset)?;
    *sec_buffer_offset += data.len();
    Ok(sb)
}


/// Computes the message integrity code over all three handshake messages.
///
/// `authenticate` must be the complete Authenticate message with its MIC field still zeroed.
pub fn compute_mic(crypto: &dyn CryptoProvider, session_base_key: &[u8; 16], negotiate: &[u8], challenge: &[u8], authenticate: &[u8]) -> Result<[u8; MIC_LEN], Error> {
    let mic = crypto.hmac_md5(session_base_key, &[negotiate, challenge, authenticate])?;
    Ok(mic)
}

/// Computes the MIC over `authenticate` and writes it into its MIC field.
pub fn sign_authenticate(crypto: &dyn CryptoProvider, session_base_key: &[u8; 16], negotiate: &[u8], challenge: &[u8], authenticate: &mut [u8]) -> Result<(), Error> {
    let mic = compute_mic(crypto, session_base_key, negotiate, challenge, authenticate)?;
    authenticate[MIC_OFFSET..AUTHENTICATE_PAYLOAD_OFFSET].copy_from_slice(&mic);
    Ok(())
}
