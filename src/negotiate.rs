//! The Negotiate message, sent by the client to open the handshake.


use crate::cursor::{SecurityBuffer, Writer};
use crate::error::Error;
use crate::{Flags, NTLMSSP_MAGIC, MESSAGE_TYPE_NEGOTIATE};


/// Offset of the first payload byte in a Negotiate message.
pub const NEGOTIATE_PAYLOAD_OFFSET: usize
    = 8 // magic
    + 4 // message type
    + 4 // flags
    + 8 // supplied domain secbuffer
    + 8 // supplied workstation secbuffer
    ;


/// The contents of an NTLM Negotiate message.
///
/// The Negotiate message is the first message in an NTLM challenge-response process and is sent by
/// the client to the server; the server is expected to respond with a Challenge message. No version
/// field is sent, so the payload starts right after the workstation security buffer.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct NegotiateMessage<'a> {
    /// Which NTLM behavior should be negotiated.
    pub flags: Flags,

    /// The domain against which the client wishes to authenticate, encoded as UTF-16LE.
    pub supplied_domain: &'a [u8],

    /// The NT hostname of the client, encoded as UTF-16LE.
    pub supplied_workstation: &'a [u8],
}

impl<'a> NegotiateMessage<'a> {
    /// Serializes the Negotiate message.
    ///
    /// The result is exactly `32 + domain + workstation` bytes long.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let domain_len = self.supplied_domain.len();
        let workstation_len = self.supplied_workstation.len();

        let domain_sb = SecurityBuffer::new("domain name", domain_len, NEGOTIATE_PAYLOAD_OFFSET)?;
        let workstation_sb = SecurityBuffer::new("workstation name", workstation_len, NEGOTIATE_PAYLOAD_OFFSET + domain_len)?;

        let mut w = Writer::with_capacity(NEGOTIATE_PAYLOAD_OFFSET + domain_len + workstation_len);
        w.put_bytes(&NTLMSSP_MAGIC);
        w.put_u32_le(MESSAGE_TYPE_NEGOTIATE);
        w.put_u32_le(self.flags.bits());
        w.put_security_buffer(&domain_sb);
        w.put_security_buffer(&workstation_sb);
        w.put_bytes(self.supplied_domain);
        w.put_bytes(self.supplied_workstation);
        Ok(w.into_inner())
    }
}


#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use crate::CLIENT_FLAGS;
    use crate::crypto::utf16_le;
    use super::*;

    #[test]
    fn negotiate_layout() {
        let domain = utf16_le("DOMAIN");
        let workstation = utf16_le("WS");
        let msg = NegotiateMessage {
            flags: CLIENT_FLAGS,
            supplied_domain: &domain,
            supplied_workstation: &workstation,
        };
        let bytes = msg.to_bytes().unwrap();

        assert_eq!(bytes.len(), 32 + 12 + 4);
        assert_eq!(&bytes[..32], hex!(
            "4e544c4d53535000" "01000000" "05b08000"
            "0c000c0020000000" "040004002c000000"));
        assert_eq!(&bytes[32..44], &domain[..]);
        assert_eq!(&bytes[44..], &workstation[..]);
    }

    #[test]
    fn negotiate_without_identity_is_header_only() {
        let msg = NegotiateMessage {
            flags: CLIENT_FLAGS,
            supplied_domain: &[],
            supplied_workstation: &[],
        };
        let bytes = msg.to_bytes().unwrap();

        assert_eq!(bytes.len(), 32);
        // both descriptors are empty and point at the end of the header
        assert_eq!(&bytes[16..32], hex!("0000000020000000" "0000000020000000"));
    }

    #[test]
    fn descriptors_track_lengths() {
        for (d, w) in [(0usize, 10usize), (2, 0), (30, 18), (254, 256)] {
            let domain = vec![0x41; d];
            let workstation = vec![0x42; w];
            let msg = NegotiateMessage {
                flags: CLIENT_FLAGS,
                supplied_domain: &domain,
                supplied_workstation: &workstation,
            };
            let bytes = msg.to_bytes().unwrap();

            assert_eq!(bytes.len(), 32 + d + w);
            assert_eq!(u16::from_le_bytes([bytes[16], bytes[17]]) as usize, d);
            assert_eq!(u32::from_le_bytes(bytes[20..24].try_into().unwrap()), 32);
            assert_eq!(u16::from_le_bytes([bytes[24], bytes[25]]) as usize, w);
            assert_eq!(u32::from_le_bytes(bytes[28..32].try_into().unwrap()) as usize, 32 + d);
            assert!(bytes[32..32 + d].iter().all(|b| *b == 0x41));
            assert!(bytes[32 + d..].iter().all(|b| *b == 0x42));
        }
    }
}
