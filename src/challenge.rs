//! Parsing of the server's Challenge message and its target information block.


use crate::cursor::Reader;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::ProtocolError;
use crate::{Flags, NTLMSSP_MAGIC, MESSAGE_TYPE_CHALLENGE};


/// Value of the `MsvAvFlags` entry announcing that the Authenticate message carries a MIC.
pub const AV_FLAG_MIC_PROVIDED: u32 = 0x0000_0002;


/// The type of additional target information included in the Challenge message.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum TargetInfoType {
    Terminator,
    NtServer,
    NtDomain,
    DnsServer,
    DnsDomain,
    DnsForest,
    Flags,
    Timestamp,
    SingleHost,
    TargetName,
    Unknown(u16),
}
impl From<TargetInfoType> for u16 {
    fn from(t: TargetInfoType) -> Self {
        match t {
            TargetInfoType::Terminator => 0x0000,
            TargetInfoType::NtServer => 0x0001,
            TargetInfoType::NtDomain => 0x0002,
            TargetInfoType::DnsServer => 0x0003,
            TargetInfoType::DnsDomain => 0x0004,
            TargetInfoType::DnsForest => 0x0005,
            TargetInfoType::Flags => 0x0006,
            TargetInfoType::Timestamp => 0x0007,
            TargetInfoType::SingleHost => 0x0008,
            TargetInfoType::TargetName => 0x0009,
            TargetInfoType::Unknown(w) => w,
        }
    }
}
impl From<u16> for TargetInfoType {
    fn from(w: u16) -> Self {
        match w {
            0x0000 => TargetInfoType::Terminator,
            0x0001 => TargetInfoType::NtServer,
            0x0002 => TargetInfoType::NtDomain,
            0x0003 => TargetInfoType::DnsServer,
            0x0004 => TargetInfoType::DnsDomain,
            0x0005 => TargetInfoType::DnsForest,
            0x0006 => TargetInfoType::Flags,
            0x0007 => TargetInfoType::Timestamp,
            0x0008 => TargetInfoType::SingleHost,
            0x0009 => TargetInfoType::TargetName,
            other => TargetInfoType::Unknown(other),
        }
    }
}

/// An entry of additional target information included in the Challenge message.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TargetInfoEntry {
    pub entry_type: TargetInfoType,
    pub data: Vec<u8>,
}

impl TargetInfoEntry {
    /// Serializes the target info entry into bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let entry_type_u16: u16 = self.entry_type.into();
        // entries are built by this crate from 16-bit lengths or fixed-size values
        let bytes_len = self.data.len() as u16;

        let mut ret = Vec::with_capacity(4 + self.data.len());
        ret.extend_from_slice(&entry_type_u16.to_le_bytes());
        ret.extend_from_slice(&bytes_len.to_le_bytes());
        ret.extend_from_slice(&self.data);
        ret
    }

    /// Interprets the data as a UTF-16LE string, replacing invalid sequences.
    pub fn to_string_lossy(&self) -> String {
        utf16_le_bytes_to_string_lossy(&self.data)
    }
}


/// Names the client expects the server to announce. Mismatches are only reported, never fatal.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Expectations<'a> {
    pub domain: Option<&'a str>,
    pub server: Option<&'a str>,
}


/// The contents of an NTLM Challenge message.
///
/// The Challenge message is sent by the server in response to the client's Negotiate message; the
/// client is expected to respond with an Authenticate message.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ChallengeMessage {
    /// The host against which the client is authenticating.
    pub target_name: String,

    /// The flags the server answered with. Informational only.
    pub flags: Flags,

    /// The challenge value.
    pub challenge: [u8; 8],

    /// The raw target information block.
    pub target_info: Vec<u8>,

    /// The decoded entries of the target information block, up to and including the terminator.
    pub target_information: Vec<TargetInfoEntry>,

    /// Offset of the terminating entry within `target_info`, if one was found.
    pub terminator_offset: Option<usize>,

    /// The server's FILETIME timestamp, if it sent one.
    pub timestamp: Option<[u8; 8]>,
}

impl ChallengeMessage {
    /// Parses a Challenge message.
    ///
    /// Consistency of the announced names with `expect` is reported to `diagnostics`.
    pub fn parse(message: &[u8], expect: Expectations<'_>, diagnostics: &mut dyn Diagnostics) -> Result<Self, ProtocolError> {
        let mut r = Reader::new(message);

        let magic = r.read_bytes("signature", NTLMSSP_MAGIC.len())?;
        if magic != NTLMSSP_MAGIC {
            return Err(ProtocolError::MagicMismatch { expected: NTLMSSP_MAGIC, obtained: Vec::from(magic) });
        }

        let message_type = r.read_u32_le("message type")?;
        if message_type != MESSAGE_TYPE_CHALLENGE {
            return Err(ProtocolError::UnexpectedMessageType { expected: MESSAGE_TYPE_CHALLENGE, obtained: message_type });
        }

        let target_name_sb = r.read_security_buffer("target name fields")?;
        let flags = Flags::from_bits_retain(r.read_u32_le("negotiate flags")?);
        let challenge = r.read_array("server challenge")?;
        r.skip("reserved", 8)?;
        let target_info_sb = r.read_security_buffer("target info fields")?;
        r.skip("version", 8)?;

        diagnostics.report(Diagnostic::ServerFlags(flags));

        let target_name_bytes = target_name_sb.apply_to_slice("target name", message)?;
        let target_name = utf16_le_bytes_to_string_lossy(target_name_bytes);
        diagnostics.report(Diagnostic::TargetName(target_name.clone()));

        let target_info = target_info_sb.apply_to_slice("target info", message)?;
        if target_info.is_empty() {
            return Err(ProtocolError::NoTargetInfo);
        }

        let walk = walk_target_info(target_info, expect, diagnostics)?;
        if walk.timestamp.is_none() {
            diagnostics.report(Diagnostic::NoTimestamp);
        }

        Ok(Self {
            target_name,
            flags,
            challenge,
            target_info: Vec::from(target_info),
            target_information: walk.entries,
            terminator_offset: walk.terminator_offset,
            timestamp: walk.timestamp,
        })
    }

    /// The target information bytes preceding the terminator.
    pub fn target_info_without_terminator(&self) -> &[u8] {
        match self.terminator_offset {
            Some(offset) => &self.target_info[..offset],
            None => &self.target_info,
        }
    }
}


struct TargetInfoWalk {
    entries: Vec<TargetInfoEntry>,
    terminator_offset: Option<usize>,
    timestamp: Option<[u8; 8]>,
}

/// Walks the AV_PAIR list until the terminator or the end of the block.
fn walk_target_info(target_info: &[u8], expect: Expectations<'_>, diagnostics: &mut dyn Diagnostics) -> Result<TargetInfoWalk, ProtocolError> {
    let mut r = Reader::new(target_info);
    let mut walk = TargetInfoWalk {
        entries: Vec::new(),
        terminator_offset: None,
        timestamp: None,
    };

    while r.remaining() > 0 {
        let entry_offset = r.position();
        let av_id = r.read_u16_le("AV-pair id")?;
        let av_len = r.read_u16_le("AV-pair length")?;
        let value = r.read_bytes("AV-pair value", usize::from(av_len))?;

        let entry = TargetInfoEntry {
            entry_type: av_id.into(),
            data: Vec::from(value),
        };

        let entry_type = entry.entry_type;
        match entry_type {
            TargetInfoType::DnsDomain => {
                if let Some(expected) = expect.domain {
                    let received = entry.to_string_lossy();
                    if !names_match(expected, &received) {
                        diagnostics.report(Diagnostic::DomainMismatch { expected: expected.to_owned(), received });
                    }
                }
            },
            TargetInfoType::DnsServer => {
                if let Some(expected) = expect.server {
                    let received = entry.to_string_lossy();
                    if !names_match(expected, &received) {
                        diagnostics.report(Diagnostic::ServerMismatch { expected: expected.to_owned(), received });
                    }
                }
            },
            TargetInfoType::Timestamp => {
                // an empty timestamp is treated as absent
                if !value.is_empty() {
                    let mut ts = [0u8; 8];
                    ts.copy_from_slice(Reader::new(value).read_bytes("MsvAvTimestamp", 8)?);
                    walk.timestamp = Some(ts);
                }
            },
            TargetInfoType::Terminator => {
                walk.terminator_offset = Some(entry_offset);
                walk.entries.push(entry);
                break;
            },
            TargetInfoType::Flags
                | TargetInfoType::NtServer
                | TargetInfoType::NtDomain
                | TargetInfoType::DnsForest
                | TargetInfoType::SingleHost
                | TargetInfoType::TargetName => {},
            TargetInfoType::Unknown(av_id) => {
                return Err(ProtocolError::UnknownAvPair { av_id });
            },
        }

        walk.entries.push(entry);
    }

    Ok(walk)
}

fn names_match(expected: &str, received: &str) -> bool {
    expected.to_uppercase() == received.to_uppercase()
}

fn utf16_le_bytes_to_string_lossy(bytes: &[u8]) -> String {
    let u16s: Vec<u16> = bytes.chunks_exact(2)
        .map(|chk| u16::from_le_bytes([chk[0], chk[1]]))
        .collect();
    String::from_utf16_lossy(&u16s)
}
