//! NTLMv2 response calculation.


use chrono::{NaiveDate, Utc};
use zeroize::Zeroizing;

use crate::challenge::{TargetInfoEntry, TargetInfoType, AV_FLAG_MIC_PROVIDED};
use crate::crypto::{utf16_le, CryptoProvider};
use crate::error::CryptoError;


/// Length of the client nonce embedded in the client challenge blob.
pub const CLIENT_NONCE_LEN: usize = 8;


/// Obtains the current NTLM timestamp.
///
/// This is the number of 100-nanosecond intervals since 1601-01-01T00:00:00Z.
pub fn get_ntlm_time() -> i64 {
    let windows_epoch = NaiveDate::from_ymd_opt(1601, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc());
    let windows_epoch = match windows_epoch {
        Some(epoch) => epoch,
        None => return 0,
    };
    let now = Utc::now();
    // the requested format is "tenths of a microsecond"; scaling the duration itself overflows
    (now - windows_epoch).num_microseconds()
        .map_or(0, |us| us * 10)
}


/// Hashes the password for use as the NTOWFv2 key: MD4 over its UTF-16LE encoding.
pub fn password_hash(crypto: &dyn CryptoProvider, password: &str) -> Result<Zeroizing<[u8; 16]>, CryptoError> {
    let password_bytes = Zeroizing::new(utf16_le(password));
    crypto.md4(&password_bytes).map(Zeroizing::new)
}

/// Derives the NTLMv2 response key.
///
/// This is HMAC-MD5 keyed with the password hash over the uppercase username concatenated with
/// the domain, both encoded as UTF-16LE. The domain is used as given.
pub fn ntowf_v2(crypto: &dyn CryptoProvider, password_hash: &[u8; 16], username: &str, domain: &str) -> Result<Zeroizing<[u8; 16]>, CryptoError> {
    let user_dom = utf16_le(&(username.to_uppercase() + domain));
    crypto.hmac_md5(password_hash, &[&user_dom[..]]).map(Zeroizing::new)
}


/// Assembles the client challenge blob ("temp").
///
/// With `add_mic_flag` unset, `target_info` is copied verbatim. With it set, `target_info` must
/// already be stripped of its terminator; an `MsvAvFlags` entry announcing the MIC and a fresh
/// terminator are appended.
pub fn client_challenge_blob(time: i64, client_nonce: &[u8; CLIENT_NONCE_LEN], target_info: &[u8], add_mic_flag: bool) -> Vec<u8> {
    let mut temp = Vec::with_capacity(28 + target_info.len() + 12);
    temp.push(0x01); // RespType
    temp.push(0x01); // HiRespType
    temp.extend_from_slice(&[0u8; 6]);
    temp.extend_from_slice(&time.to_le_bytes());
    temp.extend_from_slice(client_nonce);
    temp.extend_from_slice(&[0u8; 4]);
    temp.extend_from_slice(target_info);

    if add_mic_flag {
        let flags = TargetInfoEntry {
            entry_type: TargetInfoType::Flags,
            data: Vec::from(AV_FLAG_MIC_PROVIDED.to_le_bytes()),
        };
        let terminator = TargetInfoEntry {
            entry_type: TargetInfoType::Terminator,
            data: Vec::new(),
        };
        temp.extend_from_slice(&flags.to_bytes());
        temp.extend_from_slice(&terminator.to_bytes());
    }

    temp
}


/// The outcome of answering a server challenge.
pub struct NtlmV2Response {
    /// HMAC-MD5 over the server challenge and the client challenge blob.
    pub nt_proof_str: [u8; 16],

    /// `nt_proof_str` followed by the client challenge blob; sent as the NT response.
    pub nt_challenge_response: Vec<u8>,

    /// Key material derived from the proof; keys the MIC.
    pub session_base_key: Zeroizing<[u8; 16]>,
}

/// Computes the proof, the NT response and the session base key from a client challenge blob.
pub fn compute_response(crypto: &dyn CryptoProvider, response_key_nt: &[u8; 16], server_challenge: &[u8; 8], temp: &[u8]) -> Result<NtlmV2Response, CryptoError> {
    let nt_proof_str = crypto.hmac_md5(response_key_nt, &[&server_challenge[..], temp])?;
    let session_base_key = Zeroizing::new(crypto.hmac_md5(response_key_nt, &[&nt_proof_str[..]])?);

    let mut nt_challenge_response = Vec::with_capacity(nt_proof_str.len() + temp.len());
    nt_challenge_response.extend_from_slice(&nt_proof_str);
    nt_challenge_response.extend_from_slice(temp);

    Ok(NtlmV2Response {
        nt_proof_str,
        nt_challenge_response,
        session_base_key,
    })
}
