//! The cryptographic primitives NTLM is built from.
//!
//! MD4 and HMAC-MD5 are mandated by the protocol and must not be used for anything else; they are
//! only reachable through [`CryptoProvider`].


use digest::Digest;
use hmac::{Hmac, Mac};
use md4::Md4;
use md5::Md5;
use rand::RngCore;
use rand::rngs::OsRng;

use crate::error::CryptoError;


/// Supplies the primitives needed by the handshake.
///
/// The default implementation is [`RustCrypto`]; tests and constrained environments may provide
/// their own (e.g. with a fixed random source).
pub trait CryptoProvider {
    /// Computes the MD4 digest of `data`.
    fn md4(&self, data: &[u8]) -> Result<[u8; 16], CryptoError>;

    /// Computes HMAC-MD5 over the concatenation of `parts`.
    fn hmac_md5(&self, key: &[u8], parts: &[&[u8]]) -> Result<[u8; 16], CryptoError>;

    /// Fills `dest` with cryptographically secure random bytes.
    fn fill_random(&mut self, dest: &mut [u8]) -> Result<(), CryptoError>;
}


/// [`CryptoProvider`] backed by the RustCrypto hash crates and the operating system's random
/// number generator.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct RustCrypto;

impl CryptoProvider for RustCrypto {
    fn md4(&self, data: &[u8]) -> Result<[u8; 16], CryptoError> {
        let mut md4_state = <Md4 as Digest>::new();
        md4_state.update(data);
        Ok(md4_state.finalize().into())
    }

    fn hmac_md5(&self, key: &[u8], parts: &[&[u8]]) -> Result<[u8; 16], CryptoError> {
        let mut hmac_md5: Hmac<Md5> = <Hmac<Md5> as Mac>::new_from_slice(key)
            .or(Err(CryptoError::InvalidKeyLength { primitive: "HMAC-MD5", length: key.len() }))?;
        for part in parts {
            hmac_md5.update(part);
        }
        Ok(hmac_md5.finalize().into_bytes().into())
    }

    fn fill_random(&mut self, dest: &mut [u8]) -> Result<(), CryptoError> {
        OsRng.try_fill_bytes(dest)
            .map_err(|e| CryptoError::RandomUnavailable { reason: e.to_string() })
    }
}


/// Encodes a string as UTF-16 in little-endian byte order, without a Byte Order Mark.
pub(crate) fn utf16_le(s: &str) -> Vec<u8> {
    s.encode_utf16()
        .flat_map(|w| w.to_le_bytes())
        .collect()
}


#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use super::*;

    #[test]
    fn md4_of_utf16_password() {
        // NTOWFv1("Password") from MS-NLMP 4.2.2.1.2
        let hash = RustCrypto.md4(&utf16_le("Password")).unwrap();
        assert_eq!(hash, hex!("a4f49c406510bdcab6824ee7c30fd852"));

        let hash = RustCrypto.md4(&utf16_le("SecREt01")).unwrap();
        assert_eq!(hash, hex!("cd06ca7c7e10c99b1d33b7485a2ed808"));
    }

    #[test]
    fn hmac_md5_concatenates_parts() {
        let key = [0x0b; 16];
        let whole = RustCrypto.hmac_md5(&key, &[&b"Hi There"[..]]).unwrap();
        let split = RustCrypto.hmac_md5(&key, &[&b"Hi "[..], &b""[..], &b"There"[..]]).unwrap();

        // RFC 2104 test case 1
        assert_eq!(whole, hex!("9294727a3638bb1c13f48ef8158bfc9d"));
        assert_eq!(whole, split);
    }

    #[test]
    fn random_bytes_are_filled() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        RustCrypto.fill_random(&mut a).unwrap();
        RustCrypto.fill_random(&mut b).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn utf16_le_encoding() {
        assert_eq!(utf16_le("Dom"), vec![0x44, 0x00, 0x6F, 0x00, 0x6D, 0x00]);
        assert!(utf16_le("").is_empty());
    }
}
