//! Truncated HMAC-SHA1 report signatures.

use crate::error::{ProtocolError, Result};
use crate::SIGNATURE_LEN;
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

fn mac(secret: &[u8], message: &[u8]) -> Result<HmacSha1> {
    // HMAC takes keys of any length; longer keys are hashed first.
    let mut mac =
        <HmacSha1 as KeyInit>::new_from_slice(secret).map_err(|_| ProtocolError::InvalidKey)?;
    mac.update(message);
    Ok(mac)
}

/// The leading [`SIGNATURE_LEN`] bytes of HMAC-SHA1(secret, message).
pub fn sign(secret: &[u8], message: &[u8]) -> Result<[u8; SIGNATURE_LEN]> {
    let digest = mac(secret, message)?.finalize().into_bytes();
    let mut signature = [0u8; SIGNATURE_LEN];
    signature.copy_from_slice(&digest[..SIGNATURE_LEN]);
    Ok(signature)
}

/// Check a truncated signature in constant time.
pub fn verify(secret: &[u8], message: &[u8], signature: &[u8]) -> Result<()> {
    if signature.len() != SIGNATURE_LEN {
        return Err(ProtocolError::BadSignature);
    }
    mac(secret, message)?
        .verify_truncated_left(signature)
        .map_err(|_| ProtocolError::BadSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 2202 test case 2
    #[test]
    fn test_matches_rfc2202_prefix() {
        let signature = sign(b"Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            signature,
            [0xef, 0xfc, 0xdf, 0x6a, 0xe5, 0xeb, 0x2f, 0xa2, 0xd2, 0x74]
        );
    }

    #[test]
    fn test_verify() {
        let signature = sign(b"foo", b"payload").unwrap();
        assert!(verify(b"foo", b"payload", &signature).is_ok());
        assert_eq!(
            verify(b"bar", b"payload", &signature),
            Err(ProtocolError::BadSignature)
        );
        assert_eq!(
            verify(b"foo", b"payload!", &signature),
            Err(ProtocolError::BadSignature)
        );
        assert_eq!(
            verify(b"foo", b"payload", &signature[..9]),
            Err(ProtocolError::BadSignature)
        );
    }

    #[test]
    fn test_accepts_empty_and_long_keys() {
        let long = [0x5a; 200];
        assert!(verify(&long, b"payload", &sign(&long, b"payload").unwrap()).is_ok());
        assert!(verify(b"", b"payload", &sign(b"", b"payload").unwrap()).is_ok());
    }
}
