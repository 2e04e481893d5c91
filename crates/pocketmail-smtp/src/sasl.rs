//! SASL client responses for AUTH PLAIN, LOGIN and CRAM-MD5.

use std::fmt::Write as _;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use md5::Md5;

use crate::error::{Error, Result};

type HmacMd5 = Hmac<Md5>;

/// Base64 of `\0username\0password` (RFC 4616).
#[must_use]
pub fn plain_response(username: &str, password: &str) -> String {
    STANDARD.encode(format!("\0{username}\0{password}"))
}

/// Base64 of one LOGIN field (username or password).
#[must_use]
pub fn login_response(value: &str) -> String {
    STANDARD.encode(value)
}

/// Answers a CRAM-MD5 challenge (RFC 2195).
///
/// The Base64 challenge is decoded and signed with HMAC-MD5 keyed by the
/// password; keys longer than the 64-byte block are hashed first, as
/// RFC 2104 requires. The reply is Base64 of `username hexdigest`.
pub fn cram_md5_response(username: &str, password: &str, challenge_b64: &str) -> Result<String> {
    let challenge = STANDARD.decode(challenge_b64.trim())?;
    let digest = hmac_md5_hex(password.as_bytes(), &challenge)?;
    Ok(STANDARD.encode(format!("{username} {digest}")))
}

/// Lowercase hex HMAC-MD5 of `data` under `key`.
pub fn hmac_md5_hex(key: &[u8], data: &[u8]) -> Result<String> {
    let mut mac = <HmacMd5 as Mac>::new_from_slice(key)
        .map_err(|e| Error::Auth(format!("CRAM-MD5 key rejected: {e}")))?;
    mac.update(data);
    let digest = mac.finalize().into_bytes();

    Ok(digest.iter().fold(String::with_capacity(32), |mut hex, byte| {
        let _ = write!(hex, "{byte:02x}");
        hex
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use md5::Digest;
    use proptest::prelude::*;

    #[test]
    fn test_plain() {
        assert_eq!(plain_response("user", "pass"), "AHVzZXIAcGFzcw==");
    }

    #[test]
    fn test_login() {
        assert_eq!(login_response("user"), "dXNlcg==");
    }

    #[test]
    fn test_cram_md5_rfc2195() {
        let challenge = "PDE4OTYuNjk3MTcwOTUyQHBvc3RvZmZpY2UucmVzdG9uLm1jaS5uZXQ+";
        let response = cram_md5_response("tim", "tanstaaftanstaaf", challenge).unwrap();
        let decoded = String::from_utf8(STANDARD.decode(response).unwrap()).unwrap();
        assert_eq!(decoded, "tim b913a602c7eda7a495b4e6e7334d3890");
    }

    #[test]
    fn test_rfc2104_vector() {
        assert_eq!(
            hmac_md5_hex(b"Jefe", b"what do ya want for nothing?").unwrap(),
            "750c783e6ab0b503eaa86e310a5db738"
        );
    }

    #[test]
    fn test_long_key_is_hashed_first() {
        let key = [0xaa_u8; 80];
        let data = b"Test Using Larger Than Block-Size Key - Hash Key First";
        let hashed_key = Md5::digest(key);
        assert_eq!(
            hmac_md5_hex(&key, data).unwrap(),
            hmac_md5_hex(&hashed_key, data).unwrap()
        );
        assert_eq!(
            hmac_md5_hex(&key, data).unwrap(),
            "6b1ab7fe4bd7bf8f0b62e6ce61b9d0cd"
        );
    }

    #[test]
    fn test_bad_challenge() {
        assert!(matches!(
            cram_md5_response("u", "p", "not base64!"),
            Err(Error::Decode(_))
        ));
    }

    proptest! {
        #[test]
        fn cram_md5_is_deterministic(
            user in "[a-z]{1,12}",
            pass in ".{0,100}",
            challenge in prop::collection::vec(any::<u8>(), 1..64),
        ) {
            let challenge = STANDARD.encode(challenge);
            let first = cram_md5_response(&user, &pass, &challenge).unwrap();
            let second = cram_md5_response(&user, &pass, &challenge).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
