//! SCRAM-SHA-256 client (RFC 5802, parameterised by SHA-256 per RFC 7677).
//!
//! Channel binding is not implemented (`SCRAM-SHA-256-PLUS`); the GS2 header
//! is always the fixed `n,,`.
use base64::Engine;
use base64::engine::general_purpose::STANDARD as base64;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;

use super::saslprep;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug)]
pub enum ScramError {
    SaslPrep(super::SaslPrepError),
    Malformed(&'static str),
    ServerSignatureMismatch,
}

impl fmt::Display for ScramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SaslPrep(e) => write!(f, "{e}"),
            Self::Malformed(msg) => write!(f, "malformed SCRAM message: {msg}"),
            Self::ServerSignatureMismatch => write!(f, "SCRAM server signature verification failed"),
        }
    }
}

impl std::error::Error for ScramError {}

impl From<super::SaslPrepError> for ScramError {
    fn from(e: super::SaslPrepError) -> Self {
        Self::SaslPrep(e)
    }
}

/// SCRAM-SHA-256 client state machine, advanced message-by-message.
pub struct ScramSha256 {
    client_nonce: String,
    client_first_bare: String,
    password: String,
    server_signature: Option<[u8; 32]>,
}

impl ScramSha256 {
    /// Start a new exchange, generating an 18-byte random client nonce.
    pub fn new(password: &str) -> Self {
        let mut raw = [0u8; 18];
        rand::rng().fill_bytes(&mut raw);
        let client_nonce = base64.encode(raw);
        let client_first_bare = format!("n=,r={client_nonce}");
        Self { client_nonce, client_first_bare, password: password.to_owned(), server_signature: None }
    }

    /// The `client-first-message` to send as the SASL initial response,
    /// including the fixed `n,,` GS2 header.
    pub fn client_first_message(&self) -> String {
        format!("n,,{}", self.client_first_bare)
    }

    /// Consume `server-first-message`, returning the `client-final-message`
    /// to send as `SASLResponse`. Stores the expected ServerSignature for
    /// later verification against `SASLFinal`.
    pub fn client_final_message(&mut self, server_first: &str) -> Result<String, ScramError> {
        let (server_nonce, salt, iterations) = parse_server_first(server_first)?;
        if !server_nonce.starts_with(&self.client_nonce) {
            return Err(ScramError::Malformed("server nonce does not extend client nonce"));
        }

        let prepared = saslprep(&self.password)?;
        let salted_password = salted_password(prepared.as_bytes(), &salt, iterations);

        let client_key = hmac(&salted_password, b"Client Key");
        let stored_key = Sha256::digest(client_key);

        let channel_binding = base64.encode("n,,");
        let client_final_without_proof = format!("c={channel_binding},r={server_nonce}");

        let auth_message =
            format!("{},{},{}", self.client_first_bare, server_first, client_final_without_proof);

        let client_signature = hmac(&stored_key, auth_message.as_bytes());
        let client_proof = xor(&client_key, &client_signature);

        let server_key = hmac(&salted_password, b"Server Key");
        let mut server_signature = [0u8; 32];
        server_signature.copy_from_slice(&hmac(&server_key, auth_message.as_bytes()));
        self.server_signature = Some(server_signature);

        Ok(format!("{client_final_without_proof},p={}", base64.encode(client_proof)))
    }

    /// Verify `SASLFinal`'s `v=...` against the stored expected signature.
    pub fn verify_server_final(&self, server_final: &str) -> Result<(), ScramError> {
        let received = server_final
            .strip_prefix("v=")
            .ok_or(ScramError::Malformed("server-final-message missing v="))?;
        let received = base64.decode(received.trim_end()).map_err(|_| ScramError::Malformed("bad base64"))?;
        let expected = self.server_signature.as_ref().ok_or(ScramError::Malformed("no pending exchange"))?;
        if received == expected {
            Ok(())
        } else {
            Err(ScramError::ServerSignatureMismatch)
        }
    }
}

fn parse_server_first(msg: &str) -> Result<(String, Vec<u8>, u32), ScramError> {
    let mut nonce = None;
    let mut salt = None;
    let mut iterations = None;
    for field in msg.split(',') {
        let (key, value) = field.split_once('=').ok_or(ScramError::Malformed("server-first field missing ="))?;
        match key {
            "r" => nonce = Some(value.to_string()),
            "s" => {
                salt = Some(
                    base64.decode(value).map_err(|_| ScramError::Malformed("bad salt base64"))?,
                )
            }
            "i" => iterations = Some(value.parse().map_err(|_| ScramError::Malformed("bad iteration count"))?),
            _ => {}
        }
    }
    Ok((
        nonce.ok_or(ScramError::Malformed("server-first missing r="))?,
        salt.ok_or(ScramError::Malformed("server-first missing s="))?,
        iterations.ok_or(ScramError::Malformed("server-first missing i="))?,
    ))
}

fn hmac(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// `Hi(password, salt, iterations)`: PBKDF2-HMAC-SHA-256 with a single
/// output block (SHA-256's 32-byte output matches the requested key
/// length, so one PBKDF2 block suffices).
fn salted_password(password: &[u8], salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(password).expect("HMAC accepts any key length");
    mac.update(salt);
    mac.update(&1u32.to_be_bytes());
    let mut u = mac.finalize().into_bytes();
    let mut result = u;

    for _ in 1..iterations {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(password).expect("HMAC accepts any key length");
        mac.update(&u);
        u = mac.finalize().into_bytes();
        for (r, b) in result.iter_mut().zip(u.iter()) {
            *r ^= b;
        }
    }

    result.into()
}

fn xor(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b).map(|(x, y)| x ^ y).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    fn to_hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn salted_password_matches_vector() {
        let salt = from_hex("74172b96cd9d296b497b");
        let result = salted_password(b"pencil", &salt, 4096);
        assert_eq!(
            to_hex(&result),
            "b58fb579cae2a50591a06a807bc0535106f8e1c725ea5ce3b6eb70ca4e2aeb99"[..64],
        );
    }

    #[test]
    fn client_proof_matches_vector() {
        let salt = from_hex("31f2b148ca94a7e64554");
        let salted = salted_password(b"pencil", &salt, 4096);
        let client_key = hmac(&salted, b"Client Key");
        let stored_key = Sha256::digest(client_key);

        let client_first_bare = "n=,r=MQiVmMEKTBZgNA==";
        let server_first = "r=MQiVmMEKTBZgNA==8zeUHmzdT2SBnQ==,s=MfKxSMqUp+ZFVA==,i=4096";
        let client_final_without_proof = "c=biws,r=MQiVmMEKTBZgNA==8zeUHmzdT2SBnQ==";
        let auth_message = format!("{client_first_bare},{server_first},{client_final_without_proof}");

        let client_signature = hmac(&stored_key, auth_message.as_bytes());
        let client_proof = xor(&client_key, &client_signature);

        assert_eq!(base64.encode(client_proof), "3xQR96noltaeyOY5XSNcMtogCRRZ/qJvT8ry7i9FsGs=");
    }

    #[test]
    fn server_signature_matches_vector() {
        let salt = from_hex("080f7c0a737897be9f0f");
        let salted = salted_password(b"pencil", &salt, 4096);
        let server_key = hmac(&salted, b"Server Key");

        let client_first_bare = "n=,r=MQiVmMEKTBZgNA==";
        let server_first = "r=MQiVmMEKTBZgNA==8zeUHmzdT2SBnQ==,s=MfKxSMqUp+ZFVA==,i=4096";
        let client_final_without_proof = "c=biws,r=MQiVmMEKTBZgNA==8zeUHmzdT2SBnQ==";
        let auth_message = format!("{client_first_bare},{server_first},{client_final_without_proof}");

        let server_signature = hmac(&server_key, auth_message.as_bytes());
        assert_eq!(base64.encode(server_signature), "IeQ9HCOw5KcB8G3NunvoV9SHHUdNT8YkP/d4FAwd73g=");
    }
}
