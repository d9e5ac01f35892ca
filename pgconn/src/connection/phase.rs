//! Startup and authentication (C3/C5): send the `StartupMessage`, answer
//! whatever `AuthenticationRequest` the server issues — cleartext, MD5, or
//! the full SCRAM-SHA-256 exchange — then absorb `ParameterStatus`/
//! `BackendKeyData`/`NegotiateProtocolVersion` up to the first
//! `ReadyForQuery`.
//!
//! Adapted from `postro::phase::startup`, generalized from
//! cleartext-password-only to every `Authentication` variant C3 requires.
use crate::{
    auth::{self, ScramSha256},
    config::Config,
    error::{AuthError, Result},
    message::backend::{Authentication, BackendMessage},
    message::frontend::{self, PasswordMessage, SaslInitialResponse},
};

use super::Connection;

pub(crate) async fn startup(conn: &mut Connection, config: &Config) -> Result<()> {
    let mut params: Vec<(&str, &str)> = vec![
        ("user", &config.user),
        ("database", &config.dbname),
        ("client_encoding", &config.client_encoding),
        ("DateStyle", &config.datestyle),
        // Tells the server to report `float4`/`float8` text values with
        // enough digits to round-trip exactly.
        ("extra_float_digits", "3"),
    ];
    if let Some(app) = &config.application_name {
        params.push(("application_name", app));
    }
    for (key, value) in &config.options {
        params.push((key.as_str(), value.as_str()));
    }

    frontend::Startup { params: &params }.write(&mut conn.write_buf);
    conn.flush().await?;

    authenticate(conn, config).await?;

    // The frontend is just an interested bystander from here: the backend
    // applies any run-time parameters from the startup message, may send
    // ParameterStatus/BackendKeyData in any order, and finally ReadyForQuery.
    loop {
        match conn.recv::<BackendMessage>().await? {
            BackendMessage::BackendKeyData(key_data) => conn.backend_key_data = Some(key_data),
            BackendMessage::NegotiateProtocolVersion(_) => {}
            BackendMessage::ReadyForQuery(_) => break,
            other => return Err(other.unexpected("startup").into()),
        }
    }

    Ok(())
}

pub(crate) async fn authenticate(conn: &mut Connection, config: &Config) -> Result<()> {
    loop {
        match conn.recv::<Authentication>().await? {
            Authentication::Ok => return Ok(()),
            Authentication::CleartextPassword => {
                conn.send(PasswordMessage { password: config.password.as_bytes() });
                conn.flush().await?;
            }
            Authentication::MD5Password { salt } => {
                let digest = auth::md5_password(&config.user, &config.password, salt);
                conn.send(PasswordMessage { password: digest.as_bytes() });
                conn.flush().await?;
            }
            Authentication::SASL { mechanisms } => {
                let Some(mechanism) = auth::pick_mechanism(&mechanisms) else {
                    return Err(AuthError::UnsupportedMethod("SASL (no mechanism in common)").into());
                };
                let mut scram = ScramSha256::new(&config.password);
                let initial = scram.client_first_message();
                conn.send(SaslInitialResponse { mechanism: mechanism.as_ref(), data: initial.as_bytes() });
                conn.flush().await?;
                scram_continue(conn, &mut scram).await?;
            }
            other => return Err(AuthError::UnsupportedMethod(auth::unsupported(&other)).into()),
        }
    }
}

async fn scram_continue(conn: &mut Connection, scram: &mut ScramSha256) -> Result<()> {
    use crate::message::ProtocolError;

    let server_first = match conn.recv::<Authentication>().await? {
        Authentication::SASLContinue { data } => data,
        _ => return Err(ProtocolError::unexpected(Authentication::MSGTYPE, "SASLContinue").into()),
    };
    let server_first = std::str::from_utf8(&server_first)
        .map_err(|_| ProtocolError::malformed("SASLContinue payload is not UTF-8"))?;

    let client_final = scram.client_final_message(server_first).map_err(AuthError::Scram)?;
    conn.send(PasswordMessage { password: client_final.as_bytes() });
    conn.flush().await?;

    let server_final = match conn.recv::<Authentication>().await? {
        Authentication::SASLFinal { data } => data,
        _ => return Err(ProtocolError::unexpected(Authentication::MSGTYPE, "SASLFinal").into()),
    };
    let server_final = std::str::from_utf8(&server_final)
        .map_err(|_| ProtocolError::malformed("SASLFinal payload is not UTF-8"))?;

    scram.verify_server_final(server_final).map_err(AuthError::Scram)?;

    Ok(())
}
