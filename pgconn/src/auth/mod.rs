//! Authentication negotiation (C3): MD5, SCRAM-SHA-256, and the SASLprep
//! profile applied to the password before SCRAM.
mod md5;
mod saslprep;
mod scram;

pub use saslprep::{SaslPrepError, saslprep};
pub use scram::{ScramError, ScramSha256};

use crate::message::backend::Authentication;

/// Build the `md5`-prefixed password digest for [`Authentication::MD5Password`].
pub fn md5_password(user: &str, password: &str, salt: [u8; 4]) -> String {
    md5::digest(user, password, salt)
}

/// The SASL mechanism this driver implements. `SCRAM-SHA-256-PLUS` (channel
/// binding) is not implemented; only the non-PLUS variant is offered.
pub const SCRAM_SHA_256: &str = "SCRAM-SHA-256";

pub(crate) fn pick_mechanism(offered: &[crate::common::ByteStr]) -> Option<&crate::common::ByteStr> {
    offered.iter().find(|m| m.as_ref() == SCRAM_SHA_256)
}

pub(crate) fn unsupported(auth: &Authentication) -> &'static str {
    match auth {
        Authentication::KerberosV5 => "KerberosV5",
        Authentication::SCMCredential => "SCMCredential",
        Authentication::GSS | Authentication::GSSContinue { .. } => "GSSAPI",
        Authentication::SSPI => "SSPI",
        _ => "unknown",
    }
}
