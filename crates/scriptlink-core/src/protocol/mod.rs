//! Protocol module containing the wire envelope type and the text codec.

pub mod codec;
pub mod envelope;

pub use codec::{decode, encode, ProtocolError};
pub use envelope::Envelope;
