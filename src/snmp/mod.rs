//! SNMP protocol types: object identifiers, value types, PDUs, and
//! the BER wire codec that ties them together.

pub mod ber;
pub mod oid;
pub mod pdu;
pub mod value;

pub use ber::{decode_message, encode_message};
pub use oid::Oid;
pub use pdu::{ErrorStatus, Message, Pdu, PduKind, VarBind, Version};
pub use value::{SnmpValue, TypeTag};
