//! SNMP value types.
//!
//! One variant per SNMP type, plus the three v2c exception markers.
//! Never nest a `SnmpValue` inside another `SnmpValue`.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Integer,
    OctetString,
    ObjectIdentifier,
    Null,
    IpAddress,
    Counter32,
    Gauge32,
    TimeTicks,
    Opaque,
    Counter64,
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SnmpValue {
    Integer(i32),
    OctetString(Vec<u8>),
    ObjectIdentifier(Vec<u32>),
    Null,
    IpAddress([u8; 4]),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Opaque(Vec<u8>),
    Counter64(u64),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

impl SnmpValue {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            SnmpValue::Integer(_) => TypeTag::Integer,
            SnmpValue::OctetString(_) => TypeTag::OctetString,
            SnmpValue::ObjectIdentifier(_) => TypeTag::ObjectIdentifier,
            SnmpValue::Null => TypeTag::Null,
            SnmpValue::IpAddress(_) => TypeTag::IpAddress,
            SnmpValue::Counter32(_) => TypeTag::Counter32,
            SnmpValue::Gauge32(_) => TypeTag::Gauge32,
            SnmpValue::TimeTicks(_) => TypeTag::TimeTicks,
            SnmpValue::Opaque(_) => TypeTag::Opaque,
            SnmpValue::Counter64(_) => TypeTag::Counter64,
            SnmpValue::NoSuchObject => TypeTag::NoSuchObject,
            SnmpValue::NoSuchInstance => TypeTag::NoSuchInstance,
            SnmpValue::EndOfMibView => TypeTag::EndOfMibView,
        }
    }

    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            SnmpValue::NoSuchObject | SnmpValue::NoSuchInstance | SnmpValue::EndOfMibView
        )
    }

    pub fn octet_string<S: Into<Vec<u8>>>(bytes: S) -> Self {
        SnmpValue::OctetString(bytes.into())
    }
}
