//! SNMP message and PDU structures.

use super::oid::Oid;
use super::value::SnmpValue;

/// Wire-level SNMP version field. SNMPv1 is 0, v2c is 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V1,
    V2c,
}

impl Version {
    pub fn wire_value(self) -> i64 {
        match self {
            Version::V1 => 0,
            Version::V2c => 1,
        }
    }

    pub fn from_wire_value(value: i64) -> Option<Self> {
        match value {
            0 => Some(Version::V1),
            1 => Some(Version::V2c),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStatus {
    NoError,
    TooBig,
    NoSuchName,
    BadValue,
    ReadOnly,
    GenErr,
    NoAccess,
    WrongType,
    WrongLength,
    WrongEncoding,
    WrongValue,
    NoCreation,
    InconsistentValue,
    ResourceUnavailable,
    CommitFailed,
    UndoFailed,
    AuthorizationError,
    NotWritable,
    InconsistentName,
}

impl ErrorStatus {
    pub fn code(self) -> i32 {
        match self {
            ErrorStatus::NoError => 0,
            ErrorStatus::TooBig => 1,
            ErrorStatus::NoSuchName => 2,
            ErrorStatus::BadValue => 3,
            ErrorStatus::ReadOnly => 4,
            ErrorStatus::GenErr => 5,
            ErrorStatus::NoAccess => 6,
            ErrorStatus::WrongType => 7,
            ErrorStatus::WrongLength => 8,
            ErrorStatus::WrongEncoding => 9,
            ErrorStatus::WrongValue => 10,
            ErrorStatus::NoCreation => 11,
            ErrorStatus::InconsistentValue => 12,
            ErrorStatus::ResourceUnavailable => 13,
            ErrorStatus::CommitFailed => 14,
            ErrorStatus::UndoFailed => 15,
            ErrorStatus::AuthorizationError => 16,
            ErrorStatus::NotWritable => 17,
            ErrorStatus::InconsistentName => 18,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            0 => ErrorStatus::NoError,
            1 => ErrorStatus::TooBig,
            2 => ErrorStatus::NoSuchName,
            3 => ErrorStatus::BadValue,
            4 => ErrorStatus::ReadOnly,
            6 => ErrorStatus::NoAccess,
            7 => ErrorStatus::WrongType,
            8 => ErrorStatus::WrongLength,
            9 => ErrorStatus::WrongEncoding,
            10 => ErrorStatus::WrongValue,
            11 => ErrorStatus::NoCreation,
            12 => ErrorStatus::InconsistentValue,
            13 => ErrorStatus::ResourceUnavailable,
            14 => ErrorStatus::CommitFailed,
            15 => ErrorStatus::UndoFailed,
            16 => ErrorStatus::AuthorizationError,
            17 => ErrorStatus::NotWritable,
            18 => ErrorStatus::InconsistentName,
            _ => ErrorStatus::GenErr,
        }
    }
}

/// PDU operation kind. SET is accepted on the wire but the core
/// always answers it with a generic error (see device pipeline).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduKind {
    Get,
    GetNext,
    GetBulk,
    Set,
    GetResponse,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarBind {
    pub oid: Oid,
    pub value: SnmpValue,
}

impl VarBind {
    pub fn new(oid: Oid, value: SnmpValue) -> Self {
        Self { oid, value }
    }
}

/// A decoded PDU. `field2`/`field3` carry `(error_status, error_index)`
/// for GET/GETNEXT/SET/GETRESPONSE, or `(non_repeaters, max_repetitions)`
/// for GETBULK — the wire encoding reuses the same two INTEGER slots
/// for both meanings, so we mirror that here instead of duplicating
/// fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Pdu {
    pub kind: PduKind,
    pub request_id: i32,
    pub field2: i32,
    pub field3: i32,
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    pub fn get(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self { kind: PduKind::Get, request_id, field2: 0, field3: 0, varbinds }
    }

    pub fn get_next(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self { kind: PduKind::GetNext, request_id, field2: 0, field3: 0, varbinds }
    }

    pub fn get_bulk(request_id: i32, non_repeaters: i32, max_repetitions: i32, varbinds: Vec<VarBind>) -> Self {
        Self {
            kind: PduKind::GetBulk,
            request_id,
            field2: non_repeaters,
            field3: max_repetitions,
            varbinds,
        }
    }

    pub fn response(request_id: i32, error_status: ErrorStatus, error_index: i32, varbinds: Vec<VarBind>) -> Self {
        Self {
            kind: PduKind::GetResponse,
            request_id,
            field2: error_status.code(),
            field3: error_index,
            varbinds,
        }
    }

    pub fn error_status(&self) -> ErrorStatus {
        ErrorStatus::from_code(self.field2)
    }

    pub fn error_index(&self) -> i32 {
        self.field3
    }

    pub fn non_repeaters(&self) -> i32 {
        self.field2
    }

    pub fn max_repetitions(&self) -> i32 {
        self.field3
    }

    pub fn set_error(&mut self, status: ErrorStatus, index: i32) {
        self.field2 = status.code();
        self.field3 = index;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub version: Version,
    pub community: String,
    pub pdu: Pdu,
}

impl Message {
    pub fn new(version: Version, community: impl Into<String>, pdu: Pdu) -> Self {
        Self { version, community: community.into(), pdu }
    }
}
