//! The `ERR_<REASON>` token catalog (spec §7).
//!
//! Every fallible internal operation is modeled as a concrete, matchable
//! error enum (see each crate's own error types); this type is the final
//! translation step from "why an operation failed" to the wire token a
//! client or peer actually receives.

use std::fmt;

/// One machine-parseable failure reason, sent on the wire as `ERR_<REASON>`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ErrCode {
    // --- Arguments ---
    InvalidArgs,
    NoFilename,
    InvalidFlag,
    InvalidId,

    // --- Directory ---
    FileNotFound,
    FileExists,
    FolderExists,
    FileInTrash,
    AlreadyInTrash,
    NotInTrash,
    CannotDeleteFolder,
    FileLocked,

    // --- Permission ---
    PermissionDenied,
    ReadPermissionDenied,
    WritePermissionDenied,
    AlreadyOwner,
    AlreadyHasAccess,
    AclFull,
    UserNotInAcl,

    // --- Infrastructure ---
    NoSsAvail,
    SsUnreachable,
    SsCreateFailed,
    SsDeleteFailed,
    SsMoveFailed,
    SsCreatefolderFailed,
    UsernameInUse,
    MaxClients,
    MaxSs,

    // --- Requests ---
    ReqCreate,
    ReqNotFound,
    ReqNotPending,
    NotRequestOwner,

    // --- Unknown ---
    UnknownCmd,
}

impl ErrCode {
    /// The bare suffix following `ERR_`, e.g. `FILE_NOT_FOUND`.
    pub fn suffix(self) -> &'static str {
        match self {
            ErrCode::InvalidArgs => "INVALID_ARGS",
            ErrCode::NoFilename => "NO_FILENAME",
            ErrCode::InvalidFlag => "INVALID_FLAG",
            ErrCode::InvalidId => "INVALID_ID",
            ErrCode::FileNotFound => "FILE_NOT_FOUND",
            ErrCode::FileExists => "FILE_EXISTS",
            ErrCode::FolderExists => "FOLDER_EXISTS",
            ErrCode::FileInTrash => "FILE_IN_TRASH",
            ErrCode::AlreadyInTrash => "ALREADY_IN_TRASH",
            ErrCode::NotInTrash => "NOT_IN_TRASH",
            ErrCode::CannotDeleteFolder => "CANNOT_DELETE_FOLDER",
            ErrCode::FileLocked => "FILE_LOCKED",
            ErrCode::PermissionDenied => "PERMISSION_DENIED",
            ErrCode::ReadPermissionDenied => "READ_PERMISSION_DENIED",
            ErrCode::WritePermissionDenied => "WRITE_PERMISSION_DENIED",
            ErrCode::AlreadyOwner => "ALREADY_OWNER",
            ErrCode::AlreadyHasAccess => "ALREADY_HAS_ACCESS",
            ErrCode::AclFull => "ACL_FULL",
            ErrCode::UserNotInAcl => "USER_NOT_IN_ACL",
            ErrCode::NoSsAvail => "NO_SS_AVAIL",
            ErrCode::SsUnreachable => "SS_UNREACHABLE",
            ErrCode::SsCreateFailed => "SS_CREATE_FAILED",
            ErrCode::SsDeleteFailed => "SS_DELETE_FAILED",
            ErrCode::SsMoveFailed => "SS_MOVE_FAILED",
            ErrCode::SsCreatefolderFailed => "SS_CREATEFOLDER_FAILED",
            ErrCode::UsernameInUse => "USERNAME_IN_USE",
            ErrCode::MaxClients => "MAX_CLIENTS",
            ErrCode::MaxSs => "MAX_SS",
            ErrCode::ReqCreate => "REQ_CREATE",
            ErrCode::ReqNotFound => "REQ_NOT_FOUND",
            ErrCode::ReqNotPending => "REQ_NOT_PENDING",
            ErrCode::NotRequestOwner => "NOT_REQUEST_OWNER",
            ErrCode::UnknownCmd => "UNKNOWN_CMD",
        }
    }

    /// Parse an `ERR_<REASON>` token's suffix back into a code, for clients
    /// and tests that need to interpret a reply rather than only produce one.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Some(match suffix {
            "INVALID_ARGS" => ErrCode::InvalidArgs,
            "NO_FILENAME" => ErrCode::NoFilename,
            "INVALID_FLAG" => ErrCode::InvalidFlag,
            "INVALID_ID" => ErrCode::InvalidId,
            "FILE_NOT_FOUND" => ErrCode::FileNotFound,
            "FILE_EXISTS" => ErrCode::FileExists,
            "FOLDER_EXISTS" => ErrCode::FolderExists,
            "FILE_IN_TRASH" => ErrCode::FileInTrash,
            "ALREADY_IN_TRASH" => ErrCode::AlreadyInTrash,
            "NOT_IN_TRASH" => ErrCode::NotInTrash,
            "CANNOT_DELETE_FOLDER" => ErrCode::CannotDeleteFolder,
            "FILE_LOCKED" => ErrCode::FileLocked,
            "PERMISSION_DENIED" => ErrCode::PermissionDenied,
            "READ_PERMISSION_DENIED" => ErrCode::ReadPermissionDenied,
            "WRITE_PERMISSION_DENIED" => ErrCode::WritePermissionDenied,
            "ALREADY_OWNER" => ErrCode::AlreadyOwner,
            "ALREADY_HAS_ACCESS" => ErrCode::AlreadyHasAccess,
            "ACL_FULL" => ErrCode::AclFull,
            "USER_NOT_IN_ACL" => ErrCode::UserNotInAcl,
            "NO_SS_AVAIL" => ErrCode::NoSsAvail,
            "SS_UNREACHABLE" => ErrCode::SsUnreachable,
            "SS_CREATE_FAILED" => ErrCode::SsCreateFailed,
            "SS_DELETE_FAILED" => ErrCode::SsDeleteFailed,
            "SS_MOVE_FAILED" => ErrCode::SsMoveFailed,
            "SS_CREATEFOLDER_FAILED" => ErrCode::SsCreatefolderFailed,
            "USERNAME_IN_USE" => ErrCode::UsernameInUse,
            "MAX_CLIENTS" => ErrCode::MaxClients,
            "MAX_SS" => ErrCode::MaxSs,
            "REQ_CREATE" => ErrCode::ReqCreate,
            "REQ_NOT_FOUND" => ErrCode::ReqNotFound,
            "REQ_NOT_PENDING" => ErrCode::ReqNotPending,
            "NOT_REQUEST_OWNER" => ErrCode::NotRequestOwner,
            "UNKNOWN_CMD" => ErrCode::UnknownCmd,
            _ => return None,
        })
    }
}

impl fmt::Display for ErrCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ERR_{}", self.suffix())
    }
}
