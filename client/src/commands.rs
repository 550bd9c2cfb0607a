//! Command metadata for the interactive shell: which verbs redirect to a
//! Storage Server, which NS replies carry a multi-line payload, and the
//! `help`/`man <verb>` text (spec §6.4 — explicitly plumbing, kept minimal).

/// Verbs the Name Server answers with a redirect rather than a local
/// reply (spec §4.4 table).
pub const REDIRECT_VERBS: &[&str] = &[
    "READ",
    "STREAM",
    "WRITE",
    "UNDO",
    "CHECKPOINT",
    "REVERT",
    "VIEWCHECKPOINT",
    "LISTCHECKPOINTS",
];

/// NS verbs whose reply is a counted multi-line payload.
pub const NS_PAYLOAD_VERBS: &[&str] = &["VIEW", "VIEWTRASH", "VIEWFOLDER", "LIST", "LISTREQ"];

/// SS verbs whose reply is a counted multi-line payload.
pub const SS_PAYLOAD_VERBS: &[&str] = &["LISTCHECKPOINTS"];

/// SS verbs that stream raw bytes rather than an ACK/ERR line.
pub const SS_BYTE_STREAM_VERBS: &[&str] = &["READ", "STREAM", "VIEWCHECKPOINT"];

pub fn help_text() -> &'static str {
    "Commands:\n\
     \x20 CREATE/CREATEFOLDER name\n\
     \x20 TRASH/RESTORE/DELETE name\n\
     \x20 VIEWTRASH / EMPTYTRASH\n\
     \x20 READ/STREAM/WRITE/UNDO/CHECKPOINT/REVERT/VIEWCHECKPOINT/LISTCHECKPOINTS name ...\n\
     \x20 VIEW [-a] [-l] / INFO name / LIST\n\
     \x20 ADDACCESS -R|-W name user / REMACCESS name user\n\
     \x20 MOVE src dest / VIEWFOLDER name\n\
     \x20 REQACCESS -R|-W name / LISTREQ / APPROVE id / DENY id\n\
     \x20 EXEC name\n\
     \x20 help, man <verb>, exit"
}

pub fn man_text(verb: &str) -> String {
    match verb.to_uppercase().as_str() {
        "CREATE" => "CREATE name — create an empty file you own.".to_string(),
        "WRITE" => {
            "WRITE name sentence — locks one sentence for editing. Send lines \
             '<word_index> <content>', then ETIRW to commit or drop the connection \
             to discard."
                .to_string()
        }
        "ETIRW" => "ETIRW — commits a WRITE edit session (the literal sentinel, WRITE reversed).".to_string(),
        other => format!("no manual entry for {other}"),
    }
}
