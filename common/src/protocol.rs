//! ASCII line protocol shared by the Name Server, Storage Server, and
//! client (spec §6.1).
//!
//! A [`Request`] is one whitespace-tokenized command line. A [`Reply`] is
//! either a single `ACK_.../ERR_...` line, a redirect, or a multi-line
//! payload framed as a header line (`ACK_<VERB> <n>`) followed by exactly
//! `n` more lines — the idiomatic-Rust realization of spec §6.1's "returned
//! as a single reply" for VIEW/INFO/LISTREQ/etc., since byte-identical wire
//! compatibility with the source is an explicit non-goal.

use crate::error::ErrCode;

/// One parsed command line: a verb plus its whitespace-separated arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub verb: String,
    pub args: Vec<String>,
}

impl Request {
    pub fn arg(&self, idx: usize) -> Option<&str> {
        self.args.get(idx).map(String::as_str)
    }
}

/// Tokenize one line into a [`Request`]. Returns `None` for a blank line.
pub fn parse_line(line: &str) -> Option<Request> {
    let mut tokens = line.trim_end_matches(['\n', '\r']).split_whitespace();
    let verb = tokens.next()?.to_string();
    let args = tokens.map(str::to_string).collect();
    Some(Request { verb, args })
}

/// A reply to a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `ACK_<VERB>` with no payload.
    Ack(String),
    /// `ACK_<VERB> <args...>` on one line.
    AckArgs(String, Vec<String>),
    /// `ACK_<VERB> <ip> <port>` — redirect the client to a Storage Server.
    Redirect { verb: String, ip: String, port: u16 },
    /// `ERR_<REASON>`.
    Err(ErrCode),
    /// `ACK_<VERB> <n>` followed by `n` more lines.
    Payload { verb: String, lines: Vec<String> },
}

impl Reply {
    pub fn ack(verb: impl Into<String>) -> Self {
        Reply::Ack(verb.into())
    }

    pub fn redirect(verb: impl Into<String>, ip: impl Into<String>, port: u16) -> Self {
        Reply::Redirect { verb: verb.into(), ip: ip.into(), port }
    }

    pub fn payload(verb: impl Into<String>, lines: Vec<String>) -> Self {
        Reply::Payload { verb: verb.into(), lines }
    }

    /// Render as the exact bytes to write to the wire, `\n`-terminated.
    pub fn render(&self) -> String {
        match self {
            Reply::Ack(verb) => format!("ACK_{verb}\n"),
            Reply::AckArgs(verb, args) => {
                if args.is_empty() {
                    format!("ACK_{verb}\n")
                } else {
                    format!("ACK_{verb} {}\n", args.join(" "))
                }
            }
            Reply::Redirect { verb, ip, port } => format!("ACK_{verb} {ip} {port}\n"),
            Reply::Err(code) => format!("{code}\n"),
            Reply::Payload { verb, lines } => {
                let mut out = format!("ACK_{verb} {}\n", lines.len());
                for line in lines {
                    out.push_str(line);
                    out.push('\n');
                }
                out
            }
        }
    }
}

impl From<ErrCode> for Reply {
    fn from(code: ErrCode) -> Self {
        Reply::Err(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_verb_and_args() {
        let req = parse_line("ADDACCESS -R a.txt bob\n").unwrap();
        assert_eq!(req.verb, "ADDACCESS");
        assert_eq!(req.args, vec!["-R", "a.txt", "bob"]);
    }

    #[test]
    fn blank_line_is_none() {
        assert!(parse_line("\n").is_none());
        assert!(parse_line("   ").is_none());
    }

    #[test]
    fn renders_redirect() {
        let reply = Reply::redirect("READ", "127.0.0.1", 9001);
        assert_eq!(reply.render(), "ACK_READ 127.0.0.1 9001\n");
    }

    #[test]
    fn renders_payload_with_count_header() {
        let reply = Reply::payload("VIEW", vec!["a.txt".into(), "b.txt".into()]);
        assert_eq!(reply.render(), "ACK_VIEW 2\na.txt\nb.txt\n");
    }

    #[test]
    fn renders_error() {
        let reply: Reply = ErrCode::FileNotFound.into();
        assert_eq!(reply.render(), "ERR_FILE_NOT_FOUND\n");
    }
}
