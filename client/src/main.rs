//! Interactive client: registers with the Name Server, replays commands,
//! and follows SS redirects for bulk I/O (spec §6.4).

mod commands;
mod connection;

use std::path::PathBuf;

use clap::Parser;
use docstore_common::config::ClientConfig;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tracing::error;

use connection::{drain_to_stdout, parse_redirect, read_reply, send_line};

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "Interactive client for the document store")]
struct Args {
    /// Path to a TOML config file; missing file falls back to defaults.
    #[arg(short, long, default_value = "client.toml")]
    config: PathBuf,

    /// Username to register with (prompted if omitted).
    username: Option<String>,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = ClientConfig::load(&args.config);

    let mut stdin = BufReader::new(tokio::io::stdin());
    let username = match args.username {
        Some(u) => u,
        None => {
            print!("username: ");
            use std::io::Write as _;
            let _ = std::io::stdout().flush();
            let mut line = String::new();
            if stdin.read_line(&mut line).await.is_err() || line.trim().is_empty() {
                return std::process::ExitCode::FAILURE;
            }
            line.trim().to_string()
        }
    };

    let mut ns_stream = match TcpStream::connect((config.ns_command_host.as_str(), config.ns_command_port)).await {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "could not reach name server");
            return std::process::ExitCode::from(2);
        }
    };
    let (ns_read, mut ns_write) = ns_stream.split();
    let mut ns_reader = BufReader::new(ns_read);

    if send_line(&mut ns_write, &format!("REG_CLIENT {username}")).await.is_err() {
        return std::process::ExitCode::from(2);
    }
    match read_reply(&mut ns_reader, &[]).await {
        Ok(Some(header)) if header == "ACK_REG" => {}
        Ok(Some(header)) => {
            println!("{header}");
            return std::process::ExitCode::from(1);
        }
        _ => return std::process::ExitCode::from(1),
    }
    println!("registered as {username}");

    loop {
        print!("> ");
        {
            use std::io::Write as _;
            let _ = std::io::stdout().flush();
        }
        let mut line = String::new();
        let n = match stdin.read_line(&mut line).await {
            Ok(n) => n,
            Err(_) => break,
        };
        if n == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" {
            break;
        }
        if line == "help" {
            println!("{}", commands::help_text());
            continue;
        }
        if let Some(verb_arg) = line.strip_prefix("man ") {
            println!("{}", commands::man_text(verb_arg.trim()));
            continue;
        }

        let verb = line.split_whitespace().next().unwrap_or("").to_uppercase();
        if commands::REDIRECT_VERBS.contains(&verb.as_str()) {
            if let Err(e) = run_redirected_command(&mut ns_write, &mut ns_reader, &mut stdin, line, &verb).await {
                println!("error: {e}");
            }
        } else if send_line(&mut ns_write, line).await.is_ok() {
            match read_reply(&mut ns_reader, commands::NS_PAYLOAD_VERBS).await {
                Ok(Some(reply)) => println!("{reply}"),
                Ok(None) => {
                    println!("name server closed the connection");
                    break;
                }
                Err(e) => println!("error: {e}"),
            }
        }
    }

    std::process::ExitCode::SUCCESS
}

async fn run_redirected_command(
    ns_write: &mut (impl tokio::io::AsyncWrite + Unpin),
    ns_reader: &mut (impl tokio::io::AsyncBufRead + Unpin),
    stdin: &mut (impl tokio::io::AsyncBufRead + Unpin),
    line: &str,
    verb: &str,
) -> std::io::Result<()> {
    send_line(ns_write, line).await?;
    let header = match read_reply(ns_reader, &[]).await? {
        Some(h) => h,
        None => {
            println!("name server closed the connection");
            return Ok(());
        }
    };
    let Some((ip, port)) = parse_redirect(&header) else {
        println!("{header}");
        return Ok(());
    };

    let mut ss_stream = TcpStream::connect((ip.as_str(), port)).await?;
    let (ss_read, mut ss_write) = ss_stream.split();
    let mut ss_reader = BufReader::new(ss_read);
    send_line(&mut ss_write, line).await?;

    if commands::SS_BYTE_STREAM_VERBS.contains(&verb) {
        drain_to_stdout(&mut ss_reader).await?;
        println!();
        return Ok(());
    }

    if verb == "WRITE" {
        let Some(header) = read_reply(&mut ss_reader, &[]).await? else {
            return Ok(());
        };
        if header != "ACK_WRITE_LOCKED" {
            println!("{header}");
            return Ok(());
        }
        println!("{header} — send '<word_index> <content>' lines, ETIRW to commit");
        loop {
            print!("edit> ");
            {
                use std::io::Write as _;
                let _ = std::io::stdout().flush();
            }
            let mut edit_line = String::new();
            if stdin.read_line(&mut edit_line).await? == 0 {
                break;
            }
            let edit_line = edit_line.trim();
            if edit_line.is_empty() {
                continue;
            }
            send_line(&mut ss_write, edit_line).await?;
            if edit_line == "ETIRW" {
                if let Some(reply) = read_reply(&mut ss_reader, &[]).await? {
                    println!("{reply}");
                }
                break;
            }
            if let Some(reply) = read_reply(&mut ss_reader, &[]).await? {
                println!("{reply}");
            }
        }
        return Ok(());
    }

    if let Some(reply) = read_reply(&mut ss_reader, commands::SS_PAYLOAD_VERBS).await? {
        println!("{reply}");
    }
    Ok(())
}
