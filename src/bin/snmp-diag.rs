//! Diagnostic client for a running simulated device: issues GET,
//! GETNEXT, GETBULK or a full WALK over UDP and prints the decoded
//! response.

use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::*;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use snmp_sim::snmp::{decode_message, encode_message, ErrorStatus, Message, Oid, Pdu, SnmpValue, VarBind, Version};

#[derive(Parser)]
#[command(name = "snmp-diag")]
#[command(about = "SNMP diagnostic client for simulated devices")]
#[command(version = snmp_sim::VERSION)]
struct DiagCli {
    #[command(subcommand)]
    command: DiagCommands,

    /// Target device host
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Target device port
    #[arg(short, long)]
    port: u16,

    /// SNMP community string
    #[arg(short, long, default_value = "public")]
    community: String,

    /// Use SNMPv1 instead of v2c
    #[arg(long)]
    v1: bool,

    /// Request timeout in milliseconds
    #[arg(short, long, default_value = "1000")]
    timeout_ms: u64,
}

#[derive(Subcommand)]
enum DiagCommands {
    /// GET a single OID
    Get { oid: String },
    /// GETNEXT the successor of an OID
    GetNext { oid: String },
    /// GETBULK starting after an OID
    GetBulk {
        oid: String,
        #[arg(short, long, default_value = "10")]
        max_repetitions: u32,
    },
    /// Walk an entire subtree via repeated GETNEXT
    Walk { root: String },
}

#[tokio::main]
async fn main() {
    let cli = DiagCli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("{} {}", "error:".red().bold(), err);
        std::process::exit(1);
    }
}

async fn run(cli: DiagCli) -> Result<(), Box<dyn std::error::Error>> {
    let target: SocketAddr = format!("{}:{}", cli.host, cli.port).parse()?;
    let version = if cli.v1 { Version::V1 } else { Version::V2c };
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect(target).await?;
    let request_timeout = Duration::from_millis(cli.timeout_ms);

    match &cli.command {
        DiagCommands::Get { oid } => {
            let oid = Oid::parse(oid)?;
            let pdu = Pdu::get(1, vec![VarBind::new(oid, SnmpValue::Null)]);
            let response = exchange(&socket, version, &cli.community, pdu, request_timeout).await?;
            print_response(&response);
        }
        DiagCommands::GetNext { oid } => {
            let oid = Oid::parse(oid)?;
            let pdu = Pdu::get_next(1, vec![VarBind::new(oid, SnmpValue::Null)]);
            let response = exchange(&socket, version, &cli.community, pdu, request_timeout).await?;
            print_response(&response);
        }
        DiagCommands::GetBulk { oid, max_repetitions } => {
            let oid = Oid::parse(oid)?;
            let pdu = Pdu::get_bulk(1, 0, *max_repetitions as i32, vec![VarBind::new(oid, SnmpValue::Null)]);
            let response = exchange(&socket, version, &cli.community, pdu, request_timeout).await?;
            print_response(&response);
        }
        DiagCommands::Walk { root } => {
            let root = Oid::parse(root)?;
            walk(&socket, version, &cli.community, &root, request_timeout).await?;
        }
    }

    Ok(())
}

async fn exchange(
    socket: &UdpSocket,
    version: Version,
    community: &str,
    pdu: Pdu,
    request_timeout: Duration,
) -> Result<Message, Box<dyn std::error::Error>> {
    let message = Message { version, community: community.to_string(), pdu };
    let encoded = encode_message(&message)?;
    socket.send(&encoded).await?;

    let mut buf = [0u8; 4096];
    let n = timeout(request_timeout, socket.recv(&mut buf)).await??;
    Ok(decode_message(&buf[..n])?)
}

fn print_response(message: &Message) {
    println!("{}", format!("version={:?} community={}", message.version, message.community).dimmed());
    for varbind in &message.pdu.varbinds {
        let rendered = render_value(&varbind.value);
        println!("{} = {}", varbind.oid.to_string().cyan(), rendered);
    }
    let status = message.pdu.error_status();
    if status != ErrorStatus::NoError {
        println!("{} {:?} at index {}", "error:".red(), status, message.pdu.error_index());
    }
}

fn render_value(value: &SnmpValue) -> String {
    match value {
        SnmpValue::NoSuchObject => "noSuchObject".yellow().to_string(),
        SnmpValue::NoSuchInstance => "noSuchInstance".yellow().to_string(),
        SnmpValue::EndOfMibView => "endOfMibView".yellow().to_string(),
        other => format!("{:?}", other).green().to_string(),
    }
}

async fn walk(
    socket: &UdpSocket,
    version: Version,
    community: &str,
    root: &Oid,
    request_timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut current = root.clone();
    loop {
        let pdu = Pdu::get_next(1, vec![VarBind::new(current.clone(), SnmpValue::Null)]);
        let response = exchange(socket, version, community, pdu, request_timeout).await?;
        let Some(varbind) = response.pdu.varbinds.first() else { break };

        if !root.is_prefix_of(&varbind.oid) {
            break;
        }
        if matches!(varbind.value, SnmpValue::EndOfMibView) {
            break;
        }

        println!("{} = {}", varbind.oid.to_string().cyan(), render_value(&varbind.value));
        current = varbind.oid.clone();
    }
    Ok(())
}
