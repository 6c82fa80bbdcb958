use clap::Parser;
use log::{debug, info};
use msgtap::{Host, MessageKind, MessageLog, NullCodec, PrettyMessage, RawEntry, MAX_PACKET_SIZE};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::UdpSocket;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Raw UDP tap: logs every datagram on a port through the message log and
/// prints it. Runs with no schema loaded, so everything renders as a hex
/// dump; the full template pipeline needs the (external) template stack.
#[derive(Debug, Parser)]
struct Opt {
    /// UDP port to listen on
    #[clap(short, long, default_value = "13000")]
    port: u16,

    /// Maximum number of entries retained in the message log
    #[clap(long, default_value = "4096")]
    max_log: usize,

    /// Print the full dump of each datagram instead of the one-line summary
    #[clap(long)]
    full: bool,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let opt = Opt::parse();

    env_logger::init();

    let socket = UdpSocket::bind(("0.0.0.0", opt.port)).await?;
    let local = Host::new(std::net::Ipv4Addr::LOCALHOST, opt.port);

    let log = Arc::new(Mutex::new(MessageLog::new(opt.max_log)));
    {
        let listen_port = opt.port;
        let full = opt.full;
        log.lock().unwrap().set_callback(Some(Box::new(move |entry: &RawEntry| {
            let mut codec = NullCodec;
            let pretty = PrettyMessage::decode(entry, &mut codec, listen_port);
            if full {
                info!("\n{}", pretty.full(&mut codec, true));
            } else {
                info!("{} {} bytes: {}", entry.from, entry.len(), pretty.summary);
            }
        })));
    }

    let cancel_token = CancellationToken::new();
    let recv_token = cancel_token.clone();
    let recv_log = log.clone();
    let handle = tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        loop {
            tokio::select! {
                _ = recv_token.cancelled() => break,
                result = socket.recv_from(&mut buf) => {
                    match result {
                        Ok((n, SocketAddr::V4(peer))) => {
                            let from = Host::new(*peer.ip(), peer.port());
                            recv_log
                                .lock()
                                .unwrap()
                                .log(MessageKind::Template, from, local, &buf[..n]);
                        }
                        Ok((_, SocketAddr::V6(peer))) => {
                            debug!("ignoring IPv6 datagram from {}", peer);
                        }
                        Err(e) => {
                            debug!("recv error: {}", e);
                        }
                    }
                }
            }
        }
    });

    info!("tapping udp/{}, waiting for Ctrl-C...", opt.port);
    signal::ctrl_c().await?;
    info!("Shutting down...");

    cancel_token.cancel();
    let _ = handle.await;

    info!("Exiting...");
    Ok(())
}
