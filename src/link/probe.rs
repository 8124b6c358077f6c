//! Route probe link driver
//!
//! Host-side stand-in for a radio driver. The link counts as up while the
//! kernel has a route to the broker: a UDP socket is connected to the broker
//! address (no packets leave the host) and its local address is reported as
//! the acquired address.

use super::monitor::{LinkDriver, LinkError, LinkEvent};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const COMMAND_CAPACITY: usize = 8;

#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub host: String,
    pub port: u16,
    /// Re-check interval while the link is up
    pub probe_interval: Duration,
    /// Delay before a failed attempt is reported as `Disconnected`
    pub retry_delay: Duration,
}

#[derive(Debug)]
enum ProbeCommand {
    Connect,
}

/// Handle used by the link monitor to request connect attempts
#[derive(Debug, Clone)]
pub struct RouteProbe {
    commands: mpsc::Sender<ProbeCommand>,
}

impl RouteProbe {
    /// Launch the probe task. It reports `Started` once, then waits for
    /// `connect` requests.
    pub fn spawn(
        settings: ProbeSettings,
        events: mpsc::Sender<LinkEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        let handle = tokio::spawn(run_probe(settings, commands_rx, events, shutdown));
        (
            Self {
                commands: commands_tx,
            },
            handle,
        )
    }
}

impl LinkDriver for RouteProbe {
    fn connect(&self) -> Result<(), LinkError> {
        self.commands
            .try_send(ProbeCommand::Connect)
            .map_err(|e| match e {
                mpsc::error::TrySendError::Closed(_) => LinkError::DriverStopped,
                mpsc::error::TrySendError::Full(_) => {
                    LinkError::Rejected("connect already pending".to_string())
                }
            })
    }
}

async fn run_probe(
    settings: ProbeSettings,
    mut commands: mpsc::Receiver<ProbeCommand>,
    events: mpsc::Sender<LinkEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(host = %settings.host, port = settings.port, "Route probe started");
    if events.send(LinkEvent::Started).await.is_err() {
        return;
    }

    let mut current: Option<IpAddr> = None;

    loop {
        let event = tokio::select! {
            command = commands.recv() => match command {
                Some(ProbeCommand::Connect) => match probe_route(&settings.host, settings.port).await {
                    Ok(address) => {
                        current = Some(address);
                        LinkEvent::AddressAcquired(address)
                    }
                    Err(e) => {
                        warn!(error = %e, "No route to broker");
                        current = None;
                        tokio::time::sleep(settings.retry_delay).await;
                        LinkEvent::Disconnected
                    }
                },
                None => break,
            },
            _ = tokio::time::sleep(settings.probe_interval), if current.is_some() => {
                match probe_route(&settings.host, settings.port).await {
                    Ok(address) if Some(address) == current => continue,
                    Ok(address) => {
                        debug!(address = %address, "Local address changed");
                        current = Some(address);
                        LinkEvent::AddressAcquired(address)
                    }
                    Err(e) => {
                        warn!(error = %e, "Route to broker lost");
                        current = None;
                        LinkEvent::Disconnected
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        };

        if events.send(event).await.is_err() {
            break;
        }
    }

    debug!("Route probe stopped");
}

/// Local address the kernel would use to reach `host:port`
pub async fn probe_route(host: &str, port: u16) -> io::Result<IpAddr> {
    let target = tokio::net::lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "broker host did not resolve"))?;

    let bind: SocketAddr = if target.is_ipv4() {
        "0.0.0.0:0".parse().map_err(invalid_input)?
    } else {
        "[::]:0".parse().map_err(invalid_input)?
    };

    let socket = UdpSocket::bind(bind).await?;
    socket.connect(target).await?;
    let local = socket.local_addr()?.ip();
    if local.is_unspecified() {
        return Err(io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            "no local address for broker route",
        ));
    }
    Ok(local)
}

fn invalid_input(e: std::net::AddrParseError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, e)
}
