#[cfg(test)]
#[path = "tests/cli.rs"]
mod tests;

use camino::Utf8PathBuf;
use clap::Parser;
use const_format::concatcp;
use eyre::{Result as EyreResult, WrapErr};
use libp2p::identity::Keypair;
use libp2p::{Multiaddr, PeerId};
use meetpoint_network::config::NetworkConfig;
use meetpoint_network::types::NetworkEvent;
use meetpoint_rendezvous::{Mode, Session, SessionConfig, DEFAULT_RENDEZVOUS};
use tokio::sync::mpsc;
use tokio::{pin, select, signal, spawn};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ConfigFile;

pub const EXAMPLES: &str = r"
  # Answer pings from anyone sharing the default rendezvous string
  $ meetpoint -l

  # In another terminal, find that listener and ping it
  $ meetpoint

  # Meet somewhere more private
  $ meetpoint -r 'eiffel tower' -l
  $ meetpoint -r 'eiffel tower'
";

/// Find peers through a shared rendezvous string and ping them
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(after_help = concatcp!(
    "Run with -l as a listener that replies pong, then run without -l elsewhere\n",
    "to look the listener up and send it pings.\n\n",
    "Environment variables:\n",
    "  MEETPOINT_RENDEZVOUS    Rendezvous string\n",
    "  RUST_LOG                Log filter directives\n\n",
    "Examples:",
    EXAMPLES
))]
pub struct RootCommand {
    /// Unique string to identify a group of nodes. Share it with your friends to let them connect with you
    #[arg(short, long, value_name = "STRING", default_value = DEFAULT_RENDEZVOUS)]
    #[arg(env = "MEETPOINT_RENDEZVOUS")]
    pub rendezvous: String,

    /// Work as a listener that only replies to pings
    #[arg(short, long)]
    pub listen: bool,

    /// TOML file with swarm, discovery, bootstrap and timeout settings
    #[arg(long, value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Address to listen on, replaces the configured ones
    #[arg(long, value_name = "MULTIADDR")]
    pub listen_addr: Vec<Multiaddr>,
}

impl RootCommand {
    const fn mode(&self) -> Mode {
        if self.listen {
            Mode::Listener
        } else {
            Mode::Initiator
        }
    }

    pub async fn run(self) -> EyreResult<()> {
        let file = match &self.config {
            Some(path) => ConfigFile::load(path).await?,
            None => ConfigFile::default(),
        };

        let (network_config, session_config) = self.into_configs(file);

        let (client, events) = meetpoint_network::run(&network_config)
            .await
            .wrap_err("failed to join the network")?;

        info!(peer_id = %client.peer_id(), "Joined the network");

        let (peer_loss_sender, peer_loss) = mpsc::channel(32);
        drop(spawn(forward_events(events, peer_loss_sender)));

        let shutdown = CancellationToken::new();

        let session = Session::new(client, session_config, shutdown.clone())
            .with_peer_loss(peer_loss)
            .run();
        pin!(session);

        let report = select! {
            report = &mut session => report?,
            result = signal::ctrl_c() => {
                result.wrap_err("failed to listen for Ctrl-C")?;

                info!("Shutting down");
                shutdown.cancel();

                session.await?
            }
        };

        info!(
            key = %report.key,
            bootstrap_nodes = report.bootstrap.connected.len(),
            peers = report.connected.len(),
            "Session ended"
        );

        Ok(())
    }

    fn into_configs(self, file: ConfigFile) -> (NetworkConfig, SessionConfig) {
        let mode = self.mode();

        let mut network_config = NetworkConfig::new(Keypair::generate_ed25519());
        network_config.swarm = file.swarm;
        network_config.discovery = file.discovery;

        if !self.listen_addr.is_empty() {
            network_config.swarm.listen = self.listen_addr;
        }

        let mut session_config =
            SessionConfig::new(self.rendezvous, mode).with_timeouts(file.timeouts);

        if let Some(nodes) = file.bootstrap.nodes {
            session_config = session_config.with_bootstrap(nodes);
        }

        (network_config, session_config)
    }
}

async fn forward_events(
    mut events: mpsc::Receiver<NetworkEvent>,
    peer_loss: mpsc::Sender<PeerId>,
) {
    while let Some(event) = events.recv().await {
        match event {
            NetworkEvent::ListeningOn { address, .. } => {
                debug!(%address, "Listener ready");
            }
            NetworkEvent::PeerConnected { peer_id, address } => {
                debug!(%peer_id, %address, "Peer connected");
            }
            NetworkEvent::PeerDisconnected { peer_id } => {
                debug!(%peer_id, "Peer disconnected");

                // Listeners never drain this channel, so never wait on it.
                if let Err(err) = peer_loss.try_send(peer_id) {
                    debug!(%peer_id, %err, "Peer loss not delivered");
                }
            }
        }
    }
}
