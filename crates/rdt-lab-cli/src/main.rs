use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::info;

use rdt_lab_proto::{SessionConfig, SessionConfigOverride};
use rdt_lab_session::{
    Receiver, Sender, SessionError, SessionReport, ShutdownFlag, UdpTransport,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Stop-and-wait RDT endpoint over UDP")]
struct Cli {
    /// Load session tunables from a TOML file; flags override file values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write a JSON report of the finished session.
    #[arg(long, global = true)]
    trace_out: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reliably send payloads to a peer.
    Send {
        /// Peer address the data packets go to.
        #[arg(long, default_value = "127.0.0.1:5001")]
        peer: String,

        /// Stop after this many payloads (default: run until aborted).
        #[arg(long)]
        count: Option<u64>,

        /// Pause between stop-and-wait rounds, in milliseconds.
        #[arg(long, default_value_t = 10)]
        pacing_ms: u64,

        #[command(flatten)]
        tunables: Tunables,
    },
    /// Listen for data packets and acknowledge them.
    Recv {
        /// Local address to bind.
        #[arg(long, default_value = "127.0.0.1:5001")]
        listen: String,

        #[command(flatten)]
        tunables: Tunables,
    },
}

/// Per-run overrides for [`SessionConfig`]; unset flags keep the file or
/// default value.
#[derive(ClapArgs, Debug, Clone)]
struct Tunables {
    #[arg(long)]
    payload_size: Option<usize>,
    #[arg(long)]
    loss: Option<f64>,
    #[arg(long)]
    corrupt: Option<f64>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    max_retries: Option<u32>,
    #[arg(long)]
    initial_timeout_ms: Option<u64>,
    #[arg(long)]
    min_timeout_ms: Option<u64>,
    #[arg(long)]
    min_rtt_sample_ms: Option<u64>,
    #[arg(long)]
    alpha: Option<f64>,
    #[arg(long)]
    beta: Option<f64>,
}

impl Tunables {
    fn as_override(&self) -> SessionConfigOverride {
        SessionConfigOverride {
            payload_size: self.payload_size,
            loss_prob: self.loss,
            corrupt_prob: self.corrupt,
            seed: self.seed,
            max_retries: self.max_retries,
            initial_timeout_ms: self.initial_timeout_ms,
            min_timeout_ms: self.min_timeout_ms,
            min_rtt_sample_ms: self.min_rtt_sample_ms,
            alpha: self.alpha,
            beta: self.beta,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    // Ctrl-C raises the cooperative stop flag; the loops notice it between
    // iterations and return with their transport released.
    let stop = ShutdownFlag::new();
    let handler_flag = stop.clone();
    ctrlc::set_handler(move || handler_flag.set()).context("Failed to install Ctrl-C handler")?;

    match &cli.command {
        Command::Send {
            peer,
            count,
            pacing_ms,
            tunables,
        } => {
            let config = load_config(cli.config.as_deref(), tunables)?;
            run_send(
                peer,
                *count,
                *pacing_ms,
                config,
                &stop,
                cli.trace_out.as_deref(),
            )
        }
        Command::Recv { listen, tunables } => {
            let config = load_config(cli.config.as_deref(), tunables)?;
            run_recv(listen, config, &stop, cli.trace_out.as_deref())
        }
    }
}

fn load_config(path: Option<&Path>, tunables: &Tunables) -> Result<SessionConfig> {
    let mut config = SessionConfig::default();
    if let Some(path) = path {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let file_override: SessionConfigOverride =
            toml::from_str(&content).context("Failed to parse config file")?;
        file_override.apply_to(&mut config);
    }
    tunables.as_override().apply_to(&mut config);
    Ok(config)
}

fn run_send(
    peer: &str,
    count: Option<u64>,
    pacing_ms: u64,
    config: SessionConfig,
    stop: &ShutdownFlag,
    trace_out: Option<&Path>,
) -> Result<()> {
    let transport =
        UdpTransport::connect(peer).with_context(|| format!("Failed to reach peer {peer}"))?;
    info!(peer, payload_size = config.payload_size, "sender starting");

    // The reference client pushes one fixed payload over and over.
    let payload = vec![b'x'; config.payload_size];
    let mut sender = Sender::new(transport, config);

    let mut sent: u64 = 0;
    let mut session_result: Result<(), SessionError> = Ok(());
    while !stop.is_set() && count.is_none_or(|limit| sent < limit) {
        match sender.send(&payload) {
            Ok(_) => {
                sent += 1;
                thread::sleep(Duration::from_millis(pacing_ms));
            }
            Err(err) => {
                session_result = Err(err);
                break;
            }
        }
    }

    // The report covers aborted and interrupted sessions too.
    if let Some(path) = trace_out {
        write_trace(path, &sender.report())?;
    }
    session_result.context("Session aborted before the payload was acknowledged")?;
    info!(payloads = sent, "sender finished");
    Ok(())
}

fn run_recv(
    listen: &str,
    config: SessionConfig,
    stop: &ShutdownFlag,
    trace_out: Option<&Path>,
) -> Result<()> {
    let transport =
        UdpTransport::bind(listen).with_context(|| format!("Failed to bind {listen}"))?;
    info!(
        listen,
        loss = config.loss_prob,
        corrupt = config.corrupt_prob,
        "receiver listening"
    );

    let mut receiver = Receiver::new(transport, &config);
    let run_result = receiver
        .run(stop, |payload| {
            info!(bytes = payload.len(), "application consumed payload");
        })
        .map(|_| ());

    if let Some(path) = trace_out {
        write_trace(path, &receiver.report())?;
    }
    run_result.context("Receiver loop failed")?;
    Ok(())
}

fn write_trace(path: &Path, report: &SessionReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize session report")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    Ok(())
}
