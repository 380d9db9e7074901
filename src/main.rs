//! gwctl - replica gateway command-line client
//!
//! Resolves placement and drives reads, writes and removes through a
//! [`Gateway`] acting as a client of the listed nodes. `serve` runs an
//! in-memory peer so a cluster can be stood up on one machine.
//!
//! ```text
//! gwctl serve --listen 127.0.0.1:7000 &
//! gwctl serve --listen 127.0.0.1:7001 &
//! gwctl --nodes 127.0.0.1:7000,127.0.0.1:7001 --copies 2 write 0000000100000000 hello --create
//! gwctl --nodes 127.0.0.1:7000,127.0.0.1:7001 --copies 2 read 0000000100000000
//! ```

use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use replica_gateway::adapters::{EpochTracker, InMemoryLocalStore};
use replica_gateway::domain::{Node, NodeId, ObjectId, Opcode, Request, RequestHeader};
use replica_gateway::gateway::{Gateway, GatewayConfig};
use replica_gateway::net::{PeerServer, PoolConfig, SocketPool, TcpPeerExecutor};
use replica_gateway::placement::{hash, ClusterView, PlacementTable};
use replica_gateway::ResultCode;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Replica gateway client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cluster nodes as `ip:port` or `ip:port@zone`, comma separated
    #[arg(long, env = "GW_NODES", value_delimiter = ',')]
    nodes: Vec<String>,

    /// Gateway configuration file (YAML)
    #[arg(long, env = "GW_CONFIG")]
    config: Option<PathBuf>,

    /// Cluster epoch the request is issued in
    #[arg(long, env = "GW_EPOCH", default_value = "1")]
    epoch: u32,

    /// Copies per object (0 uses the configured default)
    #[arg(long, default_value = "0")]
    copies: u8,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the nodes holding an object
    Locate {
        #[arg(value_parser = parse_oid)]
        oid: ObjectId,
    },
    /// Read an object to stdout
    Read {
        #[arg(value_parser = parse_oid)]
        oid: ObjectId,
        #[arg(long, default_value = "0")]
        offset: u64,
        /// Bytes to read (0 reads to the end)
        #[arg(long, default_value = "0")]
        length: u32,
    },
    /// Write data to every copy of an object
    Write {
        #[arg(value_parser = parse_oid)]
        oid: ObjectId,
        /// Literal data; ignored when --file is given
        data: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long, default_value = "0")]
        offset: u64,
        /// Create the object if it does not exist
        #[arg(long)]
        create: bool,
    },
    /// Remove an object from every copy
    Remove {
        #[arg(value_parser = parse_oid)]
        oid: ObjectId,
    },
    /// Run an in-memory peer node
    Serve {
        #[arg(long, default_value = "127.0.0.1:7000")]
        listen: SocketAddr,
    },
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args);

    if let Command::Serve { listen } = args.command {
        let server = PeerServer::bind(listen, Arc::new(InMemoryLocalStore::new())).await?;
        info!(addr = %server.local_addr()?, "Serving in-memory store");
        server
            .run_until(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            GatewayConfig::from_yaml(&text)?
        }
        None => GatewayConfig::default(),
    };

    let nodes = args
        .nodes
        .iter()
        .map(|spec| parse_node(spec))
        .collect::<anyhow::Result<Vec<_>>>()?;
    if nodes.is_empty() {
        bail!("no cluster nodes given (use --nodes)");
    }
    let table = PlacementTable::build_with_limit(nodes, config.max_nodes)?;
    let view = Arc::new(ClusterView::new(args.epoch, table));

    if let Command::Locate { oid } = args.command {
        let copies = match args.copies {
            0 => config.default_copies as usize,
            n => n as usize,
        };
        let entries = view.resolve(oid, copies, config.max_copies)?;
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let epochs = Arc::new(EpochTracker::new(args.epoch));
    let pool = Arc::new(SocketPool::new(PoolConfig::default()));
    let peers = Arc::new(
        TcpPeerExecutor::new(Arc::clone(&pool), epochs.clone())
            .with_io_timeout(config.io_timeout, config.max_retry_count),
    );
    // Never a member of the cluster, so every copy is remote.
    let client_id = NodeId::new(SocketAddr::from(([0, 0, 0, 0], 0)));
    let gateway = Gateway::new(
        client_id,
        Arc::new(InMemoryLocalStore::new()),
        peers,
        pool,
        epochs,
    )
    .with_config(config)?;

    let code = match args.command {
        Command::Read { oid, offset, length } => {
            let header = RequestHeader::new(Opcode::ReadObj, oid, args.epoch)
                .with_copies(args.copies)
                .with_range(offset, length);
            let mut req = Request::new(header, view);
            let code = gateway.read(&mut req).await;
            if code.is_success() {
                std::io::stdout().write_all(&req.response_data)?;
            }
            code
        }
        Command::Write {
            oid,
            data,
            file,
            offset,
            create,
        } => {
            let payload = match (file, data) {
                (Some(path), _) => Bytes::from(
                    std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?,
                ),
                (None, Some(data)) => Bytes::from(data),
                (None, None) => bail!("write needs data or --file"),
            };
            let opcode = if create {
                Opcode::CreateAndWriteObj
            } else {
                Opcode::WriteObj
            };
            let header = RequestHeader::new(opcode, oid, args.epoch)
                .with_copies(args.copies)
                .with_range(offset, 0);
            let mut req = Request::new(header, view).with_data(payload)?;
            gateway.handle(&mut req).await
        }
        Command::Remove { oid } => {
            let header =
                RequestHeader::new(Opcode::RemoveObj, oid, args.epoch).with_copies(args.copies);
            let req = Request::new(header, view);
            gateway.remove(&req).await
        }
        Command::Locate { .. } | Command::Serve { .. } => bail!("command already handled"),
    };

    info!(metrics = ?gateway.metrics().snapshot(), "Request finished");
    if code != ResultCode::Success {
        bail!("request failed: {}", code);
    }
    Ok(())
}

// =============================================================================
// Argument Parsing
// =============================================================================

fn parse_oid(s: &str) -> Result<ObjectId, String> {
    let digits = s.trim_start_matches("0x");
    u64::from_str_radix(digits, 16)
        .map(ObjectId::new)
        .map_err(|e| format!("invalid object id {s:?}: {e}"))
}

/// `ip:port` gets a zone derived from its address; `ip:port@zone` names one.
fn parse_node(spec: &str) -> anyhow::Result<Node> {
    let (addr, zone) = match spec.split_once('@') {
        Some((addr, zone)) => (addr, Some(zone)),
        None => (spec, None),
    };
    let id = NodeId::new(
        addr.trim()
            .parse()
            .with_context(|| format!("invalid node address {addr:?}"))?,
    );
    let zone = match zone {
        Some(zone) => zone
            .trim()
            .parse()
            .with_context(|| format!("invalid zone in {spec:?}"))?,
        None => hash::hash_bytes(&id.hash_bytes()) as u32,
    };
    Ok(Node::new(id, zone))
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // Logs go to stderr so `read` output stays clean.
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
