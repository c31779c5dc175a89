//! The space-server and standalone cseg-node processes (§6). Wires the
//! library crates together; owns no algorithmic logic of its own.

mod aggregate_loc;
mod config;
mod logging;

use aggregate_loc::LscAggregateLocUpdater;
use config::{Command, Config, CsegNodeArgs, HandlerType, SpaceServerArgs};
use eyre::{eyre, Result, WrapErr};
use sirikata_aggregate::{AggregateManager, NullMeshUploader};
use sirikata_dcseg::{DcsegConfig, ServerIdPool};
use sirikata_loc::InMemoryLocationServiceCache;
use sirikata_session::{NoOpTimeSyncClient, StaticServerIDMap};
use sirikata_types::{Address4, BoundingBox, CsegNodeId, ServerId, SpaceId, Vector3};
use std::sync::Arc;
use structopt::StructOpt;
use tracing::{debug, info, warn};

fn main() -> Result<()> {
    color_eyre::install()?;
    let config = Config::from_args();
    let _guard = logging::init(config.log_dir.as_deref(), config.json_logs);

    let rt = tokio::runtime::Runtime::new().wrap_err("failed to start the Tokio runtime")?;
    match rt.block_on(run(config)) {
        Ok(()) => Ok(()),
        Err(error) => {
            tracing::error!(%error, "unrecoverable init failure");
            std::process::exit(1);
        }
    }
}

async fn run(config: Config) -> Result<()> {
    match config.command {
        Command::SpaceServer(args) => run_space_server(args).await,
        Command::CsegNode(args) => run_cseg_node(args).await,
    }
}

async fn run_space_server(args: SpaceServerArgs) -> Result<()> {
    if args.handler != HandlerType::BruteForce {
        warn!(?args.handler, "only the brutef handler is implemented; falling back to it");
    }

    let server_id = ServerId::assigned(args.server_id).ok_or_else(|| eyre!("--server-id must be nonzero"))?;
    let known_servers = args
        .known_servers
        .iter()
        .map(|s| parse_known_server(s))
        .collect::<Result<Vec<_>>>()
        .wrap_err("invalid --known-server entry")?;
    let server_id_map = Arc::new(StaticServerIDMap::new(known_servers));
    let time_sync = Arc::new(NoOpTimeSyncClient);

    let (_session, mut object_messages) = sirikata_session::spawn(args.listen, server_id_map, time_sync)
        .await
        .wrap_err("failed to bind the session manager's listen address")?;
    info!(listen = %args.listen, %server_id, "session manager listening");

    tokio::spawn(async move {
        // Stand-in for the out-of-scope scripting host's
        // `handleServerMessage`: every inbound object message is
        // logged and dropped, since nothing downstream consumes it.
        while let Some(msg) = object_messages.recv().await {
            debug!(?msg, "received object message with no scripting host attached");
        }
    });

    let lsc = Arc::new(InMemoryLocationServiceCache::new());
    let (_prox, _prox_join) = sirikata_prox::spawn(
        lsc.clone(),
        std::time::Duration::from_millis(args.tick_interval_ms),
        std::time::Duration::from_secs(args.rebuild_interval_secs),
    );
    if !args.static_dynamic_split {
        debug!("static/dynamic object split disabled; every tracked object is treated as dynamic");
    }

    let space = SpaceId(uuid::Uuid::new_v4());
    let loc_updater = Arc::new(LscAggregateLocUpdater::new(lsc.clone(), space));
    let _aggregate = AggregateManager::new(Arc::new(NullMeshUploader), loc_updater);

    match args.cseg_addr {
        Some(addr) => info!(%addr, "attached to an external CSEG node"),
        None => {
            info!(listen = %args.cseg_listen, "hosting an embedded single-node CSEG fleet");
            let pool = ServerIdPool::new((2..256).filter_map(ServerId::assigned));
            let world = BoundingBox::new(Vector3::new(-16384.0, -16384.0, -16384.0), Vector3::new(16384.0, 16384.0, 16384.0));
            let (cseg_handle, _cseg_join) =
                sirikata_dcseg::spawn_node(CsegNodeId(server_id.raw()), world, DcsegConfig::default(), 1, pool);
            let cseg_listen = args.cseg_listen;
            tokio::spawn(async move {
                if let Err(error) = sirikata_dcseg::serve(cseg_listen, cseg_handle).await {
                    warn!(%error, "embedded CSEG node stopped serving");
                }
            });
        }
    }

    tokio::signal::ctrl_c().await.wrap_err("failed to listen for ctrl-c")?;
    info!("shutting down on ctrl-c");
    Ok(())
}

async fn run_cseg_node(args: CsegNodeArgs) -> Result<()> {
    let config = DcsegConfig {
        maintenance_interval_secs: args.maintenance_interval_secs,
        upper_tree_cutoff_depth: args.upper_tree_cutoff_depth,
        merges_enabled: !args.no_merges,
        splits_enabled: !args.no_splits,
    };
    let half = args.world_half_extent;
    let world = BoundingBox::new(Vector3::new(-half, -half, -half), Vector3::new(half, half, half));
    let pool = ServerIdPool::new((args.server_id_pool_start..args.server_id_pool_end).filter_map(ServerId::assigned));

    let (handle, _join) = sirikata_dcseg::spawn_node(CsegNodeId(args.node_id), world, config, args.num_cseg_nodes, pool);
    info!(listen = %args.listen, node_id = args.node_id, "cseg node listening");

    tokio::select! {
        result = sirikata_dcseg::serve(args.listen, handle) => {
            result.wrap_err("CSEG node stopped serving")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down on ctrl-c");
        }
    }
    Ok(())
}

fn parse_known_server(s: &str) -> Result<(ServerId, Address4)> {
    let (id_str, hostport) = s.split_once('=').ok_or_else(|| eyre!("expected id=host:port, got {s:?}"))?;
    let id: u32 = id_str.parse().wrap_err("invalid server id")?;
    let server = ServerId::assigned(id).ok_or_else(|| eyre!("server id must be nonzero"))?;
    let (host, port_str) = hostport.rsplit_once(':').ok_or_else(|| eyre!("expected host:port, got {hostport:?}"))?;
    let port: u16 = port_str.parse().wrap_err("invalid port")?;
    Ok((server, Address4::new(host, port)))
}
