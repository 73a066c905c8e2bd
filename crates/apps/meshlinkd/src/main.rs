use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use meshlink::session::{self, SessionContext};
use meshlink::{
    HeartbeatService, LinkRegistry, Listener, NodeIdentity, Service, ServicePool,
};
use meshlink_wire::ServiceKind;
use meshlinkd::config::DaemonConfig;

#[derive(Parser, Debug)]
#[command(name = "meshlinkd")]
struct Args {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    bind: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    pool_size: Option<usize>,
    #[arg(long)]
    description: Option<String>,
    /// Peer to dial at startup (repeatable).
    #[arg(long = "peer")]
    peers: Vec<String>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(err) = run(args) {
        log::error!("meshlinkd: {err}");
        std::process::exit(1);
    }
}

fn load_config(args: &Args) -> Result<DaemonConfig, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => DaemonConfig::from_path(path)?,
        None => DaemonConfig::default(),
    };
    if let Some(bind) = &args.bind {
        config.bind_address = bind.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(pool_size) = args.pool_size {
        config.pool_size = pool_size;
    }
    if let Some(description) = &args.description {
        config.description = description.clone();
    }
    config.peers.extend(args.peers.iter().cloned());
    Ok(config)
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let config = load_config(&args)?;

    let pool = Arc::new(ServicePool::new(config.pool_size)?);
    let registry = Arc::new(LinkRegistry::new());
    let service = Arc::new(Service::new(ServiceKind::Core, registry));
    let heartbeat = HeartbeatService::new(&service, config.heartbeat_config());
    service.register_handler(heartbeat.clone())?;
    heartbeat.spawn(&pool.handle());

    let identity = NodeIdentity::generate(&config.description);
    log::info!(
        "meshlinkd: node {} ({}) starting with {} worker loops",
        identity.id,
        identity.description,
        pool.size()
    );

    let ctx = SessionContext {
        identity,
        service,
        cancel: pool.stop_token(),
    };

    let listener = pool.handle().block_on(Listener::bind(
        &config.bind_address,
        config.port,
        pool.clone(),
        ctx.clone(),
    ))?;

    for peer in &config.peers {
        let addr = peer.clone();
        let ctx = ctx.clone();
        pool.handle().spawn(async move {
            if let Err(err) = session::connect(&addr, ctx).await {
                log::warn!("meshlinkd: couldn't reach peer <{addr}>: {err}");
            }
        });
    }

    // Orderly shutdown on ctrl-c: stop the heartbeat timer, the listener,
    // then the pool itself, which unblocks `run`.
    let shutdown_pool = pool.clone();
    pool.handle().spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("meshlinkd: shutting down");
            heartbeat.shutdown();
            listener.shutdown();
            shutdown_pool.shutdown();
        }
    });

    pool.run();
    Ok(())
}
