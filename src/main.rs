use std::{error::Error, sync::Arc};

use clap::Parser;
use saml_gatekeeper::{AppState, Gatekeeper, build_app, config::GatekeeperConfig, observability};

#[derive(Parser, Debug)]
#[command(version, about = "Stateless SAML service provider gatekeeper", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file
    #[arg(short, long, global = true, default_value = "gatekeeper.toml")]
    config: String,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Start the gatekeeper server (default)
    Serve,
    /// Validate the configuration, key material and IdP metadata, then exit
    Check,
    /// Print the SP metadata XML to stdout
    Metadata,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match GatekeeperConfig::from_file(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(config).await,
        Command::Check => run_check(config).await,
        Command::Metadata => run_metadata(config).await,
    }
}

async fn run_server(config: GatekeeperConfig) {
    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("{e}");
        std::process::exit(1);
    }
    for warning in config.warnings() {
        tracing::warn!(%warning, "Configuration warning");
    }

    let gatekeeper = match build_gatekeeper(&config).await {
        Ok(g) => g,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize SAML service provider");
            std::process::exit(1);
        }
    };

    let addr = config.server.socket_addr();
    tracing::info!(
        entity_id = %gatekeeper.entity_id(),
        acs_path = %gatekeeper.acs_path(),
        rules = config.rules.len(),
        upstream = config.upstream.url.as_deref().unwrap_or("<none>"),
        "Starting SAML gatekeeper"
    );
    if config.upstream.url.is_none() {
        tracing::warn!("No upstream configured; requests that pass the gate will get 404");
    }

    let state = match AppState::new(config, gatekeeper) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build upstream HTTP client");
            std::process::exit(1);
        }
    };
    let app = build_app(state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, %addr, "Failed to bind");
            std::process::exit(1);
        }
    };
    tracing::info!(%addr, "Listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
    tracing::info!("Shutdown complete");
}

async fn run_check(config: GatekeeperConfig) {
    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("{e}");
        std::process::exit(1);
    }
    for warning in config.warnings() {
        tracing::warn!(%warning, "Configuration warning");
    }

    match build_gatekeeper(&config).await.and_then(|g| Ok(g.metadata()?)) {
        Ok(_) => println!("Configuration OK"),
        Err(e) => {
            eprintln!("Configuration check failed: {e}");
            std::process::exit(1);
        }
    }
}

async fn run_metadata(config: GatekeeperConfig) {
    // stdout carries the XML
    for warning in config.warnings() {
        eprintln!("warning: {warning}");
    }

    match build_gatekeeper(&config).await.and_then(|g| Ok(g.metadata()?)) {
        Ok(xml) => println!("{xml}"),
        Err(e) => {
            eprintln!("Failed to render SP metadata: {e}");
            std::process::exit(1);
        }
    }
}

/// Load key material and IdP metadata and assemble the gatekeeper.
#[cfg(feature = "saml")]
async fn build_gatekeeper(config: &GatekeeperConfig) -> Result<Gatekeeper, Box<dyn Error>> {
    use saml_gatekeeper::auth::{
        TokenCodec,
        saml::{KeyPair, SamaelEngine, load_idp_metadata},
    };

    let keys = KeyPair::load(&config.saml)?;
    let codec = TokenCodec::derive(
        &keys.key_material()?,
        config.session.signing_algorithm,
        config.session.clock_skew_secs,
    )?;

    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;
    let idp_metadata = load_idp_metadata(&config.saml, &http_client).await?;
    let engine = SamaelEngine::new(&config.saml, &keys, &idp_metadata)?;

    Ok(Gatekeeper::new(config, Arc::new(engine), codec))
}

#[cfg(not(feature = "saml"))]
async fn build_gatekeeper(_config: &GatekeeperConfig) -> Result<Gatekeeper, Box<dyn Error>> {
    Err("this binary was built without the `saml` feature; rebuild with --features saml".into())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
