#![forbid(unsafe_code)]
//! Entrypoint: parses CLI flags, loads config, constructs every subsystem,
//! and runs the reconciliation loop, scheduler, and command monitor
//! concurrently until a shutdown signal arrives.

mod cli;
mod hostname_handler;

use std::sync::Arc;

use clap::Parser;
use mds_core::config::Config;
use mds_core::credential_job::CredentialJob;
use mds_core::firmware::EfiVarsReader;
use mds_core::hostname::HostnameReconciler;
use mds_core::managers::{AccountManager, AddressManager, DiagnosticsManager, Manager, WsfcManager};
use mds_core::metadata::MetadataClient;
use mds_core::paths;
use mds_core::reconcile;
use mds_core::scheduler::{Job, Scheduler};
use mds_core::trust_store::TrustStoreInstaller;
use mds_ipc::{EndpointPermissions, Registry, Server, ServerConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hostname_handler::ReconfigureHostnameHandler;

#[cfg(target_os = "linux")]
use mds_core::tpm::linux::Tpm2Unsealer;
#[cfg(not(target_os = "linux"))]
use mds_core::tpm::UnsupportedUnsealer;

#[cfg(unix)]
use mds_core::trust_store::PosixTrustStore;
#[cfg(windows)]
use mds_core::trust_store::WindowsTrustStore;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = cli::Cli::parse();
    let config = match Config::load(&cli.distro_config, &cli.user_config) {
        Ok(config) => config,
        Err(error) => {
            warn!(%error, "failed to load config, proceeding with defaults");
            Config::default()
        }
    };

    let metadata = Arc::new(match &cli.metadata_base_url {
        Some(url) => MetadataClient::with_base_url(url.clone()),
        None => MetadataClient::new(),
    });

    let token = CancellationToken::new();

    let hostname_reconciler = Arc::new(HostnameReconciler::new(
        paths::hosts_file_path(),
        config.unstable.set_hostname,
        config.unstable.set_fqdn,
        config.unstable.fqdn_as_hostname,
        config.unstable.additional_aliases.clone(),
    ));

    let managers: Vec<Arc<dyn Manager>> = vec![
        Arc::new(AccountManager::new(config.account_manager.disable)),
        Arc::new(AddressManager::new(config.address_manager.disable)),
        Arc::new(WsfcManager::new(config.wsfc.port)),
        Arc::new(DiagnosticsManager::new(config.diagnostics.enable)),
    ];

    let scheduler = Arc::new(Scheduler::new());
    let mut jobs: Vec<Arc<dyn Job>> = Vec::new();
    if let Some(credential_job) = build_credential_job(&metadata, &config) {
        jobs.push(credential_job);
    }

    let reconcile_handle = tokio::spawn({
        let metadata = metadata.clone();
        let token = token.clone();
        async move { reconcile::run(metadata, managers, token).await }
    });

    let scheduler_handle = tokio::spawn({
        let scheduler = scheduler.clone();
        let token = token.clone();
        async move { scheduler.schedule_jobs(jobs, false, token).await }
    });

    let command_monitor_handle = if config.unstable_present && config.unstable.command_monitor_enabled {
        Some(tokio::spawn(run_command_monitor(
            config.clone(),
            hostname_reconciler.clone(),
            metadata.clone(),
            token.clone(),
        )))
    } else {
        info!("command monitor disabled by configuration");
        None
    };

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, cancelling subsystems");
    token.cancel();

    let _ = reconcile_handle.await;
    let _ = scheduler_handle.await;
    if let Some(handle) = command_monitor_handle {
        let _ = handle.await;
    }
}

fn build_credential_job(metadata: &Arc<MetadataClient>, config: &Config) -> Option<Arc<dyn Job>> {
    #[cfg(target_os = "linux")]
    let tpm: Box<dyn mds_core::tpm::TpmUnsealer> = match Tpm2Unsealer::new() {
        Ok(unsealer) => Box::new(unsealer),
        Err(error) => {
            warn!(%error, "TPM unavailable, credential bootstrap job disabled");
            return None;
        }
    };
    #[cfg(not(target_os = "linux"))]
    let tpm: Box<dyn mds_core::tpm::TpmUnsealer> = Box::new(UnsupportedUnsealer);

    let trust_store: Box<dyn TrustStoreInstaller> = build_trust_store();

    Some(Arc::new(CredentialJob::new(
        metadata.clone(),
        Box::new(EfiVarsReader::new()),
        tpm,
        trust_store,
        config.clone(),
    )))
}

#[cfg(unix)]
fn build_trust_store() -> Box<dyn TrustStoreInstaller> {
    Box::new(PosixTrustStore::detect(
        paths::client_key_path()
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| std::path::PathBuf::from("/run/google-mds-mtls")),
    ))
}

#[cfg(windows)]
fn build_trust_store() -> Box<dyn TrustStoreInstaller> {
    Box::new(WindowsTrustStore)
}

async fn run_command_monitor(
    config: Config,
    hostname_reconciler: Arc<HostnameReconciler>,
    metadata: Arc<MetadataClient>,
    token: CancellationToken,
) {
    let registry = Arc::new(Registry::new());
    let handler = Arc::new(ReconfigureHostnameHandler::new(hostname_reconciler, metadata));
    if let Err(error) = registry
        .register("agent.hostname.reconfigurehostname", handler)
        .await
    {
        warn!(%error, "failed to register hostname reconfigure handler");
        return;
    }

    let server_config = ServerConfig {
        socket_path: config
            .unstable
            .command_pipe_path
            .clone()
            .map(std::path::PathBuf::from)
            .unwrap_or_else(paths::command_socket_path),
        permissions: EndpointPermissions {
            mode: u32::from_str_radix(
                config.unstable.command_pipe_mode.trim_start_matches("0o"),
                8,
            )
            .unwrap_or(0o770),
            group: (config.unstable.command_pipe_group != "-1")
                .then(|| config.unstable.command_pipe_group.clone()),
        },
        request_timeout: parse_duration_seconds(&config.unstable.command_request_timeout),
    };

    let server = Server::new(server_config, registry);
    if let Err(error) = server.run(token).await {
        warn!(%error, "command monitor exited with an error");
    }
}

fn parse_duration_seconds(text: &str) -> std::time::Duration {
    let trimmed = text.trim().trim_end_matches('s');
    trimmed
        .parse::<u64>()
        .map(std::time::Duration::from_secs)
        .unwrap_or(std::time::Duration::from_secs(10))
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
