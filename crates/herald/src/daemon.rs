//! Daemon and cron-driver commands.

use std::sync::Arc;

use miette::Result;
use tokio::sync::watch;
use tracing::{error, info};

use herald_engine::{
    AdapterSet, BlogAdapter, ConfigUpdate, EngineConfig, NewsletterAdapter, Scheduler,
    SocialAdapter, StatsTracker,
};
use herald_platform::{CmsClient, DataStoreClient, EmailClient, SocialClient};
use herald_web::LogLevelReload;

use crate::PlatformArgs;

/// Wire up platform clients, adapters, and the scheduler.
fn build_scheduler(args: &PlatformArgs, config: EngineConfig) -> Arc<Scheduler> {
    let cms = Arc::new(CmsClient::new(&args.cms_url, &args.cms_token));
    let store = Arc::new(DataStoreClient::new(&args.store_url, &args.store_key));
    let social = Arc::new(SocialClient::new(&args.social_url, &args.social_key));
    let email = Arc::new(EmailClient::new(&args.email_url, &args.email_key));

    let adapters = AdapterSet::new(
        BlogAdapter::new(cms, &args.site_url).with_social(Arc::clone(&social)),
        SocialAdapter::new(Arc::clone(&store), social),
        NewsletterAdapter::new(store, email),
    );

    Arc::new(Scheduler::new(
        adapters,
        Arc::new(StatsTracker::new()),
        config,
    ))
}

/// Run the periodic scheduler plus the operational HTTP API until a
/// shutdown signal arrives.
pub async fn run(
    args: &PlatformArgs,
    port: u16,
    interval: u64,
    max_concurrent: usize,
    reload: LogLevelReload,
) -> Result<()> {
    let mut config = EngineConfig::default();
    config
        .apply(&ConfigUpdate {
            processing_interval_secs: Some(interval),
            max_concurrent_jobs: Some(max_concurrent),
            ..Default::default()
        })
        .map_err(|e| miette::miette!("{}", e))?;

    let scheduler = build_scheduler(args, config);

    // Surface connectivity problems at startup, but run anyway: a flapping
    // integration should not keep the whole engine down.
    let health = scheduler.health_check().await;
    if !health.healthy {
        for issue in &health.errors {
            error!(issue, "integration unreachable at startup");
        }
    }

    scheduler.start();
    info!(interval, max_concurrent, "scheduler running");

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    let web_scheduler = Arc::clone(&scheduler);
    let web_handle = tokio::spawn(async move {
        if let Err(e) = herald_web::serve(web_scheduler, Some(reload), port).await {
            error!(error = %e, "operational API failed");
        }
    });

    // Wait for shutdown signal
    loop {
        if shutdown_rx.changed().await.is_err() || *shutdown_rx.borrow() {
            break;
        }
    }

    info!("shutting down");
    scheduler.stop();
    web_handle.abort();
    info!("daemon shut down gracefully");
    Ok(())
}

/// One tick for cron: probe, process, print the report, map to exit codes.
pub async fn process_once(args: &PlatformArgs, skip_health_check: bool) -> Result<i32> {
    let scheduler = build_scheduler(args, EngineConfig::default());

    if !skip_health_check {
        let health = scheduler.health_check().await;
        if !health.healthy {
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&health).map_err(|e| miette::miette!("{}", e))?
            );
            error!(errors = health.errors.len(), "health check failed, not processing");
            return Ok(2);
        }
    }

    let report = scheduler.tick().await.map_err(|e| miette::miette!("{}", e))?;
    println!(
        "{}",
        serde_json::to_string_pretty(&report).map_err(|e| miette::miette!("{}", e))?
    );

    if report.failed > 0 {
        error!(failed = report.failed, "run finished with terminal failures");
        return Ok(1);
    }
    Ok(0)
}

/// Probe-only command.
pub async fn health(args: &PlatformArgs) -> i32 {
    let scheduler = build_scheduler(args, EngineConfig::default());
    let health = scheduler.health_check().await;

    match serde_json::to_string_pretty(&health) {
        Ok(json) => println!("{}", json),
        Err(e) => error!(error = %e, "failed to serialize health report"),
    }

    if health.healthy { 0 } else { 2 }
}
