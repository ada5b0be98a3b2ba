use std::{sync::Arc, time::Duration};

use anyhow::Result;
use chrono_tz::Tz;
use reqwest::Client;
use tokio::{io::Stdout, sync::mpsc, task::JoinHandle, time::timeout};

use crate::{
    ai::ClassificationClient,
    config::AppConfig,
    feed::{Annotator, DedupTracker, FeedWatcher, ScriptFilter, TextExtractor},
    host::{self, HostChannels},
    infrastructure::{
        directories::ResolvedPaths,
        shutdown::{Shutdown, ShutdownReason},
    },
    relay::RelayService,
    report,
    tasks::{FeedOutcome, FeedProcessor},
};

const CHANNEL_CAPACITY: usize = 256;

pub struct FeedGuardApp {
    paths: ResolvedPaths,
    processor_handle: JoinHandle<FeedOutcome>,
    relay_handle: JoinHandle<Result<Stdout>>,
    host_handle: JoinHandle<Result<usize>>,
    shutdown: Shutdown,
    config: Arc<AppConfig>,
}

impl FeedGuardApp {
    pub async fn initialize(
        config: AppConfig,
        paths: ResolvedPaths,
        shutdown: Shutdown,
    ) -> Result<Self> {
        let config = Arc::new(config);

        let http_client = Client::builder()
            .user_agent(format!("viral-feed-guard/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        let classifier = Arc::new(ClassificationClient::new(
            http_client,
            config.classifier.clone(),
        ));

        let selectors = &config.selectors;
        let watcher = FeedWatcher::new(
            selectors.post_text.clone(),
            TextExtractor::new(selectors.post_container.clone()),
            DedupTracker::default(),
            ScriptFilter::new(config.script_pattern.clone()),
        );
        let annotator = Annotator::new(
            selectors.post_container.clone(),
            selectors.text_region.clone(),
        );

        let lines = host::open_feed(&config.host.feed).await?;
        let (document_tx, document_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (relay_tx, relay_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let processor = FeedProcessor::new(watcher, annotator, classifier.clone());
        let processor_handle = processor.spawn(document_rx, shutdown.subscribe());

        let relay = Arc::new(RelayService::new(classifier));
        let relay_handle = tokio::spawn(relay.serve(
            relay_rx,
            tokio::io::stdout(),
            shutdown.subscribe(),
        ));

        let host_handle = tokio::spawn(host::pump(
            lines,
            HostChannels {
                document: document_tx,
                relay: relay_tx,
            },
            shutdown.subscribe(),
        ));

        tracing::info!(
            analyze = %config.classifier.analyze_url,
            predict = %config.classifier.predict_url,
            post_text = %config.selectors.post_text,
            feed = ?config.host.feed,
            data = %paths.data_dir.display(),
            "pipeline wired"
        );

        Ok(Self {
            paths,
            processor_handle,
            relay_handle,
            host_handle,
            shutdown,
            config,
        })
    }

    pub async fn run(self) -> Result<()> {
        let FeedGuardApp {
            paths,
            processor_handle,
            mut relay_handle,
            mut host_handle,
            shutdown,
            config,
        } = self;

        tracing::info!("viral feed guard started");
        let shutdown_timeout = Duration::from_secs(5);

        // Ends on feed close (after draining) or on a shutdown signal.
        let outcome = match processor_handle.await {
            Ok(outcome) => outcome,
            Err(err) => {
                shutdown.trigger(ShutdownReason::Internal);
                host_handle.abort();
                relay_handle.abort();
                return Err(anyhow::anyhow!("feed processor task failed: {err}"));
            }
        };
        if let Some(reason) = shutdown.subscribe().reason() {
            tracing::info!(%reason, "shutdown signal received");
        }

        match timeout(shutdown_timeout, &mut host_handle).await {
            Ok(Ok(Ok(events))) => tracing::debug!(target: "host", events, "host feed reader finished"),
            Ok(Ok(Err(err))) => tracing::error!(target: "host", error = %err, "host feed reader failed"),
            Ok(Err(err)) => tracing::error!(target: "host", error = %err, "host feed task failed"),
            Err(_) => {
                tracing::warn!(target: "host", "host feed reader did not stop within {:?}", shutdown_timeout);
                host_handle.abort();
            }
        }

        match timeout(shutdown_timeout, &mut relay_handle).await {
            Ok(Ok(Ok(_))) => {}
            Ok(Ok(Err(err))) => tracing::error!(target: "relay", error = %err, "relay service failed"),
            Ok(Err(err)) => tracing::error!(target: "relay", error = %err, "relay task failed"),
            Err(_) => {
                tracing::warn!(
                    target: "relay",
                    "relay replies did not finish within {:?}; dropping them",
                    shutdown_timeout
                );
                shutdown.trigger(ShutdownReason::Internal);
                relay_handle.abort();
            }
        }

        let tz: Tz = config.timezone.parse().unwrap_or(chrono_tz::Asia::Seoul);
        let report = report::build_report(
            &outcome.document,
            &config.selectors.post_container,
            outcome.stats,
            tz,
        );
        report::write_report(&paths.report_path, &report).await?;

        tracing::info!(
            submitted = outcome.stats.submitted,
            failed = outcome.stats.failed,
            banners = report.annotations.len(),
            "viral feed guard stopped"
        );
        Ok(())
    }
}
