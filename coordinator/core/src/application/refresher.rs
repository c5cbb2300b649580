// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Cache Refresher
//!
//! Background task that rebuilds the [`ConfigCache`] snapshot from the store
//! on a fixed interval for the lifetime of the process.
//!
//! Each cycle purges expired restriction rows, reads the active catalogs and
//! the live restrictions, and publishes one new snapshot. A failed cycle keeps
//! the previous snapshot and is retried at the next tick.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::config_cache::{ConfigCache, ConfigSnapshot};
use crate::domain::clock::Clock;
use crate::domain::events::DispatchEvent;
use crate::domain::repository::{RestrictionRepository, TopicRepository};
use crate::infrastructure::event_bus::EventBus;

/// What one refresh cycle observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSummary {
    pub generation: u64,
    pub topics: usize,
    pub restrictions: usize,
    pub purged: u64,
}

pub struct CacheRefresher {
    topics: Arc<dyn TopicRepository>,
    restrictions: Arc<dyn RestrictionRepository>,
    cache: Arc<ConfigCache>,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl CacheRefresher {
    pub fn new(
        topics: Arc<dyn TopicRepository>,
        restrictions: Arc<dyn RestrictionRepository>,
        cache: Arc<ConfigCache>,
        event_bus: EventBus,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        Self {
            topics,
            restrictions,
            cache,
            event_bus,
            clock,
            interval,
        }
    }

    /// Rebuild and publish one snapshot.
    pub async fn refresh_once(&self) -> Result<RefreshSummary> {
        let now = self.clock.now();

        // Cleanup only; a failure here must not block the refresh itself.
        let purged = match self.restrictions.purge_expired(now).await {
            Ok(purged) => purged,
            Err(e) => {
                warn!(error = %e, "Failed to purge expired restrictions");
                0
            }
        };

        let catalogs = self
            .topics
            .fetch_active_catalogs()
            .await
            .context("Failed to fetch active topic catalogs")?;
        let live = self
            .restrictions
            .fetch_live(now)
            .await
            .context("Failed to fetch live restrictions")?;

        let snapshot = ConfigSnapshot::build(catalogs, live, now);
        let topics = snapshot.catalogs().len();
        let restrictions = snapshot.restrictions().len();
        let generation = self.cache.publish(snapshot);

        self.event_bus.publish(DispatchEvent::CacheRefreshed {
            topics,
            restrictions,
            at: now,
        });

        debug!(generation, topics, restrictions, purged, "Config cache refreshed");

        Ok(RefreshSummary {
            generation,
            topics,
            restrictions,
            purged,
        })
    }

    /// Refresh every `interval` until `shutdown` fires. The first cycle runs
    /// one interval after start; the coordinator performs the initial one.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(interval = ?self.interval, "Starting config cache refresher");

        let mut tick = interval_at(Instant::now() + self.interval, self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    match self.refresh_once().await {
                        Ok(_) => {
                            metrics::counter!("chorus_cache_refreshes_total", "result" => "ok").increment(1);
                        }
                        Err(e) => {
                            metrics::counter!("chorus_cache_refreshes_total", "result" => "error").increment(1);
                            warn!("Config cache refresh failed, keeping previous snapshot: {:#}", e);
                        }
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received, stopping config cache refresher");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::{AgentId, CredentialFingerprint};
    use crate::domain::clock::SystemClock;
    use crate::domain::restriction::Restriction;
    use crate::domain::topic::{Topic, TopicId};
    use crate::infrastructure::repositories::{InMemoryRestrictionRepository, InMemoryTopicRepository};
    use chrono::{Duration as ChronoDuration, Utc};

    fn fixture() -> (InMemoryTopicRepository, InMemoryRestrictionRepository, Arc<ConfigCache>, CacheRefresher) {
        let topics = InMemoryTopicRepository::new();
        let restrictions = InMemoryRestrictionRepository::new();
        let cache = Arc::new(ConfigCache::new());
        let refresher = CacheRefresher::new(
            Arc::new(topics.clone()),
            Arc::new(restrictions.clone()),
            cache.clone(),
            EventBus::new(16),
            Arc::new(SystemClock),
            Duration::from_secs(60),
        );
        (topics, restrictions, cache, refresher)
    }

    fn seed_topic(repo: &InMemoryTopicRepository, id: i64, texts: &[&str]) {
        repo.add_topic(Topic {
            id: TopicId(id),
            display_name: None,
            active: true,
        });
        for text in texts {
            repo.add_response(TopicId(id), *text);
        }
    }

    #[tokio::test]
    async fn test_refresh_populates_cache() {
        let (topics, _, cache, refresher) = fixture();
        seed_topic(&topics, 10, &["A", "B"]);
        seed_topic(&topics, 11, &[]);

        let summary = refresher.refresh_once().await.unwrap();

        assert_eq!(summary.topics, 1);
        assert_eq!(summary.generation, 1);
        assert_eq!(cache.load().generation(), 1);
        assert!(cache.responses(TopicId(10)).is_some());
        assert!(cache.responses(TopicId(11)).is_none());
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let (topics, restrictions, cache, refresher) = fixture();
        seed_topic(&topics, 10, &["A", "B"]);
        restrictions
            .upsert(&Restriction {
                agent_id: AgentId(1),
                topic_id: TopicId(10),
                credential_fingerprint: CredentialFingerprint("aa".to_string()),
                expires_at: Utc::now() + ChronoDuration::hours(1),
            })
            .await
            .unwrap();

        refresher.refresh_once().await.unwrap();
        let first = cache.load();
        refresher.refresh_once().await.unwrap();
        let second = cache.load();

        assert_eq!(first.catalogs(), second.catalogs());
        assert_eq!(first.restrictions(), second.restrictions());
        assert_eq!(second.generation(), 2);
    }

    #[tokio::test]
    async fn test_refresh_purges_expired_rows() {
        let (_, restrictions, cache, refresher) = fixture();
        restrictions
            .upsert(&Restriction {
                agent_id: AgentId(1),
                topic_id: TopicId(10),
                credential_fingerprint: CredentialFingerprint("aa".to_string()),
                expires_at: Utc::now() - ChronoDuration::minutes(1),
            })
            .await
            .unwrap();

        let summary = refresher.refresh_once().await.unwrap();

        assert_eq!(summary.purged, 1);
        assert!(restrictions.all().is_empty());
        assert!(cache.load().restrictions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_refreshes_on_interval_and_stops() {
        let (topics, _, cache, refresher) = fixture();
        let refresher = Arc::new(refresher);
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn({
            let refresher = refresher.clone();
            let shutdown = shutdown.clone();
            async move { refresher.run(shutdown).await }
        });

        seed_topic(&topics, 10, &["A"]);
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(cache.load().generation(), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(cache.load().generation(), 2);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
