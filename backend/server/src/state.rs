use std::sync::Arc;

use anyhow::Context;
use tracing::warn;

use super::{
    cache::CountCache,
    clock::{Clock, SystemClock},
    config::Config,
    database::{RestStore, WaitlistStore},
    limiter::RateLimiter,
    notify::{Mailer, Notifier, ResendMailer},
};

pub struct State {
    pub config: Config,
    pub store: Arc<dyn WaitlistStore>,
    pub notifier: Notifier,
    pub limiter: RateLimiter,
    pub count_cache: CountCache,
}

impl State {
    /// Wires the production store, mailer and system clock from config.
    pub fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let store = RestStore::new(&config.store_url, &config.store_key, config.store_timeout)
            .context("Failed to build store client")?;

        let mailer: Option<Arc<dyn Mailer>> = match &config.resend_key {
            Some(key) => Some(Arc::new(
                ResendMailer::new(key).context("Failed to build email client")?,
            )),
            None => {
                warn!("Emails disabled");
                None
            }
        };

        Ok(Self::with_parts(
            config,
            Arc::new(store),
            mailer,
            Arc::new(SystemClock),
        ))
    }

    /// Assembles state around any store, mailer and clock.
    pub fn with_parts(
        config: Config,
        store: Arc<dyn WaitlistStore>,
        mailer: Option<Arc<dyn Mailer>>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let notifier = Notifier::new(mailer, &config.email_from, config.email_timeout);
        let limiter = RateLimiter::new(config.rate_limit, clock.clone());
        let count_cache = CountCache::new(config.count_cache_ttl, clock);

        Arc::new(Self {
            config,
            store,
            notifier,
            limiter,
            count_cache,
        })
    }
}
