use crate::reconciler::Backoff;
use std::convert::TryFrom;
use tokio::time::Duration;

#[derive(Clone, Default)]
pub struct EntranceOptions {
    pub event_queue_capacity: Option<usize>,
    pub key_prefix: Option<String>,
    pub pool_lock_ttl: Option<Duration>,
    pub update_lock_ttl: Option<Duration>,
    pub lock_attempts: Option<u32>,
    pub plugin_retry_attempts: Option<u32>,
    pub plugin_retry_backoff: Option<Backoff>,
    pub https_listen_port: Option<u16>,
}

pub(super) struct EntranceOptionsValidated {
    pub event_queue_capacity: usize,
    pub key_prefix: String,
    pub pool_lock_ttl: Duration,
    pub update_lock_ttl: Duration,
    pub lock_attempts: u32,
    pub plugin_retry_attempts: u32,
    pub plugin_retry_backoff: Backoff,
    pub https_listen_port: u16,
}

impl EntranceOptionsValidated {
    fn validate(&self) -> Result<(), &'static str> {
        if self.event_queue_capacity == 0 {
            return Err("Event queue capacity must be positive");
        }
        if !self.key_prefix.starts_with('/') {
            return Err("Key prefix must start with '/'");
        }
        if self.pool_lock_ttl < Duration::from_secs(1) || self.update_lock_ttl < Duration::from_secs(1) {
            return Err("Lock TTLs must be at least one second");
        }
        if self.lock_attempts == 0 {
            return Err("Lock attempts must be positive");
        }
        if self.plugin_retry_attempts == 0 {
            return Err("Plugin retry attempts must be positive");
        }
        if let Backoff::Exponential { initial, max } = self.plugin_retry_backoff {
            if initial > max {
                return Err("Initial retry backoff must not exceed the maximum");
            }
        }
        if self.https_listen_port == 0 {
            return Err("HTTPS listen port must be positive");
        }

        Ok(())
    }
}

impl TryFrom<EntranceOptions> for EntranceOptionsValidated {
    type Error = &'static str;

    fn try_from(options: EntranceOptions) -> Result<Self, Self::Error> {
        let values = EntranceOptionsValidated {
            event_queue_capacity: options.event_queue_capacity.unwrap_or(20),
            key_prefix: options.key_prefix.unwrap_or_else(|| "/entrance".to_string()),
            pool_lock_ttl: options.pool_lock_ttl.unwrap_or(Duration::from_secs(60)),
            update_lock_ttl: options.update_lock_ttl.unwrap_or(Duration::from_secs(20)),
            lock_attempts: options.lock_attempts.unwrap_or(3),
            plugin_retry_attempts: options.plugin_retry_attempts.unwrap_or(3),
            plugin_retry_backoff: options
                .plugin_retry_backoff
                .unwrap_or(Backoff::Fixed(Duration::from_millis(10))),
            https_listen_port: options.https_listen_port.unwrap_or(10443),
        };

        values.validate()?;
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = EntranceOptionsValidated::try_from(EntranceOptions::default()).unwrap();

        assert_eq!(options.event_queue_capacity, 20);
        assert_eq!(options.key_prefix, "/entrance");
        assert_eq!(options.pool_lock_ttl, Duration::from_secs(60));
        assert_eq!(options.lock_attempts, 3);
        assert_eq!(options.plugin_retry_attempts, 3);
        assert_eq!(options.plugin_retry_backoff, Backoff::Fixed(Duration::from_millis(10)));
        assert_eq!(options.https_listen_port, 10443);
    }

    #[test]
    fn rejects_illegal_values() {
        let cases = vec![
            EntranceOptions {
                event_queue_capacity: Some(0),
                ..EntranceOptions::default()
            },
            EntranceOptions {
                key_prefix: Some("entrance".to_string()),
                ..EntranceOptions::default()
            },
            EntranceOptions {
                pool_lock_ttl: Some(Duration::from_millis(500)),
                ..EntranceOptions::default()
            },
            EntranceOptions {
                plugin_retry_attempts: Some(0),
                ..EntranceOptions::default()
            },
            EntranceOptions {
                plugin_retry_backoff: Some(Backoff::Exponential {
                    initial: Duration::from_secs(2),
                    max: Duration::from_secs(1),
                }),
                ..EntranceOptions::default()
            },
        ];

        for options in cases {
            assert!(EntranceOptionsValidated::try_from(options).is_err());
        }
    }
}
