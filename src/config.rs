//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the consumer server, the
//! broker and the ID generator.
//!
//! Config is used in three ways:
//! 1. **Server creation**: `Server::new(config)`
//! 2. **Consumer defaults**: `Consumer::with_defaults(name, sub, handler, &config)`
//! 3. **Broker/ID setup**: `Broker::new(config.id_generator())`
//!
//! ## Loading
//! [`Config::load`] merges, in order: defaults, an optional TOML file, and
//! `EVENTVISOR_*` environment variables (e.g. `EVENTVISOR_MAX_HANDLERS=8`).
//!
//! ## Sentinel values
//! - `grace = 0s` → wait for drain indefinitely (no grace timeout)
//! - `machine_id = None` → random machine id per generator
//! - `stream_keepalive = 0s` → keep-alive frames disabled

use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ids::Sonyflake;
use crate::record::{EventRecord, EventRecordBuilder};

/// Environment prefix for overrides.
pub const ENV_PREFIX: &str = "EVENTVISOR_";

/// Global configuration for the eventvisor runtime.
///
/// ## Field semantics
/// - `max_handlers`: default per-subscription handler cap (min 1)
/// - `bus_capacity`: lifecycle bus ring buffer size (min 1)
/// - `grace`: upper bound for the server drain (`0s` = unbounded)
/// - `service_name`: default source tag for event records
/// - `machine_id`: Sonyflake machine id (`None` = random)
/// - `stream_keepalive`: SSE keep-alive interval (`0s` = disabled)
/// - `kafka_brokers`: broker endpoints handed to the transport layer
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default maximum number of concurrently running handlers per consumer.
    pub max_handlers: usize,

    /// Capacity of the lifecycle bus broadcast channel ring buffer.
    ///
    /// Slow listeners that lag behind more than `bus_capacity` events skip
    /// older items.
    pub bus_capacity: usize,

    /// Maximum time to wait for all consumers to drain after shutdown.
    #[serde(with = "duration_secs")]
    pub grace: Duration,

    /// Service name stamped on event records created through [`Config::record`].
    pub service_name: String,

    /// Machine id for the distributed ID generator.
    pub machine_id: Option<u16>,

    /// Keep-alive interval for server-sent event streams.
    #[serde(with = "duration_secs")]
    pub stream_keepalive: Duration,

    /// Message broker endpoints (consumed by the transport, not by the engine).
    pub kafka_brokers: Vec<String>,
}

impl Config {
    /// Loads configuration from defaults, an optional TOML file and the environment.
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        let cfg: Config = figment.merge(Env::prefixed(ENV_PREFIX)).extract()?;
        Ok(cfg)
    }

    /// Returns the handler cap clamped to a minimum of 1.
    #[inline]
    pub fn max_handlers_clamped(&self) -> usize {
        self.max_handlers.max(1)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the drain grace period as an `Option`.
    ///
    /// - `None` → wait indefinitely
    /// - `Some(d)` → give up after `d`
    #[inline]
    pub fn grace_period(&self) -> Option<Duration> {
        if self.grace == Duration::ZERO {
            None
        } else {
            Some(self.grace)
        }
    }

    /// Returns the SSE keep-alive interval as an `Option`.
    #[inline]
    pub fn keepalive(&self) -> Option<Duration> {
        if self.stream_keepalive == Duration::ZERO {
            None
        } else {
            Some(self.stream_keepalive)
        }
    }

    /// Comma-joined broker list, as expected by `KAFKA_BROKERS`-style settings.
    pub fn kafka_broker_list(&self) -> String {
        self.kafka_brokers.join(",")
    }

    /// Starts an event record stamped with the configured service name.
    pub fn record(&self, content: Vec<u8>) -> EventRecordBuilder {
        EventRecord::builder(&self.service_name, content)
    }

    /// Builds a Sonyflake generator using the configured machine id.
    pub fn id_generator(&self) -> Sonyflake {
        match self.machine_id {
            Some(id) => Sonyflake::with_machine_id(id),
            None => Sonyflake::new(),
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `max_handlers = 10`
    /// - `bus_capacity = 1024`
    /// - `grace = 0s` (unbounded drain)
    /// - `service_name = "EXAMPLE-SERVICE"`
    /// - `machine_id = None`
    /// - `stream_keepalive = 15s`
    /// - `kafka_brokers = ["0.0.0.0:9092"]`
    fn default() -> Self {
        Self {
            max_handlers: 10,
            bus_capacity: 1024,
            grace: Duration::ZERO,
            service_name: "EXAMPLE-SERVICE".to_string(),
            machine_id: None,
            stream_keepalive: Duration::from_secs(15),
            kafka_brokers: vec!["0.0.0.0:9092".to_string()],
        }
    }
}

/// Durations are written as whole seconds in files and env vars.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_unbounded_grace() {
        let cfg = Config::default();
        assert_eq!(cfg.grace_period(), None);
        assert_eq!(cfg.max_handlers_clamped(), 10);
        assert_eq!(cfg.keepalive(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn records_carry_service_name() {
        let cfg = Config {
            service_name: "billing".to_string(),
            ..Config::default()
        };
        let record = cfg.record(b"{}".to_vec()).build();
        assert_eq!(record.service_name(), "BILLING");
        assert_eq!(record.content(), b"{}");
    }

    #[test]
    fn zero_values_are_clamped() {
        let cfg = Config {
            max_handlers: 0,
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.max_handlers_clamped(), 1);
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }

    #[test]
    fn kafka_brokers_are_comma_joined() {
        let cfg = Config {
            kafka_brokers: vec!["a:9092".into(), "b:9092".into(), "c:9092".into()],
            ..Config::default()
        };
        assert_eq!(cfg.kafka_broker_list(), "a:9092,b:9092,c:9092");
    }

    #[test]
    fn load_merges_toml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "eventvisor.toml",
                "max_handlers = 4\ngrace = 30\nservice_name = \"MEDIA\"\nmachine_id = 7",
            )?;
            let cfg = Config::load(Some(Path::new("eventvisor.toml"))).expect("load");
            assert_eq!(cfg.max_handlers, 4);
            assert_eq!(cfg.grace_period(), Some(Duration::from_secs(30)));
            assert_eq!(cfg.service_name, "MEDIA");
            assert_eq!(cfg.machine_id, Some(7));
            assert_eq!(cfg.bus_capacity, 1024);
            Ok(())
        });
    }

    #[test]
    fn load_without_file_uses_defaults() {
        figment::Jail::expect_with(|_jail| {
            let cfg = Config::load(None).expect("defaults load");
            assert_eq!(cfg.max_handlers, 10);
            Ok(())
        });
    }

    #[test]
    fn env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("eventvisor.toml", "max_handlers = 4")?;
            jail.set_env("EVENTVISOR_MAX_HANDLERS", "16");
            let cfg = Config::load(Some(Path::new("eventvisor.toml"))).expect("load");
            assert_eq!(cfg.max_handlers, 16);
            Ok(())
        });
    }
}
