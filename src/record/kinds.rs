//! Closed enumerations carried by an [`EventRecord`](super::EventRecord).
//!
//! Each enum parses case-insensitively from either its short form (`DOMAIN`)
//! or its wire form (`EVENT_DOMAIN`). Strict parsing goes through [`FromStr`];
//! [`parse_lossy`](EventType::parse_lossy) falls back to the default variant.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Unknown variant name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {field} {value:?}")]
pub struct ParseKindError {
    /// Which field failed to parse.
    pub field: &'static str,
    /// The rejected input.
    pub value: String,
}

macro_rules! closed_kind {
    (
        $(#[$meta:meta])*
        $name:ident, field = $field:literal, prefix = $prefix:literal, default = $default:ident,
        { $($(#[$vmeta:meta])* $variant:ident => $short:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $short)]
                $variant,
            )+
        }

        impl $name {
            /// Wire form, e.g. `EVENT_DOMAIN`.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $short,)+
                }
            }

            /// Parses `value`, falling back to the default variant on unknown input.
            pub fn parse_lossy(value: &str) -> Self {
                value.parse().unwrap_or(Self::$default)
            }
        }

        impl FromStr for $name {
            type Err = ParseKindError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let upper = s.trim().to_ascii_uppercase();
                let short = upper.strip_prefix($prefix).unwrap_or(upper.as_str());
                $(
                    if short == &$short[$prefix.len()..] {
                        return Ok($name::$variant);
                    }
                )+
                Err(ParseKindError { field: $field, value: s.to_string() })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

closed_kind! {
    /// Whether an event stays inside a bounded context or crosses services.
    EventType, field = "event type", prefix = "EVENT_", default = Domain,
    {
        #[default]
        Domain => "EVENT_DOMAIN",
        Integration => "EVENT_INTEGRATION",
    }
}

closed_kind! {
    /// Delivery priority.
    Priority, field = "priority", prefix = "PRIORITY_", default = Low,
    {
        #[default]
        Low => "PRIORITY_LOW",
        Mid => "PRIORITY_MID",
        High => "PRIORITY_HIGH",
    }
}

closed_kind! {
    /// Message broker the event travels through.
    Provider, field = "provider", prefix = "PROVIDER_", default = Kafka,
    {
        #[default]
        Kafka => "PROVIDER_KAFKA",
        RabbitMq => "PROVIDER_RABBITMQ",
        Nats => "PROVIDER_NATS",
        Aws => "PROVIDER_AWS",
    }
}
