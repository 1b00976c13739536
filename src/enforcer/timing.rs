//! The timing gate.
//!
//! A record that was published or withdrawn may only be considered
//! omnipresent or hidden once every cache in the world can be assumed to
//! have caught up. The [`Policy`] holds the delays and TTLs that determine
//! how long that takes.
use std::time::Duration;

use jiff::{Span, SpanRelativeTo};
use serde::{Deserialize, Serialize};

use crate::error::Error;

use super::key::{Record, RecordKind, RecordState, Timestamp};

/// Delays and TTLs of a zone and its parent.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Policy {
    /// Time for a change to reach all authoritative servers of the zone.
    #[serde(with = "duration")]
    pub zone_propagation_delay: Duration,

    /// The TTL of the signed zone data (the SOA minimum for negative
    /// answers included).
    #[serde(with = "duration")]
    pub zone_ttl: Duration,

    /// Time for a change to reach all authoritative servers of the parent.
    #[serde(with = "duration")]
    pub parent_propagation_delay: Duration,

    /// Time between submitting a DS and the parent publishing it.
    #[serde(with = "duration")]
    pub parent_registration_delay: Duration,

    /// The TTL of the DS RRset at the parent.
    #[serde(with = "duration")]
    pub ds_ttl: Duration,

    /// The TTL of the DNSKEY RRset.
    #[serde(with = "duration")]
    pub dnskey_ttl: Duration,

    /// Extra margin before a new DNSKEY counts as published.
    #[serde(with = "duration")]
    pub publish_safety: Duration,

    /// Extra margin before a withdrawn DNSKEY counts as gone.
    #[serde(with = "duration")]
    pub retire_safety: Duration,

    /// How long a fully withdrawn key lingers before it is purged.
    #[serde(with = "duration")]
    pub purge_delay: Duration,
}

impl Default for Policy {
    fn default() -> Self {
        const MINUTE: u64 = 60;
        const HOUR: u64 = 60 * MINUTE;
        Policy {
            zone_propagation_delay: Duration::from_secs(30 * MINUTE),
            zone_ttl: Duration::from_secs(15 * MINUTE),
            parent_propagation_delay: Duration::from_secs(30 * MINUTE),
            parent_registration_delay: Duration::from_secs(30 * MINUTE),
            ds_ttl: Duration::from_secs(HOUR),
            dnskey_ttl: Duration::from_secs(2 * HOUR),
            publish_safety: Duration::from_secs(30 * MINUTE),
            retire_safety: Duration::from_secs(30 * MINUTE),
            purge_delay: Duration::from_secs(30 * MINUTE),
        }
    }
}

impl Policy {
    /// A policy where every delay is zero.
    ///
    /// Every transition is then only held back by the rules.
    pub fn immediate() -> Self {
        Policy {
            zone_propagation_delay: Duration::ZERO,
            zone_ttl: Duration::ZERO,
            parent_propagation_delay: Duration::ZERO,
            parent_registration_delay: Duration::ZERO,
            ds_ttl: Duration::ZERO,
            dnskey_ttl: Duration::ZERO,
            publish_safety: Duration::ZERO,
            retire_safety: Duration::ZERO,
            purge_delay: Duration::ZERO,
        }
    }

    /// How long a record of `kind` must stay in its current state before
    /// it may move on to `target`.
    pub fn min_wait(&self, kind: RecordKind, target: RecordState) -> Duration {
        match kind {
            RecordKind::Ds => {
                self.ds_ttl + self.parent_propagation_delay + self.parent_registration_delay
            }
            RecordKind::RrsigData => self.zone_ttl + self.zone_propagation_delay,
            RecordKind::Dnskey | RecordKind::RrsigDnskey => {
                let safety = match target {
                    RecordState::Omnipresent => self.publish_safety,
                    _ => self.retire_safety,
                };
                self.dnskey_ttl + self.zone_propagation_delay + safety
            }
        }
    }

    /// The earliest time a record may move on to `target`.
    pub fn earliest_transition(
        &self,
        record: &Record,
        kind: RecordKind,
        target: RecordState,
    ) -> Timestamp {
        record
            .last_change
            .saturating_add(self.min_wait(kind, target).as_secs())
    }

    /// Whether enough time has passed for a record to move on to `target`.
    pub fn allows(
        &self,
        record: &Record,
        kind: RecordKind,
        target: RecordState,
        now: Timestamp,
    ) -> bool {
        now >= self.earliest_transition(record, kind, target)
    }

    /// The time at which a key that changed last at `last_change` may be
    /// purged.
    pub fn purge_time(&self, last_change: Timestamp) -> Timestamp {
        last_change.saturating_add(self.purge_delay.as_secs())
    }
}

/// Parse a duration such as `1h30m` or `2d`.
///
/// Days are taken to be 24 hours.
pub fn parse_duration(value: &str) -> Result<Duration, Error> {
    let span: Span = value
        .parse()
        .map_err(|e| format!("unable to parse {value} as duration: {e}"))?;
    let signeddur = span
        .to_duration(SpanRelativeTo::days_are_24_hours())
        .map_err(|e| format!("unable to convert duration: {e}"))?;
    Duration::try_from(signeddur).map_err(|e| format!("unable to convert duration: {e}").into())
}

/// Serde support for durations written as seconds or as a span string.
mod duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Seconds(u64),
        Span(String),
    }

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Seconds(secs) => Ok(Duration::from_secs(secs)),
            Repr::Span(span) => {
                super::parse_duration(&span).map_err(serde::de::Error::custom)
            }
        }
    }
}
