//! The key rollover enforcer.
//!
//! Every key contributes up to four records to a zone and its parent: the
//! DS, the DNSKEY, the signature over the DNSKEY RRset and the signatures
//! over the zone data. Each of these moves through the states hidden,
//! rumoured, omnipresent and unretentive independently. The enforcer
//! decides when a record may take its next step, such that a validating
//! resolver is able to validate the zone at every point in time, whatever
//! it happens to have in its cache.
//!
//! Driving the enforcer is a matter of calling [`enforce_step`] and then
//! calling it again at [`next_wakeup_time`].
mod audit;
mod collection;
mod key;
mod rules;
mod scheduler;
mod timing;

pub use self::audit::{audit, is_valid, Violation};
pub use self::collection::{KeyCollection, KeySnapshot, SignerFlags};
pub use self::key::{Goal, Key, KeyId, Record, RecordKind, RecordState, Roles, Timestamp};
pub use self::rules::{DnskeyRetraction, RuleOptions, Rules};
pub use self::scheduler::{enforce_step, next_wakeup_time, purge};
pub use self::timing::{parse_duration, Policy};
