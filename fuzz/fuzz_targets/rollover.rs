#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use keyroll::enforcer::{
    enforce_step, is_valid, next_wakeup_time, DnskeyRetraction, Goal, KeyCollection, Policy,
    RecordState, Roles, RuleOptions,
};

#[derive(Arbitrary, Debug)]
struct Input {
    immediate: bool,
    min_flux: bool,
    min_sig: bool,
    signatures_first: bool,
    actions: Vec<Action>,
}

#[derive(Arbitrary, Debug)]
enum Action {
    /// Introduce a new key.
    Add { role: u8, new_algorithm: bool },

    /// Change the goal of the n-th key.
    Flip { key: u8, hidden: bool },

    /// Jump to the next wakeup time.
    Wait,

    /// Jump ahead by some amount of seconds.
    Sleep(u16),
}

fuzz_target!(|input: Input| {
    let policy = if input.immediate {
        Policy::immediate()
    } else {
        Policy::default()
    };
    let options = RuleOptions {
        min_flux: input.min_flux,
        min_sig: input.min_sig,
        dnskey_retraction: if input.signatures_first {
            DnskeyRetraction::SignaturesFirst
        } else {
            DnskeyRetraction::Covered
        },
    };

    let mut keys = KeyCollection::new();
    keys.create_key("init", 8, Roles::CSK, Goal::Omnipresent, RecordState::Omnipresent)
        .unwrap();

    let mut now = 0;
    let mut added = 0;
    for action in input.actions.iter().take(64) {
        match *action {
            Action::Add {
                role,
                new_algorithm,
            } => {
                added += 1;
                let roles = match role % 3 {
                    0 => Roles::KSK,
                    1 => Roles::ZSK,
                    _ => Roles::CSK,
                };
                let algorithm = if new_algorithm { 13 } else { 8 };
                keys.create_key(
                    &format!("key{added}"),
                    algorithm,
                    roles,
                    Goal::Omnipresent,
                    RecordState::Hidden,
                )
                .unwrap();
            }
            Action::Flip { key, hidden } => {
                let ids = keys.ids();
                if !ids.is_empty() {
                    let goal = if hidden {
                        Goal::Hidden
                    } else {
                        Goal::Omnipresent
                    };
                    keys.set_goal(ids[usize::from(key) % ids.len()], goal)
                        .unwrap();
                }
            }
            Action::Wait => {
                if let Some(time) = next_wakeup_time(&keys, &policy, now) {
                    now = time;
                }
            }
            Action::Sleep(secs) => now += u64::from(secs),
        }

        enforce_step(&mut keys, &policy, &options, now).unwrap();
        assert!(is_valid(&keys), "unsafe state at {now}: {:?}", keys.snapshot());
    }
});
