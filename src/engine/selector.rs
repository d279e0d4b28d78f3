//! Candidate selector: one greedy round over the registry.

use tracing::{debug, trace};

use super::guard::{fingerprint, AttemptKey, ProgressGuard};
use crate::codec::{Codec, DecodeError};
use crate::payload::Payload;

/// Result of one selector round.
#[derive(Debug)]
pub enum Selection {
    Applied { codec: &'static str, value: Payload },
    NoProgress,
}

/// Why a successful decode was still not taken.
#[derive(Debug)]
pub enum Rejection {
    Failed(DecodeError),
    Empty,
    Unchanged,
    TooLarge(usize),
    Implausible,
    Cycle,
}

/// Run the acceptance checks on one codec's result.
fn judge(
    codec:           &dyn Codec,
    input:           &Payload,
    result:          Result<Payload, DecodeError>,
    guard:           &ProgressGuard,
    max_output_size: usize,
) -> Result<Payload, Rejection> {
    let output = result.map_err(Rejection::Failed)?;
    if output.trimmed().is_empty() {
        return Err(Rejection::Empty);
    }
    if output.trimmed() == input.trimmed() {
        return Err(Rejection::Unchanged);
    }
    if output.len() >= max_output_size {
        return Err(Rejection::TooLarge(output.len()));
    }
    if !codec.plausible(input, &output) {
        return Err(Rejection::Implausible);
    }
    if guard.seen_value(&fingerprint(&output)) {
        return Err(Rejection::Cycle);
    }
    Ok(output)
}

/// Try codecs in registry order against `current` and return the first
/// accepted output.  Every attempted key is marked visited in `guard`,
/// whether or not it succeeded.
pub fn select(
    registry:        &[&dyn Codec],
    current:         &Payload,
    guard:           &mut ProgressGuard,
    max_output_size: usize,
) -> Selection {
    let fp = fingerprint(current);

    for codec in registry {
        let key = AttemptKey { codec: codec.name(), fingerprint: fp };
        if !guard.begin(key) {
            trace!(codec = key.codec, "already attempted, skipping");
            continue;
        }

        let result = codec.decode(current, max_output_size);
        match judge(*codec, current, result, guard, max_output_size) {
            Ok(value) => {
                debug!(codec = key.codec, len = value.len(), text = value.is_text(), "layer accepted");
                guard.hold(fingerprint(&value));
                return Selection::Applied { codec: key.codec, value };
            }
            Err(Rejection::Failed(e)) if e.is_size_limit() => {
                debug!(codec = key.codec, error = %e, "size limit tripped");
            }
            Err(reason) => {
                trace!(codec = key.codec, ?reason, "candidate rejected");
            }
        }
    }
    Selection::NoProgress
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::builtin_registry;

    #[test]
    fn first_acceptable_codec_wins() {
        let input = Payload::from("SGVsbG8sIFdvcmxkIQ==");
        let mut guard = ProgressGuard::new(&input);
        match select(builtin_registry(), &input, &mut guard, 1 << 20) {
            Selection::Applied { codec, value } => {
                assert_eq!(codec, "Base64");
                assert_eq!(value, Payload::from("Hello, World!"));
            }
            Selection::NoProgress => panic!("expected a layer"),
        }
        // Base64+Zlib failed first, then Base64 succeeded.
        assert_eq!(guard.invocations(), 2);
    }

    #[test]
    fn second_round_on_same_value_invokes_nothing() {
        let input = Payload::from("hello world");
        let mut guard = ProgressGuard::new(&input);
        assert!(matches!(select(builtin_registry(), &input, &mut guard, 1 << 20), Selection::NoProgress));
        let first = guard.invocations();
        assert_eq!(first, builtin_registry().len());
        assert!(matches!(select(builtin_registry(), &input, &mut guard, 1 << 20), Selection::NoProgress));
        assert_eq!(guard.invocations(), first);
    }
}
