//! Layered auto-decode engine.
//!
//! ```
//! use peel::engine::{Engine, TerminalReason};
//!
//! let outcome = Engine::default().decode_auto("SGVsbG8sIFdvcmxkIQ==");
//! assert_eq!(outcome.value.to_string(), "Hello, World!");
//! assert_eq!(outcome.chain, ["Base64"]);
//! assert_eq!(outcome.reason, TerminalReason::Success);
//! ```
//!
//! # Session lifecycle
//! Each call builds a [`Session`] holding the current value, the chain and
//! a [`ProgressGuard`].  The session is a state machine:
//!
//! ```text
//! Scanning ──layer accepted──▶ Applying ──depth left──▶ Scanning
//!    │                             └──depth used up──▶ Terminated(MaxDepthReached)
//!    └──nothing accepted──▶ Terminated(Success | NoProgress)
//! ```
//!
//! Sessions share nothing but the immutable registry, so any number of
//! them can run concurrently.

use serde::Serialize;
use std::fmt;
use tracing::info;

use crate::codec::{builtin_registry, Codec, CodecDescriptor, CodecId, DecodeError};
use crate::config::EngineConfig;
use crate::payload::Payload;

pub mod guard;
pub mod selector;

pub use guard::{AttemptKey, Fingerprint, ProgressGuard};
use selector::{select, Selection};

// ── Outcome ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    /// At least one layer was removed and nothing further applies.
    Success,
    /// Not a single layer could be removed.
    NoProgress,
    /// The depth cap stopped a session that was still making progress.
    MaxDepthReached,
}

impl fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TerminalReason::Success         => "success",
            TerminalReason::NoProgress      => "no recognizable encoding",
            TerminalReason::MaxDepthReached => "stopped at maximum depth",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeOutcome {
    /// Final value, never truncated.
    pub value:       Payload,
    pub chain:       Vec<&'static str>,
    pub reason:      TerminalReason,
    /// Codec invocations spent by the session.
    pub invocations: usize,
}

// ── Session ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Scanning,
    Terminated(TerminalReason),
}

pub struct Session<'r> {
    registry:        &'r [&'r dyn Codec],
    max_depth:       usize,
    max_output_size: usize,
    current:         Payload,
    chain:           Vec<&'static str>,
    guard:           ProgressGuard,
    state:           State,
}

impl<'r> Session<'r> {
    pub fn new(registry: &'r [&'r dyn Codec], input: Payload, max_depth: usize, max_output_size: usize) -> Self {
        let state = if max_depth == 0 {
            State::Terminated(TerminalReason::MaxDepthReached)
        } else {
            State::Scanning
        };
        Self {
            registry,
            max_depth,
            max_output_size,
            guard: ProgressGuard::new(&input),
            current: input,
            chain: Vec::new(),
            state,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn current(&self) -> &Payload {
        &self.current
    }

    pub fn chain(&self) -> &[&'static str] {
        &self.chain
    }

    /// Run one Scanning round.  Terminal states are final: stepping a
    /// terminated session is a no-op.
    pub fn step(&mut self) -> State {
        if self.state != State::Scanning {
            return self.state;
        }

        self.state = match select(self.registry, &self.current, &mut self.guard, self.max_output_size) {
            Selection::Applied { codec, value } => {
                self.apply(codec, value);
                if self.chain.len() >= self.max_depth {
                    State::Terminated(TerminalReason::MaxDepthReached)
                } else {
                    State::Scanning
                }
            }
            Selection::NoProgress if self.chain.is_empty() => State::Terminated(TerminalReason::NoProgress),
            Selection::NoProgress => State::Terminated(TerminalReason::Success),
        };
        self.state
    }

    fn apply(&mut self, codec: &'static str, value: Payload) {
        self.current = value;
        self.chain.push(codec);
    }

    pub fn run(mut self) -> DecodeOutcome {
        let reason = loop {
            if let State::Terminated(reason) = self.step() {
                break reason;
            }
        };
        info!(
            %reason,
            layers = self.chain.len(),
            invocations = self.guard.invocations(),
            "decode session finished"
        );
        DecodeOutcome {
            value: self.current,
            chain: self.chain,
            reason,
            invocations: self.guard.invocations(),
        }
    }
}

// ── Engine ───────────────────────────────────────────────────────────────────

/// Registry plus limits.  Cheap to copy around; holds no per-call state.
#[derive(Clone, Copy)]
pub struct Engine<'r> {
    registry: &'r [&'r dyn Codec],
    config:   EngineConfig,
}

impl Default for Engine<'static> {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine<'static> {
    /// Engine over the built-in registry.
    pub fn new(config: EngineConfig) -> Self {
        Self { registry: builtin_registry(), config }
    }
}

impl<'r> Engine<'r> {
    /// Engine over a caller-supplied registry.  Slice order is priority and
    /// codec names must be unique within it.
    pub fn with_registry(registry: &'r [&'r dyn Codec], config: EngineConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn list_codecs(&self) -> Vec<CodecDescriptor> {
        self.registry.iter().map(|c| c.descriptor()).collect()
    }

    pub fn decode_auto(&self, input: impl Into<Payload>) -> DecodeOutcome {
        Session::new(self.registry, input.into(), self.config.max_depth, self.config.max_output_size).run()
    }

    /// Apply one codec from this engine's registry, looked up by name.
    pub fn decode_single(&self, codec_id: &str, input: &Payload) -> Result<Payload, DecodeError> {
        self.find(codec_id)
            .ok_or_else(|| DecodeError::UnknownCodec(codec_id.to_owned()))?
            .decode(input, self.config.max_output_size)
    }

    fn find(&self, codec_id: &str) -> Option<&'r dyn Codec> {
        let canonical = CodecId::from_name(codec_id).map(CodecId::name);
        self.registry
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(codec_id) || Some(c.name()) == canonical)
    }

    /// Decode independent inputs.  With the `parallel` feature the work is
    /// spread over the Rayon pool; results keep input order either way.
    pub fn decode_batch(&self, inputs: Vec<Payload>) -> Vec<DecodeOutcome> {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            inputs.into_par_iter().map(|input| self.decode_auto(input)).collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            inputs.into_iter().map(|input| self.decode_auto(input)).collect()
        }
    }
}

/// One-shot auto-decode over the built-in registry.
pub fn decode_auto(input: impl Into<Payload>, max_depth: usize, max_output_size: usize) -> DecodeOutcome {
    Session::new(builtin_registry(), input.into(), max_depth, max_output_size).run()
}
