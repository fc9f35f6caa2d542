//! The localecho agent — turns one utterance into one answer.
//!
//! An utterance is first offered to the [`FastPathTable`], whose
//! deterministic rules answer common requests through a single tool call.
//! Anything else goes to the [`Orchestrator`]'s bounded reasoning loop:
//!
//! 1. **Build context** (system prompt + tool schema + recalled notes + history)
//! 2. **Send to the model** via the configured provider
//! 3. **If the reply holds a `Tool:` call**: run it, append the observation, loop
//! 4. **Otherwise**: the reply is the answer
//!
//! The loop stops at the first plain-text reply or after `max_turns` turns.

pub mod fast_path;
pub mod orchestrator;
pub mod parser;
pub mod prompt;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use fast_path::{FastPathHit, FastPathRule, FastPathTable};
pub use orchestrator::Orchestrator;
pub use parser::{ParsedOutput, final_answer, parse_output};
