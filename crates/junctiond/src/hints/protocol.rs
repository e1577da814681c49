//! Hint wire format.
//!
//! A hint is a line of whitespace-separated tokens announcing which of the
//! publisher's approaches are flowing:
//!
//! ```text
//! baseline:  <n> <e> <s> <w>              e.g. "0 1 0 1"
//! signed:    <publisher> <n> <e> <s> <w>  e.g. "2 0 1 0 1"
//! ```
//!
//! Each bit token is `0` or `1`. In signed mode the reader rejects any record
//! whose publisher token is not the id of the junction owning the slot.

use junction_common::{Flow, JunctionError, JunctionId, Protections};

/// Layout of hint records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintMode {
    /// Four bare flow bits
    Baseline,
    /// Publisher id followed by four flow bits
    Signed,
}

impl HintMode {
    fn token_count(self) -> usize {
        match self {
            Self::Baseline => 4,
            Self::Signed => 5,
        }
    }
}

impl From<&Protections> for HintMode {
    fn from(protections: &Protections) -> Self {
        if protections.repudiation {
            Self::Signed
        } else {
            Self::Baseline
        }
    }
}

/// Render `flow` as the record `publisher` writes to its own slot
pub fn encode(flow: &Flow, mode: HintMode, publisher: JunctionId) -> String {
    let bits = flow
        .bits()
        .map(|moving| if moving { "1" } else { "0" })
        .join(" ");

    match mode {
        HintMode::Baseline => bits,
        HintMode::Signed => format!("{} {}", publisher, bits),
    }
}

/// Parse the record read from `expected`'s slot
pub fn decode(raw: &str, mode: HintMode, expected: JunctionId) -> Result<Flow, JunctionError> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    if tokens.len() != mode.token_count() {
        return Err(JunctionError::MalformedHint {
            junction: expected,
            reason: format!(
                "expected {} tokens, got {}",
                mode.token_count(),
                tokens.len()
            ),
        });
    }

    let bit_tokens = match mode {
        HintMode::Baseline => &tokens[..],
        HintMode::Signed => {
            let publisher = tokens[0];
            if publisher != expected.to_string() {
                return Err(JunctionError::InvalidSignature {
                    expected,
                    found: publisher.to_string(),
                });
            }
            &tokens[1..]
        }
    };

    let mut bits = [false; 4];
    for (bit, token) in bits.iter_mut().zip(bit_tokens) {
        *bit = match *token {
            "1" => true,
            "0" => false,
            other => {
                return Err(JunctionError::MalformedHint {
                    junction: expected,
                    reason: format!("invalid flow bit {:?}", other),
                });
            }
        };
    }

    Ok(Flow::from(bits))
}
