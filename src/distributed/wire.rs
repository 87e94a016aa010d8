use crate::error::{OptimisationError, Result};
use crate::problem::Evaluation;

/// Size of the fixed part of an encoded sample: stop flag, two values and the
/// parameter length.
const HEADER_LENGTH: usize = 1 + 8 + 8 + 8;

/// One node's contribution to a reduction.
///
/// Encoded by hand rather than as JSON because the incumbent of a node that
/// has not evaluated anything yet is `(+inf, +inf)`. Layout, little-endian:
/// `u8` stop flag, `f64` soft-constraints value, `f64` objective value, `u64`
/// parameter length, then the parameter's `f64` elements.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Sample {
    pub(crate) wants_to_stop: bool,
    pub(crate) evaluation: Evaluation,
    pub(crate) parameter: Vec<f64>,
}

impl Sample {
    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LENGTH + 8 * self.parameter.len());
        bytes.push(u8::from(self.wants_to_stop));
        bytes.extend_from_slice(&self.evaluation.soft_constraints_value.to_le_bytes());
        bytes.extend_from_slice(&self.evaluation.objective_value.to_le_bytes());
        bytes.extend_from_slice(&(self.parameter.len() as u64).to_le_bytes());
        for value in &self.parameter {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LENGTH {
            return Err(malformed(format!(
                "{} bytes are too short for a sample",
                bytes.len()
            )));
        }

        let wants_to_stop = match bytes[0] {
            0 => false,
            1 => true,
            flag => return Err(malformed(format!("invalid stop flag {}", flag))),
        };
        let soft_constraints_value = f64::from_le_bytes(word(&bytes[1..9]));
        let objective_value = f64::from_le_bytes(word(&bytes[9..17]));
        let length = u64::from_le_bytes(word(&bytes[17..25]));

        let payload = &bytes[HEADER_LENGTH..];
        let expected = usize::try_from(length).ok().and_then(|l| l.checked_mul(8));
        if expected != Some(payload.len()) {
            return Err(malformed(format!(
                "announced {} parameter elements but carries {} bytes",
                length,
                payload.len()
            )));
        }

        let parameter = payload
            .chunks_exact(8)
            .map(|chunk| f64::from_le_bytes(word(chunk)))
            .collect();
        Ok(Self {
            wants_to_stop,
            evaluation: Evaluation::new(objective_value, soft_constraints_value),
            parameter,
        })
    }
}

fn word(bytes: &[u8]) -> [u8; 8] {
    let mut word = [0; 8];
    word.copy_from_slice(bytes);
    word
}

fn malformed(reason: String) -> OptimisationError {
    OptimisationError::Communication(format!("Malformed sample: {}", reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_incumbent_survives_the_wire() {
        let sample = Sample {
            wants_to_stop: true,
            evaluation: Evaluation::new(f64::INFINITY, f64::INFINITY),
            parameter: Vec::new(),
        };
        let bytes = sample.encode();
        assert_eq!(bytes.len(), HEADER_LENGTH);
        assert_eq!(Sample::decode(&bytes).unwrap(), sample);
    }

    #[test]
    fn test_layout_is_little_endian() {
        let sample = Sample {
            wants_to_stop: false,
            evaluation: Evaluation::new(2.0, 0.0),
            parameter: vec![1.0],
        };
        let bytes = sample.encode();
        assert_eq!(bytes[0], 0);
        assert_eq!(&bytes[9..17], &2f64.to_le_bytes());
        assert_eq!(&bytes[17..25], &1u64.to_le_bytes());
        assert_eq!(&bytes[25..], &1f64.to_le_bytes());
    }

    #[test]
    fn test_truncated_sample_is_rejected() {
        let sample = Sample {
            wants_to_stop: false,
            evaluation: Evaluation::new(1.0, 0.0),
            parameter: vec![1.0, 2.0],
        };
        let bytes = sample.encode();
        let error = Sample::decode(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(error, OptimisationError::Communication(_)));
        assert!(Sample::decode(&bytes[..10]).is_err());
    }

    #[test]
    fn test_invalid_stop_flag_is_rejected() {
        let mut bytes = Sample {
            wants_to_stop: false,
            evaluation: Evaluation::new(1.0, 0.0),
            parameter: Vec::new(),
        }
        .encode();
        bytes[0] = 7;
        assert!(Sample::decode(&bytes).is_err());
    }
}
