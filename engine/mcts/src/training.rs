//! Training samples produced by self-play.
//!
//! Binary layout (little endian):
//! * u32 state length, then the state bytes
//! * u32 policy length, then one f32 per action
//! * f32 value

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors decoding a [`TrainingData`] record.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("record truncated: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("{0} trailing bytes after record")]
    TrailingBytes(usize),
}

/// One (state, search distribution, outcome) sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingData {
    /// State as seen by the player to move
    pub state: Vec<u8>,
    /// Action distribution the search produced for that state
    pub policy: Vec<f32>,
    /// Final outcome for the player to move: +1 win, -1 loss, 0 draw
    pub value: f32,
}

impl TrainingData {
    pub fn new(state: Vec<u8>, policy: Vec<f32>, value: f32) -> Self {
        Self {
            state,
            policy,
            value,
        }
    }

    pub fn encoded_len(&self) -> usize {
        4 + self.state.len() + 4 + 4 * self.policy.len() + 4
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(&(self.state.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.state);
        out.extend_from_slice(&(self.policy.len() as u32).to_le_bytes());
        for p in &self.policy {
            out.extend_from_slice(&p.to_le_bytes());
        }
        out.extend_from_slice(&self.value.to_le_bytes());
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader { buf, offset: 0 };

        let state_len = reader.u32()? as usize;
        let state = reader.take(state_len)?.to_vec();

        let policy_len = reader.u32()? as usize;
        let policy = reader
            .take(policy_len.saturating_mul(4))?
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        let value = f32::from_le_bytes(reader.array()?);

        let rest = buf.len() - reader.offset;
        if rest != 0 {
            return Err(DecodeError::TrailingBytes(rest));
        }

        Ok(Self {
            state,
            policy,
            value,
        })
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, needed: usize) -> Result<&'a [u8], DecodeError> {
        let available = self.buf.len() - self.offset;
        if needed > available {
            return Err(DecodeError::Truncated {
                offset: self.offset,
                needed,
                available,
            });
        }
        let bytes = &self.buf[self.offset..self.offset + needed];
        self.offset += needed;
        Ok(bytes)
    }

    fn array(&mut self) -> Result<[u8; 4], DecodeError> {
        let bytes = self.take(4)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        self.array().map(u32::from_le_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip_is_exact() {
        let sample = TrainingData::new(
            vec![0, 1, 2, 0, 0, 1, 2, 2, 0],
            vec![0.1, 0.0, 0.0, 0.2, 0.7, 0.0, 0.0, 0.0, f32::MIN_POSITIVE],
            -1.0,
        );
        let bytes = sample.encode();
        assert_eq!(bytes.len(), sample.encoded_len());

        let decoded = TrainingData::decode(&bytes).unwrap();
        assert_eq!(decoded, sample);
        for (a, b) in decoded.policy.iter().zip(&sample.policy) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_decode_truncated() {
        let bytes = TrainingData::new(vec![1, 2], vec![1.0], 0.0).encode();
        let err = TrainingData::decode(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { needed: 4, .. }));
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut bytes = TrainingData::new(vec![], vec![], 1.0).encode();
        bytes.push(0);
        assert_eq!(
            TrainingData::decode(&bytes),
            Err(DecodeError::TrailingBytes(1))
        );
    }

    #[test]
    fn test_decode_huge_length_prefix() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            TrainingData::decode(&bytes),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn test_serde_json_roundtrip() {
        let sample = TrainingData::new(vec![2, 0, 1], vec![0.5, 0.25, 0.25], 0.0);
        let json = serde_json::to_string(&sample).unwrap();
        let back: TrainingData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample);
    }
}
