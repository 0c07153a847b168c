// ============================================================
// Layer 3 — Example Domain Type
// ============================================================
// One labelled, tokenised and padded sentence.
//
//   token_ids: [t0, t1, t2, 0, 0]     ← padded to max_seq_len
//   mask:      [ 1,  1,  1, 0, 0]     ← 1 = real token, 0 = padding
//   label:     1
//
// Immutable once constructed: fields are private and only
// exposed through accessors, so a validated Example can never
// drift into an inconsistent shape.

use serde::{Deserialize, Serialize};

use crate::domain::error::RationaleError;

/// Token id reserved for padding positions.
pub const PAD_ID: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    token_ids: Vec<u32>,
    mask:      Vec<u32>,
    label:     usize,
}

impl Example {
    /// Validate and build an Example.
    ///
    /// The mask must have the same length as `token_ids`, contain only
    /// 0/1 values laid out as a prefix of ones followed by zeros, and
    /// mark at least one real token.
    pub fn new(token_ids: Vec<u32>, mask: Vec<u32>, label: usize) -> Result<Self, RationaleError> {
        if token_ids.len() != mask.len() {
            return Err(RationaleError::shape(format!(
                "token sequence has {} positions but mask has {}",
                token_ids.len(),
                mask.len()
            )));
        }
        if mask.iter().any(|&m| m > 1) {
            return Err(RationaleError::shape("mask values must be 0 or 1"));
        }
        let valid = mask.iter().take_while(|&&m| m == 1).count();
        if valid == 0 {
            return Err(RationaleError::shape("example has no real tokens"));
        }
        if mask[valid..].iter().any(|&m| m != 0) {
            return Err(RationaleError::shape(
                "mask must be a prefix of ones followed by padding zeros",
            ));
        }
        Ok(Self { token_ids, mask, label })
    }

    /// Pad or truncate raw token ids to `max_len` and build the mask.
    pub fn from_tokens(mut ids: Vec<u32>, max_len: usize, label: usize) -> Result<Self, RationaleError> {
        ids.truncate(max_len);
        let valid = ids.len();
        ids.resize(max_len, PAD_ID);
        let mut mask = vec![1u32; valid];
        mask.resize(max_len, 0);
        Self::new(ids, mask, label)
    }

    pub fn token_ids(&self) -> &[u32] { &self.token_ids }

    pub fn mask(&self) -> &[u32] { &self.mask }

    pub fn label(&self) -> usize { self.label }

    /// Padded length (the same for every example of a dataset).
    pub fn padded_len(&self) -> usize { self.token_ids.len() }

    /// Number of real (non-padding) tokens.
    pub fn valid_len(&self) -> usize {
        self.mask.iter().filter(|&&m| m == 1).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tokens_pads_and_masks() {
        let ex = Example::from_tokens(vec![5, 6, 7], 5, 1).unwrap();
        assert_eq!(ex.token_ids(), &[5, 6, 7, 0, 0]);
        assert_eq!(ex.mask(), &[1, 1, 1, 0, 0]);
        assert_eq!(ex.valid_len(), 3);
        assert_eq!(ex.padded_len(), 5);
    }

    #[test]
    fn test_from_tokens_truncates() {
        let ex = Example::from_tokens(vec![1, 2, 3, 4, 5, 6], 4, 0).unwrap();
        assert_eq!(ex.token_ids(), &[1, 2, 3, 4]);
        assert_eq!(ex.valid_len(), 4);
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let err = Example::new(vec![1, 2, 3], vec![1, 1], 0).unwrap_err();
        assert!(matches!(err, RationaleError::InputShape(_)));
    }

    #[test]
    fn test_empty_example_rejected() {
        assert!(Example::from_tokens(vec![], 4, 0).is_err());
    }

    #[test]
    fn test_holes_in_mask_rejected() {
        assert!(Example::new(vec![1, 2, 3], vec![1, 0, 1], 0).is_err());
        assert!(Example::new(vec![1, 2, 3], vec![1, 2, 0], 0).is_err());
    }
}
