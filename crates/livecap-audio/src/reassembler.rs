//! Sample reassembly on the consumer side.
//!
//! The transport delivers raw byte deltas whose boundaries are arbitrary:
//! a poll can split a 2-byte canonical sample in half. The reassembler
//! carries the dangling byte across polls so the speech engine only ever
//! sees whole samples — an odd-length residual reaching the engine would
//! desynchronize sample boundaries for the rest of the session.

/// Carries at most one pending byte between polls.
#[derive(Debug, Default)]
pub struct SampleReassembler {
    carry: Option<u8>,
}

impl SampleReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a byte delta into whole canonical samples, holding back a
    /// trailing half-sample byte if the combined length is odd.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<i16> {
        if bytes.is_empty() && self.carry.is_none() {
            return Vec::new();
        }

        let mut joined: Vec<u8>;
        let data: &[u8] = match self.carry.take() {
            Some(pending) => {
                joined = Vec::with_capacity(bytes.len() + 1);
                joined.push(pending);
                joined.extend_from_slice(bytes);
                &joined
            }
            None => bytes,
        };

        let whole = data.len() & !1;
        if data.len() != whole {
            self.carry = Some(data[data.len() - 1]);
        }

        data[..whole]
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }

    pub fn has_carry(&self) -> bool {
        self.carry.is_some()
    }

    /// Drop any pending byte; used at session teardown.
    pub fn reset(&mut self) {
        self.carry = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn le_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn even_delta_passes_through() {
        let mut r = SampleReassembler::new();
        let out = r.push(&le_bytes(&[100, -200, 300]));
        assert_eq!(out, vec![100, -200, 300]);
        assert!(!r.has_carry());
    }

    #[test]
    fn odd_delta_carries_the_tail_byte() {
        let mut r = SampleReassembler::new();
        let bytes = le_bytes(&[0x1234, 0x5678]);

        let first = r.push(&bytes[..3]);
        assert_eq!(first, vec![0x1234]);
        assert!(r.has_carry());

        let second = r.push(&bytes[3..]);
        assert_eq!(second, vec![0x5678]);
        assert!(!r.has_carry());
    }

    #[test]
    fn reassembly_is_invariant_under_split_boundaries() {
        // The same byte stream split at any set of boundaries must yield
        // the same sample sequence as one unsplit read.
        let samples: Vec<i16> = (0..257).map(|i| (i * 131 - 16384) as i16).collect();
        let bytes = le_bytes(&samples);

        let mut unsplit = SampleReassembler::new();
        let reference = unsplit.push(&bytes);
        assert_eq!(reference, samples);

        for splits in [vec![1], vec![3, 7, 8], vec![1, 1, 1, 5, 2], vec![513]] {
            let mut r = SampleReassembler::new();
            let mut out = Vec::new();
            let mut rest: &[u8] = &bytes;
            for s in splits {
                let cut = s.min(rest.len());
                out.extend(r.push(&rest[..cut]));
                rest = &rest[cut..];
            }
            out.extend(r.push(rest));
            assert_eq!(out, reference);
            assert!(!r.has_carry());
        }
    }

    #[test]
    fn single_byte_polls_still_reconstruct() {
        let samples = vec![-1i16, 32767, -32768];
        let bytes = le_bytes(&samples);
        let mut r = SampleReassembler::new();
        let mut out = Vec::new();
        for b in &bytes {
            out.extend(r.push(std::slice::from_ref(b)));
        }
        assert_eq!(out, samples);
    }

    #[test]
    fn reset_drops_pending_byte() {
        let mut r = SampleReassembler::new();
        r.push(&[0xAB]);
        assert!(r.has_carry());
        r.reset();
        assert!(!r.has_carry());
        assert!(r.push(&[]).is_empty());
    }
}
