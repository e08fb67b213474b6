/// OPC UA quality, derived from the top two bits (31..30) of a 32-bit status word.
///
/// `00` => Good, `01` => Uncertain, `10`/`11` => Bad. Equality and hashing are
/// over the raw word, so two status words that map to the same category but
/// differ in their low bits are still distinct values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct OpcQuality(u32);

impl OpcQuality {
    pub fn from_status_word(word: u32) -> Self {
        Self(word)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }

    fn category(&self) -> u32 {
        self.0 >> 30
    }

    pub fn is_good(&self) -> bool {
        self.category() == 0
    }

    pub fn is_uncertain(&self) -> bool {
        self.category() == 1
    }

    pub fn is_bad(&self) -> bool {
        self.category() >= 2
    }
}

impl std::fmt::Display for OpcQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = if self.is_good() {
            "Good"
        } else if self.is_uncertain() {
            "Uncertain"
        } else {
            "Bad"
        };
        write!(f, "{label}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn good_is_top_bits_zero() {
        let q = OpcQuality::from_status_word(0x0000_0000);
        assert!(q.is_good());
        assert!(!q.is_uncertain());
        assert!(!q.is_bad());
    }

    #[test]
    fn uncertain_is_top_bits_one() {
        let q = OpcQuality::from_status_word(0b0100_0000 << 24);
        assert!(q.is_uncertain());
        assert!(!q.is_good());
        assert!(!q.is_bad());
    }

    #[test]
    fn bad_covers_both_remaining_patterns() {
        let bad_10 = OpcQuality::from_status_word(0b1000_0000 << 24);
        let bad_11 = OpcQuality::from_status_word(0b1100_0000 << 24);
        assert!(bad_10.is_bad());
        assert!(bad_11.is_bad());
    }

    #[test]
    fn equality_and_hash_are_over_the_raw_word() {
        let a = OpcQuality::from_status_word(0x4000_0001);
        let b = OpcQuality::from_status_word(0x4000_0002);
        assert_ne!(a, b);
        assert!(a.is_uncertain() && b.is_uncertain());
    }

    #[test]
    fn quality_derivation_is_total_over_status_words() {
        for word in [0u32, 1, 0x3FFF_FFFF, 0x4000_0000, 0x7FFF_FFFF, 0x8000_0000, 0xFFFF_FFFF] {
            let q = OpcQuality::from_status_word(word);
            let top2 = word >> 30;
            assert_eq!(q.is_good(), top2 == 0);
            assert_eq!(q.is_uncertain(), top2 == 1);
            assert_eq!(q.is_bad(), top2 >= 2);
        }
    }
}
