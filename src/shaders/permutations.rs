use std::fmt;

use serde::Deserialize;

use crate::error::{Result, ShaderError};

/// The widest permutation key; one bit per define.
pub const MAX_PERMUTATION_DEFINES: usize = u32::BITS as usize;

/// A bitmask over a stage's permutation defines.
/// Bit `i` set means define `i` is active; zero is the base permutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PermutationKey(pub u32);

impl PermutationKey {
    pub const BASE: Self = Self(0);

    pub fn is_base(self) -> bool {
        self.0 == 0
    }

    pub fn is_set(self, bit: usize) -> bool {
        bit < MAX_PERMUTATION_DEFINES && self.0 & (1 << bit) != 0
    }

    /// indices of the active defines, ascending
    pub fn active_bits(self) -> impl Iterator<Item = usize> {
        (0..MAX_PERMUTATION_DEFINES).filter(move |&bit| self.is_set(bit))
    }
}

impl fmt::Display for PermutationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum RuleKind {
    AnyBitSet,
    AllBitsSet,
    OnlyOneBitSet,
    MaxOneBitSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermutationRule {
    pub kind: RuleKind,
    /// the define bits this rule constrains
    pub affected: u32,
}

impl PermutationRule {
    pub fn new(kind: RuleKind, affected: u32) -> Self {
        Self { kind, affected }
    }

    /// Builds a rule from define indices, checked against the number of defines.
    pub fn from_bits(kind: RuleKind, bits: &[u32], define_count: usize) -> Result<Self> {
        let mut affected = 0;
        for &bit in bits {
            if bit as usize >= define_count.min(MAX_PERMUTATION_DEFINES) {
                return Err(ShaderError::RuleBitOutOfRange { bit, define_count });
            }
            affected |= 1 << bit;
        }

        Ok(Self { kind, affected })
    }

    /// Whether the rule has an opinion about this key at all.
    pub fn applies_to(&self, key: PermutationKey) -> bool {
        key.0 & self.affected != 0
    }

    pub fn allows(&self, key: PermutationKey) -> bool {
        let set = key.0 & self.affected;
        match self.kind {
            RuleKind::AnyBitSet => set != 0,
            RuleKind::AllBitsSet => set == self.affected,
            RuleKind::OnlyOneBitSet => set.count_ones() == 1,
            RuleKind::MaxOneBitSet => set.count_ones() <= 1,
        }
    }
}

/// A procedural key predicate, applied after the declarative rules.
pub type KeyFilter = fn(PermutationKey) -> bool;

/// True when exactly one of the masks is set in the key.
pub fn only_one_of(key: PermutationKey, masks: &[u32]) -> bool {
    masks.iter().filter(|&&mask| key.0 & mask != 0).count() == 1
}

/// Every non-base key over `define_count` defines that passes all the rules, ascending.
///
/// The base key is always valid and is never produced here.
pub fn valid_permutation_keys(
    define_count: usize,
    rules: &[PermutationRule],
) -> Result<Vec<PermutationKey>> {
    if define_count > MAX_PERMUTATION_DEFINES {
        return Err(ShaderError::TooManyPermutationDefines {
            shader: String::new(),
            stage: String::new(),
            count: define_count,
        });
    }

    let end: u64 = 1 << define_count;
    let valid = (1..end)
        .map(|mask| PermutationKey(mask as u32))
        .filter(|&key| {
            rules
                .iter()
                .filter(|rule| rule.applies_to(key))
                .all(|rule| rule.allows(key))
        })
        .collect();

    Ok(valid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(masks: &[u32]) -> Vec<PermutationKey> {
        masks.iter().copied().map(PermutationKey).collect()
    }

    fn rule(kind: RuleKind, bits: &[u32], define_count: usize) -> PermutationRule {
        PermutationRule::from_bits(kind, bits, define_count).unwrap()
    }

    #[test]
    fn no_rules_keeps_every_non_base_key() {
        for n in 0..=8 {
            let valid = valid_permutation_keys(n, &[]).unwrap();
            assert_eq!(valid.len(), (1 << n) - 1);
            assert!(!valid.contains(&PermutationKey::BASE));
        }
    }

    #[test]
    fn only_one_bit_set() {
        let rules = [rule(RuleKind::OnlyOneBitSet, &[0, 1, 2], 3)];
        let valid = valid_permutation_keys(3, &rules).unwrap();
        assert_eq!(valid, keys(&[0b001, 0b010, 0b100]));
    }

    #[test]
    fn max_one_bit_set() {
        let rules = [rule(RuleKind::MaxOneBitSet, &[0, 1, 2], 3)];
        let valid = valid_permutation_keys(3, &rules).unwrap();
        assert_eq!(valid, keys(&[0b001, 0b010, 0b100]));
    }

    #[test]
    fn max_one_bit_set_over_a_subset() {
        // keys without any affected bit are not constrained
        let rules = [rule(RuleKind::MaxOneBitSet, &[0, 1], 3)];
        let valid = valid_permutation_keys(3, &rules).unwrap();
        assert_eq!(valid, keys(&[0b001, 0b010, 0b100, 0b101, 0b110]));
    }

    #[test]
    fn any_bit_set() {
        let rules = [rule(RuleKind::AnyBitSet, &[0, 1], 2)];
        let valid = valid_permutation_keys(2, &rules).unwrap();
        assert_eq!(valid, keys(&[0b01, 0b10, 0b11]));
    }

    #[test]
    fn all_bits_set() {
        let rules = [rule(RuleKind::AllBitsSet, &[0, 1, 2], 3)];
        let valid = valid_permutation_keys(3, &rules).unwrap();
        assert_eq!(valid, keys(&[0b111]));

        let rules = [rule(RuleKind::AllBitsSet, &[1, 2], 3)];
        let valid = valid_permutation_keys(3, &rules).unwrap();
        assert_eq!(valid, keys(&[0b001, 0b110, 0b111]));
    }

    #[test]
    fn rules_are_conjoined() {
        let rules = [
            rule(RuleKind::OnlyOneBitSet, &[0, 1], 3),
            rule(RuleKind::AllBitsSet, &[1, 2], 3),
        ];
        let valid = valid_permutation_keys(3, &rules).unwrap();
        assert_eq!(valid, keys(&[0b001, 0b110]));

        let reversed: Vec<_> = rules.iter().rev().copied().collect();
        assert_eq!(valid_permutation_keys(3, &reversed).unwrap(), valid);
    }

    #[test]
    fn rule_bits_are_checked() {
        let err = PermutationRule::from_bits(RuleKind::AnyBitSet, &[0, 3], 3).unwrap_err();
        assert!(matches!(
            err,
            ShaderError::RuleBitOutOfRange {
                bit: 3,
                define_count: 3
            }
        ));
    }

    #[test]
    fn too_many_defines() {
        assert!(valid_permutation_keys(MAX_PERMUTATION_DEFINES + 1, &[]).is_err());
    }

    #[test]
    fn only_one_of_masks() {
        let formats = [0b001, 0b010, 0b100];
        assert!(only_one_of(PermutationKey(0b1010), &formats));
        assert!(!only_one_of(PermutationKey(0b1000), &formats));
        assert!(!only_one_of(PermutationKey(0b0011), &formats));
    }

    #[test]
    fn key_bits() {
        let key = PermutationKey(0b1010);
        assert_eq!(key.active_bits().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(key.to_string(), "0xa");
        assert!(PermutationKey::BASE.is_base());
    }
}
