//! Random string generation.
//!
//! Two generators with different guarantees live here. Storage names for
//! uploaded photos only need to be unlikely to collide, so they come from a
//! fast statistical PRNG. Confirmation tokens are bearer secrets and must come
//! from the operating system CSPRNG.

use rand::{
    rngs::{OsRng, SmallRng},
    Rng, RngCore, SeedableRng,
};

/// The 62-character alphanumeric alphabet shared by both generators.
pub const ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Length of a photo storage name.
pub const STORAGE_NAME_LENGTH: usize = 48;

/// Length of an email confirmation token.
pub const CONFIRMATION_TOKEN_LENGTH: usize = 35;

// 6 bits are enough to index 62 symbols; values 62 and 63 are rejected.
const INDEX_MASK: u8 = 0b0011_1111;

/// Fast, non-cryptographic name for a stored photo.
pub fn storage_name() -> String {
    let mut rng = SmallRng::from_entropy();
    random_string(&mut rng, STORAGE_NAME_LENGTH)
}

/// Uniform alphanumeric string drawn from an arbitrary generator.
pub fn random_string<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| {
            // gen_range keeps the index inside the alphabet
            ALPHABET[rng.gen_range(0..ALPHABET.len())] as char
        })
        .collect()
}

/// Email confirmation token drawn from the OS CSPRNG.
pub fn confirmation_token() -> String {
    secure_random_string(CONFIRMATION_TOKEN_LENGTH)
}

/// Alphanumeric string from `OsRng` using rejection sampling, so every symbol
/// of the alphabet is equally likely.
pub fn secure_random_string(length: usize) -> String {
    let mut result = String::with_capacity(length);
    let mut buffer = [0u8; 64];

    while result.len() < length {
        OsRng.fill_bytes(&mut buffer);
        for byte in buffer {
            if let Some(&symbol) = ALPHABET.get(usize::from(byte & INDEX_MASK)) {
                result.push(symbol as char);
                if result.len() == length {
                    break;
                }
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    fn in_alphabet(value: &str) -> bool {
        value.bytes().all(|b| ALPHABET.contains(&b))
    }

    #[test]
    fn test_alphabet_has_no_duplicates() {
        let unique: HashSet<u8> = ALPHABET.iter().copied().collect();
        assert_eq!(unique.len(), 62);
        assert!(ALPHABET.iter().all(|b| b.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_confirmation_token_shape() {
        for _ in 0..200 {
            let token = confirmation_token();
            assert_eq!(token.len(), CONFIRMATION_TOKEN_LENGTH);
            assert!(in_alphabet(&token), "unexpected symbol in {}", token);
        }
    }

    #[test]
    fn test_confirmation_tokens_do_not_repeat() {
        let tokens: HashSet<String> = (0..1000).map(|_| confirmation_token()).collect();
        assert_eq!(tokens.len(), 1000);
    }

    #[test]
    fn test_secure_random_string_arbitrary_lengths() {
        assert_eq!(secure_random_string(0), "");
        assert_eq!(secure_random_string(1).len(), 1);
        // longer than one buffer refill
        let long = secure_random_string(500);
        assert_eq!(long.len(), 500);
        assert!(in_alphabet(&long));
    }

    #[test]
    fn test_secure_symbols_are_roughly_uniform() {
        let mut counts: HashMap<char, usize> = HashMap::new();
        let sample = secure_random_string(62 * 2000);
        for symbol in sample.chars() {
            *counts.entry(symbol).or_default() += 1;
        }

        // Every symbol appears, and none is wildly over or under represented.
        // Expected count is 2000 with a standard deviation of about 44.
        assert_eq!(counts.len(), 62);
        for (symbol, count) in counts {
            assert!(
                (1600..=2400).contains(&count),
                "symbol {} appeared {} times",
                symbol,
                count
            );
        }
    }

    #[test]
    fn test_storage_name_shape() {
        let name = storage_name();
        assert_eq!(name.len(), STORAGE_NAME_LENGTH);
        assert!(in_alphabet(&name));
        assert_ne!(name, storage_name());
    }

    #[test]
    fn test_random_string_is_reproducible_with_seed() {
        let mut a = SmallRng::seed_from_u64(7);
        let mut b = SmallRng::seed_from_u64(7);
        assert_eq!(random_string(&mut a, 48), random_string(&mut b, 48));
    }
}
