//! Keyspace enumeration and shuffling.

use rand::Rng;

use super::{encode, Code, CONSONANTS, KEYSPACE_SIZE, VOWELS};

/// Enumerate every code in alphabet order, packed.
pub fn enumerate_keyspace() -> Vec<u32> {
    let mut keyspace = Vec::with_capacity(KEYSPACE_SIZE);
    let mut buf = [0u8; 5];

    for &c0 in CONSONANTS {
        buf[0] = c0;
        for &v1 in VOWELS {
            buf[1] = v1;
            for &c2 in CONSONANTS {
                buf[2] = c2;
                for &v3 in VOWELS {
                    buf[3] = v3;
                    for &c4 in CONSONANTS {
                        buf[4] = c4;
                        let s: String = buf.iter().map(|&b| char::from(b)).collect();
                        keyspace.push(encode(&Code::from_decoded(s)));
                    }
                }
            }
        }
    }

    keyspace
}

/// In-place Fisher-Yates shuffle.
pub fn shuffle<R: Rng + ?Sized>(values: &mut [u32], rng: &mut R) {
    for i in (1..values.len()).rev() {
        let j = rng.random_range(0..=i);
        values.swap(i, j);
    }
}

/// Enumerate the keyspace and return it in uniformly random order.
pub fn generate_permutation<R: Rng + ?Sized>(rng: &mut R) -> Vec<u32> {
    let mut keyspace = enumerate_keyspace();
    shuffle(&mut keyspace, rng);
    keyspace
}
