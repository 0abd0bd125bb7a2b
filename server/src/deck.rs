//! Deterministic deck construction and dealing helpers

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use shared::card::RANKS_PER_SUIT;
use shared::{Card, Variant};

/// Builds and shuffles the deck for a variant. The same seed always yields
/// the same order.
pub fn shuffled_deck(variant: &Variant, seed: &str) -> Vec<Card> {
    let mut faces: Vec<(usize, u8)> = (0..variant.num_suits())
        .flat_map(|suit| RANKS_PER_SUIT.iter().map(move |&rank| (suit, rank)))
        .collect();

    let mut rng = StdRng::seed_from_u64(seed_value(seed));
    faces.shuffle(&mut rng);

    faces
        .into_iter()
        .enumerate()
        .map(|(order, (suit, rank))| Card::new(suit, rank, order))
        .collect()
}

// FNV-1a over the seed text
fn seed_value(seed: &str) -> u64 {
    seed.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x0100_0000_01b3)
    })
}

/// Generates a fresh seed string for a table
pub fn new_seed(num_players: usize, variant_id: usize) -> String {
    let salt: u32 = rand::thread_rng().gen_range(1..=1_000_000);
    format!("p{}v{}s{}", num_players, variant_id, salt)
}

/// Cards each player starts with
pub fn hand_size(num_players: usize) -> usize {
    match num_players {
        0..=3 => 5,
        4 | 5 => 4,
        _ => 3,
    }
}
