use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::{CandidatePool, PhotoPair};

/// Draws comparison pairs from a candidate pool.
///
/// The pool is never shrunk, so a photo keeps coming back in later pairs. The only
/// history kept is the pair passed in as `previous`.
pub struct PairGenerator<R = StdRng> {
    rng: R,
}

impl PairGenerator<StdRng> {
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> PairGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Returns two distinct photos from `pool`, or `None` when the pool has fewer than two.
    ///
    /// If the draw repeats `previous` (in either order) and the pool has more than two
    /// photos, one redraw is made that cannot land on `previous` again. With exactly
    /// two photos only one pair exists and it is returned every time.
    pub fn next_pair(&mut self, pool: &CandidatePool, previous: Option<&PhotoPair>) -> Option<PhotoPair> {
        let size = pool.len();
        if size < 2 {
            return None;
        }

        let first = self.rng.gen_range(0..size);
        let second = draw_excluding(&mut self.rng, size, &[first]);
        let pair = pair_at(pool, first, second)?;

        let previous = match previous {
            Some(previous) if size > 2 && pair.same_photos(previous) => previous,
            _ => return Some(pair),
        };

        let (Some(prev_a), Some(prev_b)) = (
            pool.position(&previous.left().id),
            pool.position(&previous.right().id),
        ) else {
            return Some(pair);
        };

        let first = self.rng.gen_range(0..size);
        let mut excluded = vec![first];
        if first == prev_a {
            excluded.push(prev_b);
        } else if first == prev_b {
            excluded.push(prev_a);
        }
        excluded.sort_unstable();
        let second = draw_excluding(&mut self.rng, size, &excluded);

        pair_at(pool, first, second)
    }
}

/// Uniform index in `0..size` skipping `excluded`, which must be sorted and unique.
fn draw_excluding<R: Rng>(rng: &mut R, size: usize, excluded: &[usize]) -> usize {
    let mut index = rng.gen_range(0..size - excluded.len());
    for &skip in excluded {
        if index >= skip {
            index += 1;
        }
    }
    index
}

fn pair_at(pool: &CandidatePool, first: usize, second: usize) -> Option<PhotoPair> {
    PhotoPair::new(pool.get(first)?.clone(), pool.get(second)?.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Photo;
    use std::collections::HashSet;

    fn pool_of(size: usize) -> CandidatePool {
        let photos = (1..=size)
            .map(|i| Photo {
                id: format!("p{}", i),
                photographer_name: format!("Photographer {}", i),
                photographer_avatar_url: None,
                image_url: format!("https://img.example/p{}.jpg", i),
                description: None,
            })
            .collect();
        CandidatePool::new("contest", photos)
    }

    fn ids(pair: &PhotoPair) -> (String, String) {
        (pair.left().id.clone(), pair.right().id.clone())
    }

    #[test]
    fn small_pools_yield_nothing() {
        let mut generator = PairGenerator::seeded(1);
        assert!(generator.next_pair(&pool_of(0), None).is_none());
        assert!(generator.next_pair(&pool_of(1), None).is_none());
    }

    #[test]
    fn pairs_are_distinct_pool_members() {
        let mut generator = PairGenerator::seeded(7);
        for size in 2..8 {
            let pool = pool_of(size);
            let mut previous = None;
            for _ in 0..200 {
                let pair = generator.next_pair(&pool, previous.as_ref()).unwrap();
                assert_ne!(pair.left().id, pair.right().id);
                assert!(pool.position(&pair.left().id).is_some());
                assert!(pool.position(&pair.right().id).is_some());
                previous = Some(pair);
            }
        }
    }

    #[test]
    fn never_repeats_previous_pair_with_three_or_more_photos() {
        for size in [3, 4, 10] {
            let pool = pool_of(size);
            let mut generator = PairGenerator::seeded(size as u64);
            let mut previous = generator.next_pair(&pool, None).unwrap();
            for _ in 0..1000 {
                let next = generator.next_pair(&pool, Some(&previous)).unwrap();
                assert!(!next.same_photos(&previous), "pool of {} repeated {:?}", size, ids(&next));
                previous = next;
            }
        }
    }

    #[test]
    fn two_photo_pool_repeats_its_only_pair() {
        let pool = pool_of(2);
        let mut generator = PairGenerator::seeded(3);
        let first = generator.next_pair(&pool, None).unwrap();
        for _ in 0..20 {
            let next = generator.next_pair(&pool, Some(&first)).unwrap();
            assert!(next.same_photos(&first));
        }
    }

    #[test]
    fn repeated_pair_may_return_two_draws_later() {
        let pool = pool_of(3);
        let mut generator = PairGenerator::seeded(11);
        let mut history = vec![generator.next_pair(&pool, None).unwrap()];
        for _ in 0..200 {
            let next = generator.next_pair(&pool, history.last()).unwrap();
            history.push(next);
        }

        let returned = history
            .windows(3)
            .any(|window| window[2].same_photos(&window[0]));
        assert!(returned);
    }

    #[test]
    fn same_seed_gives_same_sequence() {
        let pool = pool_of(6);
        let mut a = PairGenerator::seeded(42);
        let mut b = PairGenerator::seeded(42);
        let mut prev_a = None;
        let mut prev_b = None;
        for _ in 0..50 {
            let pair_a = a.next_pair(&pool, prev_a.as_ref()).unwrap();
            let pair_b = b.next_pair(&pool, prev_b.as_ref()).unwrap();
            assert_eq!(ids(&pair_a), ids(&pair_b));
            prev_a = Some(pair_a);
            prev_b = Some(pair_b);
        }
    }

    #[test]
    fn every_photo_gets_offered() {
        let pool = pool_of(6);
        let mut generator = PairGenerator::seeded(5);
        let mut seen = HashSet::new();
        let mut previous = None;
        for _ in 0..300 {
            let pair = generator.next_pair(&pool, previous.as_ref()).unwrap();
            seen.insert(pair.left().id.clone());
            seen.insert(pair.right().id.clone());
            previous = Some(pair);
        }
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn previous_from_another_pool_is_ignored() {
        let pool = pool_of(4);
        let stranger = PhotoPair::new(
            Photo::new("x".to_string(), "https://img.example/x.jpg".to_string()),
            Photo::new("y".to_string(), "https://img.example/y.jpg".to_string()),
        )
        .unwrap();
        let mut generator = PairGenerator::seeded(9);
        assert!(generator.next_pair(&pool, Some(&stranger)).is_some());
    }
}
