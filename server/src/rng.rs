//! Dice and fuzzy-number helpers used by creation and reset code.

use rand::Rng;

/// Uniform inclusive range; tolerates a reversed range.
pub fn number_range(lo: i32, hi: i32) -> i32 {
    if lo >= hi {
        return lo;
    }
    rand::thread_rng().gen_range(lo..=hi)
}

/// 1..=100.
pub fn number_percent() -> i32 {
    number_range(1, 100)
}

/// `number` d `size`.
pub fn dice(number: i32, size: i32) -> i32 {
    (0..number.max(0)).map(|_| number_range(1, size.max(1))).sum()
}

/// `value` +/- 1 with a 25% chance either way.
pub fn number_fuzzy(value: i32) -> i32 {
    match number_range(1, 4) {
        1 => value - 1,
        4 => value + 1,
        _ => value,
    }
    .max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_is_inclusive_and_bounded() {
        for _ in 0..200 {
            let v = number_range(3, 7);
            assert!((3..=7).contains(&v));
        }
        assert_eq!(number_range(5, 5), 5);
        assert_eq!(number_range(9, 2), 9);
    }

    #[test]
    fn dice_bounds() {
        for _ in 0..100 {
            let v = dice(2, 6);
            assert!((2..=12).contains(&v));
        }
        assert_eq!(dice(0, 6), 0);
    }

    #[test]
    fn fuzzy_stays_near_and_positive() {
        for _ in 0..100 {
            let v = number_fuzzy(10);
            assert!((9..=11).contains(&v));
        }
        assert!(number_fuzzy(1) >= 1);
    }
}
