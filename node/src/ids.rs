//! Circular identifier-space arithmetic for the M = 32 bit ring.

/// Width of the identifier space in bits.
pub const M: u32 = 32;

/// A ring identifier. The space wraps modulo `2^32`.
pub type Identifier = u32;

/// `start(i)` for finger table slot `i`: `(id + 2^i) mod 2^32`.
pub fn start(id: Identifier, i: u32) -> Identifier {
    debug_assert!(i < M);
    id.wrapping_add(1u32.wrapping_shl(i))
}

/// Is `x` strictly between `a` and `b`, walking clockwise from `a` to `b`?
///
/// If `a == b` the interval is the whole ring minus the point itself.
pub fn in_open(a: Identifier, x: Identifier, b: Identifier) -> bool {
    if a == b {
        x != a
    } else if a < b {
        a < x && x < b
    } else {
        x > a || x < b
    }
}

/// Like [`in_open`] but `x == b` also counts.
pub fn in_open_closed(a: Identifier, x: Identifier, b: Identifier) -> bool {
    x == b || in_open(a, x, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_excludes_both_endpoints() {
        assert!(!in_open(10, 10, 20));
        assert!(!in_open(10, 20, 20));
        assert!(in_open(10, 15, 20));
    }

    #[test]
    fn open_handles_wraparound() {
        assert!(in_open(250, 5, 10));
        assert!(!in_open(250, 20, 10));
    }

    #[test]
    fn open_single_node_ring_owns_whole_circle() {
        assert!(in_open(42, 0, 42));
        assert!(in_open(42, 41, 42));
        assert!(!in_open(42, 42, 42));
    }

    #[test]
    fn open_closed_includes_right_endpoint() {
        assert!(!in_open_closed(10, 10, 20));
        assert!(in_open_closed(10, 20, 20));
    }

    #[test]
    fn start_wraps_past_max() {
        assert_eq!(start(u32::MAX, 0), 0);
        assert_eq!(start(0, 31), 1u32 << 31);
    }

    #[test]
    fn exactly_one_window_among_three_distinct_points_contains_a_fourth() {
        let (a, b, c, x) = (10u32, 100u32, 200u32, 50u32);
        let windows = [in_open(a, x, b), in_open(b, x, c), in_open(c, x, a)];
        assert_eq!(windows.iter().filter(|w| **w).count(), 1);
    }

    /// For any three distinct points splitting the ring into three arcs, a
    /// fourth distinct point falls in exactly one of those arcs. Checked over
    /// many random quadruples rather than one fixed example.
    #[test]
    fn in_range_predicate_laws_hold_over_random_quadruples() {
        use rand::Rng;
        let mut rng = rand::thread_rng();

        for _ in 0..2000 {
            let mut points = std::collections::HashSet::new();
            while points.len() < 4 {
                points.insert(rng.gen::<u32>());
            }
            let mut points: Vec<u32> = points.into_iter().collect();
            points.truncate(4);
            let (a, b, c, x) = (points[0], points[1], points[2], points[3]);

            let windows = [in_open(a, x, b), in_open(b, x, c), in_open(c, x, a)];
            assert_eq!(
                windows.iter().filter(|w| **w).count(),
                1,
                "a={a:#x} b={b:#x} c={c:#x} x={x:#x} windows={windows:?}"
            );

            // in_open_closed agrees with in_open except at the right endpoint.
            assert!(in_open_closed(a, b, b));
            assert_eq!(in_open_closed(a, x, b), in_open(a, x, b) || x == b);
        }
    }

    #[test]
    fn start_is_injective_across_all_finger_slots_for_random_owners() {
        use rand::Rng;
        let mut rng = rand::thread_rng();

        for _ in 0..200 {
            let owner: u32 = rng.gen();
            let starts: std::collections::HashSet<u32> = (0..M).map(|i| start(owner, i)).collect();
            assert_eq!(starts.len(), M as usize, "owner {owner:#x} produced colliding finger starts");
        }
    }
}
