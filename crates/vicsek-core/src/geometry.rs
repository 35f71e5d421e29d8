//! Periodic geometry on a square domain of side `length` (a torus).

use std::f64::consts::TAU;

/// Reduce `value` into `[0, period)`.
///
/// `rem_euclid` can return exactly `period` for tiny negative inputs; that
/// case is folded back to zero so the half-open invariant always holds.
pub fn wrap_periodic(value: f64, period: f64) -> f64 {
    let wrapped = value.rem_euclid(period);
    if wrapped >= period {
        0.0
    } else {
        wrapped
    }
}

/// Reduce an angle into `[0, 2*pi)`.
pub fn wrap_angle(theta: f64) -> f64 {
    wrap_periodic(theta, TAU)
}

/// Square periodic domain with minimum-image distances.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Domain {
    length: f64,
}

impl Domain {
    /// `length` must be positive and finite; callers validate it through config.
    pub fn new(length: f64) -> Self {
        Self { length }
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn wrap(&self, position: [f64; 2]) -> [f64; 2] {
        [
            wrap_periodic(position[0], self.length),
            wrap_periodic(position[1], self.length),
        ]
    }

    pub fn contains(&self, position: [f64; 2]) -> bool {
        position
            .iter()
            .all(|c| c.is_finite() && (0.0..self.length).contains(c))
    }

    /// Minimum-image separation along one axis, in `[-length/2, length/2]`.
    pub fn axis_delta(&self, delta: f64) -> f64 {
        let half = 0.5 * self.length;
        if delta > half {
            delta - self.length
        } else if delta < -half {
            delta + self.length
        } else {
            delta
        }
    }

    /// `a - b` under the minimum-image convention. Inputs are expected inside the domain.
    pub fn displacement(&self, a: [f64; 2], b: [f64; 2]) -> [f64; 2] {
        [
            self.axis_delta(a[0] - b[0]),
            self.axis_delta(a[1] - b[1]),
        ]
    }

    pub fn distance_sq(&self, a: [f64; 2], b: [f64; 2]) -> f64 {
        let [dx, dy] = self.displacement(a, b);
        dx * dx + dy * dy
    }

    pub fn distance(&self, a: [f64; 2], b: [f64; 2]) -> f64 {
        self.distance_sq(a, b).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn wrap_maps_into_half_open_interval() {
        let domain = Domain::new(10.0);
        assert_eq!(domain.wrap([10.0, -0.0]), [0.0, 0.0]);
        let [x, y] = domain.wrap([10.4, -2.5]);
        assert!((x - 0.4).abs() < 1e-12);
        assert!((y - 7.5).abs() < 1e-12);
    }

    #[test]
    fn wrap_folds_rounded_period_to_zero() {
        // -1e-18 rem_euclid 10 rounds to exactly 10.0.
        assert_eq!(wrap_periodic(-1e-18, 10.0), 0.0);
        assert_eq!(wrap_angle(-1e-18), 0.0);
    }

    #[test]
    fn displacement_takes_shortest_image() {
        let domain = Domain::new(10.0);
        let d = domain.displacement([0.5, 9.8], [9.5, 0.3]);
        assert!((d[0] - 1.0).abs() < 1e-12);
        assert!((d[1] + 0.5).abs() < 1e-12);
        assert!((domain.distance([0.2, 0.2], [9.8, 9.8]) - (0.32f64).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn contains_rejects_upper_edge_and_nan() {
        let domain = Domain::new(5.0);
        assert!(domain.contains([0.0, 4.999]));
        assert!(!domain.contains([5.0, 1.0]));
        assert!(!domain.contains([f64::NAN, 1.0]));
    }

    proptest! {
        #[test]
        fn wrap_after_any_displacement_stays_in_domain(
            length in 0.5f64..500.0,
            fx in 0.0f64..1.0,
            fy in 0.0f64..1.0,
            dx in -1.0e4f64..1.0e4,
            dy in -1.0e4f64..1.0e4,
        ) {
            let domain = Domain::new(length);
            let p = [fx * length, fy * length];
            let wrapped = domain.wrap([p[0] + dx, p[1] + dy]);
            prop_assert!(domain.contains(wrapped));
            prop_assert_eq!(domain.distance(p, p), 0.0);
        }

        #[test]
        fn displacement_is_bounded_by_half_length(
            length in 0.5f64..500.0,
            a in (0.0f64..1.0, 0.0f64..1.0),
            b in (0.0f64..1.0, 0.0f64..1.0),
        ) {
            let domain = Domain::new(length);
            let d = domain.displacement([a.0 * length, a.1 * length], [b.0 * length, b.1 * length]);
            prop_assert!(d[0].abs() <= 0.5 * length + 1e-9);
            prop_assert!(d[1].abs() <= 0.5 * length + 1e-9);
        }
    }
}
