// Dweve CBF - Conic Benchmark Format toolkit
//
// Copyright (c) 2025 Dweve IP B.V. and individual contributors.
//
// SPDX-License-Identifier: Apache-2.0
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE file at the
// root of this repository or at: http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Distances from points to cones.
//!
//! Each domain tag maps to a [`ConeDistance`] that measures how far a
//! point is from the cone (primal) and from its dual cone (dual). The
//! [`ConeRegistry`] is built once and passed to the certificate
//! functions; extension tags are added with [`ConeRegistry::register`].

use crate::error::{VerifyError, VerifyResult};
use std::collections::HashMap;
use std::f64::consts::SQRT_2;
use std::fmt;

/// Distance of a point to a cone and to its dual cone.
pub trait ConeDistance: Send + Sync {
    /// Distance of `x` to the cone. Zero when `x` lies in it.
    fn primal_distance(&self, x: &[f64]) -> f64;

    /// Distance of `y` to the dual cone. Self-dual cones reuse the primal
    /// distance.
    fn dual_distance(&self, y: &[f64]) -> f64 {
        self.primal_distance(y)
    }
}

fn norm(x: &[f64]) -> f64 {
    x.iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// `F`: every point. Its dual is `{0}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Free;

impl ConeDistance for Free {
    fn primal_distance(&self, _x: &[f64]) -> f64 {
        0.0
    }

    fn dual_distance(&self, y: &[f64]) -> f64 {
        norm(y)
    }
}

/// `L=`: the origin. Its dual is every point.
#[derive(Debug, Clone, Copy, Default)]
pub struct Zero;

impl ConeDistance for Zero {
    fn primal_distance(&self, x: &[f64]) -> f64 {
        norm(x)
    }

    fn dual_distance(&self, _y: &[f64]) -> f64 {
        0.0
    }
}

/// `L+`: the non-negative orthant.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonNegative;

impl ConeDistance for NonNegative {
    fn primal_distance(&self, x: &[f64]) -> f64 {
        x.iter()
            .map(|v| v.min(0.0))
            .map(|v| v * v)
            .sum::<f64>()
            .sqrt()
    }
}

/// `L-`: the non-positive orthant.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonPositive;

impl ConeDistance for NonPositive {
    fn primal_distance(&self, x: &[f64]) -> f64 {
        x.iter()
            .map(|v| v.max(0.0))
            .map(|v| v * v)
            .sum::<f64>()
            .sqrt()
    }
}

/// `Q`: `x0 >= ||x[1..]||`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecondOrder;

impl ConeDistance for SecondOrder {
    fn primal_distance(&self, x: &[f64]) -> f64 {
        let Some((&head, rest)) = x.split_first() else {
            return 0.0;
        };
        let radius = norm(rest);
        if head >= radius {
            0.0
        } else if -head >= radius {
            // Polar cone: the nearest cone point is the origin.
            norm(x)
        } else {
            (radius - head) / SQRT_2
        }
    }
}

/// `QR`: `2 x0 x1 >= ||x[2..]||^2` with `x0, x1 >= 0`.
///
/// Measured through the orthogonal map onto `Q`, which preserves
/// distances.
#[derive(Debug, Clone, Copy, Default)]
pub struct RotatedSecondOrder;

impl ConeDistance for RotatedSecondOrder {
    fn primal_distance(&self, x: &[f64]) -> f64 {
        if x.len() < 2 {
            return SecondOrder.primal_distance(x);
        }
        let mut mapped = Vec::with_capacity(x.len());
        mapped.push((x[0] + x[1]) / SQRT_2);
        mapped.push((x[0] - x[1]) / SQRT_2);
        mapped.extend_from_slice(&x[2..]);
        SecondOrder.primal_distance(&mapped)
    }
}

/// `INTEGER`: the largest distance of a coordinate to its nearest integer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Integer;

impl ConeDistance for Integer {
    fn primal_distance(&self, x: &[f64]) -> f64 {
        x.iter()
            .map(|v| (v - v.round()).abs())
            .fold(0.0, f64::max)
    }
}

/// Tag used for integrality in certificates.
pub const INTEGER_TAG: &str = "INTEGER";

/// Map from domain tag to distance function.
pub struct ConeRegistry {
    cones: HashMap<String, Box<dyn ConeDistance>>,
}

impl ConeRegistry {
    /// A registry with no cones.
    pub fn empty() -> Self {
        Self {
            cones: HashMap::new(),
        }
    }

    /// A registry with `F`, `L+`, `L-`, `L=`, `Q`, `QR` and `INTEGER`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("F", Free);
        registry.register("L+", NonNegative);
        registry.register("L-", NonPositive);
        registry.register("L=", Zero);
        registry.register("Q", SecondOrder);
        registry.register("QR", RotatedSecondOrder);
        registry.register(INTEGER_TAG, Integer);
        registry
    }

    /// Register (or replace) the distance function of a tag.
    pub fn register(&mut self, tag: impl Into<String>, cone: impl ConeDistance + 'static) {
        self.cones.insert(tag.into(), Box::new(cone));
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.cones.contains_key(tag)
    }

    pub fn get(&self, tag: &str) -> VerifyResult<&dyn ConeDistance> {
        self.cones
            .get(tag)
            .map(|cone| cone.as_ref())
            .ok_or_else(|| VerifyError::UnknownCone(tag.to_string()))
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.cones.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}

impl Default for ConeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for ConeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConeRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    // ==================== Linear cones ====================

    #[test]
    fn test_free_and_zero_are_dual() {
        let x = [3.0, -4.0];
        assert_eq!(Free.primal_distance(&x), 0.0);
        assert!(close(Free.dual_distance(&x), 5.0));
        assert!(close(Zero.primal_distance(&x), 5.0));
        assert_eq!(Zero.dual_distance(&x), 0.0);
    }

    #[test]
    fn test_orthants() {
        let x = [1.0, -3.0, 4.0];
        assert!(close(NonNegative.primal_distance(&x), 3.0));
        assert!(close(NonPositive.primal_distance(&x), (17.0f64).sqrt()));
        assert!(close(NonNegative.dual_distance(&x), 3.0));
        assert_eq!(NonNegative.primal_distance(&[0.0, 2.0]), 0.0);
    }

    // ==================== Quadratic cones ====================

    #[test]
    fn test_second_order_inside() {
        assert_eq!(SecondOrder.primal_distance(&[5.0, 3.0, 4.0]), 0.0);
        assert_eq!(SecondOrder.primal_distance(&[]), 0.0);
    }

    #[test]
    fn test_second_order_polar() {
        assert!(close(
            SecondOrder.primal_distance(&[-5.0, 3.0, 4.0]),
            (50.0f64).sqrt()
        ));
    }

    #[test]
    fn test_second_order_between() {
        // Projection of (0, 1) onto the cone is (0.5, 0.5).
        assert!(close(
            SecondOrder.primal_distance(&[0.0, 1.0]),
            1.0 / SQRT_2
        ));
    }

    #[test]
    fn test_second_order_negative_head_outside_polar() {
        // x0 = -1 with |rest| = 4: x0^2 < |rest|^2 but x0 < 0.
        assert!(close(
            SecondOrder.primal_distance(&[-1.0, 4.0]),
            5.0 / SQRT_2
        ));
    }

    #[test]
    fn test_rotated_second_order() {
        // 2 * 1 * 2 = 4 >= 2^2
        assert!(RotatedSecondOrder.primal_distance(&[1.0, 2.0, 2.0]) < EPS);
        // Both heads negative is the polar side.
        let x = [-1.0, -1.0, 0.0];
        assert!(close(RotatedSecondOrder.primal_distance(&x), SQRT_2));
        assert!(RotatedSecondOrder.primal_distance(&[0.0, 1.0, 1.0]) > 0.0);
    }

    // ==================== Integer ====================

    #[test]
    fn test_integer_distance() {
        assert_eq!(Integer.primal_distance(&[1.0, -2.0, 0.0]), 0.0);
        assert!(close(Integer.primal_distance(&[1.25, 2.9]), 0.25));
        assert_eq!(Integer.primal_distance(&[]), 0.0);
    }

    // ==================== Registry ====================

    struct Ball(f64);

    impl ConeDistance for Ball {
        fn primal_distance(&self, x: &[f64]) -> f64 {
            (norm(x) - self.0).max(0.0)
        }
    }

    #[test]
    fn test_registry_builtins() {
        let registry = ConeRegistry::with_builtins();
        assert_eq!(
            registry.tags(),
            vec!["F", "INTEGER", "L+", "L-", "L=", "Q", "QR"]
        );
        let q = registry.get("Q").unwrap();
        assert_eq!(q.primal_distance(&[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_registry_unknown_tag() {
        let registry = ConeRegistry::default();
        match registry.get("EXP") {
            Err(VerifyError::UnknownCone(tag)) => assert_eq!(tag, "EXP"),
            other => panic!("expected UnknownCone, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_registry_extension() {
        let mut registry = ConeRegistry::empty();
        registry.register("BALL", Ball(1.0));
        assert!(registry.contains("BALL"));
        assert!(!registry.contains("Q"));
        let ball = registry.get("BALL").unwrap();
        assert!(close(ball.primal_distance(&[3.0, 4.0]), 4.0));
        assert!(close(ball.dual_distance(&[3.0, 4.0]), 4.0));
    }
}
