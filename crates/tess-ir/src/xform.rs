//! Affine index transformations.
//!
//! A reshape re-maps indices with an affine function `y = A·x + b` whose
//! matrix has at most one nonzero entry per row. [`AffineMap`] stores that
//! sparse row form: each output axis is either a constant or
//! `scale · x[input] + offset`. Composition stays inside the form, and maps
//! that touch every input axis have exact inverses on their image lattice.
//!
//! The lowering pass cares about one derived property: a map that fails to
//! reference some input axis is *not injective* — it replicates its input
//! across the unreferenced axis — and fusion must not cross it.

use crate::shape::{Range, Shape};

/// One output axis of an affine map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AxisMap {
    /// The output coordinate is a constant.
    Constant(i64),
    /// The output coordinate is `scale · x[input] + offset`, `scale != 0`.
    Linear { input: usize, scale: i64, offset: i64 },
}

/// A sparse affine map between index spaces.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AffineMap {
    input_rank: usize,
    rows: Vec<AxisMap>,
}

impl AffineMap {
    /// Create a map from its rows.
    ///
    /// # Panics
    ///
    /// Panics if a row references an input axis `>= input_rank` or has a
    /// zero scale.
    pub fn new(input_rank: usize, rows: Vec<AxisMap>) -> Self {
        for row in &rows {
            if let AxisMap::Linear { input, scale, .. } = row {
                assert!(*input < input_rank, "row references input axis {} of {}", input, input_rank);
                assert!(*scale != 0, "affine row scale must be nonzero");
            }
        }
        Self { input_rank, rows }
    }

    /// The identity on a rank-`rank` space.
    pub fn identity(rank: usize) -> Self {
        let rows = (0..rank)
            .map(|axis| AxisMap::Linear { input: axis, scale: 1, offset: 0 })
            .collect();
        Self { input_rank: rank, rows }
    }

    /// A pure translation by `offsets`.
    pub fn translation(offsets: &[i64]) -> Self {
        let rows = offsets
            .iter()
            .enumerate()
            .map(|(axis, &offset)| AxisMap::Linear { input: axis, scale: 1, offset })
            .collect();
        Self { input_rank: offsets.len(), rows }
    }

    /// Rank of the input space.
    #[inline]
    pub fn input_rank(&self) -> usize {
        self.input_rank
    }

    /// Rank of the output space.
    #[inline]
    pub fn output_rank(&self) -> usize {
        self.rows.len()
    }

    /// The output rows.
    #[inline]
    pub fn rows(&self) -> &[AxisMap] {
        &self.rows
    }

    /// The composition `self ∘ inner` (apply `inner` first).
    pub fn compose(&self, inner: &AffineMap) -> AffineMap {
        assert_eq!(
            self.input_rank,
            inner.output_rank(),
            "composed maps disagree on the intermediate rank"
        );
        let rows = self
            .rows
            .iter()
            .map(|row| match *row {
                AxisMap::Constant(c) => AxisMap::Constant(c),
                AxisMap::Linear { input, scale, offset } => match inner.rows[input] {
                    AxisMap::Constant(c) => AxisMap::Constant(scale * c + offset),
                    AxisMap::Linear { input: i, scale: s, offset: o } => {
                        AxisMap::Linear { input: i, scale: scale * s, offset: scale * o + offset }
                    }
                },
            })
            .collect();
        AffineMap { input_rank: inner.input_rank, rows }
    }

    /// The image of a shape.
    pub fn apply(&self, shape: &Shape) -> Shape {
        assert_eq!(shape.rank(), self.input_rank, "shape rank does not match map input rank");
        let ranges = self
            .rows
            .iter()
            .map(|row| match *row {
                AxisMap::Constant(c) => Range::single(c),
                AxisMap::Linear { input, scale, offset } => {
                    let r = shape.axis(input);
                    if scale > 0 {
                        Range::with_size(scale * r.start() + offset, scale * r.step(), r.size())
                    } else {
                        Range::with_size(scale * r.last() + offset, -scale * r.step(), r.size())
                    }
                }
            })
            .collect();
        Shape::new(ranges)
    }

    /// The image of a point.
    pub fn apply_point(&self, point: &[i64]) -> Vec<i64> {
        assert_eq!(point.len(), self.input_rank);
        self.rows
            .iter()
            .map(|row| match *row {
                AxisMap::Constant(c) => c,
                AxisMap::Linear { input, scale, offset } => scale * point[input] + offset,
            })
            .collect()
    }

    /// The exact inverse map, when one exists.
    ///
    /// Defined for square, injective maps whose scales are all ±1: every
    /// input axis is then read by exactly one row, and each row solves for
    /// its input with integer arithmetic. Returns `None` for rank-changing,
    /// replicating, or non-unit-scale maps. (Non-unit scales still invert
    /// exactly on their image lattice; see [`inverse_image`].)
    ///
    /// [`inverse_image`]: AffineMap::inverse_image
    pub fn invert(&self) -> Option<AffineMap> {
        if self.output_rank() != self.input_rank {
            return None;
        }
        let mut inverse: Vec<Option<AxisMap>> = vec![None; self.input_rank];
        for (axis, row) in self.rows.iter().enumerate() {
            match *row {
                AxisMap::Constant(_) => return None,
                AxisMap::Linear { input, scale, offset } => {
                    if scale.abs() != 1 || inverse[input].is_some() {
                        return None;
                    }
                    // y = s·x + o with s = ±1, so x = s·y − s·o.
                    inverse[input] =
                        Some(AxisMap::Linear { input: axis, scale, offset: -scale * offset });
                }
            }
        }
        let rows = inverse.into_iter().collect::<Option<Vec<AxisMap>>>()?;
        Some(AffineMap { input_rank: self.output_rank(), rows })
    }

    /// True iff every input axis is referenced by some row.
    ///
    /// An unreferenced input axis means distinct inputs map to the same
    /// output — the map replicates and must not be fused through.
    pub fn is_injective(&self) -> bool {
        let mut referenced = vec![false; self.input_rank];
        for row in &self.rows {
            if let AxisMap::Linear { input, .. } = row {
                referenced[*input] = true;
            }
        }
        referenced.into_iter().all(|r| r)
    }

    /// The preimage of `image`, a sub-shape of this map's image.
    ///
    /// Requires an injective map; every range of `image` must lie on the
    /// corresponding image lattice, so the divisions below are exact.
    pub fn inverse_image(&self, image: &Shape) -> Shape {
        assert_eq!(image.rank(), self.output_rank());
        assert!(self.is_injective(), "cannot invert a non-injective map");

        let mut ranges: Vec<Option<Range>> = vec![None; self.input_rank];
        for (axis, row) in self.rows.iter().enumerate() {
            match *row {
                AxisMap::Constant(c) => {
                    let r = image.axis(axis);
                    debug_assert!(r.size() == 1 && r.start() == c, "image strays off a constant row");
                }
                AxisMap::Linear { input, scale, offset } => {
                    if ranges[input].is_some() {
                        // Replicated input axis; the first row already
                        // determined its preimage.
                        continue;
                    }
                    let r = image.axis(axis);
                    let first = if scale > 0 { r.start() - offset } else { r.last() - offset };
                    debug_assert_eq!(first % scale, 0, "image strays off the map lattice");
                    let start = first / scale;
                    let step = if r.size() == 1 { 1 } else { (r.step() / scale).abs() };
                    debug_assert!(r.size() == 1 || r.step() % scale == 0);
                    ranges[input] = Some(Range::with_size(start, step, r.size()));
                }
            }
        }

        Shape::new(ranges.into_iter().map(|r| r.expect("injective map covers all inputs")).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Range;

    fn shape1(r: Range) -> Shape {
        Shape::new(vec![r])
    }

    #[test]
    fn test_identity() {
        let id = AffineMap::identity(2);
        let s = Shape::new(vec![Range::till(0, 4), Range::till(2, 6)]);
        assert_eq!(id.apply(&s), s);
        assert_eq!(id.apply_point(&[1, 3]), vec![1, 3]);
        assert!(id.is_injective());
    }

    #[test]
    fn test_translation() {
        let t = AffineMap::translation(&[10]);
        assert_eq!(t.apply(&shape1(Range::till(0, 4))), shape1(Range::till(10, 14)));
        assert_eq!(t.apply_point(&[3]), vec![13]);
    }

    #[test]
    fn test_scale_apply() {
        let m = AffineMap::new(1, vec![AxisMap::Linear { input: 0, scale: 2, offset: 1 }]);
        // {0,1,2,3} → {1,3,5,7}
        assert_eq!(m.apply(&shape1(Range::till(0, 4))), shape1(Range::with_size(1, 2, 4)));
    }

    #[test]
    fn test_negative_scale_apply() {
        let m = AffineMap::new(1, vec![AxisMap::Linear { input: 0, scale: -1, offset: 3 }]);
        // {0,1,2,3} → {3,2,1,0}, normalized ascending.
        assert_eq!(m.apply(&shape1(Range::till(0, 4))), shape1(Range::till(0, 4)));
    }

    #[test]
    fn test_compose() {
        let shift = AffineMap::translation(&[5]);
        let scale = AffineMap::new(1, vec![AxisMap::Linear { input: 0, scale: 2, offset: 0 }]);

        // scale ∘ shift: x → 2(x + 5)
        let m = scale.compose(&shift);
        assert_eq!(m.apply_point(&[1]), vec![12]);

        // shift ∘ scale: x → 2x + 5
        let m = shift.compose(&scale);
        assert_eq!(m.apply_point(&[1]), vec![7]);
    }

    #[test]
    fn test_compose_associative() {
        let a = AffineMap::translation(&[1]);
        let b = AffineMap::new(1, vec![AxisMap::Linear { input: 0, scale: 3, offset: 0 }]);
        let c = AffineMap::translation(&[-2]);

        let left = a.compose(&b).compose(&c);
        let right = a.compose(&b.compose(&c));
        assert_eq!(left, right);
    }

    #[test]
    fn test_broadcast_not_injective() {
        // Rank-2 output reading a rank-2 input but ignoring axis 0.
        let m = AffineMap::new(2, vec![AxisMap::Linear { input: 1, scale: 1, offset: 0 }]);
        assert!(!m.is_injective());

        // A constant row alone references nothing.
        let c = AffineMap::new(1, vec![AxisMap::Constant(7)]);
        assert!(!c.is_injective());
    }

    #[test]
    fn test_permutation_injective() {
        let m = AffineMap::new(
            2,
            vec![
                AxisMap::Linear { input: 1, scale: 1, offset: 0 },
                AxisMap::Linear { input: 0, scale: 1, offset: 0 },
            ],
        );
        assert!(m.is_injective());

        let s = Shape::new(vec![Range::till(0, 2), Range::till(0, 3)]);
        assert_eq!(m.apply(&s), Shape::new(vec![Range::till(0, 3), Range::till(0, 2)]));
    }

    #[test]
    fn test_invert_translation() {
        let t = AffineMap::translation(&[10, -3]);
        let inv = t.invert().unwrap();
        assert_eq!(inv.apply_point(&[12, 0]), vec![2, 3]);
        // inv ∘ t is the identity.
        assert_eq!(inv.compose(&t), AffineMap::identity(2));
    }

    #[test]
    fn test_invert_permutation_with_flip() {
        let m = AffineMap::new(
            2,
            vec![
                AxisMap::Linear { input: 1, scale: -1, offset: 5 },
                AxisMap::Linear { input: 0, scale: 1, offset: 0 },
            ],
        );
        let inv = m.invert().unwrap();
        assert_eq!(inv.compose(&m), AffineMap::identity(2));
        assert_eq!(m.compose(&inv), AffineMap::identity(2));
    }

    #[test]
    fn test_invert_undefined_cases() {
        // Rank-changing maps have no inverse.
        let narrow = AffineMap::new(2, vec![AxisMap::Linear { input: 0, scale: 1, offset: 0 }]);
        assert_eq!(narrow.invert(), None);

        // Replication reads one input twice and ignores the other.
        let replicate = AffineMap::new(
            2,
            vec![
                AxisMap::Linear { input: 0, scale: 1, offset: 0 },
                AxisMap::Linear { input: 0, scale: 1, offset: 0 },
            ],
        );
        assert_eq!(replicate.invert(), None);

        // A non-unit scale has no integer inverse on the whole space.
        let stretch = AffineMap::new(1, vec![AxisMap::Linear { input: 0, scale: 2, offset: 0 }]);
        assert_eq!(stretch.invert(), None);

        // Constant rows collapse the space.
        let pin = AffineMap::new(1, vec![AxisMap::Constant(4)]);
        assert_eq!(pin.invert(), None);
    }

    #[test]
    fn test_inverse_image_translation() {
        let t = AffineMap::translation(&[10]);
        let sub = shape1(Range::till(12, 14));
        assert_eq!(t.inverse_image(&sub), shape1(Range::till(2, 4)));
    }

    #[test]
    fn test_inverse_image_scale() {
        let m = AffineMap::new(1, vec![AxisMap::Linear { input: 0, scale: 2, offset: 1 }]);
        // Image of {0..4} is {1,3,5,7}; take the sub-lattice {3,7}.
        let sub = shape1(Range::with_size(3, 4, 2));
        assert_eq!(m.inverse_image(&sub), shape1(Range::with_size(1, 2, 2)));
    }

    #[test]
    fn test_inverse_image_roundtrip() {
        let m = AffineMap::new(
            2,
            vec![
                AxisMap::Linear { input: 1, scale: 3, offset: -1 },
                AxisMap::Linear { input: 0, scale: 1, offset: 4 },
            ],
        );
        let s = Shape::new(vec![Range::till(0, 5), Range::till(2, 6)]);
        assert_eq!(m.inverse_image(&m.apply(&s)), s);
    }

    #[test]
    #[should_panic(expected = "non-injective")]
    fn test_inverse_image_requires_injectivity() {
        let m = AffineMap::new(2, vec![AxisMap::Linear { input: 1, scale: 1, offset: 0 }]);
        let _ = m.inverse_image(&shape1(Range::till(0, 4)));
    }
}
