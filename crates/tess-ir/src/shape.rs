//! Stepped index ranges and rectangular index spaces.
//!
//! A [`Range`] is the set `{start, start+step, …}` of integers below `end`;
//! a [`Shape`] is a cartesian product of ranges. Both are value types with
//! structural equality; emptiness is never represented (operations that can
//! come up empty return `Option`).
//!
//! Ranges with steps form arithmetic lattices, so intersection is a
//! Chinese-remainder computation rather than a pair of `min`/`max` calls:
//! the intersection of two stepped ranges is again a stepped range (with
//! the lcm of the steps) or nothing.

use std::fmt;
use tess_util::FxHashSet;

/// A non-empty set of equally spaced integers.
///
/// Canonical form: `step >= 1`, `end = start + size * step` (exclusive,
/// aligned). Constructors normalize descending steps.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    start: i64,
    step: i64,
    end: i64,
}

impl Range {
    /// Create a range from `start` (inclusive) to `end` (exclusive) with
    /// the given step.
    ///
    /// A negative step enumerates downwards from `start` to `end`; the
    /// result is normalized to the ascending form covering the same set.
    ///
    /// # Panics
    ///
    /// Panics if `step == 0` or the range would be empty.
    pub fn new(start: i64, step: i64, end: i64) -> Self {
        assert!(step != 0, "range step must be nonzero");
        if step > 0 {
            assert!(start < end, "empty range {}..{}", start, end);
            let size = (end - start + step - 1) / step;
            Self::with_size(start, step, size)
        } else {
            assert!(start > end, "empty range {}..{} by {}", start, end, step);
            let size = (start - end + (-step) - 1) / -step;
            let last = start + step * (size - 1);
            Self::with_size(last, -step, size)
        }
    }

    /// The contiguous range `start..end`.
    pub fn till(start: i64, end: i64) -> Self {
        Self::new(start, 1, end)
    }

    /// The single-element range `{index}`.
    pub fn single(index: i64) -> Self {
        Self::with_size(index, 1, 1)
    }

    /// A range given by its first element, step, and element count.
    ///
    /// A single-element range normalizes its step to 1, so equal sets are
    /// equal values.
    ///
    /// # Panics
    ///
    /// Panics if `step < 1` or `size < 1`.
    pub fn with_size(start: i64, step: i64, size: i64) -> Self {
        assert!(step >= 1, "range step must be positive, got {}", step);
        assert!(size >= 1, "range size must be positive, got {}", size);
        let step = if size == 1 { 1 } else { step };
        Self { start, step, end: start + size * step }
    }

    /// First element.
    #[inline]
    pub fn start(&self) -> i64 {
        self.start
    }

    /// Distance between consecutive elements.
    #[inline]
    pub fn step(&self) -> i64 {
        self.step
    }

    /// Exclusive, aligned upper bound.
    #[inline]
    pub fn end(&self) -> i64 {
        self.end
    }

    /// Last element.
    #[inline]
    pub fn last(&self) -> i64 {
        self.end - self.step
    }

    /// Number of elements.
    #[inline]
    pub fn size(&self) -> i64 {
        (self.end - self.start) / self.step
    }

    /// True if `index` is an element.
    pub fn contains(&self, index: i64) -> bool {
        index >= self.start && index < self.end && (index - self.start) % self.step == 0
    }

    /// True if every element of `other` is an element of `self`.
    pub fn contains_range(&self, other: &Range) -> bool {
        if !self.contains(other.start) {
            return false;
        }
        if other.size() == 1 {
            return true;
        }
        self.contains(other.last()) && other.step % self.step == 0
    }

    /// Intersect two ranges as integer lattices.
    ///
    /// The elements common to both ranges form another equally spaced set
    /// (with step `lcm(a.step, b.step)`) or no set at all.
    pub fn intersect(&self, other: &Range) -> Option<Range> {
        let (g, x, _) = egcd(self.step, other.step);
        let diff = other.start - self.start;
        if diff % g != 0 {
            // The two lattices never meet.
            return None;
        }

        let lcm = self.step / g * other.step;
        let m = other.step / g;
        // Solve start + step*t ≡ other.start (mod other.step).
        let t = (((diff / g) % m) as i128 * (x % m) as i128).rem_euclid(m as i128) as i64;
        let x0 = self.start + self.step * t;

        let lo = self.start.max(other.start);
        let hi = self.last().min(other.last());
        if lo > hi {
            return None;
        }

        let mut first = x0 + (lo - x0).div_euclid(lcm) * lcm;
        if first < lo {
            first += lcm;
        }
        if first > hi {
            return None;
        }

        let size = (hi - first) / lcm + 1;
        Some(Range::with_size(first, lcm, size))
    }
}

/// Extended gcd: returns `(g, x, y)` with `a*x + b*y == g`.
fn egcd(a: i64, b: i64) -> (i64, i64, i64) {
    if b == 0 {
        (a, 1, 0)
    } else {
        let (g, x, y) = egcd(b, a % b);
        (g, y, x - (a / b) * y)
    }
}

impl fmt::Debug for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.step == 1 {
            write!(f, "{}..{}", self.start, self.end)
        } else {
            write!(f, "{}..{} by {}", self.start, self.end, self.step)
        }
    }
}

/// A rectangular index space: the cartesian product of ranges.
///
/// Rank 0 is the space of the single empty index (a scalar).
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Shape {
    ranges: Vec<Range>,
}

impl Shape {
    /// Create a shape from its per-axis ranges.
    pub fn new(ranges: Vec<Range>) -> Self {
        Self { ranges }
    }

    /// The rank-0 shape of a scalar.
    pub fn scalar() -> Self {
        Self { ranges: Vec::new() }
    }

    /// Number of axes.
    #[inline]
    pub fn rank(&self) -> usize {
        self.ranges.len()
    }

    /// Number of elements (1 for rank 0).
    pub fn size(&self) -> i64 {
        self.ranges.iter().map(Range::size).product()
    }

    /// The per-axis ranges.
    #[inline]
    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    /// The range along one axis.
    #[inline]
    pub fn axis(&self, axis: usize) -> Range {
        self.ranges[axis]
    }

    /// Intersect two shapes of equal rank axis by axis.
    pub fn intersect(&self, other: &Shape) -> Option<Shape> {
        assert_eq!(self.rank(), other.rank(), "rank mismatch in shape intersection");
        let mut ranges = Vec::with_capacity(self.rank());
        for (a, b) in self.ranges.iter().zip(&other.ranges) {
            ranges.push(a.intersect(b)?);
        }
        Some(Shape { ranges })
    }

    /// True if `other` is a sub-lattice of `self` on every axis.
    pub fn contains_shape(&self, other: &Shape) -> bool {
        self.rank() == other.rank()
            && self.ranges.iter().zip(&other.ranges).all(|(a, b)| a.contains_range(b))
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, range) in self.ranges.iter().enumerate() {
            if i > 0 {
                write!(f, " × ")?;
            }
            write!(f, "{}", range)?;
        }
        write!(f, "]")
    }
}

/// The smallest rectangular shape that could be partitioned by `shapes`.
///
/// Per axis, the candidate range starts at the least start, ends at the
/// greatest last element, and steps by the gcd of all steps and start
/// offsets. Returns `None` when the inputs cannot partition the candidate
/// (their total size differs from its size, or one of them is not a
/// sub-lattice of it) — i.e. when the union is not rectangular.
///
/// Disjointness is not checked here; callers that need a partition check it
/// separately.
pub fn rectangular_union(shapes: &[Shape]) -> Option<Shape> {
    assert!(!shapes.is_empty());
    let rank = shapes[0].rank();
    if rank == 0 {
        return if shapes.len() == 1 { Some(Shape::scalar()) } else { None };
    }

    let mut ranges = Vec::with_capacity(rank);
    for axis in 0..rank {
        let start = shapes.iter().map(|s| s.axis(axis).start()).min().unwrap();
        let last = shapes.iter().map(|s| s.axis(axis).last()).max().unwrap();

        let mut step = 0;
        for shape in shapes {
            let r = shape.axis(axis);
            step = gcd(step, r.step());
            step = gcd(step, r.start() - start);
        }
        if step == 0 {
            step = 1;
        }

        ranges.push(Range::with_size(start, step, (last - start) / step + 1));
    }

    let candidate = Shape::new(ranges);
    let total: i64 = shapes.iter().map(Shape::size).sum();
    if total != candidate.size() {
        return None;
    }
    if !shapes.iter().all(|s| candidate.contains_shape(s)) {
        return None;
    }
    Some(candidate)
}

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// The coarsest partition of the union of `shapes` that respects every
/// per-axis boundary of every input shape.
///
/// Each shape is split on every axis at every other shape's start and end;
/// cells that come out identical are emitted once. The result is pairwise
/// disjoint whenever overlapping inputs agree on their common cells (which
/// holds for the subspace lists the partitioner feeds in).
pub fn subdivide(shapes: &[Shape]) -> Vec<Shape> {
    if shapes.len() <= 1 {
        return shapes.to_vec();
    }
    let rank = shapes[0].rank();
    debug_assert!(shapes.iter().all(|s| s.rank() == rank));

    // Per-axis break points: every start and end of every shape.
    let mut breaks: Vec<Vec<i64>> = vec![Vec::new(); rank];
    for shape in shapes {
        for (axis, range) in shape.ranges().iter().enumerate() {
            breaks[axis].push(range.start());
            breaks[axis].push(range.end());
        }
    }
    for axis_breaks in &mut breaks {
        axis_breaks.sort_unstable();
        axis_breaks.dedup();
    }

    let mut seen: FxHashSet<Shape> = FxHashSet::default();
    let mut cells = Vec::new();
    for shape in shapes {
        let segments: Vec<Vec<Range>> = shape
            .ranges()
            .iter()
            .enumerate()
            .map(|(axis, range)| split_range(range, &breaks[axis]))
            .collect();
        emit_cells(&segments, &mut Vec::new(), &mut seen, &mut cells);
    }
    cells
}

/// Split one range at the given sorted break points.
fn split_range(range: &Range, breaks: &[i64]) -> Vec<Range> {
    let mut cuts = vec![range.start()];
    cuts.extend(breaks.iter().copied().filter(|&b| b > range.start() && b < range.end()));
    cuts.push(range.end());

    let mut segments = Vec::with_capacity(cuts.len() - 1);
    for window in cuts.windows(2) {
        let (lo, hi) = (window[0], window[1]);
        // First lattice element at or after lo, last strictly before hi.
        let first = range.start() + (lo - range.start() + range.step() - 1) / range.step() * range.step();
        let last = range.start() + (hi - 1 - range.start()) / range.step() * range.step();
        let last = last.min(range.last());
        if first <= last {
            segments.push(Range::with_size(first, range.step(), (last - first) / range.step() + 1));
        }
    }
    segments
}

fn emit_cells(
    segments: &[Vec<Range>],
    prefix: &mut Vec<Range>,
    seen: &mut FxHashSet<Shape>,
    out: &mut Vec<Shape>,
) {
    if prefix.len() == segments.len() {
        let cell = Shape::new(prefix.clone());
        if seen.insert(cell.clone()) {
            out.push(cell);
        }
        return;
    }
    for range in &segments[prefix.len()] {
        prefix.push(*range);
        emit_cells(segments, prefix, seen, out);
        prefix.pop();
    }
}
