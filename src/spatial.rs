// Copyright 2024 Mikael Lund
//
// Licensed under the Apache license, version 2.0 (the "license");
// you may not use this file except in compliance with the license.
// You may obtain a copy of the license at
//
//     http://www.apache.org/licenses/license-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the license is distributed on an "as is" basis,
// without warranties or conditions of any kind, either express or implied.
// See the license for the specific language governing permissions and
// limitations under the license.

//! # Octree nearest neighbour search
//!
//! For every point in a query set B, find the nearest point in an indexed set A,
//! skipping pairs rejected by an ignore predicate. The tree borrows A and holds only
//! indices, so it can be built per call and thrown away.

use crate::Point;

/// Maximum number of points in a leaf before it is split
const LEAF_CAPACITY: usize = 8;

/// Coincident points cannot be separated; stop splitting at this depth.
const MAX_DEPTH: usize = 16;

/// Anything with a position in space.
pub trait Located {
    fn position(&self) -> Point;
}

impl Located for Point {
    fn position(&self) -> Point {
        *self
    }
}

/// Nearest point of A for one point of B.
#[derive(Debug, Clone, Copy)]
pub struct NearestMatch<'a, A, B> {
    /// Nearest accepted point of A; `None` if all were ignored or out of range
    pub a: Option<&'a A>,
    pub b: &'a B,
    /// Squared distance; `NaN` if there is no match
    pub distance_squared: f64,
}

/// Axis aligned bounding box
#[derive(Debug, Clone, Copy)]
struct BoundingBox {
    min: Point,
    max: Point,
}

impl BoundingBox {
    fn enclosing<'a>(points: impl Iterator<Item = &'a Point>) -> Self {
        let mut bbox = Self {
            min: Point::repeat(f64::INFINITY),
            max: Point::repeat(f64::NEG_INFINITY),
        };
        for p in points {
            bbox.min = bbox.min.inf(p);
            bbox.max = bbox.max.sup(p);
        }
        bbox
    }

    fn center(&self) -> Point {
        (self.min + self.max) * 0.5
    }

    /// Squared distance from a point to the nearest point of the box (zero if inside)
    fn distance_squared(&self, point: &Point) -> f64 {
        (0..3)
            .map(|i| {
                let d = (self.min[i] - point[i]).max(point[i] - self.max[i]).max(0.0);
                d * d
            })
            .sum()
    }

    /// Octant index 0..8 of a point relative to `center`
    fn octant(center: &Point, point: &Point) -> usize {
        (0..3)
            .filter(|&i| point[i] >= center[i])
            .map(|i| 1 << i)
            .sum()
    }
}

#[derive(Debug)]
enum Node {
    Leaf(Vec<usize>),
    Branch(Vec<(BoundingBox, Node)>),
}

/// Octree over a borrowed slice of points.
///
/// Points with non-finite coordinates are not indexed.
#[derive(Debug)]
pub struct Octree<'a, A> {
    items: &'a [A],
    positions: Vec<Point>,
    root: Option<(BoundingBox, Node)>,
}

impl<'a, A: Located> Octree<'a, A> {
    pub fn new(items: &'a [A]) -> Self {
        let positions: Vec<Point> = items.iter().map(Located::position).collect();
        let indices: Vec<usize> = (0..items.len())
            .filter(|&i| positions[i].iter().all(|x| x.is_finite()))
            .collect();
        let root = (!indices.is_empty()).then(|| {
            let bbox = BoundingBox::enclosing(indices.iter().map(|&i| &positions[i]));
            let node = Self::build(&positions, indices, &bbox, 0);
            (bbox, node)
        });
        Self {
            items,
            positions,
            root,
        }
    }

    fn build(positions: &[Point], indices: Vec<usize>, bbox: &BoundingBox, depth: usize) -> Node {
        if indices.len() <= LEAF_CAPACITY || depth >= MAX_DEPTH {
            return Node::Leaf(indices);
        }
        let center = bbox.center();
        let mut octants: [Vec<usize>; 8] = Default::default();
        for i in indices {
            octants[BoundingBox::octant(&center, &positions[i])].push(i);
        }
        let children = octants
            .into_iter()
            .filter(|octant| !octant.is_empty())
            .map(|octant| {
                let child_box = BoundingBox::enclosing(octant.iter().map(|&i| &positions[i]));
                let child = Self::build(positions, octant, &child_box, depth + 1);
                (child_box, child)
            })
            .collect();
        Node::Branch(children)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Index and squared distance of the nearest accepted point within `max_distance_squared`.
    ///
    /// Equal squared distances resolve to the lower index in A.
    pub fn nearest<B: Located>(
        &self,
        query: &B,
        max_distance_squared: f64,
        ignore: &impl Fn(&A, &B) -> bool,
    ) -> Option<(usize, f64)> {
        let point = query.position();
        if !point.iter().all(|x| x.is_finite()) {
            return None;
        }
        let mut best = None;
        if let Some((bbox, node)) = &self.root {
            let mut search = Search {
                tree: self,
                point,
                query,
                limit: max_distance_squared,
                ignore,
                best: &mut best,
            };
            search.visit(bbox, node);
        }
        best
    }
}

/// State of one nearest neighbour query
struct Search<'s, 'a, A, B, F> {
    tree: &'s Octree<'a, A>,
    point: Point,
    query: &'s B,
    limit: f64,
    ignore: &'s F,
    best: &'s mut Option<(usize, f64)>,
}

impl<A, B, F> Search<'_, '_, A, B, F>
where
    F: Fn(&A, &B) -> bool,
{
    fn bound(&self) -> f64 {
        self.best.map_or(self.limit, |(_, d2)| d2)
    }

    fn visit(&mut self, bbox: &BoundingBox, node: &Node) {
        if bbox.distance_squared(&self.point) > self.bound() {
            return;
        }
        match node {
            Node::Leaf(indices) => {
                for &i in indices {
                    self.offer(i);
                }
            }
            Node::Branch(children) => {
                // nearest boxes first to tighten the bound early
                let mut order: Vec<(f64, usize)> = children
                    .iter()
                    .enumerate()
                    .map(|(i, (b, _))| (b.distance_squared(&self.point), i))
                    .collect();
                order.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
                for (_, i) in order {
                    let (child_box, child) = &children[i];
                    self.visit(child_box, child);
                }
            }
        }
    }

    fn offer(&mut self, index: usize) {
        let d2 = (self.tree.positions[index] - self.point).norm_squared();
        let better = match *self.best {
            None => d2 <= self.limit,
            Some((j, best)) => d2 < best || (d2 == best && index < j),
        };
        if better && !(self.ignore)(&self.tree.items[index], self.query) {
            *self.best = Some((index, d2));
        }
    }
}

/// For each point of `b`, find its nearest point in `a` that is not ignored.
///
/// The result is parallel to `b`. Points further away than `max_distance` are never
/// matched.
pub fn nearest_neighbours<'a, A: Located, B: Located>(
    a: &'a [A],
    b: &'a [B],
    max_distance: Option<f64>,
    ignore: impl Fn(&A, &B) -> bool,
) -> Vec<NearestMatch<'a, A, B>> {
    let tree = Octree::new(a);
    let limit = max_distance.map_or(f64::INFINITY, |d| d * d);
    b.iter()
        .map(|query| match tree.nearest(query, limit, &ignore) {
            Some((i, distance_squared)) => NearestMatch {
                a: Some(&a[i]),
                b: query,
                distance_squared,
            },
            None => NearestMatch {
                a: None,
                b: query,
                distance_squared: f64::NAN,
            },
        })
        .collect()
}
