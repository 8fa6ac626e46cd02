//! 2-D primitives for the projected (sun-frame) occlusion test.

/// Point in the plane perpendicular to the solar ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bbox2 {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Bbox2 {
    /// Box that contains nothing; the identity for [`Bbox2::union`].
    pub const EMPTY: Bbox2 = Bbox2 {
        xmin: f64::INFINITY,
        ymin: f64::INFINITY,
        xmax: f64::NEG_INFINITY,
        ymax: f64::NEG_INFINITY,
    };

    pub fn is_empty(&self) -> bool {
        !(self.xmin <= self.xmax && self.ymin <= self.ymax)
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    pub fn union(self, other: Bbox2) -> Bbox2 {
        Bbox2 {
            xmin: self.xmin.min(other.xmin),
            ymin: self.ymin.min(other.ymin),
            xmax: self.xmax.max(other.xmax),
            ymax: self.ymax.max(other.ymax),
        }
    }

    /// Closed-interval overlap; boxes that share only an edge overlap.
    #[inline]
    pub fn overlaps(&self, other: &Bbox2) -> bool {
        self.xmin <= other.xmax
            && other.xmin <= self.xmax
            && self.ymin <= other.ymax
            && other.ymin <= self.ymax
    }

    /// Grow each side by `amount`.
    pub fn expand(self, amount: f64) -> Bbox2 {
        Bbox2 {
            xmin: self.xmin - amount,
            ymin: self.ymin - amount,
            xmax: self.xmax + amount,
            ymax: self.ymax + amount,
        }
    }
}

/// Triangle projected onto the sun-frame xy plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle2 {
    pub a: Point2,
    pub b: Point2,
    pub c: Point2,
}

impl Triangle2 {
    pub const fn new(a: Point2, b: Point2, c: Point2) -> Self {
        Self { a, b, c }
    }

    #[inline]
    pub fn points(&self) -> [Point2; 3] {
        [self.a, self.b, self.c]
    }

    pub fn bbox(&self) -> Bbox2 {
        Bbox2 {
            xmin: self.a.x.min(self.b.x).min(self.c.x),
            ymin: self.a.y.min(self.b.y).min(self.c.y),
            xmax: self.a.x.max(self.b.x).max(self.c.x),
            ymax: self.a.y.max(self.b.y).max(self.c.y),
        }
    }

    pub fn centroid(&self) -> Point2 {
        Point2::new(
            (self.a.x + self.b.x + self.c.x) / 3.0,
            (self.a.y + self.b.y + self.c.y) / 3.0,
        )
    }

    /// Separating-axis test over the six edge normals.
    ///
    /// Triangles whose projections overlap by no more than `tolerance` on some
    /// axis are separated; touching along an edge or at a vertex is not an
    /// intersection.
    ///
    /// Projections are taken relative to the edge's first point, so both
    /// endpoints of the edge land on exactly zero and faces sharing that
    /// edge separate without rounding noise.
    pub fn intersects(&self, other: &Triangle2, tolerance: f64) -> bool {
        let mine = self.points();
        let theirs = other.points();
        for tri in [&mine, &theirs] {
            for i in 0..3 {
                let p = tri[i];
                let q = tri[(i + 1) % 3];
                let (nx, ny) = (p.y - q.y, q.x - p.x);
                let len = nx.hypot(ny);
                if len == 0.0 {
                    continue;
                }
                let slack = tolerance * len;
                let (min_a, max_a) = project(&mine, p, nx, ny);
                let (min_b, max_b) = project(&theirs, p, nx, ny);
                if max_a <= min_b + slack || max_b <= min_a + slack {
                    return false;
                }
            }
        }
        true
    }
}

#[inline]
fn project(points: &[Point2; 3], origin: Point2, nx: f64, ny: f64) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for p in points {
        let d = (p.x - origin.x) * nx + (p.y - origin.y) * ny;
        lo = lo.min(d);
        hi = hi.max(d);
    }
    (lo, hi)
}
