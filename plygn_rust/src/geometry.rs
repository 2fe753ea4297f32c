/// Integer pixel coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Midpoint with integer truncation of the per-axis average.
    /// Symmetric in its arguments, so both triangles sharing an edge agree on it.
    pub fn midpoint(self, o: Self) -> Self {
        Self { x: (self.x + o.x) / 2, y: (self.y + o.y) / 2 }
    }
}

/// Three integer vertices. Degenerate (zero-area) triangles are legal values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Triangle {
    pub a: Point,
    pub b: Point,
    pub c: Point,
}

impl Triangle {
    pub const fn new(a: Point, b: Point, c: Point) -> Self {
        Self { a, b, c }
    }

    pub fn from_coords(coords: [(i32, i32); 3]) -> Self {
        let [a, b, c] = coords.map(|(x, y)| Point::new(x, y));
        Self { a, b, c }
    }

    pub fn vertices(&self) -> [Point; 3] {
        [self.a, self.b, self.c]
    }

    /// Shoelace sum `x1(y2-y3) + x2(y3-y1) + x3(y1-y2)`, i.e. twice the signed area.
    pub fn doubled_signed_area(&self) -> i64 {
        let (x1, y1) = (self.a.x as i64, self.a.y as i64);
        let (x2, y2) = (self.b.x as i64, self.b.y as i64);
        let (x3, y3) = (self.c.x as i64, self.c.y as i64);
        x1 * (y2 - y3) + x2 * (y3 - y1) + x3 * (y1 - y2)
    }

    pub fn doubled_area(&self) -> u64 {
        self.doubled_signed_area().unsigned_abs()
    }

    pub fn area(&self) -> f64 {
        self.doubled_area() as f64 * 0.5
    }

    pub fn is_degenerate(&self) -> bool {
        self.doubled_signed_area() == 0
    }
}
