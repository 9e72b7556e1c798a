use nalgebra::{point, Point3};

#[derive(Clone, Copy, Debug)]
pub enum BoundingShape {
    Sphere { origin: Point3<f32>, radius: f32 },
    BoundingBox { min: Point3<f32>, max: Point3<f32> },
}

impl BoundingShape {
    /// Axis-aligned box around a point set. An empty set yields a
    /// degenerate box at the origin.
    pub fn bounding_box_from_points(points: impl IntoIterator<Item = Point3<f32>>) -> BoundingShape {
        let mut points = points.into_iter();
        let Some(first) = points.next() else {
            return BoundingShape::BoundingBox {
                min: Point3::origin(),
                max: Point3::origin(),
            };
        };

        let mut min = first;
        let mut max = first;
        for p in points {
            min = Point3::from(min.coords.inf(&p.coords));
            max = Point3::from(max.coords.sup(&p.coords));
        }
        BoundingShape::BoundingBox { min, max }
    }

    /// Componentwise extremes: the box corners for a box, the enclosing box
    /// corners for a sphere.
    pub fn box_extremes(&self) -> (Point3<f32>, Point3<f32>) {
        match self {
            BoundingShape::BoundingBox { min, max } => (*min, *max),
            BoundingShape::Sphere { origin, radius } => (
                point![origin.x - radius, origin.y - radius, origin.z - radius],
                point![origin.x + radius, origin.y + radius, origin.z + radius],
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use nalgebra::point;

    use super::BoundingShape;

    #[test]
    fn box_from_points_takes_componentwise_extremes() {
        let shape = BoundingShape::bounding_box_from_points([
            point![1.0, -2.0, 0.5],
            point![-3.0, 4.0, 0.0],
            point![0.0, 0.0, -1.0],
        ]);

        let (min, max) = shape.box_extremes();
        assert_abs_diff_eq!(min, point![-3.0, -2.0, -1.0]);
        assert_abs_diff_eq!(max, point![1.0, 4.0, 0.5]);
    }

    #[test]
    fn sphere_extremes_enclose_the_radius() {
        let shape = BoundingShape::Sphere {
            origin: point![1.0, 2.0, 3.0],
            radius: 2.0,
        };
        let (min, max) = shape.box_extremes();
        assert_abs_diff_eq!(min, point![-1.0, 0.0, 1.0]);
        assert_abs_diff_eq!(max, point![3.0, 4.0, 5.0]);
    }
}
