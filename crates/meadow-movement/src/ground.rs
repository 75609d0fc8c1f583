//! Downward ground queries supplied by the terrain system.

use glam::Vec3;

/// Result of a downward ground probe.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundHit {
    /// Ground height (y) at the probed XZ position.
    pub height: f32,
    /// Unit surface normal.
    pub normal: Vec3,
}

/// Terrain capability consumed by the movement controller.
pub trait GroundQuery {
    /// Probe straight down at world XZ; `None` when there is no terrain.
    fn sample(&self, x: f32, z: f32) -> Option<GroundHit>;
}

impl<F> GroundQuery for F
where
    F: Fn(f32, f32) -> Option<GroundHit>,
{
    fn sample(&self, x: f32, z: f32) -> Option<GroundHit> {
        self(x, z)
    }
}

/// Infinite horizontal plane, optionally limited to a square around the
/// origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlatGround {
    /// Plane height.
    pub height: f32,
    /// Half extent of the covered square; `None` covers everything.
    pub half_extent: Option<f32>,
}

impl FlatGround {
    /// Unbounded plane at `height`.
    pub fn at(height: f32) -> Self {
        Self {
            height,
            half_extent: None,
        }
    }
}

impl GroundQuery for FlatGround {
    fn sample(&self, x: f32, z: f32) -> Option<GroundHit> {
        if let Some(half) = self.half_extent
            && (x.abs() > half || z.abs() > half)
        {
            return None;
        }
        Some(GroundHit {
            height: self.height,
            normal: Vec3::Y,
        })
    }
}

/// Regular grid of heights sampled bilinearly.
///
/// Cell `(i, j)` sits at `origin + (i * cell_size, j * cell_size)` in XZ.
/// Normals come from the bilinear surface gradient, so slopes tilt the
/// avatar smoothly across cell borders.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightField {
    origin_x: f32,
    origin_z: f32,
    cell_size: f32,
    columns: usize,
    rows: usize,
    heights: Vec<f32>,
}

impl HeightField {
    /// Build a field of `columns × rows` samples by evaluating `height_at`
    /// at each grid point. Returns `None` for fewer than two samples on
    /// either axis or a non-positive cell size.
    pub fn from_fn(
        origin_x: f32,
        origin_z: f32,
        cell_size: f32,
        columns: usize,
        rows: usize,
        height_at: impl Fn(f32, f32) -> f32,
    ) -> Option<Self> {
        if columns < 2 || rows < 2 || cell_size <= 0.0 {
            return None;
        }
        let mut heights = Vec::with_capacity(columns * rows);
        for j in 0..rows {
            for i in 0..columns {
                let x = origin_x + i as f32 * cell_size;
                let z = origin_z + j as f32 * cell_size;
                heights.push(height_at(x, z));
            }
        }
        Some(Self {
            origin_x,
            origin_z,
            cell_size,
            columns,
            rows,
            heights,
        })
    }

    fn at(&self, i: usize, j: usize) -> f32 {
        self.heights[j * self.columns + i]
    }
}

impl GroundQuery for HeightField {
    fn sample(&self, x: f32, z: f32) -> Option<GroundHit> {
        let gx = (x - self.origin_x) / self.cell_size;
        let gz = (z - self.origin_z) / self.cell_size;
        let max_x = (self.columns - 1) as f32;
        let max_z = (self.rows - 1) as f32;
        if !(0.0..=max_x).contains(&gx) || !(0.0..=max_z).contains(&gz) {
            return None;
        }

        let i = (gx.floor() as usize).min(self.columns - 2);
        let j = (gz.floor() as usize).min(self.rows - 2);
        let fx = gx - i as f32;
        let fz = gz - j as f32;

        let h00 = self.at(i, j);
        let h10 = self.at(i + 1, j);
        let h01 = self.at(i, j + 1);
        let h11 = self.at(i + 1, j + 1);

        let height = h00 * (1.0 - fx) * (1.0 - fz)
            + h10 * fx * (1.0 - fz)
            + h01 * (1.0 - fx) * fz
            + h11 * fx * fz;

        let dh_dx = ((h10 - h00) * (1.0 - fz) + (h11 - h01) * fz) / self.cell_size;
        let dh_dz = ((h01 - h00) * (1.0 - fx) + (h11 - h10) * fx) / self.cell_size;
        let normal = Vec3::new(-dh_dx, 1.0, -dh_dz).normalize();

        Some(GroundHit { height, normal })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_ground_bounds() {
        let ground = FlatGround {
            height: 2.0,
            half_extent: Some(10.0),
        };
        assert_eq!(ground.sample(3.0, -4.0).unwrap().height, 2.0);
        assert!(ground.sample(10.5, 0.0).is_none());
    }

    #[test]
    fn test_height_field_interpolates_between_samples() {
        let field = HeightField::from_fn(0.0, 0.0, 1.0, 3, 3, |x, _| x * 2.0).unwrap();
        let hit = field.sample(0.5, 1.0).unwrap();
        assert!((hit.height - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_height_field_normal_tilts_against_slope() {
        // Rises 1 m per metre along +X: the normal leans toward -X at 45°.
        let field = HeightField::from_fn(0.0, 0.0, 1.0, 4, 4, |x, _| x).unwrap();
        let hit = field.sample(1.5, 1.5).unwrap();
        let expected = Vec3::new(-1.0, 1.0, 0.0).normalize();
        assert!(
            hit.normal.abs_diff_eq(expected, 1e-4),
            "normal {:?} != {:?}",
            hit.normal,
            expected
        );
    }

    #[test]
    fn test_height_field_outside_is_miss() {
        let field = HeightField::from_fn(0.0, 0.0, 2.0, 3, 3, |_, _| 0.0).unwrap();
        assert!(field.sample(-0.1, 1.0).is_none());
        assert!(field.sample(4.0, 4.0).is_some(), "far edge is inside");
        assert!(field.sample(4.1, 1.0).is_none());
    }

    #[test]
    fn test_degenerate_field_rejected() {
        assert!(HeightField::from_fn(0.0, 0.0, 1.0, 1, 5, |_, _| 0.0).is_none());
        assert!(HeightField::from_fn(0.0, 0.0, 0.0, 3, 3, |_, _| 0.0).is_none());
    }

    #[test]
    fn test_closure_is_a_ground_query() {
        let ramp = |x: f32, _z: f32| {
            Some(GroundHit {
                height: x * 0.5,
                normal: Vec3::Y,
            })
        };
        assert_eq!(ramp.sample(4.0, 0.0).unwrap().height, 2.0);
    }
}
