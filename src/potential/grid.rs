//! External potential tabulated on a regular grid.
//!
//! The grid file is YAML, one axis per dimension and the values with the last
//! axis running fastest:
//!
//! ```yaml
//! axes:
//!   - { min: -1.0, max: 1.0, points: 3 }
//!   - { min: 0.0, max: 2.0, points: 2 }
//! values: [0.0, 1.0, 2.0, 3.0, 4.0, 5.0]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::Potential;
use crate::error::{DmcError, Result};
use crate::system::{Particle, Position};

/// Evenly spaced sample points `min, ..., max` along one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridAxis {
    pub min: f64,
    pub max: f64,
    pub points: usize,
}

impl GridAxis {
    fn spacing(&self) -> f64 {
        (self.max - self.min) / (self.points - 1) as f64
    }

    /// Lower grid index and fractional offset of `x`, `None` off the grid.
    fn locate(&self, x: f64) -> Option<(usize, f64)> {
        if !(x >= self.min && x <= self.max) {
            return None;
        }
        let t = (x - self.min) / self.spacing();
        let lower = (t.floor() as usize).min(self.points - 2);
        Some((lower, t - lower as f64))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GridFile {
    axes: Vec<GridAxis>,
    values: Vec<f64>,
}

/// V = Σᵢ g(rᵢ), with g multilinearly interpolated between grid points.
///
/// Outside the grid the potential is infinite, so walkers leaving the
/// tabulated region are removed at the next branching step.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPotential {
    axes: Vec<GridAxis>,
    values: Vec<f64>,
    source: String,
}

impl GridPotential {
    pub fn new(axes: Vec<GridAxis>, values: Vec<f64>, source: &str) -> Result<Self> {
        for (k, axis) in axes.iter().enumerate() {
            let finite = axis.min.is_finite() && axis.max.is_finite();
            if axis.points < 2 || !finite || !(axis.max > axis.min) {
                return Err(DmcError::config(format!(
                    "grid axis {} of {} needs min < max and at least 2 points",
                    k, source
                )));
            }
        }
        let expected: usize = axes.iter().map(|a| a.points).product();
        if values.len() != expected {
            return Err(DmcError::config(format!(
                "grid {} has {} values, its axes need {}",
                source,
                values.len(),
                expected
            )));
        }
        Ok(Self {
            axes,
            values,
            source: source.to_string(),
        })
    }

    /// Read a grid file whose axes must match `dimensions`.
    pub fn read(path: impl AsRef<Path>, dimensions: usize) -> Result<Self> {
        let path = path.as_ref();
        let reader = std::io::BufReader::new(std::fs::File::open(path)?);
        let grid: GridFile = serde_yaml::from_reader(reader)?;
        let source = path.display().to_string();
        if grid.axes.len() != dimensions {
            return Err(DmcError::config(format!(
                "grid {} has {} axes but the system has {} dimensions",
                source,
                grid.axes.len(),
                dimensions
            )));
        }
        Self::new(grid.axes, grid.values, &source)
    }

    /// Interpolated value at `r`, infinite outside the grid.
    pub fn value_at(&self, r: &Position) -> f64 {
        let mut cell = Vec::with_capacity(self.axes.len());
        for (axis, &x) in self.axes.iter().zip(r.iter()) {
            match axis.locate(x) {
                Some(located) => cell.push(located),
                None => return f64::INFINITY,
            }
        }

        let mut value = 0.0;
        for corner in 0..(1usize << cell.len()) {
            let mut index = 0;
            let mut weight = 1.0;
            for (k, (axis, &(lower, frac))) in self.axes.iter().zip(&cell).enumerate() {
                let upper = (corner >> k) & 1 == 1;
                index = index * axis.points + lower + upper as usize;
                weight *= if upper { frac } else { 1.0 - frac };
            }
            if weight != 0.0 {
                value += weight * self.values[index];
            }
        }
        value
    }
}

impl Potential for GridPotential {
    fn evaluate(&self, configuration: &[Position], _particles: &[Particle]) -> f64 {
        configuration.iter().map(|r| self.value_at(r)).sum()
    }

    fn one_line_description(&self) -> String {
        let shape: Vec<String> = self.axes.iter().map(|a| a.points.to_string()).collect();
        format!("Grid potential from {} ({} points)", self.source, shape.join(" x "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    fn axis(min: f64, max: f64, points: usize) -> GridAxis {
        GridAxis { min, max, points }
    }

    #[test]
    fn test_linear_profile_is_reproduced() {
        // g(x) = 2x + 1 sampled at x = -1, 0, 1
        let grid =
            GridPotential::new(vec![axis(-1.0, 1.0, 3)], vec![-1.0, 1.0, 3.0], "line").unwrap();
        for &x in &[-1.0, -0.3, 0.0, 0.25, 1.0] {
            let r = Position::from_vec(vec![x]);
            assert_relative_eq!(grid.value_at(&r), 2.0 * x + 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_bilinear_interpolation() {
        // g(x, y) = x + 10 y on a 2 x 3 grid, last axis fastest
        let values = vec![0.0, 10.0, 20.0, 1.0, 11.0, 21.0];
        let axes = vec![axis(0.0, 1.0, 2), axis(0.0, 2.0, 3)];
        let grid = GridPotential::new(axes, values, "plane").unwrap();
        let r = Position::from_vec(vec![0.5, 1.5]);
        assert_relative_eq!(grid.value_at(&r), 15.5, epsilon = 1e-12);

        let particles = vec![
            Particle::new("a", 1.0, 0.0, 0, vec![0.0, 0.0]),
            Particle::new("b", 1.0, 0.0, 0, vec![0.0, 0.0]),
        ];
        let configuration = vec![r, Position::from_vec(vec![1.0, 0.0])];
        assert_relative_eq!(grid.evaluate(&configuration, &particles), 16.5, epsilon = 1e-12);
    }

    #[test]
    fn test_outside_the_grid_is_infinite() {
        let grid = GridPotential::new(vec![axis(-1.0, 1.0, 3)], vec![0.0; 3], "flat").unwrap();
        assert!(grid.value_at(&Position::from_vec(vec![1.5])).is_infinite());
        assert!(grid.value_at(&Position::from_vec(vec![f64::NAN])).is_infinite());
    }

    #[test]
    fn test_malformed_grids_are_rejected() {
        assert!(GridPotential::new(vec![axis(0.0, 1.0, 3)], vec![0.0; 2], "short").is_err());
        assert!(GridPotential::new(vec![axis(0.0, 1.0, 1)], vec![0.0], "single").is_err());
        assert!(GridPotential::new(vec![axis(1.0, 0.0, 2)], vec![0.0; 2], "reversed").is_err());
    }

    #[test]
    fn test_read_grid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "axes:\n  - {{ min: 0.0, max: 4.0, points: 5 }}\nvalues: [0, 1, 4, 9, 16]\n")
            .unwrap();

        let grid = GridPotential::read(file.path(), 1).unwrap();
        assert_relative_eq!(grid.value_at(&Position::from_vec(vec![2.5])), 6.5, epsilon = 1e-12);
        assert!(grid.one_line_description().ends_with("(5 points)"));
        assert!(matches!(GridPotential::read(file.path(), 2), Err(DmcError::Config(_))));
    }
}
