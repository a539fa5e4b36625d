//! Continuous action space.
use crate::error::ControlError;
use anyhow::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A box in `R^n` given by elementwise lower and upper bounds.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BoxSpace {
    low: Vec<f32>,
    high: Vec<f32>,
}

impl BoxSpace {
    /// Creates a box from its bounds.
    ///
    /// Both bounds must be finite, have the same length, and `low <= high`.
    pub fn new(low: Vec<f32>, high: Vec<f32>) -> Result<Self> {
        if low.len() != high.len() {
            return Err(ControlError::shape("BoxSpace bounds", &[low.len()], &[high.len()]).into());
        }
        let valid = low
            .iter()
            .zip(high.iter())
            .all(|(l, h)| l.is_finite() && h.is_finite() && l <= h);
        if !valid {
            return Err(ControlError::InvalidConfig(format!(
                "invalid bounds of BoxSpace: low={:?}, high={:?}",
                low, high
            ))
            .into());
        }
        Ok(Self { low, high })
    }

    /// Creates `[-bound, bound]^dim`.
    pub fn symmetric(dim: usize, bound: f32) -> Self {
        Self {
            low: vec![-bound; dim],
            high: vec![bound; dim],
        }
    }

    /// Lower bounds.
    pub fn low(&self) -> &[f32] {
        &self.low
    }

    /// Upper bounds.
    pub fn high(&self) -> &[f32] {
        &self.high
    }

    /// Dimension of the space.
    pub fn dim(&self) -> usize {
        self.low.len()
    }

    /// Shape of an action.
    pub fn shape(&self) -> [usize; 1] {
        [self.low.len()]
    }

    /// Draws an action uniformly at random.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f32> {
        self.low
            .iter()
            .zip(self.high.iter())
            .map(|(&l, &h)| if l < h { rng.gen_range(l..h) } else { l })
            .collect()
    }

    /// Clips an action into the box in place.
    pub fn clip(&self, act: &mut [f32]) {
        act.iter_mut()
            .zip(self.low.iter().zip(self.high.iter()))
            .for_each(|(a, (&l, &h))| *a = a.clamp(l, h));
    }

    /// Returns `true` if the action is inside the box.
    pub fn contains(&self, act: &[f32]) -> bool {
        act.len() == self.dim()
            && act
                .iter()
                .zip(self.low.iter().zip(self.high.iter()))
                .all(|(a, (l, h))| l <= a && a <= h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_sample_within_bounds() {
        let space = BoxSpace::new(vec![-1.0, 0.0], vec![1.0, 2.0]).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..1000 {
            assert!(space.contains(&space.sample(&mut rng)));
        }
    }

    #[test]
    fn test_clip() {
        let space = BoxSpace::symmetric(3, 2.0);
        let mut act = vec![-5.0, 0.5, 3.0];
        space.clip(&mut act);
        assert_eq!(act, vec![-2.0, 0.5, 2.0]);
    }

    #[test]
    fn test_invalid_bounds() {
        assert!(BoxSpace::new(vec![1.0], vec![0.0]).is_err());
        assert!(BoxSpace::new(vec![0.0], vec![f32::INFINITY]).is_err());
        let err = BoxSpace::new(vec![0.0, 1.0], vec![1.0]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ControlError>(),
            Some(ControlError::ShapeError { .. })
        ));
    }
}
