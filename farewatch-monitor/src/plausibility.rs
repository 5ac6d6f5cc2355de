use serde::{Deserialize, Serialize};

/// Flags result sets whose lowest price looks like a rendering glitch.
///
/// A set is suspicious when its minimum is below `floor`, or below
/// `ratio` times its maximum. Sets with fewer than two prices are never
/// suspicious.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PlausibilityPolicy {
    pub floor: i32,
    pub ratio: f64,
}

impl Default for PlausibilityPolicy {
    fn default() -> Self {
        Self { floor: 100, ratio: 0.65 }
    }
}

impl PlausibilityPolicy {
    pub fn is_suspicious(&self, prices: &[i32]) -> bool {
        if prices.len() < 2 {
            return false;
        }
        let (Some(min), Some(max)) = (prices.iter().min(), prices.iter().max()) else {
            return false;
        };

        *min < self.floor || f64::from(*min) < self.ratio * f64::from(*max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_below_floor_is_suspicious() {
        let policy = PlausibilityPolicy::default();
        assert!(policy.is_suspicious(&[80, 400, 420]));
    }

    #[test]
    fn test_outlier_minimum_is_suspicious() {
        let policy = PlausibilityPolicy::default();
        // 250 < 0.65 * 400
        assert!(policy.is_suspicious(&[250, 400]));
        assert!(!policy.is_suspicious(&[260, 400]));
    }

    #[test]
    fn test_single_price_is_never_suspicious() {
        let policy = PlausibilityPolicy::default();
        assert!(!policy.is_suspicious(&[50]));
        assert!(!policy.is_suspicious(&[]));
    }

    #[test]
    fn test_custom_policy() {
        let policy = PlausibilityPolicy { floor: 10, ratio: 0.1 };
        assert!(!policy.is_suspicious(&[50, 400]));
    }
}
