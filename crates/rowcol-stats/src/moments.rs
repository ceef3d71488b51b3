/// Single-pass running moments (Welford's update), plus min/max.
///
/// Every finite input gives a finite mean. The sum of squared deviations is held as
/// `scale^2 * ssq`, with `scale` the largest magnitude seen, so it only overflows when the
/// standard deviation itself exceeds `f64::MAX`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Moments {
    count: u64,
    mean: f64,
    scale: f64,
    ssq: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl Moments {
    pub fn push(&mut self, x: f64) {
        self.count += 1;
        let n = self.count as f64;
        let old_mean = self.mean;
        // (x - mean) / n, divided first: x - mean alone can overflow.
        self.mean += x / n - old_mean / n;

        let magnitude = x.abs().max(old_mean.abs());
        if magnitude > self.scale {
            if self.scale > 0.0 {
                let ratio = self.scale / magnitude;
                self.ssq *= ratio * ratio;
            }
            self.scale = magnitude;
        }
        if self.scale > 0.0 {
            let s = self.scale;
            self.ssq += (x / s - old_mean / s) * (x / s - self.mean / s);
        }

        self.min = Some(self.min.map_or(x, |m| m.min(x)));
        self.max = Some(self.max.map_or(x, |m| m.max(x)));
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    /// Sample (n - 1) standard deviation.
    pub fn stddev(&self) -> Option<f64> {
        (self.count >= 2).then(|| self.scale * (self.ssq / (self.count - 1) as f64).sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_two_pass_formulas() {
        let xs = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let mut m = Moments::default();
        xs.iter().for_each(|&x| m.push(x));

        let mean = xs.iter().sum::<f64>() / xs.len() as f64;
        let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (xs.len() - 1) as f64;
        assert_eq!(m.count(), 8);
        assert!((m.mean().unwrap() - mean).abs() < 1e-12);
        assert!((m.stddev().unwrap() - var.sqrt()).abs() < 1e-12);
        assert_eq!((m.min(), m.max()), (Some(2.0), Some(9.0)));
    }

    #[test]
    fn values_near_the_float_limits_stay_finite() {
        let mut m = Moments::default();
        m.push(-1.5e308);
        m.push(1.5e308);
        assert_eq!(m.mean(), Some(0.0));
        // The true deviation (about 2.12e308) is beyond f64::MAX.
        assert_eq!(m.stddev(), Some(f64::INFINITY));

        let mut m = Moments::default();
        m.push(-1e308);
        m.push(1e308);
        assert_eq!(m.mean(), Some(0.0));
        let expected = 1e308 * 2f64.sqrt();
        assert!((m.stddev().unwrap() - expected).abs() <= expected * 1e-12);
    }

    #[test]
    fn small_counts_leave_moments_undefined() {
        let mut m = Moments::default();
        assert_eq!((m.mean(), m.stddev(), m.min()), (None, None, None));
        m.push(3.0);
        assert_eq!(m.mean(), Some(3.0));
        assert_eq!(m.stddev(), None);
    }
}
