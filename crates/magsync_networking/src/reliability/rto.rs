//! # Retransmission Timeout
//!
//! `rto = rtt * 2 * (1 + packet_loss)`, recomputed every tick from the
//! endpoint's live estimates.

use magsync_shared::{SessionConfig, MIN_RTO_SECS};

/// Computes retransmission timeouts from RTT and loss.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RtoEstimator {
    /// Lower bound applied to every computed timeout (seconds).
    pub min_rto: f64,
    /// Double the timeout for each prior retransmission of an entry.
    pub backoff: bool,
    /// Caps the backoff at `2^max_backoff_exponent`.
    pub max_backoff_exponent: u32,
}

impl Default for RtoEstimator {
    fn default() -> Self {
        Self {
            min_rto: MIN_RTO_SECS,
            backoff: false,
            max_backoff_exponent: 5,
        }
    }
}

impl RtoEstimator {
    /// Estimator with no floor and no backoff: the bare formula.
    #[must_use]
    pub const fn unclamped() -> Self {
        Self {
            min_rto: 0.0,
            backoff: false,
            max_backoff_exponent: 0,
        }
    }

    /// Builds an estimator from session configuration.
    #[must_use]
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            min_rto: config.min_rto_secs.max(0.0),
            backoff: config.rto_backoff,
            max_backoff_exponent: config.max_backoff_exponent,
        }
    }

    /// Timeout in seconds for the given RTT (seconds) and loss (fraction).
    #[must_use]
    pub fn rto(&self, rtt: f32, packet_loss: f32) -> f64 {
        let rtt = sanitize(rtt);
        let loss = sanitize(packet_loss).min(1.0);
        (rtt * 2.0 * (1.0 + loss)).max(self.min_rto)
    }

    /// Timeout for an entry that has been retransmitted `retransmits` times.
    #[must_use]
    pub fn timeout_for(&self, rto: f64, retransmits: u32) -> f64 {
        if !self.backoff {
            return rto;
        }
        let exponent = retransmits.min(self.max_backoff_exponent).min(30);
        rto * f64::from(1u32 << exponent)
    }
}

/// NaN and negative inputs count as zero.
#[inline]
fn sanitize(value: f32) -> f64 {
    let value = f64::from(value);
    if value.is_nan() || value < 0.0 {
        0.0
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formula() {
        let rto = RtoEstimator::unclamped().rto(0.1, 0.2);
        assert!((rto - 0.24).abs() < 1e-6, "rto = {rto}");
    }

    #[test]
    fn test_floor_before_first_sample() {
        let estimator = RtoEstimator::default();
        assert_eq!(estimator.rto(0.0, 0.0), MIN_RTO_SECS);
        assert_eq!(RtoEstimator::unclamped().rto(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_bad_inputs_sanitized() {
        let estimator = RtoEstimator::unclamped();
        assert_eq!(estimator.rto(f32::NAN, 0.5), 0.0);
        assert_eq!(estimator.rto(-1.0, 0.5), 0.0);
        // Loss above 100% is clamped.
        let rto = estimator.rto(0.1, 5.0);
        assert!((rto - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_backoff() {
        let estimator = RtoEstimator {
            min_rto: 0.0,
            backoff: true,
            max_backoff_exponent: 3,
        };
        assert_eq!(estimator.timeout_for(0.1, 0), 0.1);
        assert_eq!(estimator.timeout_for(0.1, 2), 0.4);
        assert_eq!(estimator.timeout_for(0.1, 10), 0.8);
        assert_eq!(RtoEstimator::default().timeout_for(0.1, 10), 0.1);
    }

    #[test]
    fn test_from_config() {
        let config = SessionConfig {
            min_rto_secs: 0.05,
            rto_backoff: true,
            ..SessionConfig::default()
        };
        let estimator = RtoEstimator::from_config(&config);
        assert_eq!(estimator.min_rto, 0.05);
        assert!(estimator.backoff);
    }
}
