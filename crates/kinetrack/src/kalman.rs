//! Constant-velocity Kalman filter over 2-D positions.
//!
//! State is `[x, vx, y, vy]`; only positions are observed.

use nalgebra::{Matrix2, Matrix2x4, Matrix4, Vector2, Vector4};
use serde::{Deserialize, Serialize};

/// Noise and regularisation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanConfig {
    /// Process noise on each position component.
    pub q_pos: f64,
    /// Process noise on each velocity component.
    pub q_vel: f64,
    /// Measurement noise variance (both axes).
    pub r: f64,
    /// Covariance diagonal right after `initialize`.
    pub initial_variance: f64,
    /// Covariance diagonal before the first measurement.
    pub prior_variance: f64,
    /// `|det S|` below this switches to the fallback inverse.
    pub det_epsilon: f64,
    /// Smallest time step used by `predict`.
    pub dt_epsilon: f64,
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            q_pos: 1e-5,
            q_vel: 1e-3,
            r: 1e-6,
            initial_variance: 0.1,
            prior_variance: 1e3,
            det_epsilon: 1e-12,
            dt_epsilon: 1e-6,
        }
    }
}

/// Magnitude of the stand-in inverse for a singular innovation covariance.
const SINGULAR_FALLBACK: f64 = 1e12;

/// One smoothed sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilteredSample {
    pub t: f64,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
}

impl FilteredSample {
    pub fn speed(&self) -> f64 {
        self.vx.hypot(self.vy)
    }
}

/// Constant-velocity Kalman filter over state `[x, vx, y, vy]`.
///
/// Positions are measured directly; the first measurement initializes the
/// state with zero velocity.
#[derive(Debug, Clone)]
pub struct KalmanTracker2D {
    config: KalmanConfig,
    x: Vector4<f64>,
    p: Matrix4<f64>,
    initialized: bool,
    last_t: Option<f64>,
}

impl KalmanTracker2D {
    pub fn new(config: KalmanConfig) -> Self {
        let p = Matrix4::identity() * config.prior_variance;
        Self {
            config,
            x: Vector4::zeros(),
            p,
            initialized: false,
            last_t: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// `[x, vx, y, vy]`.
    pub fn state(&self) -> Vector4<f64> {
        self.x
    }

    pub fn covariance(&self) -> Matrix4<f64> {
        self.p
    }

    /// Back to the uninitialised prior.
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    /// Seed from a measurement with zero velocity.
    pub fn initialize(&mut self, z: [f64; 2]) {
        self.x = Vector4::new(z[0], 0.0, z[1], 0.0);
        self.p = Matrix4::identity() * self.config.initial_variance;
        self.initialized = true;
    }

    /// Propagate by `dt` seconds (floored at `dt_epsilon`).
    pub fn predict(&mut self, dt: f64) {
        let dt = if dt.is_finite() {
            dt.max(self.config.dt_epsilon)
        } else {
            self.config.dt_epsilon
        };
        #[rustfmt::skip]
        let f = Matrix4::new(
            1.0, dt,  0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 1.0, dt,
            0.0, 0.0, 0.0, 1.0,
        );
        let q = Matrix4::from_diagonal(&Vector4::new(
            self.config.q_pos,
            self.config.q_vel,
            self.config.q_pos,
            self.config.q_vel,
        ));
        self.x = f * self.x;
        self.p = f * self.p * f.transpose() + q;
    }

    /// Correct with a position measurement.
    pub fn update(&mut self, z: [f64; 2]) {
        #[rustfmt::skip]
        let h = Matrix2x4::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
        );
        let r = Matrix2::identity() * self.config.r;
        let innovation = Vector2::new(z[0], z[1]) - h * self.x;
        let s = h * self.p * h.transpose() + r;
        let s_inv = self.inverse_2x2(&s);
        let k = self.p * h.transpose() * s_inv;
        self.x += k * innovation;
        self.p = (Matrix4::identity() - k * h) * self.p;
    }

    /// Closed-form 2×2 inverse; a large diagonal stands in when singular.
    fn inverse_2x2(&self, s: &Matrix2<f64>) -> Matrix2<f64> {
        let det = s[(0, 0)] * s[(1, 1)] - s[(0, 1)] * s[(1, 0)];
        if !(det.abs() >= self.config.det_epsilon) {
            tracing::trace!(det, "singular innovation covariance");
            return Matrix2::identity() * SINGULAR_FALLBACK;
        }
        Matrix2::new(s[(1, 1)], -s[(0, 1)], -s[(1, 0)], s[(0, 0)]) / det
    }

    /// Feed a timestamped measurement and return the smoothed sample.
    ///
    /// The first call initialises the filter. Timestamps that do not advance
    /// are moved to `last_t + dt_epsilon`, so emitted samples are strictly
    /// increasing in `t`.
    pub fn step(&mut self, t: f64, z: [f64; 2]) -> FilteredSample {
        let t = match self.last_t {
            Some(last) if !(t > last) => {
                tracing::warn!(t, last, "non-increasing timestamp clamped");
                last + self.config.dt_epsilon
            }
            _ => t,
        };
        match self.last_t {
            Some(last) if self.initialized => {
                self.predict(t - last);
                self.update(z);
            }
            _ => {
                tracing::debug!(x = z[0], y = z[1], "kalman tracker initialised");
                self.initialize(z);
            }
        }
        self.last_t = Some(t);
        self.sample(t)
    }

    fn sample(&self, t: f64) -> FilteredSample {
        FilteredSample {
            t,
            x: self.x[0],
            y: self.x[2],
            vx: self.x[1],
            vy: self.x[3],
        }
    }
}
