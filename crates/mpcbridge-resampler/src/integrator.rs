//! [`IntegratingResampler`] – reference [`ResamplingEngine`].
//!
//! Holds the state and input handed over by the bridge and, on each
//! [`resample`][ResamplingEngine::resample], integrates the stored
//! acceleration with a semi-implicit Euler step:
//!
//! ```text
//! v ← v + a·dt
//! p_base ← p_base + v_lin·dt           (base linear velocity in world frame)
//! R_base ← R_base · exp(ω·dt)          (base angular velocity in body frame)
//! q_j    ← q_j + v_j·dt
//! ```
//!
//! Torques use an identity inertia: `tau = a`, with the sum of the linear
//! contact forces subtracted from the base linear rows.  This is enough to
//! exercise the bridge end-to-end; production engines replace it behind the
//! trait.

use mpcbridge_types::{BridgeError, JointNameMap, VIRTUAL_JOINT_NAMES, VectorKind, WRENCH_SIZE};
use nalgebra::{DVector, Quaternion, UnitQuaternion, Vector3};
use tracing::trace;

use crate::engine::ResamplingEngine;
use crate::model::{BASE_NQ, BASE_NV, FloatingBaseModel};

/// Index of the quaternion `[qx qy qz qw]` inside the generalized position.
const QUAT_OFFSET: usize = 3;

pub struct IntegratingResampler {
    model: FloatingBaseModel,
    frames: Vec<String>,
    x: DVector<f64>,
    u: DVector<f64>,
}

impl IntegratingResampler {
    /// Create an engine at the neutral configuration (identity base
    /// orientation, everything else zero) with no contact frames.
    pub fn new(model: FloatingBaseModel) -> Self {
        let nq = model.nq();
        let nv = model.nv();
        let mut x = DVector::zeros(nq + nv);
        x[QUAT_OFFSET + 3] = 1.0;
        Self {
            model,
            frames: Vec::new(),
            x,
            u: DVector::zeros(nv),
        }
    }

    pub fn model(&self) -> &FloatingBaseModel {
        &self.model
    }

    fn base_orientation(q: &DVector<f64>) -> Result<UnitQuaternion<f64>, BridgeError> {
        let raw = Quaternion::new(
            q[QUAT_OFFSET + 3],
            q[QUAT_OFFSET],
            q[QUAT_OFFSET + 1],
            q[QUAT_OFFSET + 2],
        );
        UnitQuaternion::try_new(raw, 1.0e-12).ok_or_else(|| {
            BridgeError::MalformedSolution("floating-base quaternion has zero norm".to_string())
        })
    }

    fn write_orientation(q: &mut DVector<f64>, orientation: &UnitQuaternion<f64>) {
        let coords = orientation.quaternion().coords;
        for k in 0..4 {
            q[QUAT_OFFSET + k] = coords[k];
        }
    }
}

impl ResamplingEngine for IntegratingResampler {
    fn set_frames(&mut self, frames: &[String]) {
        self.frames = frames.to_vec();
        self.u = DVector::zeros(self.input_size());
    }

    fn frames(&self) -> &[String] {
        &self.frames
    }

    fn nq(&self) -> usize {
        self.model.nq()
    }

    fn nv(&self) -> usize {
        self.model.nv()
    }

    fn set_state(&mut self, x: &DVector<f64>) -> Result<(), BridgeError> {
        if x.len() != self.state_size() {
            return Err(BridgeError::DimensionMismatch {
                vector: VectorKind::State,
                expected: self.state_size(),
                actual: x.len(),
            });
        }
        self.x.copy_from(x);
        Ok(())
    }

    fn set_input(&mut self, u: &DVector<f64>) -> Result<(), BridgeError> {
        if u.len() != self.input_size() {
            return Err(BridgeError::DimensionMismatch {
                vector: VectorKind::Input,
                expected: self.input_size(),
                actual: u.len(),
            });
        }
        self.u.copy_from(u);
        Ok(())
    }

    fn state(&self) -> DVector<f64> {
        self.x.clone()
    }

    fn input(&self) -> DVector<f64> {
        self.u.clone()
    }

    fn tau(&self) -> DVector<f64> {
        let nv = self.nv();
        let mut tau = self.u.rows(0, nv).clone_owned();
        for k in 0..self.frames.len() {
            let offset = nv + k * WRENCH_SIZE;
            for axis in 0..3 {
                tau[axis] -= self.u[offset + axis];
            }
        }
        tau
    }

    fn resample(&mut self, dt: f64) -> Result<(), BridgeError> {
        if !dt.is_finite() || dt < 0.0 {
            return Err(BridgeError::Config(format!(
                "resample step must be a non-negative number of seconds, got {dt}"
            )));
        }
        let nq = self.nq();
        let nv = self.nv();

        for i in 0..nv {
            self.x[nq + i] += self.u[i] * dt;
        }

        let mut q = self.x.rows(0, nq).clone_owned();
        for axis in 0..3 {
            q[axis] += self.x[nq + axis] * dt;
        }
        let omega = Vector3::new(self.x[nq + 3], self.x[nq + 4], self.x[nq + 5]);
        let orientation = Self::base_orientation(&q)? * UnitQuaternion::from_scaled_axis(omega * dt);
        Self::write_orientation(&mut q, &orientation);
        for j in 0..self.model.joint_names().len() {
            q[BASE_NQ + j] += self.x[nq + BASE_NV + j] * dt;
        }
        self.x.rows_mut(0, nq).copy_from(&q);

        trace!(dt, "resampled state");
        Ok(())
    }

    fn minimal_q(&self, q: &DVector<f64>) -> Result<DVector<f64>, BridgeError> {
        if q.len() != self.nq() {
            return Err(BridgeError::DimensionMismatch {
                vector: VectorKind::Position,
                expected: self.nq(),
                actual: q.len(),
            });
        }
        let (roll, pitch, yaw) = Self::base_orientation(q)?.euler_angles();
        let mut minimal = DVector::zeros(self.nv());
        for axis in 0..3 {
            minimal[axis] = q[axis];
        }
        minimal[3] = roll;
        minimal[4] = pitch;
        minimal[5] = yaw;
        for j in 0..self.model.joint_names().len() {
            minimal[BASE_NV + j] = q[BASE_NQ + j];
        }
        Ok(minimal)
    }

    fn map_to_q(&self, joints: &JointNameMap) -> DVector<f64> {
        let value = |name: &str| joints.get(name).copied().unwrap_or(0.0);
        let mut q = DVector::zeros(self.nq());
        for axis in 0..3 {
            q[axis] = value(VIRTUAL_JOINT_NAMES[axis]);
        }
        let orientation = UnitQuaternion::from_euler_angles(
            value(VIRTUAL_JOINT_NAMES[3]),
            value(VIRTUAL_JOINT_NAMES[4]),
            value(VIRTUAL_JOINT_NAMES[5]),
        );
        Self::write_orientation(&mut q, &orientation);
        for (j, name) in self.model.joint_names().iter().enumerate() {
            q[BASE_NQ + j] = value(name);
        }
        q
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const EPS: f64 = 1e-9;

    fn one_joint_engine() -> IntegratingResampler {
        IntegratingResampler::new(FloatingBaseModel::new(["knee"]))
    }

    fn state(q: &[f64], v: &[f64]) -> DVector<f64> {
        DVector::from_iterator(q.len() + v.len(), q.iter().chain(v.iter()).copied())
    }

    #[test]
    fn neutral_state_has_identity_orientation() {
        let engine = one_joint_engine();
        let x = engine.state();
        assert_eq!(x.len(), 15);
        assert_eq!(x[6], 1.0);
    }

    #[test]
    fn set_state_rejects_wrong_dimension_and_keeps_previous() {
        let mut engine = one_joint_engine();
        let good = state(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.1], &[0.0; 7]);
        engine.set_state(&good).unwrap();

        let bad = DVector::zeros(16);
        let err = engine.set_state(&bad).unwrap_err();
        assert_eq!(
            err,
            BridgeError::DimensionMismatch { vector: VectorKind::State, expected: 15, actual: 16 }
        );
        assert_eq!(engine.state(), good);
    }

    #[test]
    fn input_size_grows_with_frames() {
        let mut engine = one_joint_engine();
        assert_eq!(engine.input_size(), 7);
        engine.set_frames(&["left_foot".to_string(), "right_foot".to_string()]);
        assert_eq!(engine.input_size(), 7 + 12);
        assert!(engine.set_input(&DVector::zeros(7)).is_err());
        assert!(engine.set_input(&DVector::zeros(19)).is_ok());
    }

    #[test]
    fn resample_integrates_joint_velocity_and_acceleration() {
        let mut engine = one_joint_engine();
        engine
            .set_state(&state(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.1], &[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.2]))
            .unwrap();
        let mut u = DVector::zeros(7);
        u[6] = 1.0;
        engine.set_input(&u).unwrap();

        engine.resample(0.1).unwrap();
        let x = engine.state();
        // v = 0.2 + 1.0 * 0.1, q = 0.1 + 0.3 * 0.1
        assert!((x[14] - 0.3).abs() < EPS);
        assert!((x[7] - 0.13).abs() < EPS);
    }

    #[test]
    fn resample_rotates_base_about_body_axis() {
        let mut engine = one_joint_engine();
        let mut v = [0.0; 7];
        v[5] = FRAC_PI_2;
        engine.set_state(&state(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0], &v)).unwrap();
        engine.resample(1.0).unwrap();

        let minimal = engine.minimal_q(&engine.state().rows(0, 8).clone_owned()).unwrap();
        assert!((minimal[5] - FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn resample_rejects_negative_step() {
        let mut engine = one_joint_engine();
        assert!(matches!(engine.resample(-0.01), Err(BridgeError::Config(_))));
    }

    #[test]
    fn tau_subtracts_linear_contact_forces_from_base() {
        let mut engine = one_joint_engine();
        engine.set_frames(&["foot".to_string()]);
        let mut u = DVector::zeros(13);
        u[6] = 2.5;
        u[7] = 1.0;
        u[9] = 9.0;
        engine.set_input(&u).unwrap();

        let tau = engine.tau();
        assert_eq!(tau.len(), 7);
        assert!((tau[0] + 1.0).abs() < EPS);
        assert!((tau[2] + 9.0).abs() < EPS);
        assert!((tau[6] - 2.5).abs() < EPS);
    }

    #[test]
    fn minimal_q_drops_one_coordinate() {
        let engine = one_joint_engine();
        let q = DVector::from_vec(vec![0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.1]);
        let minimal = engine.minimal_q(&q).unwrap();
        assert_eq!(minimal.len(), 7);
        assert!((minimal[0] - 0.5).abs() < EPS);
        assert!(minimal[3].abs() < EPS && minimal[4].abs() < EPS && minimal[5].abs() < EPS);
        assert!((minimal[6] - 0.1).abs() < EPS);
    }

    #[test]
    fn minimal_q_rejects_zero_quaternion() {
        let engine = one_joint_engine();
        let q = DVector::zeros(8);
        assert!(matches!(engine.minimal_q(&q), Err(BridgeError::MalformedSolution(_))));
    }

    #[test]
    fn map_to_q_inverts_minimal_q() {
        let engine = one_joint_engine();
        let joints = JointNameMap::from([
            ("VIRTUALJOINT_1".to_string(), 0.2),
            ("VIRTUALJOINT_6".to_string(), 0.3),
            ("knee".to_string(), -0.4),
        ]);
        let q = engine.map_to_q(&joints);
        assert_eq!(q.len(), 8);
        let minimal = engine.minimal_q(&q).unwrap();
        assert!((minimal[0] - 0.2).abs() < EPS);
        assert!((minimal[5] - 0.3).abs() < 1e-9);
        assert!((minimal[6] + 0.4).abs() < EPS);
    }

    #[test]
    fn map_to_q_defaults_missing_joints() {
        let engine = one_joint_engine();
        let q = engine.map_to_q(&JointNameMap::new());
        assert_eq!(q[6], 1.0);
        assert_eq!(q[7], 0.0);
    }
}
