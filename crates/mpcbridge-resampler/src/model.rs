//! [`FloatingBaseModel`] – sizing of a floating-base mechanism.
//!
//! The base is parameterized as `[x y z qx qy qz qw]` in the generalized
//! position and as a 6-D twist in the generalized velocity, so
//! `nq = 7 + n` and `nv = 6 + n` for `n` actuated joints.

use mpcbridge_types::VIRTUAL_JOINT_NAMES;

/// Entries of the base pose in the generalized position.
pub const BASE_NQ: usize = 7;
/// Entries of the base twist in the generalized velocity.
pub const BASE_NV: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloatingBaseModel {
    joint_names: Vec<String>,
}

impl FloatingBaseModel {
    pub fn new<I, S>(joint_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            joint_names: joint_names.into_iter().map(Into::into).collect(),
        }
    }

    /// Actuated joints, excluding the floating base.
    pub fn joint_names(&self) -> &[String] {
        &self.joint_names
    }

    pub fn nq(&self) -> usize {
        BASE_NQ + self.joint_names.len()
    }

    pub fn nv(&self) -> usize {
        BASE_NV + self.joint_names.len()
    }

    /// Names of every minimal coordinate: the six virtual base joints
    /// followed by the actuated joints.
    pub fn minimal_names(&self) -> Vec<String> {
        VIRTUAL_JOINT_NAMES
            .iter()
            .map(|n| n.to_string())
            .chain(self.joint_names.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_follow_joint_count() {
        let model = FloatingBaseModel::new(["hip", "knee"]);
        assert_eq!(model.nq(), 9);
        assert_eq!(model.nv(), 8);
    }

    #[test]
    fn minimal_names_prepend_virtual_joints() {
        let model = FloatingBaseModel::new(["knee"]);
        let names = model.minimal_names();
        assert_eq!(names.len(), model.nv());
        assert_eq!(names[0], "VIRTUALJOINT_1");
        assert_eq!(names[6], "knee");
    }
}
