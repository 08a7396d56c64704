use bevy::prelude::*;

use orchard_msgs::{PointMsg, PoseMsg, QuaternionMsg};

/// Convert a world transform into a wire pose. Scale is not representable on
/// the wire and is dropped.
pub fn to_pose_msg(transform: &Transform) -> PoseMsg {
    PoseMsg {
        position: PointMsg {
            x: transform.translation.x,
            y: transform.translation.y,
            z: transform.translation.z,
        },
        orientation: QuaternionMsg {
            x: transform.rotation.x,
            y: transform.rotation.y,
            z: transform.rotation.z,
            w: transform.rotation.w,
        },
    }
}

/// Convert a wire pose into a world transform with unit scale.
pub fn from_pose_msg(pose: &PoseMsg) -> Transform {
    Transform {
        translation: Vec3::new(pose.position.x, pose.position.y, pose.position.z),
        rotation: Quat::from_xyzw(
            pose.orientation.x,
            pose.orientation.y,
            pose.orientation.z,
            pose.orientation.w,
        ),
        scale: Vec3::ONE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pose_conversion_preserves_translation_and_rotation() {
        let transform = Transform::from_xyz(1.0, 2.0, 3.0)
            .with_rotation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2));

        let pose = to_pose_msg(&transform);
        let back = from_pose_msg(&pose);

        assert!(back.translation.abs_diff_eq(transform.translation, 1e-6));
        assert!(back.rotation.abs_diff_eq(transform.rotation, 1e-6));
    }

    #[test]
    fn test_identity_pose() {
        let pose = to_pose_msg(&Transform::IDENTITY);
        assert_eq!(pose.position, PointMsg::default());
        assert_eq!(pose.orientation, QuaternionMsg::default());
    }
}
