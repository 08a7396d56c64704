//! Wire types for the orchard navigation bridge.
//!
//! These mirror the robotics middleware's navigation interface: stamped poses
//! in and plans (ordered stamped poses) out, plus the cross-component
//! `ReloadLevel` call. They are plain serde types so middleware peers and the
//! Bevy server share one definition; the `engine` feature additionally lets
//! the server use selected types directly on its internal message bus.

use serde::{Deserialize, Serialize};

use orchard_common::ServiceMessage;

#[cfg(feature = "engine")]
use bevy::prelude::Message;

/// A point in 3D space, in meters.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct PointMsg {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// An orientation quaternion.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct QuaternionMsg {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for QuaternionMsg {
    fn default() -> Self {
        // Identity rotation
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

/// Position plus orientation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct PoseMsg {
    pub position: PointMsg,
    pub orientation: QuaternionMsg,
}

/// Timestamp and reference frame carried alongside stamped data.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct HeaderMsg {
    pub stamp_secs: u32,
    pub stamp_nanos: u32,
    pub frame_id: String,
}

/// A pose with its header.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PoseStampedMsg {
    pub header: HeaderMsg,
    pub pose: PoseMsg,
}

/// An ordered sequence of stamped poses forming a traversable path.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PlanMsg {
    pub header: HeaderMsg,
    pub poses: Vec<PoseStampedMsg>,
}

/// Request a plan that starts from the gathering row nearest to `start`.
///
/// `goal` and `tolerance` are carried for middleware interface fidelity but do
/// not influence row selection.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct GetPlan {
    pub start: PoseStampedMsg,
    pub goal: PoseStampedMsg,
    pub tolerance: f32,
}

/// Response to [`GetPlan`]. An empty `plan` means no gathering row with at
/// least one pose was available.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PlanResponse {
    pub plan: PlanMsg,
}

impl ServiceMessage for GetPlan {
    type Response = PlanResponse;

    fn service_name() -> &'static str {
        "get_gathering_plan"
    }
}

/// Cross-component call: unload the current level and queue its reload on the
/// next tick. Also accepted from remote peers over the wire.
#[cfg_attr(feature = "engine", derive(Message))]
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct ReloadLevel;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_service_endpoint_name() {
        assert_eq!(GetPlan::service_name(), "get_gathering_plan");
    }

    #[test]
    fn test_default_orientation_is_identity() {
        let q = QuaternionMsg::default();
        assert_eq!((q.x, q.y, q.z, q.w), (0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_default_plan_is_empty() {
        let response = PlanResponse::default();
        assert!(response.plan.poses.is_empty());
    }
}
