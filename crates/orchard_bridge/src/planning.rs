use bevy::prelude::*;
use tracing::{debug, warn};

use orchard_msgs::{GetPlan, HeaderMsg, PlanMsg, PlanResponse, PoseStampedMsg};
use orchard_net::{ServiceRequest, ServiceResponse};

use crate::config::BridgeConfig;
use crate::conversions::to_pose_msg;
use crate::rows::GatheringRow;

/// Pick the row whose entry pose is nearest to `start`. Rows without poses
/// are never candidates.
pub fn nearest_row<'a>(
    rows: impl IntoIterator<Item = &'a GatheringRow>,
    start: Vec3,
) -> Option<&'a GatheringRow> {
    rows.into_iter()
        .filter_map(|row| {
            row.entry()
                .map(|entry| (row, entry.translation.distance_squared(start)))
        })
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(row, _)| row)
}

fn stamp_header(time: &Time, config: &BridgeConfig) -> HeaderMsg {
    let elapsed = time.elapsed();
    HeaderMsg {
        stamp_secs: elapsed.as_secs() as u32,
        stamp_nanos: elapsed.subsec_nanos(),
        frame_id: config.frame_id.clone(),
    }
}

/// System that answers `get_gathering_plan` calls with the poses of the row
/// nearest to the requested start.
pub(crate) fn answer_plan_requests(
    mut requests: MessageReader<ServiceRequest<GetPlan>>,
    mut replies: MessageWriter<ServiceResponse<GetPlan>>,
    rows: Query<&GatheringRow>,
    config: Res<BridgeConfig>,
    time: Res<Time>,
) {
    for request in requests.read() {
        let start = request.start.pose.position;
        let start = Vec3::new(start.x, start.y, start.z);
        let header = stamp_header(&time, &config);

        let poses = match nearest_row(&rows, start) {
            Some(row) => {
                debug!(
                    "Answering plan request from peer {} with a {} pose row",
                    request.source(),
                    row.poses.len()
                );
                row.poses
                    .iter()
                    .map(|pose| PoseStampedMsg {
                        header: header.clone(),
                        pose: to_pose_msg(pose),
                    })
                    .collect()
            }
            None => {
                // An empty plan still gets a reply so the caller is not left
                // waiting on the call id
                warn!("No gathering rows available, returning an empty plan");
                Vec::new()
            }
        };

        replies.write(ServiceResponse::reply(
            request,
            PlanResponse {
                plan: PlanMsg { header, poses },
            },
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_row_picks_closest_entry() {
        let near = GatheringRow::along(Vec3::new(1.0, 0.0, 0.0), Vec3::X, 3);
        let far = GatheringRow::along(Vec3::new(10.0, 0.0, 0.0), Vec3::X, 3);

        let rows = [far.clone(), near.clone()];
        let picked = nearest_row(rows.iter(), Vec3::ZERO).unwrap();
        assert_eq!(picked.entry().unwrap(), near.entry().unwrap());
    }

    #[test]
    fn test_nearest_row_only_measures_entry_pose() {
        // Second row's later poses pass closer to the start, but its entry is
        // further away, so the first row wins
        let entry_near = GatheringRow::along(Vec3::new(2.0, 0.0, 0.0), Vec3::X, 2);
        let tail_near = GatheringRow::along(Vec3::new(5.0, 0.0, 0.0), -Vec3::X, 6);

        let rows = [tail_near, entry_near.clone()];
        let picked = nearest_row(rows.iter(), Vec3::ZERO).unwrap();
        assert_eq!(picked.entry().unwrap(), entry_near.entry().unwrap());
    }

    #[test]
    fn test_nearest_row_skips_empty_rows() {
        let empty = GatheringRow::default();
        let only = GatheringRow::along(Vec3::new(100.0, 0.0, 0.0), Vec3::X, 2);

        let rows = [empty, only.clone()];
        let picked = nearest_row(rows.iter(), Vec3::ZERO).unwrap();
        assert_eq!(picked.entry().unwrap(), only.entry().unwrap());
    }

    #[test]
    fn test_nearest_row_none_without_candidates() {
        assert!(nearest_row(std::iter::empty::<&GatheringRow>(), Vec3::ZERO).is_none());
        assert!(nearest_row([GatheringRow::default()].iter(), Vec3::ZERO).is_none());
    }
}
