//! Pose detection results: keypoints, poses, and the fixed skeleton topology.

use std::fmt;

/// Number of entries in the keypoint vocabulary.
pub const NUM_KEYPOINTS: usize = 18;

/// One of the anatomical landmarks a pose model can detect.
///
/// The vocabulary is a closed set; decoder models that only emit the classic 17 PoseNet
/// keypoints simply never produce [`KeypointKind::Neck`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeypointKind {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
    Neck = 17,
}

impl KeypointKind {
    /// All keypoint kinds, in vocabulary order.
    pub const ALL: [Self; NUM_KEYPOINTS] = [
        Self::Nose,
        Self::LeftEye,
        Self::RightEye,
        Self::LeftEar,
        Self::RightEar,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
        Self::Neck,
    ];

    /// Returns the kind at `index` in the vocabulary, if it exists.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Returns the human-readable label of this keypoint.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::LeftEye => "left eye",
            Self::RightEye => "right eye",
            Self::LeftEar => "left ear",
            Self::RightEar => "right ear",
            Self::LeftShoulder => "left shoulder",
            Self::RightShoulder => "right shoulder",
            Self::LeftElbow => "left elbow",
            Self::RightElbow => "right elbow",
            Self::LeftWrist => "left wrist",
            Self::RightWrist => "right wrist",
            Self::LeftHip => "left hip",
            Self::RightHip => "right hip",
            Self::LeftKnee => "left knee",
            Self::RightKnee => "right knee",
            Self::LeftAnkle => "left ankle",
            Self::RightAnkle => "right ankle",
            Self::Neck => "neck",
        }
    }
}

impl fmt::Display for KeypointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Keypoint pairs connected by a drawn skeleton segment.
///
/// Shared read-only by every render; never references [`KeypointKind::Neck`].
pub const EDGES: [(KeypointKind, KeypointKind); 19] = [
    (KeypointKind::Nose, KeypointKind::LeftEye),
    (KeypointKind::Nose, KeypointKind::RightEye),
    (KeypointKind::Nose, KeypointKind::LeftEar),
    (KeypointKind::Nose, KeypointKind::RightEar),
    (KeypointKind::LeftEar, KeypointKind::LeftEye),
    (KeypointKind::RightEar, KeypointKind::RightEye),
    (KeypointKind::LeftEye, KeypointKind::RightEye),
    (KeypointKind::LeftShoulder, KeypointKind::RightShoulder),
    (KeypointKind::LeftShoulder, KeypointKind::LeftElbow),
    (KeypointKind::LeftShoulder, KeypointKind::LeftHip),
    (KeypointKind::RightShoulder, KeypointKind::RightElbow),
    (KeypointKind::RightShoulder, KeypointKind::RightHip),
    (KeypointKind::LeftElbow, KeypointKind::LeftWrist),
    (KeypointKind::RightElbow, KeypointKind::RightWrist),
    (KeypointKind::LeftHip, KeypointKind::RightHip),
    (KeypointKind::LeftHip, KeypointKind::LeftKnee),
    (KeypointKind::RightHip, KeypointKind::RightKnee),
    (KeypointKind::LeftKnee, KeypointKind::LeftAnkle),
    (KeypointKind::RightKnee, KeypointKind::RightAnkle),
];

/// One anatomical landmark's detected position and confidence.
///
/// Coordinates are in inference-image pixels; the rescale box maps them back to source display
/// coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Confidence score in `[0, 1]`.
    pub score: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, score: f32) -> Self {
        Self { x, y, score }
    }
}

/// The full set of keypoints for one detected person in one frame.
///
/// Produced fresh per frame by the inference engine and consumed immediately by the renderer.
#[derive(Debug, Clone, Default)]
pub struct Pose {
    keypoints: [Option<Keypoint>; NUM_KEYPOINTS],
}

impl Pose {
    /// Creates a pose with no keypoints set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the keypoint of kind `kind`, replacing any previous value.
    pub fn set(&mut self, kind: KeypointKind, keypoint: Keypoint) {
        self.keypoints[kind as usize] = Some(keypoint);
    }

    /// Returns the keypoint of kind `kind`, if the model produced one.
    pub fn get(&self, kind: KeypointKind) -> Option<Keypoint> {
        self.keypoints[kind as usize]
    }

    /// Iterates over all present keypoints, in vocabulary order.
    pub fn keypoints(&self) -> impl Iterator<Item = (KeypointKind, Keypoint)> + '_ {
        KeypointKind::ALL
            .iter()
            .filter_map(|kind| self.keypoints[*kind as usize].map(|kp| (*kind, kp)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_is_closed_and_indexed() {
        for (i, kind) in KeypointKind::ALL.iter().enumerate() {
            assert_eq!(*kind as usize, i);
            assert_eq!(KeypointKind::from_index(i), Some(*kind));
        }
        assert_eq!(KeypointKind::from_index(NUM_KEYPOINTS), None);
    }

    #[test]
    fn edges_never_reference_neck() {
        for (a, b) in EDGES {
            assert_ne!(a, KeypointKind::Neck);
            assert_ne!(b, KeypointKind::Neck);
        }
    }

    #[test]
    fn pose_iterates_in_vocabulary_order() {
        let mut pose = Pose::new();
        pose.set(KeypointKind::RightAnkle, Keypoint::new(3.0, 3.0, 0.9));
        pose.set(KeypointKind::Nose, Keypoint::new(1.0, 1.0, 0.9));
        pose.set(KeypointKind::LeftHip, Keypoint::new(2.0, 2.0, 0.9));

        let kinds: Vec<_> = pose.keypoints().map(|(kind, _)| kind).collect();
        assert_eq!(
            kinds,
            [
                KeypointKind::Nose,
                KeypointKind::LeftHip,
                KeypointKind::RightAnkle
            ]
        );
    }
}
