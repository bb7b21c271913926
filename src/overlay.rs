//! SVG overlay rendering for detected poses.

use svg::node::element::{Circle, Line, Text};
use svg::Document;

use crate::{
    pose::{Pose, EDGES, NUM_KEYPOINTS},
    resolution::{RescaleBox, Resolution},
};

/// Keypoints scoring below this are not drawn and excluded from edge rendering.
pub const DEFAULT_THRESHOLD: f32 = 0.2;

const KEYPOINT_RADIUS: u32 = 5;
const EDGE_STROKE_WIDTH: u32 = 2;

/// A vector-drawing canvas of a fixed pixel size.
///
/// Shapes accumulate in the order they are added and serialize to a standalone SVG document via
/// [`SvgCanvas::serialize`].
pub struct SvgCanvas {
    doc: Document,
}

impl SvgCanvas {
    /// Creates an empty canvas of the given pixel size.
    pub fn new(size: Resolution) -> Self {
        Self {
            doc: Document::new()
                .set("width", size.width())
                .set("height", size.height()),
        }
    }

    /// Adds a filled circle of radius `r` centered on `(cx, cy)`.
    pub fn circle(&mut self, cx: i32, cy: i32, r: u32, fill: &str, fill_opacity: f32, stroke: &str) {
        self.push(
            Circle::new()
                .set("cx", cx)
                .set("cy", cy)
                .set("r", r)
                .set("fill", fill)
                .set("fill-opacity", fill_opacity)
                .set("stroke", stroke),
        );
    }

    /// Adds a straight line segment from `(x1, y1)` to `(x2, y2)`.
    pub fn line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, stroke: &str, stroke_width: u32) {
        self.push(
            Line::new()
                .set("x1", x1)
                .set("y1", y1)
                .set("x2", x2)
                .set("y2", y2)
                .set("stroke", stroke)
                .set("stroke-width", stroke_width),
        );
    }

    /// Adds a text string with its anchor at `(x, y)`.
    pub fn text(&mut self, x: i32, y: i32, content: &str, fill: &str, font_size: u32) {
        self.push(
            Text::new()
                .set("x", x)
                .set("y", y)
                .set("fill", fill)
                .set("font-size", font_size)
                .set("style", "font-family:sans-serif")
                .add(svg::node::Text::new(content)),
        );
    }

    fn push<N: svg::Node>(&mut self, node: N) {
        let doc = std::mem::replace(&mut self.doc, Document::new());
        self.doc = doc.add(node);
    }

    /// Serializes the canvas to a standalone SVG markup string.
    pub fn serialize(&self) -> String {
        self.doc.to_string()
    }
}

/// Draws `text` with a shadowed outline for legibility on arbitrary backgrounds.
///
/// An offset black copy is drawn first, then a white copy at the true position.
pub fn shadow_text(canvas: &mut SvgCanvas, x: i32, y: i32, text: &str, font_size: u32) {
    canvas.text(x + 1, y + 1, text, "black", font_size);
    canvas.text(x, y, text, "white", font_size);
}

/// Draws the skeleton of `pose` onto `canvas`.
///
/// `src_size` is the display size the overlay is rendered at and `inference_box` the region of
/// the source frame that was fed to inference; together they map inference-space keypoint
/// coordinates back to display coordinates. Keypoints scoring below `threshold` are skipped
/// entirely. Circles are emitted for all qualifying keypoints in vocabulary order, followed by
/// one line per edge whose endpoints both qualify, in fixed edge-table order.
pub fn draw_pose(
    canvas: &mut SvgCanvas,
    pose: &Pose,
    src_size: Resolution,
    inference_box: RescaleBox,
    color: &str,
    threshold: f32,
) {
    let scale_x = src_size.width() as f32 / inference_box.width;
    let scale_y = src_size.height() as f32 / inference_box.height;

    let mut xys: [Option<(i32, i32)>; NUM_KEYPOINTS] = [None; NUM_KEYPOINTS];
    for (kind, keypoint) in pose.keypoints() {
        if keypoint.score < threshold {
            continue;
        }
        // Offset and scale to source coordinate space.
        let kp_x = ((keypoint.x - inference_box.x) * scale_x) as i32;
        let kp_y = ((keypoint.y - inference_box.y) * scale_y) as i32;

        xys[kind as usize] = Some((kp_x, kp_y));
        canvas.circle(kp_x, kp_y, KEYPOINT_RADIUS, "cyan", keypoint.score, color);
    }

    for (a, b) in EDGES {
        let (Some((ax, ay)), Some((bx, by))) = (xys[a as usize], xys[b as usize]) else {
            continue;
        };
        canvas.line(ax, ay, bx, by, color, EDGE_STROKE_WIDTH);
    }
}

/// Per-loop render statistics.
///
/// The render callback threads this through every invocation instead of hiding mutable counters
/// in a captured closure environment.
#[derive(Debug, Default)]
pub struct RenderStats {
    frames: u64,
    sum_parse_time_ms: f64,
    sum_inference_time_ms: f64,
}

impl RenderStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one rendered frame's output-parsing and inference wall times.
    pub fn record(&mut self, parse_time_ms: f64, inference_time_ms: f64) {
        self.frames += 1;
        self.sum_parse_time_ms += parse_time_ms;
        self.sum_inference_time_ms += inference_time_ms;
    }

    /// Returns the number of frames recorded so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Returns the average inference wall time per frame, in milliseconds.
    ///
    /// Returns `None` before the first frame has been recorded.
    pub fn avg_inference_time_ms(&self) -> Option<f64> {
        (self.frames > 0).then(|| self.sum_inference_time_ms / self.frames as f64)
    }
}

#[cfg(test)]
mod tests {
    use crate::pose::{Keypoint, KeypointKind};

    use super::*;

    fn count(haystack: &str, needle: &str) -> usize {
        haystack.matches(needle).count()
    }

    fn vga_canvas() -> SvgCanvas {
        SvgCanvas::new(Resolution::RES_VGA)
    }

    #[test]
    fn identity_box_maps_coordinates_unchanged() {
        let mut pose = Pose::new();
        pose.set(KeypointKind::Nose, Keypoint::new(100.0, 200.0, 0.9));

        let mut canvas = vga_canvas();
        draw_pose(
            &mut canvas,
            &pose,
            Resolution::RES_VGA,
            RescaleBox::new(0.0, 0.0, 640.0, 480.0),
            "yellow",
            DEFAULT_THRESHOLD,
        );

        let out = canvas.serialize();
        assert!(out.contains(r#"cx="100""#), "{out}");
        assert!(out.contains(r#"cy="200""#), "{out}");
    }

    #[test]
    fn upscaling_box_doubles_coordinates() {
        let mut pose = Pose::new();
        pose.set(KeypointKind::Nose, Keypoint::new(50.0, 50.0, 0.9));

        let mut canvas = vga_canvas();
        draw_pose(
            &mut canvas,
            &pose,
            Resolution::RES_VGA,
            RescaleBox::new(0.0, 0.0, 320.0, 240.0),
            "yellow",
            DEFAULT_THRESHOLD,
        );

        let out = canvas.serialize();
        assert!(out.contains(r#"cx="100""#), "{out}");
        assert!(out.contains(r#"cy="100""#), "{out}");
    }

    #[test]
    fn offset_box_subtracts_before_scaling() {
        let mut pose = Pose::new();
        pose.set(KeypointKind::Nose, Keypoint::new(30.0, 60.0, 0.9));

        let mut canvas = vga_canvas();
        draw_pose(
            &mut canvas,
            &pose,
            Resolution::RES_VGA,
            RescaleBox::new(10.0, 20.0, 640.0, 480.0),
            "yellow",
            DEFAULT_THRESHOLD,
        );

        let out = canvas.serialize();
        assert!(out.contains(r#"cx="20""#), "{out}");
        assert!(out.contains(r#"cy="40""#), "{out}");
    }

    #[test]
    fn zero_area_box_yields_saturated_coordinates() {
        let mut pose = Pose::new();
        pose.set(KeypointKind::Nose, Keypoint::new(100.0, 200.0, 0.9));
        pose.set(KeypointKind::LeftEye, Keypoint::new(0.0, 0.0, 0.9));

        let mut canvas = vga_canvas();
        draw_pose(
            &mut canvas,
            &pose,
            Resolution::RES_VGA,
            RescaleBox::new(0.0, 0.0, 0.0, 0.0),
            "yellow",
            DEFAULT_THRESHOLD,
        );

        // Division by the box size is unguarded, so the scale factors are infinite. The `as`
        // casts saturate the nose to `i32::MAX` and collapse the eye (`0.0 * inf` is NaN) to 0;
        // both keypoints and their shared edge are still emitted.
        let out = canvas.serialize();
        assert!(out.contains(&format!(r#"cx="{}""#, i32::MAX)), "{out}");
        assert!(out.contains(&format!(r#"cy="{}""#, i32::MAX)), "{out}");
        assert!(out.contains(r#"cx="0""#), "{out}");
        assert_eq!(count(&out, "<circle"), 2);
        assert_eq!(count(&out, "<line"), 1);
    }

    #[test]
    fn sub_threshold_keypoints_are_skipped_entirely() {
        let mut pose = Pose::new();
        pose.set(KeypointKind::Nose, Keypoint::new(10.0, 10.0, 0.9));
        pose.set(KeypointKind::LeftEye, Keypoint::new(20.0, 10.0, 0.1));

        let mut canvas = vga_canvas();
        draw_pose(
            &mut canvas,
            &pose,
            Resolution::RES_VGA,
            RescaleBox::full(Resolution::RES_VGA),
            "yellow",
            DEFAULT_THRESHOLD,
        );

        let out = canvas.serialize();
        // Only the nose circle, and no edges - the eye is below threshold and therefore
        // unusable as an edge endpoint.
        assert_eq!(count(&out, "<circle"), 1);
        assert_eq!(count(&out, "<line"), 0);
    }

    #[test]
    fn one_line_per_edge_with_both_endpoints() {
        let mut pose = Pose::new();
        pose.set(KeypointKind::Nose, Keypoint::new(10.0, 10.0, 0.9));
        pose.set(KeypointKind::LeftEye, Keypoint::new(20.0, 10.0, 0.8));

        let mut canvas = vga_canvas();
        draw_pose(
            &mut canvas,
            &pose,
            Resolution::RES_VGA,
            RescaleBox::full(Resolution::RES_VGA),
            "yellow",
            DEFAULT_THRESHOLD,
        );

        let out = canvas.serialize();
        // Exactly the nose<->left-eye edge; every other edge is missing an endpoint.
        assert_eq!(count(&out, "<circle"), 2);
        assert_eq!(count(&out, "<line"), 1);
    }

    #[test]
    fn circles_precede_lines() {
        let mut pose = Pose::new();
        pose.set(KeypointKind::LeftShoulder, Keypoint::new(10.0, 40.0, 0.9));
        pose.set(KeypointKind::RightShoulder, Keypoint::new(60.0, 40.0, 0.9));

        let mut canvas = vga_canvas();
        draw_pose(
            &mut canvas,
            &pose,
            Resolution::RES_VGA,
            RescaleBox::full(Resolution::RES_VGA),
            "yellow",
            DEFAULT_THRESHOLD,
        );

        let out = canvas.serialize();
        let last_circle = out.rfind("<circle").unwrap();
        let first_line = out.find("<line").unwrap();
        assert!(last_circle < first_line);
    }

    #[test]
    fn full_skeleton_emits_all_edges() {
        let mut pose = Pose::new();
        for (i, kind) in KeypointKind::ALL.iter().enumerate() {
            pose.set(*kind, Keypoint::new(i as f32 * 10.0, i as f32 * 5.0, 1.0));
        }

        let mut canvas = vga_canvas();
        draw_pose(
            &mut canvas,
            &pose,
            Resolution::RES_VGA,
            RescaleBox::full(Resolution::RES_VGA),
            "yellow",
            DEFAULT_THRESHOLD,
        );

        let out = canvas.serialize();
        assert_eq!(count(&out, "<circle"), 18);
        assert_eq!(count(&out, "<line"), EDGES.len());

        // Lines come out in edge-table order: the first one connects the nose (at the origin)
        // to the left eye.
        let first_line = &out[out.find("<line").unwrap()..];
        let first_line = &first_line[..first_line.find("/>").unwrap()];
        assert!(first_line.contains(r#"x1="0""#), "{first_line}");
        assert!(first_line.contains(r#"x2="10""#), "{first_line}");
    }

    #[test]
    fn fill_opacity_carries_the_score() {
        let mut pose = Pose::new();
        pose.set(KeypointKind::Nose, Keypoint::new(10.0, 10.0, 0.75));

        let mut canvas = vga_canvas();
        draw_pose(
            &mut canvas,
            &pose,
            Resolution::RES_VGA,
            RescaleBox::full(Resolution::RES_VGA),
            "yellow",
            DEFAULT_THRESHOLD,
        );

        assert!(canvas.serialize().contains(r#"fill-opacity="0.75""#));
    }

    #[test]
    fn shadow_text_draws_black_then_white() {
        let mut canvas = vga_canvas();
        shadow_text(&mut canvas, 10, 20, "hello", 16);

        let out = canvas.serialize();
        let black = out.find(r#"fill="black""#).unwrap();
        let white = out.find(r#"fill="white""#).unwrap();
        assert!(black < white);
        assert!(out.contains(r#"x="11""#) && out.contains(r#"y="21""#));
        assert!(out.contains(r#"x="10""#) && out.contains(r#"y="20""#));
        assert_eq!(count(&out, "hello"), 2);
    }

    #[test]
    fn render_stats_average() {
        let mut stats = RenderStats::new();
        assert_eq!(stats.avg_inference_time_ms(), None);

        stats.record(1.0, 10.0);
        stats.record(3.0, 20.0);
        assert_eq!(stats.frames(), 2);
        assert_eq!(stats.avg_inference_time_ms(), Some(15.0));
    }
}
