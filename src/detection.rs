use std::time::Instant;

use opencv::{
    core::{Mat, Rect, Vector},
    imgcodecs,
    prelude::*,
};

use crate::error::Error;
use crate::visualization;

/// Labels the vehicle predicate accepts. Fixed, closed list.
const VEHICLE_LABELS: [&str; 5] = ["car", "truck", "motorbike", "bicycle", "bus"];

/// Bounding box in integer pixel coordinates, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    #[inline]
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Bottom-right corner: (x + width, y + height).
    #[inline]
    pub fn bottom_right(&self) -> (i32, i32) {
        (self.x + self.width, self.y + self.height)
    }

    #[inline]
    pub fn to_rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// One observed object in one frame.
///
/// Label, confidence, box, and the owned frame are fixed at construction;
/// only `last_spotted` (via [`Detection::update_last_spotted`]) and
/// `downstream_processed` ever change afterwards.
#[derive(Debug)]
pub struct Detection {
    frame: Mat,
    label: String,
    confidence: f32,
    bbox: BoundingBox,
    pub(crate) last_spotted: Instant,
    /// Set by downstream consumers once they have handled this track. The
    /// tracker initializes it to false and never touches it again.
    pub downstream_processed: bool,
}

impl Detection {
    pub fn new(frame: Mat, label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Detection {
            frame,
            label: label.into(),
            confidence,
            bbox,
            last_spotted: Instant::now(),
            downstream_processed: false,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    pub fn last_spotted(&self) -> Instant {
        self.last_spotted
    }

    /// The full frame as captured when this object was first observed.
    pub fn original_frame(&self) -> &Mat {
        &self.frame
    }

    /// A copy of the frame with the bounding box and label drawn on. The
    /// stored frame stays untouched.
    pub fn frame_with_bounding_box(&self) -> opencv::Result<Mat> {
        let mut annotated = self.frame.try_clone()?;
        self.draw_bounding_box(&mut annotated)?;
        Ok(annotated)
    }

    /// Draw this detection's box and label onto the given image, mutating it.
    pub fn draw_bounding_box(&self, target: &mut Mat) -> opencv::Result<()> {
        let color = visualization::overlay_color();
        visualization::draw_box(target, self.bbox.to_rect(), color, 2)?;
        let text = format!("{}: {:.4}", self.label, self.confidence);
        visualization::draw_label(target, &text, (self.bbox.x, self.bbox.y - 5), color, 1.5, 3)
    }

    /// The sub-region of the frame bounded by the box.
    pub fn cropped_frame(&self) -> opencv::Result<Mat> {
        let roi = Mat::roi(&self.frame, self.bbox.to_rect())?;
        roi.try_clone()
    }

    /// The frame encoded as JPEG bytes.
    pub fn encoded_image(&self) -> Result<Vec<u8>, Error> {
        let mut buf = Vector::<u8>::new();
        let encoded = imgcodecs::imencode(".jpg", &self.frame, &mut buf, &Vector::new())
            .map_err(|e| Error::Encoding(e.to_string()))?;
        if !encoded {
            return Err(Error::Encoding("encoder rejected the frame".to_string()));
        }
        Ok(buf.to_vec())
    }

    pub fn is_person(&self) -> bool {
        self.label == "person"
    }

    pub fn is_vehicle(&self) -> bool {
        VEHICLE_LABELS.contains(&self.label.as_str())
    }

    /// Coarse same-object heuristic: true iff the other box's top-left corner
    /// lies within `margin_fraction` of this frame's dimensions. Width,
    /// height, and overlap are deliberately ignored.
    pub fn bounding_boxes_similar(&self, other: &Detection, margin_fraction: f32) -> bool {
        let x_margin = (self.frame.cols() as f32 * margin_fraction) as i32;
        let y_margin = (self.frame.rows() as f32 * margin_fraction) as i32;
        (self.bbox.x - other.bbox.x).abs() <= x_margin
            && (self.bbox.y - other.bbox.y).abs() <= y_margin
    }

    pub fn update_last_spotted(&mut self) {
        self.last_spotted = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use opencv::core::{Scalar, Size, Vec3b, CV_8UC3};

    fn test_frame(width: i32, height: i32) -> Mat {
        Mat::new_size_with_default(Size::new(width, height), CV_8UC3, Scalar::all(0.0)).unwrap()
    }

    fn detection(label: &str, x: i32, y: i32) -> Detection {
        Detection::new(test_frame(200, 200), label, 0.9, BoundingBox::new(x, y, 50, 100))
    }

    #[test]
    fn test_new_initializes_state() {
        let det = detection("person", 10, 10);
        assert_eq!(det.label(), "person");
        assert_relative_eq!(det.confidence(), 0.9);
        assert_eq!(det.bbox(), BoundingBox::new(10, 10, 50, 100));
        assert!(!det.downstream_processed);
        assert!(det.last_spotted().elapsed().as_secs() < 1);
    }

    #[test]
    fn test_bounding_box_corners() {
        let bbox = BoundingBox::new(10, 20, 30, 40);
        assert_eq!(bbox.bottom_right(), (40, 60));
        assert_eq!(bbox.to_rect(), Rect::new(10, 20, 30, 40));
    }

    #[test]
    fn test_boxes_similar_within_margin() {
        // 200x200 frame, margin 0.3 -> 60px in each axis
        let a = detection("person", 10, 10);
        let b = detection("person", 12, 11);
        assert!(a.bounding_boxes_similar(&b, 0.3));

        // exactly on the margin still matches
        let c = detection("person", 70, 70);
        assert!(a.bounding_boxes_similar(&c, 0.3));
    }

    #[test]
    fn test_boxes_not_similar_beyond_margin() {
        let a = detection("person", 10, 10);
        let b = detection("person", 150, 10);
        assert!(!a.bounding_boxes_similar(&b, 0.3));

        // one axis out of range is enough
        let c = detection("person", 10, 120);
        assert!(!a.bounding_boxes_similar(&c, 0.3));
    }

    #[test]
    fn test_classification_predicates() {
        assert!(detection("person", 0, 0).is_person());
        assert!(!detection("person", 0, 0).is_vehicle());
        assert!(detection("car", 0, 0).is_vehicle());
        assert!(detection("bus", 0, 0).is_vehicle());
        assert!(!detection("dog", 0, 0).is_vehicle());
        assert!(!detection("dog", 0, 0).is_person());
    }

    #[test]
    fn test_cropped_frame_has_box_dimensions() {
        let det = detection("person", 10, 10);
        let crop = det.cropped_frame().unwrap();
        assert_eq!(crop.cols(), 50);
        assert_eq!(crop.rows(), 100);
    }

    #[test]
    fn test_encoded_image_is_jpeg() {
        let det = detection("person", 10, 10);
        let bytes = det.encoded_image().unwrap();
        // JPEG start-of-image marker
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_annotated_copy_leaves_original_untouched() {
        let det = detection("person", 10, 10);
        let annotated = det.frame_with_bounding_box().unwrap();

        let drawn = *annotated.at_2d::<Vec3b>(10, 10).unwrap();
        assert_eq!(drawn[0], 255);

        let original = *det.original_frame().at_2d::<Vec3b>(10, 10).unwrap();
        assert_eq!(original, Vec3b::from([0, 0, 0]));
    }

    #[test]
    fn test_update_last_spotted_refreshes() {
        let mut det = detection("person", 10, 10);
        det.last_spotted = Instant::now() - std::time::Duration::from_secs(3);
        assert!(det.last_spotted().elapsed().as_secs() >= 3);
        det.update_last_spotted();
        assert!(det.last_spotted().elapsed().as_secs() < 1);
    }
}
