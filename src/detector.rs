use std::fs;

use anyhow::Context;
use opencv::{
    core::{Mat, Rect, Scalar, Size, Vector, CV_32F},
    dnn,
    prelude::*,
};

use crate::config::Config;
use crate::detection::{BoundingBox, Detection};

/// Darknet network input resolution.
const INPUT_SIZE: i32 = 416;

/// Runs a Darknet YOLO network over frames and produces raw [`Detection`]
/// batches: confidence-filtered and overlap-suppressed, ready for the
/// tracker.
pub struct Detector {
    net: dnn::Net,
    output_layers: Vector<String>,
    labels: Vec<String>,
    confidence_threshold: f32,
    nms_threshold: f32,
}

impl Detector {
    /// Load the network and label list named by the config.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let net = dnn::read_net_from_darknet(&config.model_config_path, &config.model_weights_path)
            .with_context(|| {
                format!(
                    "failed to load darknet model from {}",
                    config.model_weights_path
                )
            })?;
        let output_layers = net.get_unconnected_out_layers_names()?;
        let labels = fs::read_to_string(&config.labels_path)
            .with_context(|| format!("failed to read labels from {}", config.labels_path))?
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();

        Ok(Detector {
            net,
            output_layers,
            labels,
            confidence_threshold: config.confidence_threshold,
            nms_threshold: config.nms_threshold,
        })
    }

    /// Detect objects in a frame. Each returned detection owns its own copy
    /// of the frame.
    pub fn detect(&mut self, frame: &Mat) -> anyhow::Result<Vec<Detection>> {
        let outputs = self.forward(frame)?;
        self.collect_detections(frame, &outputs)
    }

    /// Blob preprocessing and forward pass through the output layers.
    fn forward(&mut self, frame: &Mat) -> anyhow::Result<Vector<Mat>> {
        let blob = dnn::blob_from_image(
            frame,
            1.0 / 255.0,
            Size::new(INPUT_SIZE, INPUT_SIZE),
            Scalar::default(),
            true,
            false,
            CV_32F,
        )?;
        self.net.set_input(&blob, "", 1.0, Scalar::default())?;
        let mut outputs = Vector::<Mat>::new();
        self.net.forward(&mut outputs, &self.output_layers)?;
        Ok(outputs)
    }

    /// Postprocess raw network output into detections: per-row argmax
    /// scoring, confidence filtering, then non-maximum suppression.
    fn collect_detections(
        &self,
        frame: &Mat,
        outputs: &Vector<Mat>,
    ) -> anyhow::Result<Vec<Detection>> {
        let frame_width = frame.cols() as f32;
        let frame_height = frame.rows() as f32;

        let mut boxes = Vector::<Rect>::new();
        let mut confidences = Vector::<f32>::new();
        let mut class_ids = Vec::new();

        // each row is [cx, cy, w, h, objectness, class scores...] with
        // coordinates relative to the frame size
        for output in outputs.iter() {
            for row_idx in 0..output.rows() {
                let row = output.at_row::<f32>(row_idx)?;
                if row.len() <= 5 {
                    continue;
                }
                let (class_id, confidence) = argmax(&row[5..]);
                if confidence < self.confidence_threshold {
                    continue;
                }
                boxes.push(scale_box(row, frame_width, frame_height));
                confidences.push(confidence);
                class_ids.push(class_id);
            }
        }

        let mut keep = Vector::<i32>::new();
        dnn::nms_boxes(
            &boxes,
            &confidences,
            self.confidence_threshold,
            self.nms_threshold,
            &mut keep,
            1.0,
            0,
        )?;

        let mut detections = Vec::with_capacity(keep.len());
        for idx in keep.iter() {
            let idx = idx as usize;
            let rect = boxes.get(idx)?;
            let label = self
                .labels
                .get(class_ids[idx])
                .cloned()
                .unwrap_or_else(|| format!("class_{}", class_ids[idx]));
            detections.push(Detection::new(
                frame.try_clone()?,
                label,
                confidences.get(idx)?,
                BoundingBox::new(rect.x, rect.y, rect.width, rect.height),
            ));
        }
        Ok(detections)
    }
}

/// Index and value of the best class score.
fn argmax(scores: &[f32]) -> (usize, f32) {
    let mut best = (0usize, 0.0f32);
    for (idx, &score) in scores.iter().enumerate() {
        if score > best.1 {
            best = (idx, score);
        }
    }
    best
}

/// Center-relative network coordinates to an integer top-left pixel box.
fn scale_box(row: &[f32], frame_width: f32, frame_height: f32) -> Rect {
    let center_x = row[0] * frame_width;
    let center_y = row[1] * frame_height;
    let width = row[2] * frame_width;
    let height = row[3] * frame_height;
    let x = (center_x - width / 2.0) as i32;
    let y = (center_y - height / 2.0) as i32;
    Rect::new(x, y, width as i32, height as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_argmax_picks_best_score() {
        assert_eq!(argmax(&[0.1, 0.7, 0.3]), (1, 0.7));
        assert_eq!(argmax(&[0.0, 0.0]), (0, 0.0));
    }

    #[test]
    fn test_scale_box_centers_to_top_left() {
        // center (0.5, 0.5), size (0.25, 0.5) on a 400x200 frame
        let rect = scale_box(&[0.5, 0.5, 0.25, 0.5, 0.9], 400.0, 200.0);
        assert_eq!(rect, Rect::new(150, 50, 100, 100));
    }

    #[test]
    fn test_detector_on_model_files() {
        // skip unless the model files are present
        let config = Config::default();
        if !Path::new(&config.model_weights_path).exists() {
            return;
        }

        let mut detector = Detector::new(&config).expect("failed to create detector");
        let frame = Mat::new_size_with_default(
            Size::new(640, 480),
            opencv::core::CV_8UC3,
            Scalar::all(0.0),
        )
        .unwrap();

        let detections = detector.detect(&frame).expect("detection failed");
        for det in &detections {
            assert!(det.confidence() >= config.confidence_threshold);
        }
    }
}
