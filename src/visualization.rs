use opencv::{
    core::{Mat, Point, Rect, Scalar},
    imgproc,
    prelude::*,
};

use crate::detection::Detection;

/// Color used for overlay boxes and labels (BGR).
pub fn overlay_color() -> Scalar {
    Scalar::new(255.0, 0.0, 0.0, 0.0)
}

pub fn draw_box(frame: &mut Mat, rect: Rect, color: Scalar, thickness: i32) -> opencv::Result<()> {
    imgproc::rectangle(frame, rect, color, thickness, imgproc::LINE_8, 0)
}

pub fn draw_label(
    frame: &mut Mat,
    text: &str,
    org: (i32, i32),
    color: Scalar,
    font_scale: f64,
    thickness: i32,
) -> opencv::Result<()> {
    imgproc::put_text(
        frame,
        text,
        Point::new(org.0, org.1),
        imgproc::FONT_HERSHEY_SIMPLEX,
        font_scale,
        color,
        thickness,
        imgproc::LINE_8,
        false,
    )
}

/// Overlay every live track onto the frame.
pub fn draw_tracks(frame: &mut Mat, tracks: &[Detection]) -> opencv::Result<()> {
    for track in tracks {
        track.draw_bounding_box(frame)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Size, Vec3b, CV_8UC3};

    #[test]
    fn test_draw_box_marks_pixels() {
        let mut frame = Mat::new_size_with_default(
            Size::new(100, 100),
            CV_8UC3,
            Scalar::all(0.0),
        )
        .unwrap();

        draw_box(&mut frame, Rect::new(10, 10, 30, 30), overlay_color(), 1).unwrap();

        let px = *frame.at_2d::<Vec3b>(10, 10).unwrap();
        assert_eq!(px[0], 255);
    }

    #[test]
    fn test_draw_tracks_empty_is_noop() {
        let mut frame = Mat::new_size_with_default(
            Size::new(100, 100),
            CV_8UC3,
            Scalar::all(0.0),
        )
        .unwrap();
        draw_tracks(&mut frame, &[]).unwrap();
    }
}
