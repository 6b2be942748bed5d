//! Text detection: DB-style segmentation postprocessing.
//!
//! The detection model emits a per-pixel text probability map. Thresholding
//! gives a binary mask; connected components become candidate boxes, which
//! are score-filtered, expanded, scaled back to source coordinates, and
//! sorted into reading order.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::contours::find_contours;
use imageproc::morphology::dilate;
use ndarray::{Array3, Array4, ArrayView2};
use ort::{inputs, session::Session, value::TensorRef};

use deckscan_core::types::BoundingBox;

use crate::OcrError;

use super::PaddleOptions;

/// ImageNet normalisation used by the detection model.
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Boxes with a short side under this many mask pixels are discarded.
const MIN_BOX_SIDE: f32 = 3.0;

/// Rows whose vertical centres differ by less than this are one text line.
const READING_ORDER_TOLERANCE: f32 = 10.0;

/// Run detection and return reading-ordered boxes in source coordinates.
pub(crate) fn detect(
    session: &mut Session,
    image: &DynamicImage,
    opts: &PaddleOptions,
) -> Result<Vec<BoundingBox>, OcrError> {
    let input = preprocess(image, opts)?;
    let tensor: TensorRef<f32> = TensorRef::from_array_view(&input)?;
    let outputs = session.run(inputs![tensor])?;
    let pred = outputs[0]
        .try_extract_array::<f32>()?
        .into_owned()
        .into_dimensionality::<ndarray::Ix4>()
        .map_err(|e| OcrError::Preprocess(format!("unexpected det output shape: {e}")))?;

    let map = pred.index_axis(ndarray::Axis(0), 0);
    let map = map.index_axis(ndarray::Axis(0), 0);
    Ok(postprocess(map, (image.width(), image.height()), opts))
}

/// Resize to a multiple of 32 under the side cap and normalise.
fn preprocess(image: &DynamicImage, opts: &PaddleOptions) -> Result<Array4<f32>, OcrError> {
    let (width, height) = (image.width(), image.height());
    #[allow(clippy::cast_precision_loss)]
    let (w, h) = (width as f32, height as f32);
    #[allow(clippy::cast_precision_loss)]
    let limit = opts.det_limit_side as f32;

    let ratio = if w.max(h) > limit { limit / w.max(h) } else { 1.0 };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let resize_w = (((w * ratio) / 32.0).round() as u32).max(1) * 32;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let resize_h = (((h * ratio) / 32.0).round() as u32).max(1) * 32;

    let resized = image
        .resize_exact(resize_w, resize_h, image::imageops::FilterType::CatmullRom)
        .to_rgb8();

    let mut array = Array3::<f32>::zeros((3, resize_h as usize, resize_w as usize));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            array[[c, y as usize, x as usize]] =
                (f32::from(pixel[c]) / 255.0 - MEAN[c]) / STD[c];
        }
    }
    Ok(array.insert_axis(ndarray::Axis(0)))
}

/// Threshold, find components, filter, expand, rescale, order.
fn postprocess(
    pred: ArrayView2<'_, f32>,
    source_dims: (u32, u32),
    opts: &PaddleOptions,
) -> Vec<BoundingBox> {
    let (map_h, map_w) = (pred.shape()[0], pred.shape()[1]);
    let (src_w, src_h) = source_dims;

    #[allow(clippy::cast_possible_truncation)]
    let mut mask = GrayImage::new(map_w as u32, map_h as u32);
    for y in 0..map_h {
        for x in 0..map_w {
            let on = pred[[y, x]] > opts.det_thresh;
            #[allow(clippy::cast_possible_truncation)]
            mask.put_pixel(x as u32, y as u32, Luma([if on { 255 } else { 0 }]));
        }
    }
    mask = dilate(&mask, imageproc::distance_transform::Norm::L1, 1);

    let contours = find_contours::<u32>(&mask);
    let mut boxes = Vec::new();

    for contour in contours.iter().take(opts.max_boxes) {
        if contour.points.is_empty() {
            continue;
        }
        #[allow(clippy::cast_precision_loss)]
        let (min_x, max_x, min_y, max_y) = contour.points.iter().fold(
            (f32::INFINITY, f32::NEG_INFINITY, f32::INFINITY, f32::NEG_INFINITY),
            |(lx, hx, ly, hy), p| {
                (
                    lx.min(p.x as f32),
                    hx.max(p.x as f32),
                    ly.min(p.y as f32),
                    hy.max(p.y as f32),
                )
            },
        );
        if (max_x - min_x).min(max_y - min_y) < MIN_BOX_SIDE {
            continue;
        }
        if region_score(pred, min_x, max_x, min_y, max_y) < opts.box_thresh {
            continue;
        }

        let (ex_min_x, ex_max_x, ex_min_y, ex_max_y) =
            expand(min_x, max_x, min_y, max_y, opts.unclip_ratio);

        #[allow(clippy::cast_precision_loss)]
        let scale_x = src_w as f32 / map_w as f32;
        #[allow(clippy::cast_precision_loss)]
        let scale_y = src_h as f32 / map_h as f32;
        #[allow(clippy::cast_precision_loss)]
        let (far_x, far_y) = ((src_w - 1) as f32, (src_h - 1) as f32);

        let x0 = (ex_min_x * scale_x).clamp(0.0, far_x);
        let x1 = (ex_max_x * scale_x).clamp(0.0, far_x);
        let y0 = (ex_min_y * scale_y).clamp(0.0, far_y);
        let y1 = (ex_max_y * scale_y).clamp(0.0, far_y);
        if x1 - x0 <= MIN_BOX_SIDE || y1 - y0 <= MIN_BOX_SIDE {
            continue;
        }
        boxes.push(BoundingBox::new(x0, y0, x1 - x0, y1 - y0));
    }

    sort_reading_order(boxes)
}

/// Mean probability inside an axis-aligned region of the prediction map.
fn region_score(pred: ArrayView2<'_, f32>, min_x: f32, max_x: f32, min_y: f32, max_y: f32) -> f32 {
    let (h, w) = (pred.shape()[0], pred.shape()[1]);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let (x0, x1) = (
        (min_x.floor().max(0.0) as usize).min(w - 1),
        (max_x.ceil().max(0.0) as usize).min(w - 1),
    );
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let (y0, y1) = (
        (min_y.floor().max(0.0) as usize).min(h - 1),
        (max_y.ceil().max(0.0) as usize).min(h - 1),
    );

    let mut sum = 0.0f32;
    let mut count = 0u32;
    for y in y0..=y1 {
        for x in x0..=x1 {
            sum += pred[[y, x]];
            count += 1;
        }
    }
    #[allow(clippy::cast_precision_loss)]
    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}

/// Grow a box by the DB unclip offset: area * ratio / perimeter.
fn expand(min_x: f32, max_x: f32, min_y: f32, max_y: f32, ratio: f32) -> (f32, f32, f32, f32) {
    let width = max_x - min_x;
    let height = max_y - min_y;
    let area = width * height;
    let perimeter = 2.0 * (width + height);
    let offset = if perimeter > 0.0 {
        area * ratio / perimeter
    } else {
        0.0
    };
    (
        min_x - offset,
        max_x + offset,
        min_y - offset,
        max_y + offset,
    )
}

/// Top-to-bottom, then left-to-right within a vertical tolerance band.
fn sort_reading_order(mut boxes: Vec<BoundingBox>) -> Vec<BoundingBox> {
    boxes.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));
    let n = boxes.len();
    if n < 2 {
        return boxes;
    }
    for i in 0..(n - 1) {
        for j in (0..=i).rev() {
            if j + 1 < n
                && (boxes[j + 1].y - boxes[j].y).abs() < READING_ORDER_TOLERANCE
                && boxes[j + 1].x < boxes[j].x
            {
                boxes.swap(j, j + 1);
            } else {
                break;
            }
        }
    }
    boxes
}
