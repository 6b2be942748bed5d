//! Primary OCR engine: PaddleOCR models on ONNX Runtime.
//!
//! Two-stage pipeline: a detection model proposes text boxes, a CRNN
//! recognition model reads each box, and a CTC decoder turns logits into
//! text. Models are loaded once per process; the sessions sit behind
//! mutexes so the engine satisfies the thread-safety contract of
//! [`TextRecognizer`](crate::TextRecognizer) for independent calls.

mod ctc;
mod detect;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::DynamicImage;
use ndarray::Array3;
use ort::{
    inputs,
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};

use deckscan_core::types::{BoundingBox, Span};

use crate::{OcrError, TextRecognizer};

/// Tuning knobs of the two model stages. Defaults follow the PP-OCRv4
/// reference configuration.
#[derive(Debug, Clone)]
pub struct PaddleOptions {
    /// Longest-side cap applied before detection.
    pub det_limit_side: u32,
    /// Probability threshold for the detection bitmap.
    pub det_thresh: f32,
    /// Minimum mean probability inside a proposed box.
    pub box_thresh: f32,
    /// Expansion ratio applied to accepted boxes.
    pub unclip_ratio: f32,
    /// Cap on proposed boxes per image.
    pub max_boxes: usize,
    /// Fixed input height of the recognition model.
    pub rec_height: usize,
    /// Cap on the dynamic recognition width.
    pub rec_max_width: usize,
    /// Regions per recognition batch.
    pub rec_batch: usize,
}

impl Default for PaddleOptions {
    fn default() -> Self {
        Self {
            det_limit_side: 960,
            det_thresh: 0.3,
            box_thresh: 0.5,
            unclip_ratio: 1.6,
            max_boxes: 1000,
            rec_height: 48,
            rec_max_width: 320,
            rec_batch: 6,
        }
    }
}

/// The primary local OCR engine.
#[derive(Debug)]
pub struct PaddleOcr {
    det: Mutex<Session>,
    rec: Mutex<Session>,
    dict: Vec<String>,
    opts: PaddleOptions,
}

impl PaddleOcr {
    /// Load the engine from the default model directory.
    ///
    /// The directory is discovered from `DECKSCAN_OCR_MODELS`, then
    /// `<manifest>/models`, then `./models`, and must contain
    /// `det_model.onnx`, `rec_model.onnx`, and `keys.txt`.
    ///
    /// # Errors
    ///
    /// [`OcrError::ModelLoad`] when the directory or any model file is
    /// missing or unloadable.
    pub fn new() -> Result<Self, OcrError> {
        Self::from_dir(&Self::find_model_dir()?, PaddleOptions::default())
    }

    /// Load the engine from an explicit model directory.
    ///
    /// # Errors
    ///
    /// [`OcrError::ModelLoad`] when a model file is missing or unloadable.
    pub fn from_dir(dir: &Path, opts: PaddleOptions) -> Result<Self, OcrError> {
        let det_path = dir.join("det_model.onnx");
        let rec_path = dir.join("rec_model.onnx");
        let dict_path = dir.join("keys.txt");
        for path in [&det_path, &rec_path, &dict_path] {
            if !path.exists() {
                return Err(OcrError::ModelLoad(format!(
                    "missing model file {}",
                    path.display()
                )));
            }
        }

        Ok(Self {
            det: Mutex::new(Self::load_session(&det_path)?),
            rec: Mutex::new(Self::load_session(&rec_path)?),
            dict: ctc::load_dict(&dict_path)?,
            opts,
        })
    }

    fn load_session(path: &Path) -> Result<Session, OcrError> {
        Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level1)
            .map_err(ort::Error::<()>::from)?
            .with_intra_threads(4)
            .map_err(ort::Error::<()>::from)?
            .commit_from_file(path)
            .map_err(|e| OcrError::ModelLoad(format!("{}: {e}", path.display())))
    }

    fn find_model_dir() -> Result<PathBuf, OcrError> {
        if let Ok(dir) = std::env::var("DECKSCAN_OCR_MODELS") {
            let path = PathBuf::from(dir);
            if path.is_dir() {
                return Ok(path);
            }
        }
        if let Ok(manifest) = std::env::var("CARGO_MANIFEST_DIR") {
            let path = Path::new(&manifest).join("models");
            if path.is_dir() {
                return Ok(path);
            }
        }
        let fallback = PathBuf::from("models");
        if fallback.is_dir() {
            return Ok(fallback);
        }
        Err(OcrError::ModelLoad(
            "no model directory found; set DECKSCAN_OCR_MODELS".to_string(),
        ))
    }

    /// Read text from the detected regions, batched for the recognition
    /// model.
    fn read_regions(
        &self,
        image: &DynamicImage,
        boxes: &[BoundingBox],
    ) -> Result<Vec<Span>, OcrError> {
        let crops: Vec<DynamicImage> = boxes
            .iter()
            .map(|b| {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                image.crop_imm(
                    b.x.max(0.0) as u32,
                    b.y.max(0.0) as u32,
                    b.width.max(1.0) as u32,
                    b.height.max(1.0) as u32,
                )
            })
            .collect();

        let mut spans = Vec::with_capacity(crops.len());
        for (batch_start, chunk) in crops
            .chunks(self.opts.rec_batch)
            .enumerate()
            .map(|(i, c)| (i * self.opts.rec_batch, c))
        {
            let results = self.read_batch(chunk)?;
            for (offset, (text, confidence)) in results.into_iter().enumerate() {
                if text.is_empty() {
                    continue;
                }
                spans.push(Span::new(text, confidence, boxes[batch_start + offset]));
            }
        }
        Ok(spans)
    }

    /// Run the recognition model over one batch of crops.
    fn read_batch(&self, crops: &[DynamicImage]) -> Result<Vec<(String, f32)>, OcrError> {
        #[allow(clippy::cast_precision_loss)]
        let max_ratio = crops
            .iter()
            .map(|c| c.width() as f32 / c.height().max(1) as f32)
            .fold(1.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let width = ((self.opts.rec_height as f32 * max_ratio).ceil() as usize)
            .min(self.opts.rec_max_width);

        let mut batch =
            ndarray::Array4::<f32>::zeros((crops.len(), 3, self.opts.rec_height, width));
        for (i, crop) in crops.iter().enumerate() {
            let normalized = self.normalize_region(crop, width);
            batch
                .slice_mut(ndarray::s![i, .., .., ..])
                .assign(&normalized);
        }

        let output = {
            let mut session = self
                .rec
                .lock()
                .map_err(|_| OcrError::Preprocess("recognition session poisoned".to_string()))?;
            let tensor: TensorRef<f32> = TensorRef::from_array_view(&batch)?;
            let outputs = session.run(inputs![tensor])?;
            outputs[0]
                .try_extract_array::<f32>()?
                .into_owned()
                .into_dimensionality::<ndarray::Ix3>()
                .map_err(|e| OcrError::Preprocess(format!("unexpected rec output shape: {e}")))?
        };

        let mut results = Vec::with_capacity(crops.len());
        for row in 0..crops.len() {
            let preds = output.index_axis(ndarray::Axis(0), row);
            results.push(ctc::decode(&self.dict, preds));
        }
        Ok(results)
    }

    /// Resize a crop to the model height, normalise to `[-1, 1]`, and pad
    /// to the batch width.
    fn normalize_region(&self, crop: &DynamicImage, width: usize) -> Array3<f32> {
        let height = self.opts.rec_height;
        #[allow(clippy::cast_precision_loss)]
        let ratio = crop.width() as f32 / crop.height().max(1) as f32;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let target_w = (((height as f32) * ratio).ceil() as usize).clamp(1, width);

        #[allow(clippy::cast_possible_truncation)]
        let resized = crop
            .resize_exact(
                target_w as u32,
                height as u32,
                image::imageops::FilterType::CatmullRom,
            )
            .to_rgb8();

        let mut array = Array3::<f32>::zeros((3, height, width));
        for y in 0..height {
            for x in 0..target_w {
                #[allow(clippy::cast_possible_truncation)]
                let pixel = resized.get_pixel(x as u32, y as u32);
                for c in 0..3 {
                    array[[c, y, x]] = (f32::from(pixel[c]) / 255.0 - 0.5) / 0.5;
                }
            }
        }
        array
    }
}

impl TextRecognizer for PaddleOcr {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<Span>, OcrError> {
        let boxes = {
            let mut session = self
                .det
                .lock()
                .map_err(|_| OcrError::Preprocess("detection session poisoned".to_string()))?;
            detect::detect(&mut session, image, &self.opts)?
        };
        if boxes.is_empty() {
            log::debug!("no text regions detected");
            return Ok(Vec::new());
        }
        log::debug!("detected {} text regions", boxes.len());
        self.read_regions(image, &boxes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_models_report_model_load() {
        let dir = std::env::temp_dir().join("deckscan-no-models");
        let err = PaddleOcr::from_dir(&dir, PaddleOptions::default()).unwrap_err();
        assert!(matches!(err, OcrError::ModelLoad(_)));
    }

    #[test]
    fn default_options_follow_reference_config() {
        let opts = PaddleOptions::default();
        assert_eq!(opts.det_limit_side, 960);
        assert_eq!(opts.rec_height, 48);
        assert_eq!(opts.rec_batch, 6);
    }
}
