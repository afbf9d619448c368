//! Face detector
//!
//! SCRFD-style anchor-based detection (3 strides, 2 anchors per cell)
//! run at a configurable working resolution. The pipeline needs exactly
//! one face per image, selected deterministically.

use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView};
use openvino::{ElementType, InferRequest, Shape, Tensor};

use super::model::SafeCompiledModel;
use super::preprocess::{image_to_nchw, resize_with_padding, ResizeInfo};

const STRIDES: [i32; 3] = [8, 16, 32];
const ANCHORS_PER_CELL: usize = 2;
const NMS_THRESHOLD: f32 = 0.4;

/// A detected face region.
#[derive(Debug, Clone)]
pub struct FaceBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

/// Choose the best detection: highest confidence, first-encountered on
/// exact ties. Explicit policy, not arbitrary selection.
pub fn pick_best(boxes: Vec<FaceBox>) -> Option<FaceBox> {
    boxes.into_iter().fold(None, |best, candidate| match best {
        Some(current) if candidate.confidence <= current.confidence => Some(current),
        _ => Some(candidate),
    })
}

pub struct FaceDetector {
    model: SafeCompiledModel,
    input_size: u32,
    min_confidence: f32,
}

impl FaceDetector {
    pub fn new(model: SafeCompiledModel, input_size: u32, min_confidence: f32) -> Self {
        Self {
            model,
            input_size,
            min_confidence,
        }
    }

    /// Detect all face regions at or above the minimum confidence.
    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceBox>> {
        let size = self.input_size;
        let resize_info = ResizeInfo::new(image.dimensions(), (size, size));

        let padded = resize_with_padding(image, size, size);
        let input_tensor = image_to_nchw(&padded);

        let mut request = self.model.create_infer_request()?;

        let input_shape = Shape::new(&[1, 3, size as i64, size as i64])?;
        let mut input = Tensor::new(ElementType::F32, &input_shape)?;

        let input_data = input_tensor
            .as_slice()
            .context("detector input tensor not contiguous")?;
        unsafe {
            let tensor_data = input.get_raw_data_mut()?.as_mut_ptr() as *mut f32;
            std::ptr::copy_nonoverlapping(input_data.as_ptr(), tensor_data, input_data.len());
        }

        request.set_input_tensor(&input)?;
        request.infer()?;

        let detections = self.parse_outputs(&request, &resize_info)?;
        Ok(nms(detections, NMS_THRESHOLD))
    }

    /// Detect and return the single best face, or none.
    pub fn best_face(&self, image: &DynamicImage) -> Result<Option<FaceBox>> {
        let detections = self.detect(image)?;
        tracing::debug!("detected {} candidate face regions", detections.len());
        Ok(pick_best(detections))
    }

    /// Parse per-stride score and bbox outputs. Output layout: scores
    /// for strides 8/16/32 at indices 0..3, bbox distances at 3..6.
    fn parse_outputs(&self, request: &InferRequest, resize_info: &ResizeInfo) -> Result<Vec<FaceBox>> {
        let mut all_boxes = Vec::new();
        let input = self.input_size as i32;

        for (idx, &stride) in STRIDES.iter().enumerate() {
            let scores_tensor = request.get_output_tensor_by_index(idx)?;
            let bbox_tensor = request.get_output_tensor_by_index(idx + STRIDES.len())?;

            let scores = read_tensor_f32(&scores_tensor)?;
            let bboxes = read_tensor_f32(&bbox_tensor)?;

            let feat_h = input / stride;
            let feat_w = input / stride;

            let mut anchor_centers = Vec::with_capacity((feat_h * feat_w) as usize * ANCHORS_PER_CELL);
            for y in 0..feat_h {
                for x in 0..feat_w {
                    for _ in 0..ANCHORS_PER_CELL {
                        anchor_centers.push((x as f32 * stride as f32, y as f32 * stride as f32));
                    }
                }
            }

            for (i, &(cx, cy)) in anchor_centers.iter().enumerate() {
                let Some(&score) = scores.get(i) else { break };
                if score < self.min_confidence {
                    continue;
                }

                // Bbox predictions are distances (left, top, right,
                // bottom) from the anchor center, in stride units.
                let bbox_idx = i * 4;
                if bbox_idx + 3 >= bboxes.len() {
                    continue;
                }

                let x1 = cx - bboxes[bbox_idx] * stride as f32;
                let y1 = cy - bboxes[bbox_idx + 1] * stride as f32;
                let x2 = cx + bboxes[bbox_idx + 2] * stride as f32;
                let y2 = cy + bboxes[bbox_idx + 3] * stride as f32;

                let (orig_x1, orig_y1) = resize_info.to_original(x1, y1);
                let (orig_x2, orig_y2) = resize_info.to_original(x2, y2);

                let max_w = resize_info.original_width as f32;
                let max_h = resize_info.original_height as f32;

                all_boxes.push(FaceBox {
                    x1: orig_x1.clamp(0.0, max_w),
                    y1: orig_y1.clamp(0.0, max_h),
                    x2: orig_x2.clamp(0.0, max_w),
                    y2: orig_y2.clamp(0.0, max_h),
                    confidence: score,
                });
            }
        }

        Ok(all_boxes)
    }
}

fn read_tensor_f32(tensor: &Tensor) -> Result<Vec<f32>> {
    let shape = tensor.get_shape()?;
    let total: i64 = shape.get_dimensions().iter().product();

    let data = unsafe {
        let ptr = tensor.get_raw_data()?.as_ptr() as *const f32;
        std::slice::from_raw_parts(ptr, total as usize).to_vec()
    };

    Ok(data)
}

/// Non-maximum suppression by descending confidence.
fn nms(mut boxes: Vec<FaceBox>, threshold: f32) -> Vec<FaceBox> {
    if boxes.is_empty() {
        return boxes;
    }

    boxes.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<FaceBox> = Vec::new();
    let mut suppressed = vec![false; boxes.len()];

    for i in 0..boxes.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(boxes[i].clone());

        for j in (i + 1)..boxes.len() {
            if !suppressed[j] && iou(&boxes[i], &boxes[j]) > threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

fn iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    let union = area_a + area_b - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}
