//! Face localization.
//!
//! [`FaceLocator`] is the seam the decision engine depends on. The shipped
//! implementation runs SCRFD (Sample and Computation Redistribution for
//! Efficient Face Detection) via ONNX Runtime with 3-stride anchor-free
//! decoding and neighbor-counting NMS.

use crate::error::DetectionError;
use crate::frame::{bilinear_resize, GrayFrame};
use crate::types::FaceRegion;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

const SCRFD_INPUT_SIZE: usize = 640;
const SCRFD_MEAN: f32 = 127.5;
const SCRFD_STD: f32 = 128.0;
const SCRFD_CONFIDENCE_THRESHOLD: f32 = 0.5;
const SCRFD_NMS_THRESHOLD: f32 = 0.4;
const SCRFD_STRIDES: [usize; 3] = [8, 16, 32];
const SCRFD_ANCHORS_PER_CELL: usize = 2;

/// Search parameters passed to every [`FaceLocator::locate`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocateParams {
    /// Image pyramid step; must be > 1.0.
    pub scale_factor: f32,
    /// Minimum number of overlapping candidate detections merged into a face.
    pub min_neighbors: u32,
}

impl LocateParams {
    pub fn validate(&self) -> Result<(), DetectionError> {
        if !(self.scale_factor.is_finite() && self.scale_factor > 1.0) {
            return Err(DetectionError::InvalidConfig(format!(
                "scale_factor must be > 1.0, got {}",
                self.scale_factor
            )));
        }
        Ok(())
    }
}

/// Finds faces in a grayscale frame.
///
/// Implementations must return regions fully inside the frame, in an order
/// that is stable for identical input. `&mut self` because inference sessions
/// need exclusive access while running.
pub trait FaceLocator: Send {
    fn locate(
        &mut self,
        frame: &GrayFrame,
        params: &LocateParams,
    ) -> Result<Vec<FaceRegion>, DetectionError>;
}

/// Metadata for coordinate de-mapping after letterbox resize.
struct LetterboxInfo {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

/// Output tensor indices for one stride: (score_idx, bbox_idx).
type StrideOutputIndices = (usize, usize);

/// Raw SCRFD candidate in original frame coordinates.
#[derive(Debug, Clone, PartialEq)]
struct Candidate {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    confidence: f32,
}

/// Candidate that survived suppression, with the count of candidates it absorbed.
#[derive(Debug, Clone)]
struct MergedCandidate {
    candidate: Candidate,
    neighbors: u32,
}

/// SCRFD-based face locator.
pub struct ScrfdFaceLocator {
    session: Session,
    input_height: usize,
    input_width: usize,
    stride_indices: [StrideOutputIndices; 3],
}

impl ScrfdFaceLocator {
    /// Load the SCRFD ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, DetectionError> {
        if !Path::new(model_path).exists() {
            return Err(DetectionError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?output_names,
            "loaded SCRFD model"
        );

        // Landmark outputs, when present, are ignored.
        if output_names.len() < 6 {
            return Err(DetectionError::ModelFailure(format!(
                "SCRFD model requires at least 6 outputs (3 strides × score/bbox), got {}",
                output_names.len()
            )));
        }

        let stride_indices = discover_output_indices(&output_names);
        tracing::debug!(?stride_indices, "SCRFD output tensor mapping");

        Ok(Self {
            session,
            input_height: SCRFD_INPUT_SIZE,
            input_width: SCRFD_INPUT_SIZE,
            stride_indices,
        })
    }

    /// Preprocess a grayscale frame into a NCHW float tensor with letterbox padding.
    fn preprocess(&self, frame: &GrayFrame) -> (Array4<f32>, LetterboxInfo) {
        let width = frame.width as usize;
        let height = frame.height as usize;

        let scale_w = self.input_width as f32 / width as f32;
        let scale_h = self.input_height as f32 / height as f32;
        let scale = scale_w.min(scale_h);

        let new_w = ((width as f32 * scale).round() as usize).clamp(1, self.input_width);
        let new_h = ((height as f32 * scale).round() as usize).clamp(1, self.input_height);
        let pad_x = (self.input_width - new_w) as f32 / 2.0;
        let pad_y = (self.input_height - new_h) as f32 / 2.0;

        let letterbox = LetterboxInfo { scale, pad_x, pad_y };
        let resized = bilinear_resize(&frame.data, width, height, new_w, new_h);

        let pad_x_start = pad_x.floor() as usize;
        let pad_y_start = pad_y.floor() as usize;

        let mut tensor = Array4::<f32>::zeros((1, 3, self.input_height, self.input_width));

        for y in 0..self.input_height {
            for x in 0..self.input_width {
                let pixel = if y >= pad_y_start
                    && y < pad_y_start + new_h
                    && x >= pad_x_start
                    && x < pad_x_start + new_w
                {
                    resized[(y - pad_y_start) * new_w + (x - pad_x_start)] as f32
                } else {
                    SCRFD_MEAN // pad value normalizes to 0.0
                };

                let normalized = (pixel - SCRFD_MEAN) / SCRFD_STD;
                tensor[[0, 0, y, x]] = normalized;
                tensor[[0, 1, y, x]] = normalized;
                tensor[[0, 2, y, x]] = normalized;
            }
        }

        (tensor, letterbox)
    }
}

impl FaceLocator for ScrfdFaceLocator {
    fn locate(
        &mut self,
        frame: &GrayFrame,
        params: &LocateParams,
    ) -> Result<Vec<FaceRegion>, DetectionError> {
        params.validate()?;
        if frame.width == 0 || frame.height == 0 {
            return Err(DetectionError::InvalidImage("zero-area image".into()));
        }

        let (input, letterbox) = self.preprocess(frame);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();
        for (stride_pos, &stride) in SCRFD_STRIDES.iter().enumerate() {
            let (score_idx, bbox_idx) = self.stride_indices[stride_pos];

            let (_, scores) = outputs[score_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectionError::ModelFailure(format!("scores stride {stride}: {e}")))?;
            let (_, bboxes) = outputs[bbox_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectionError::ModelFailure(format!("bboxes stride {stride}: {e}")))?;

            candidates.extend(decode_stride(
                scores,
                bboxes,
                stride,
                self.input_width,
                self.input_height,
                &letterbox,
                SCRFD_CONFIDENCE_THRESHOLD,
            ));
        }

        let raw = candidates.len();
        let merged = merge_candidates(candidates, SCRFD_NMS_THRESHOLD);
        let regions = finalize_regions(merged, params.min_neighbors, frame.width, frame.height);

        tracing::debug!(
            raw,
            faces = regions.len(),
            scale_factor = params.scale_factor,
            min_neighbors = params.min_neighbors,
            "SCRFD locate"
        );

        Ok(regions)
    }
}

/// Discover score/bbox tensor ordering by name ("score_8", "bbox_16", ...),
/// falling back to the standard positional layout
/// `[0-2] = scores, [3-5] = bboxes` for strides 8/16/32.
fn discover_output_indices(names: &[String]) -> [StrideOutputIndices; 3] {
    let find = |prefix: &str, stride: usize| -> Option<usize> {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| n == &target)
    };

    let mut named = [(0usize, 0usize); 3];
    for (i, &stride) in SCRFD_STRIDES.iter().enumerate() {
        match (find("score", stride), find("bbox", stride)) {
            (Some(s), Some(b)) => named[i] = (s, b),
            _ => {
                tracing::info!(
                    ?names,
                    "SCRFD: output names not recognized, using positional mapping [0-2]=scores, [3-5]=bboxes"
                );
                return [(0, 3), (1, 4), (2, 5)];
            }
        }
    }

    tracing::info!("SCRFD: using name-based output tensor mapping");
    named
}

/// Decode candidates for a single stride level.
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    stride: usize,
    input_width: usize,
    input_height: usize,
    letterbox: &LetterboxInfo,
    threshold: f32,
) -> Vec<Candidate> {
    let grid_h = input_height / stride;
    let grid_w = input_width / stride;
    let num_anchors = grid_h * grid_w * SCRFD_ANCHORS_PER_CELL;

    let mut candidates = Vec::new();

    for idx in 0..num_anchors {
        let score = scores.get(idx).copied().unwrap_or(0.0);
        if score <= threshold {
            continue;
        }

        let anchor_idx = idx / SCRFD_ANCHORS_PER_CELL;
        let anchor_cx = (anchor_idx % grid_w * stride) as f32;
        let anchor_cy = (anchor_idx / grid_w * stride) as f32;

        let off = idx * 4;
        if off + 3 >= bboxes.len() {
            continue;
        }
        let s = stride as f32;
        let x1 = anchor_cx - bboxes[off] * s;
        let y1 = anchor_cy - bboxes[off + 1] * s;
        let x2 = anchor_cx + bboxes[off + 2] * s;
        let y2 = anchor_cy + bboxes[off + 3] * s;

        let orig_x1 = (x1 - letterbox.pad_x) / letterbox.scale;
        let orig_y1 = (y1 - letterbox.pad_y) / letterbox.scale;
        let orig_x2 = (x2 - letterbox.pad_x) / letterbox.scale;
        let orig_y2 = (y2 - letterbox.pad_y) / letterbox.scale;

        candidates.push(Candidate {
            x: orig_x1,
            y: orig_y1,
            width: orig_x2 - orig_x1,
            height: orig_y2 - orig_y1,
            confidence: score,
        });
    }

    candidates
}

/// Non-Maximum Suppression that remembers how many candidates each kept box absorbed.
fn merge_candidates(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<MergedCandidate> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; candidates.len()];

    for i in 0..candidates.len() {
        if suppressed[i] {
            continue;
        }
        let mut neighbors = 0u32;
        for j in (i + 1)..candidates.len() {
            if suppressed[j] {
                continue;
            }
            if iou(&candidates[i], &candidates[j]) > iou_threshold {
                suppressed[j] = true;
                neighbors += 1;
            }
        }
        keep.push(MergedCandidate {
            candidate: candidates[i].clone(),
            neighbors,
        });
    }

    keep
}

/// Drop weakly supported boxes, clamp to the frame, convert to pixel rectangles,
/// and order by confidence with a (y, x) tie-break.
fn finalize_regions(
    merged: Vec<MergedCandidate>,
    min_neighbors: u32,
    width: u32,
    height: u32,
) -> Vec<FaceRegion> {
    let mut scored: Vec<(f32, FaceRegion)> = merged
        .into_iter()
        .filter(|m| m.neighbors >= min_neighbors)
        .filter_map(|m| clamp_to_frame(&m.candidate, width, height).map(|r| (m.candidate.confidence, r)))
        .collect();

    scored.sort_by(|(ca, ra), (cb, rb)| {
        cb.partial_cmp(ca)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(ra.y.cmp(&rb.y))
            .then(ra.x.cmp(&rb.x))
    });

    // Clamping can make previously separate boxes overlap; keep the first.
    let mut regions: Vec<FaceRegion> = Vec::with_capacity(scored.len());
    for (_, region) in scored {
        if !regions.iter().any(|kept| regions_overlap(kept, &region)) {
            regions.push(region);
        }
    }
    regions
}

fn clamp_to_frame(c: &Candidate, width: u32, height: u32) -> Option<FaceRegion> {
    let x1 = c.x.floor().clamp(0.0, width as f32) as u32;
    let y1 = c.y.floor().clamp(0.0, height as f32) as u32;
    let x2 = (c.x + c.width).ceil().clamp(0.0, width as f32) as u32;
    let y2 = (c.y + c.height).ceil().clamp(0.0, height as f32) as u32;
    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    Some(FaceRegion::new(x1, y1, x2 - x1, y2 - y1))
}

fn regions_overlap(a: &FaceRegion, b: &FaceRegion) -> bool {
    a.x < b.x + b.width && b.x < a.x + a.width && a.y < b.y + b.height && b.y < a.y + a.height
}

/// Compute Intersection-over-Union between two candidates.
fn iou(a: &Candidate, b: &Candidate) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let inter_area = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union_area = a.width * a.height + b.width * b.height - inter_area;

    if union_area > 0.0 {
        inter_area / union_area
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(x: f32, y: f32, w: f32, h: f32, conf: f32) -> Candidate {
        Candidate { x, y, width: w, height: h, confidence: conf }
    }

    #[test]
    fn test_params_validation() {
        assert!(LocateParams { scale_factor: 1.1, min_neighbors: 5 }.validate().is_ok());
        assert!(matches!(
            LocateParams { scale_factor: 1.0, min_neighbors: 5 }.validate(),
            Err(DetectionError::InvalidConfig(_))
        ));
        assert!(LocateParams { scale_factor: f32::NAN, min_neighbors: 0 }.validate().is_err());
    }

    #[test]
    fn test_iou_identical() {
        let a = cand(0.0, 0.0, 100.0, 100.0, 1.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_partial() {
        let a = cand(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = cand(5.0, 0.0, 10.0, 10.0, 1.0);
        assert!((iou(&a, &b) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_merge_counts_neighbors() {
        let merged = merge_candidates(
            vec![
                cand(0.0, 0.0, 100.0, 100.0, 0.9),
                cand(2.0, 2.0, 100.0, 100.0, 0.8),
                cand(4.0, 4.0, 100.0, 100.0, 0.7),
                cand(300.0, 300.0, 50.0, 50.0, 0.6),
            ],
            0.4,
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].neighbors, 2);
        assert!((merged[0].candidate.confidence - 0.9).abs() < 1e-6);
        assert_eq!(merged[1].neighbors, 0);
    }

    #[test]
    fn test_min_neighbors_filters_isolated_boxes() {
        let merged = merge_candidates(
            vec![
                cand(0.0, 0.0, 100.0, 100.0, 0.9),
                cand(1.0, 1.0, 100.0, 100.0, 0.85),
                cand(300.0, 300.0, 50.0, 50.0, 0.95),
            ],
            0.4,
        );
        let regions = finalize_regions(merged.clone(), 1, 640, 480);
        assert_eq!(regions, vec![FaceRegion::new(0, 0, 100, 100)]);

        let regions = finalize_regions(merged, 0, 640, 480);
        assert_eq!(regions.len(), 2);
        // Higher confidence first
        assert_eq!(regions[0], FaceRegion::new(300, 300, 50, 50));
    }

    #[test]
    fn test_regions_clamped_inside_frame() {
        let merged = vec![MergedCandidate {
            candidate: cand(-10.5, -3.0, 60.0, 60.0, 0.9),
            neighbors: 5,
        }];
        let regions = finalize_regions(merged, 5, 40, 40);
        assert_eq!(regions, vec![FaceRegion::new(0, 0, 40, 40)]);
        assert!(regions[0].fits_within(40, 40));
    }

    #[test]
    fn test_degenerate_boxes_dropped() {
        let merged = vec![MergedCandidate {
            candidate: cand(500.0, 500.0, 20.0, 20.0, 0.9),
            neighbors: 5,
        }];
        assert!(finalize_regions(merged, 0, 100, 100).is_empty());
    }

    #[test]
    fn test_equal_confidence_ordered_by_position() {
        let merged = vec![
            MergedCandidate { candidate: cand(50.0, 10.0, 10.0, 10.0, 0.8), neighbors: 0 },
            MergedCandidate { candidate: cand(10.0, 10.0, 10.0, 10.0, 0.8), neighbors: 0 },
            MergedCandidate { candidate: cand(10.0, 0.0, 5.0, 5.0, 0.8), neighbors: 0 },
        ];
        let regions = finalize_regions(merged, 0, 100, 100);
        assert_eq!(
            regions,
            vec![
                FaceRegion::new(10, 0, 5, 5),
                FaceRegion::new(10, 10, 10, 10),
                FaceRegion::new(50, 10, 10, 10),
            ]
        );
    }

    #[test]
    fn test_overlap_after_clamping_keeps_first() {
        let merged = vec![
            MergedCandidate { candidate: cand(0.0, 0.0, 30.0, 30.0, 0.9), neighbors: 0 },
            MergedCandidate { candidate: cand(20.0, 20.0, 30.0, 30.0, 0.8), neighbors: 0 },
        ];
        let regions = finalize_regions(merged, 0, 100, 100);
        assert_eq!(regions, vec![FaceRegion::new(0, 0, 30, 30)]);
    }

    #[test]
    fn test_decode_stride_maps_to_frame_space() {
        // One positive anchor at grid cell (0, 0), stride 32, identity letterbox.
        let grid = SCRFD_INPUT_SIZE / 32;
        let mut scores = vec![0.0f32; grid * grid * SCRFD_ANCHORS_PER_CELL];
        let mut bboxes = vec![0.0f32; scores.len() * 4];
        scores[0] = 0.9;
        bboxes[..4].copy_from_slice(&[0.0, 0.0, 2.0, 3.0]);

        let letterbox = LetterboxInfo { scale: 1.0, pad_x: 0.0, pad_y: 0.0 };
        let dets = decode_stride(&scores, &bboxes, 32, SCRFD_INPUT_SIZE, SCRFD_INPUT_SIZE, &letterbox, 0.5);
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0], cand(0.0, 0.0, 64.0, 96.0, 0.9));
    }

    #[test]
    fn test_discover_output_indices_named() {
        let names: Vec<String> = [
            "bbox_8", "score_8", "kps_8",
            "bbox_16", "score_16", "kps_16",
            "bbox_32", "score_32", "kps_32",
        ].iter().map(|s| s.to_string()).collect();

        let indices = discover_output_indices(&names);
        assert_eq!(indices, [(1, 0), (4, 3), (7, 6)]);
    }

    #[test]
    fn test_discover_output_indices_positional_fallback() {
        let names: Vec<String> = (0..9).map(|i: usize| i.to_string()).collect();
        assert_eq!(discover_output_indices(&names), [(0, 3), (1, 4), (2, 5)]);
    }
}
