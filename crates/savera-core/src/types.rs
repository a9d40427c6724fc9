use serde::{Deserialize, Serialize};

/// Axis-aligned face rectangle in pixel coordinates of the source frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether the region lies entirely inside a `width` × `height` frame.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }
}

/// Panic confidence produced by the scorer, always within [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct PanicScore(f32);

impl PanicScore {
    /// Returns `None` for non-finite values or values outside [0, 1].
    pub fn new(value: f32) -> Option<Self> {
        (value.is_finite() && (0.0..=1.0).contains(&value)).then_some(Self(value))
    }

    pub fn value(self) -> f32 {
        self.0
    }
}

/// Outcome of applying the dynamic threshold to one score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub is_panic: bool,
    pub score: f32,
    /// Threshold actually compared against; a pure function of `score`.
    pub threshold_used: f32,
}

/// Per-face record kept for logging and callers that want more than the aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceVerdict {
    /// Position in locator order (0-based).
    pub index: usize,
    /// `None` when the whole input was scored as a pre-cropped face.
    pub region: Option<FaceRegion>,
    pub classification: Classification,
}

/// Why a detection came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionStatus {
    Panic,
    NoPanic,
    NoFaceDetected,
}

impl DetectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Panic => "panic",
            Self::NoPanic => "no-panic",
            Self::NoFaceDetected => "no-face-detected",
        }
    }
}

impl std::fmt::Display for DetectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate decision for one input image.
///
/// Fields are private so the invariants hold: `panic_detected` is true iff at
/// least one face verdict is panic, and a suggestion exists iff
/// `panic_detected` is true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    panic_detected: bool,
    suggestion: Option<String>,
    status: DetectionStatus,
    faces: Vec<FaceVerdict>,
}

impl DetectionResult {
    /// Result for an image in which the locator found nothing.
    pub fn no_face() -> Self {
        Self {
            panic_detected: false,
            suggestion: None,
            status: DetectionStatus::NoFaceDetected,
            faces: Vec::new(),
        }
    }

    /// Aggregate per-face verdicts by logical OR. `suggest` is only invoked
    /// when at least one face is panic.
    pub fn from_verdicts(faces: Vec<FaceVerdict>, suggest: impl FnOnce() -> String) -> Self {
        if faces.is_empty() {
            return Self::no_face();
        }
        let panic_detected = faces.iter().any(|f| f.classification.is_panic);
        let (suggestion, status) = if panic_detected {
            (Some(suggest()), DetectionStatus::Panic)
        } else {
            (None, DetectionStatus::NoPanic)
        };
        Self {
            panic_detected,
            suggestion,
            status,
            faces,
        }
    }

    pub fn panic_detected(&self) -> bool {
        self.panic_detected
    }

    pub fn suggestion(&self) -> Option<&str> {
        self.suggestion.as_deref()
    }

    pub fn status(&self) -> DetectionStatus {
        self.status
    }

    pub fn faces(&self) -> &[FaceVerdict] {
        &self.faces
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(index: usize, is_panic: bool) -> FaceVerdict {
        FaceVerdict {
            index,
            region: Some(FaceRegion::new(0, 0, 10, 10)),
            classification: Classification {
                is_panic,
                score: if is_panic { 0.9 } else { 0.1 },
                threshold_used: 0.5,
            },
        }
    }

    #[test]
    fn test_panic_score_rejects_out_of_range() {
        assert!(PanicScore::new(-0.01).is_none());
        assert!(PanicScore::new(1.01).is_none());
        assert!(PanicScore::new(f32::NAN).is_none());
        assert_eq!(PanicScore::new(0.0).map(PanicScore::value), Some(0.0));
        assert_eq!(PanicScore::new(1.0).map(PanicScore::value), Some(1.0));
    }

    #[test]
    fn test_region_fits_within() {
        let r = FaceRegion::new(10, 10, 20, 20);
        assert!(r.fits_within(30, 30));
        assert!(!r.fits_within(29, 30));
        assert_eq!(r.area(), 400);
    }

    #[test]
    fn test_any_panic_face_makes_result_panic() {
        let result = DetectionResult::from_verdicts(
            vec![verdict(0, false), verdict(1, true), verdict(2, false)],
            || "stay safe".to_string(),
        );
        assert!(result.panic_detected());
        assert_eq!(result.status(), DetectionStatus::Panic);
        assert_eq!(result.suggestion(), Some("stay safe"));
        assert_eq!(result.faces().len(), 3);
    }

    #[test]
    fn test_no_panic_has_no_suggestion() {
        let result = DetectionResult::from_verdicts(vec![verdict(0, false)], || {
            panic!("suggestion must not be generated without panic")
        });
        assert!(!result.panic_detected());
        assert_eq!(result.status(), DetectionStatus::NoPanic);
        assert!(result.suggestion().is_none());
    }

    #[test]
    fn test_empty_verdicts_is_no_face() {
        let result = DetectionResult::from_verdicts(Vec::new(), String::new);
        assert_eq!(result.status(), DetectionStatus::NoFaceDetected);
        assert!(!result.panic_detected());
    }

    #[test]
    fn test_status_serializes_kebab_case() {
        let json = serde_json::to_value(DetectionResult::no_face()).unwrap();
        assert_eq!(json["status"], "no-face-detected");
        assert_eq!(json["panic_detected"], false);
        assert!(json["suggestion"].is_null());
    }
}
