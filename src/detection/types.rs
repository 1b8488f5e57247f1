// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 检测输入数据结构定义
/// Data structures for the detector/tracker output consumed by the counter
use crate::error::{CounterError, Result};
use serde::{Deserialize, Serialize};

// ========== 公共常量 ==========

/// 默认计数的类别 (COCO: car, motorcycle, bus, truck)
pub const VEHICLE_CLASSES: [u32; 4] = [2, 3, 5, 7];

/// 跟踪ID (由外部跟踪器分配, 可能被复用)
pub type TrackId = i64;

// ========== 数据结构 ==========

/// 检测框 (整数像素坐标, x1/y1 左上, x2/y2 右下)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// 垂直中心 (向下取整)
    pub fn center_y(&self) -> i32 {
        (i64::from(self.y1) + i64::from(self.y2)).div_euclid(2) as i32
    }

    /// 获取中心点
    pub fn center(&self) -> (i32, i32) {
        let cx = (i64::from(self.x1) + i64::from(self.x2)).div_euclid(2) as i32;
        (cx, self.center_y())
    }
}

/// 跟踪器原始输出 (未校验)
///
/// 字段全部可选: 缺字段的检测在该帧内被跳过, 不影响其他检测
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    /// 整数ID; 保留原始数字以便精确校验 (大整数不经过 f64)
    #[serde(default)]
    pub track_id: Option<serde_json::Number>,
    #[serde(default)]
    pub bbox: Option<Vec<f64>>,
    #[serde(default)]
    pub class_id: Option<u32>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

impl RawDetection {
    pub fn new(track_id: TrackId, bbox: [f64; 4]) -> Self {
        Self {
            track_id: Some(serde_json::Number::from(track_id)),
            bbox: Some(bbox.to_vec()),
            ..Default::default()
        }
    }

    pub fn with_class(mut self, class_id: u32, confidence: f32) -> Self {
        self.class_id = Some(class_id);
        self.confidence = Some(confidence);
        self
    }

    /// 校验并转换为整数坐标的检测
    pub fn validate(&self) -> Result<Detection> {
        let track_id = match &self.track_id {
            Some(id) => parse_track_id(id)?,
            None => {
                return Err(CounterError::MalformedDetection(
                    "missing track_id".to_string(),
                ))
            }
        };

        let coords = self.bbox.as_deref().ok_or_else(|| {
            CounterError::MalformedDetection(format!("track {}: missing bbox", track_id))
        })?;
        let [x1, y1, x2, y2] = match coords {
            [x1, y1, x2, y2] => [*x1, *y1, *x2, *y2],
            other => {
                return Err(CounterError::MalformedDetection(format!(
                    "track {}: bbox has {} coordinates, expected 4",
                    track_id,
                    other.len()
                )))
            }
        };
        if ![x1, y1, x2, y2].iter().all(|c| c.is_finite()) {
            return Err(CounterError::MalformedDetection(format!(
                "track {}: non-finite bbox {:?}",
                track_id, coords
            )));
        }

        Ok(Detection {
            track_id,
            bbox: BBox::new(x1 as i32, y1 as i32, x2 as i32, y2 as i32),
            class_id: self.class_id,
            confidence: self.confidence,
        })
    }
}

/// 跟踪ID必须是整数: 接受 `7` 和 `7.0`, 拒绝 `7.9` 和超出 i64 范围的值
fn parse_track_id(id: &serde_json::Number) -> Result<TrackId> {
    if let Some(v) = id.as_i64() {
        return Ok(v);
    }
    // u64 超出 i64 范围时 as_f64 仍有值, 需先排除
    if id.is_u64() {
        return Err(CounterError::MalformedDetection(format!(
            "track_id {} out of range",
            id
        )));
    }
    match id.as_f64() {
        Some(v) if v.fract() == 0.0 && v >= -(2f64.powi(53)) && v <= 2f64.powi(53) => {
            Ok(v as TrackId)
        }
        _ => Err(CounterError::MalformedDetection(format!(
            "track_id {} is not an integer",
            id
        ))),
    }
}

/// 校验后的检测
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub track_id: TrackId,
    pub bbox: BBox,
    pub class_id: Option<u32>,
    pub confidence: Option<f32>,
}

/// 一帧的检测结果 (检测/跟踪 → 计数)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameBatch {
    /// 帧高度 (像素), 缺省时使用配置中的 frame_height
    pub frame_height: Option<u32>,
    pub detections: Vec<RawDetection>,
    /// 解码阶段已丢弃的检测数
    pub malformed: usize,
}

impl FrameBatch {
    pub fn new(frame_height: u32, detections: Vec<RawDetection>) -> Self {
        Self {
            frame_height: Some(frame_height),
            detections,
            malformed: 0,
        }
    }
}

/// 类别/置信度过滤
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionFilter {
    /// 允许的类别, 为空表示全部
    pub classes: Vec<u32>,
    pub min_confidence: f32,
}

impl Default for DetectionFilter {
    fn default() -> Self {
        Self {
            classes: VEHICLE_CLASSES.to_vec(),
            min_confidence: 0.5,
        }
    }
}

impl DetectionFilter {
    /// 不过滤任何检测
    pub fn accept_all() -> Self {
        Self {
            classes: Vec::new(),
            min_confidence: 0.0,
        }
    }

    pub fn accepts(&self, detection: &Detection) -> bool {
        if let Some(class_id) = detection.class_id {
            if !self.classes.is_empty() && !self.classes.contains(&class_id) {
                return false;
            }
        }
        match detection.confidence {
            Some(conf) => conf >= self.min_confidence,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_y_floors() {
        assert_eq!(BBox::new(0, 80, 10, 121).center_y(), 100);
        assert_eq!(BBox::new(0, -3, 10, 0).center_y(), -2);
        assert_eq!(BBox::new(4, 0, 9, 0).center(), (6, 0));
    }

    #[test]
    fn test_validate_truncates_coordinates() {
        let det = RawDetection::new(7, [10.9, 20.7, 30.2, 41.9]).validate().unwrap();
        assert_eq!(det.track_id, 7);
        assert_eq!(det.bbox, BBox::new(10, 20, 30, 41));
        assert_eq!(det.bbox.center_y(), 30);
    }

    #[test]
    fn test_validate_rejects_malformed() {
        let missing_bbox = RawDetection {
            track_id: Some(serde_json::Number::from(1i64)),
            ..Default::default()
        };
        assert!(matches!(
            missing_bbox.validate(),
            Err(CounterError::MalformedDetection(_))
        ));

        let missing_id = RawDetection {
            bbox: Some(vec![0.0, 0.0, 1.0, 1.0]),
            ..Default::default()
        };
        assert!(missing_id.validate().is_err());

        let nan = RawDetection::new(3, [0.0, f64::NAN, 1.0, 1.0]);
        assert!(nan.validate().is_err());

        let inf = RawDetection::new(3, [0.0, 0.0, f64::INFINITY, 1.0]);
        assert!(inf.validate().is_err());

        let short = RawDetection {
            track_id: Some(serde_json::Number::from(2i64)),
            bbox: Some(vec![0.0, 1.0, 2.0]),
            ..Default::default()
        };
        assert!(short.validate().is_err());
    }

    fn from_json(text: &str) -> RawDetection {
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn test_large_track_ids_stay_distinct() {
        let a = from_json(r#"{"track_id": 9007199254740993, "bbox": [0, 0, 1, 1]}"#)
            .validate()
            .unwrap();
        let b = from_json(r#"{"track_id": 9007199254740992, "bbox": [0, 0, 1, 1]}"#)
            .validate()
            .unwrap();
        assert_eq!(a.track_id, 9_007_199_254_740_993);
        assert_eq!(b.track_id, 9_007_199_254_740_992);
        assert_ne!(a.track_id, b.track_id);

        let negative = from_json(r#"{"track_id": -4, "bbox": [0, 0, 1, 1]}"#);
        assert_eq!(negative.validate().unwrap().track_id, -4);
    }

    #[test]
    fn test_non_integer_track_id_is_rejected() {
        let fractional = from_json(r#"{"track_id": 7.9, "bbox": [0, 0, 1, 1]}"#);
        assert!(matches!(
            fractional.validate(),
            Err(CounterError::MalformedDetection(_))
        ));

        let too_big = from_json(r#"{"track_id": 18446744073709551615, "bbox": [0, 0, 1, 1]}"#);
        assert!(too_big.validate().is_err());

        let huge_float = from_json(r#"{"track_id": 1e300, "bbox": [0, 0, 1, 1]}"#);
        assert!(huge_float.validate().is_err());

        // 整数值的浮点数仍然接受
        let whole = from_json(r#"{"track_id": 7.0, "bbox": [0, 0, 1, 1]}"#);
        assert_eq!(whole.validate().unwrap().track_id, 7);
    }

    #[test]
    fn test_filter() {
        let filter = DetectionFilter::default();
        let car = RawDetection::new(1, [0.0, 0.0, 1.0, 1.0])
            .with_class(2, 0.9)
            .validate()
            .unwrap();
        let person = RawDetection::new(2, [0.0, 0.0, 1.0, 1.0])
            .with_class(0, 0.9)
            .validate()
            .unwrap();
        let weak_truck = RawDetection::new(3, [0.0, 0.0, 1.0, 1.0])
            .with_class(7, 0.3)
            .validate()
            .unwrap();
        let unlabeled = RawDetection::new(4, [0.0, 0.0, 1.0, 1.0]).validate().unwrap();

        assert!(filter.accepts(&car));
        assert!(!filter.accepts(&person));
        assert!(!filter.accepts(&weak_truck));
        assert!(filter.accepts(&unlabeled));
        assert!(DetectionFilter::accept_all().accepts(&person));
    }
}
