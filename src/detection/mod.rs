/// 检测输入 (Detection Input)
///
/// 外部检测/跟踪模型每帧输出 (track_id, bbox),
/// 计数核心只消费这些结果:
/// - RawDetection: 未校验的原始检测
/// - Detection:    校验后的整数坐标检测
/// - FrameBatch:   一帧的全部检测
pub mod types;

pub use types::{
    BBox, Detection, DetectionFilter, FrameBatch, RawDetection, TrackId, VEHICLE_CLASSES,
};
