//! 帧来源接口
//! Narrow producer interface between frame acquisition and the counting core

use crate::detection::FrameBatch;
use crate::error::Result;

/// 检测结果来源 (外部检测/跟踪器)
pub trait FrameSource {
    /// 下一帧; `Ok(None)` 表示流结束, `Err` 表示来源不可用
    fn next_frame(&mut self) -> Result<Option<FrameBatch>>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<FrameBatch>> {
        (**self).next_frame()
    }
}

/// 由迭代器提供帧 (测试/回放)
pub struct IterSource<I> {
    frames: I,
}

impl<I> IterSource<I>
where
    I: Iterator<Item = Result<FrameBatch>>,
{
    pub fn new(frames: I) -> Self {
        Self { frames }
    }
}

impl IterSource<std::vec::IntoIter<Result<FrameBatch>>> {
    pub fn from_frames(frames: Vec<FrameBatch>) -> Self {
        let frames: Vec<Result<FrameBatch>> = frames.into_iter().map(Ok).collect();
        Self::new(frames.into_iter())
    }
}

impl<I> FrameSource for IterSource<I>
where
    I: Iterator<Item = Result<FrameBatch>>,
{
    fn next_frame(&mut self) -> Result<Option<FrameBatch>> {
        self.frames.next().transpose()
    }
}
