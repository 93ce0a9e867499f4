use crate::core::video::Frame;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// 非阻塞取帧的结果
#[derive(Debug)]
pub enum Take {
    Frame(Frame),
    /// 暂时为空，之后可能还有
    Empty,
    /// 抽帧结束且已全部取走
    Closed,
}

#[derive(Default)]
struct BufferState {
    queue: VecDeque<Frame>,
    closed: bool,
}

/// 帧缓冲区 - 抽帧与 OCR worker 之间的无界队列
///
/// 每帧只会交给一个取用者；取出顺序不保证，由账本恢复帧序。
#[derive(Default)]
pub struct FrameBuffer {
    state: Mutex<BufferState>,
    ready: Condvar,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn put(&self, frame: Frame) {
        self.lock().queue.push_back(frame);
        self.ready.notify_one();
    }

    pub fn try_take(&self) -> Take {
        let mut state = self.lock();
        match state.queue.pop_front() {
            Some(frame) => Take::Frame(frame),
            None if state.closed => Take::Closed,
            None => Take::Empty,
        }
    }

    /// 阻塞直到有帧；缓冲区关闭且为空时返回 `None`
    pub fn take(&self) -> Option<Frame> {
        let mut state = self.lock();
        loop {
            if let Some(frame) = state.queue.pop_front() {
                return Some(frame);
            }
            if state.closed {
                return None;
            }
            state = self
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// 不再放入新帧，唤醒所有等待者
    pub fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }

    /// 丢弃剩余帧，返回丢弃数量
    pub fn clear(&self) -> usize {
        let mut state = self.lock();
        let discarded = state.queue.len();
        state.queue.clear();
        discarded
    }

    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

/// 离开作用域时关闭缓冲区（包括 panic 展开），保证 worker 能退出
pub struct CloseOnDrop<'a>(pub &'a FrameBuffer);

impl Drop for CloseOnDrop<'_> {
    fn drop(&mut self) {
        self.0.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    fn frame(index: u64) -> Frame {
        Frame::new(index, RgbImage::new(2, 2), 25.0)
    }

    #[test]
    fn test_try_take_sentinels() {
        let buffer = FrameBuffer::new();
        assert!(matches!(buffer.try_take(), Take::Empty));

        buffer.put(frame(0));
        assert_eq!(buffer.len(), 1);
        assert!(matches!(buffer.try_take(), Take::Frame(f) if f.index == 0));

        buffer.close();
        assert!(buffer.is_closed());
        assert!(matches!(buffer.try_take(), Take::Closed));
    }

    #[test]
    fn test_closed_buffer_still_drains() {
        let buffer = FrameBuffer::new();
        buffer.put(frame(1));
        buffer.put(frame(2));
        buffer.close();

        assert_eq!(buffer.take().map(|f| f.index), Some(1));
        assert_eq!(buffer.take().map(|f| f.index), Some(2));
        assert!(buffer.take().is_none());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_clear() {
        let buffer = FrameBuffer::new();
        for i in 0..5 {
            buffer.put(frame(i));
        }
        assert_eq!(buffer.clear(), 5);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_close_on_drop_releases_waiters() {
        let buffer = Arc::new(FrameBuffer::new());
        let waiter = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || buffer.take().is_none())
        };
        {
            let _guard = CloseOnDrop(&buffer);
        }
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_concurrent_takers_never_share_a_frame() {
        let buffer = Arc::new(FrameBuffer::new());
        let takers: Vec<_> = (0..4)
            .map(|_| {
                let buffer = Arc::clone(&buffer);
                thread::spawn(move || {
                    let mut taken = Vec::new();
                    while let Some(frame) = buffer.take() {
                        taken.push(frame.index);
                    }
                    taken
                })
            })
            .collect();

        for i in 0..500 {
            buffer.put(frame(i));
        }
        buffer.close();

        let mut seen = HashSet::new();
        let mut total = 0;
        for taker in takers {
            for index in taker.join().unwrap() {
                assert!(seen.insert(index), "frame {} taken twice", index);
                total += 1;
            }
        }
        assert_eq!(total, 500);
    }
}
