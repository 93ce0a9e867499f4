//! 结果账本 - 按帧序号落盘，定期刷新

use super::config::DEFAULT_FLUSH_EVERY;
use super::result::RecognitionResult;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// 输出文件表头
pub const OUTPUT_HEADER: &str = "Frame Index\tTimestamp\tOCR Text";

struct LedgerState {
    writer: Box<dyn Write + Send>,
    pending: BTreeMap<u64, RecognitionResult>,
    /// 已排好序、尚未被 writer 接收的字节
    carry: Vec<u8>,
    /// 下一个应写出的帧序号
    next_index: u64,
    stride: u64,
    recorded: u64,
    written: u64,
}

impl LedgerState {
    fn queue_line(&mut self, result: &RecognitionResult) {
        self.carry.extend_from_slice(result.to_tsv_line().as_bytes());
        self.carry.push(b'\n');
    }

    /// 把紧接已写前缀的连续结果移入 `carry`
    fn queue_contiguous(&mut self) -> usize {
        let mut count = 0;
        while let Some(entry) = self.pending.first_entry() {
            if *entry.key() != self.next_index {
                break;
            }
            let result = entry.remove();
            self.queue_line(&result);
            self.next_index += self.stride;
            count += 1;
        }
        count
    }

    /// 把 carry 交给 writer；只丢弃已被接收的字节，失败后重试从断点继续
    fn drain_carry(&mut self) -> io::Result<()> {
        if self.carry.is_empty() {
            return Ok(());
        }
        while !self.carry.is_empty() {
            match self.writer.write(&self.carry) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "output accepted no bytes",
                    ))
                }
                Ok(n) => {
                    let lines = self.carry[..n].iter().filter(|&&b| b == b'\n').count();
                    self.carry.drain(..n);
                    self.written += lines as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        self.writer.flush()
    }

    fn unwritten_lines(&self) -> usize {
        self.carry.iter().filter(|&&b| b == b'\n').count()
    }

    fn flush_contiguous(&mut self) -> io::Result<usize> {
        let count = self.queue_contiguous();
        self.drain_carry()?;
        Ok(count)
    }

    /// 写出全部剩余结果（按序号，跳过缺口）
    fn flush_all(&mut self) -> io::Result<usize> {
        let mut count = self.queue_contiguous();

        if !self.pending.is_empty() {
            let mut missing = Vec::new();
            let mut expected = self.next_index;
            for &index in self.pending.keys() {
                while expected < index && missing.len() < 10 {
                    missing.push(expected);
                    expected += self.stride;
                }
                expected = index + self.stride;
            }
            warn!(
                "⚠️ Writing {} results past a gap; missing frames include {:?}",
                self.pending.len(),
                missing
            );

            let rest = std::mem::take(&mut self.pending);
            if let Some(&last) = rest.keys().next_back() {
                self.next_index = last + self.stride;
            }
            for result in rest.values() {
                self.queue_line(result);
            }
            count += rest.len();
        }

        self.drain_carry()?;
        Ok(count)
    }
}

/// 关闭账本时的统计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerStats {
    pub recorded: u64,
    pub written: u64,
}

/// 结果账本 - 汇总所有 worker 的结果，严格按帧序号追加到输出
///
/// 记录与刷新共用一把锁。
pub struct ResultLedger {
    state: Mutex<LedgerState>,
    flush_every: usize,
}

impl ResultLedger {
    /// 清空 `path` 并写入表头
    pub fn create(path: impl AsRef<Path>, flush_every: usize) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)?;
        info!("📝 Writing results to {:?}", path);
        // 每次 flush 都是一次批量写入
        Self::new(Box::new(file), flush_every)
    }

    /// 只排序计数、不输出的账本
    pub fn discard() -> Self {
        Self::from_writer(Box::new(io::sink()), DEFAULT_FLUSH_EVERY)
    }

    pub fn new(mut writer: Box<dyn Write + Send>, flush_every: usize) -> io::Result<Self> {
        writeln!(writer, "{}", OUTPUT_HEADER)?;
        writer.flush()?;
        Ok(Self::from_writer(writer, flush_every))
    }

    fn from_writer(writer: Box<dyn Write + Send>, flush_every: usize) -> Self {
        Self {
            state: Mutex::new(LedgerState {
                writer,
                pending: BTreeMap::new(),
                carry: Vec::new(),
                next_index: 0,
                stride: 1,
                recorded: 0,
                written: 0,
            }),
            flush_every: flush_every.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 相邻帧序号的间隔，需在记录前设置
    pub fn set_stride(&self, stride: u64) {
        self.lock().stride = stride.max(1);
    }

    /// 记录一个结果，每 `flush_every` 条刷新一次连续前缀
    ///
    /// 刷新失败时结果保留到下次重试，错误返回给调用方。
    pub fn record(&self, result: RecognitionResult) -> io::Result<()> {
        let mut state = self.lock();
        let index = result.frame_index;

        if index < state.next_index || state.pending.contains_key(&index) {
            warn!("⚠️ Ignoring duplicate result for frame {}", index);
            return Ok(());
        }

        state.pending.insert(index, result);
        state.recorded += 1;

        if state.recorded % self.flush_every as u64 == 0 {
            let written = state.flush_contiguous()?;
            debug!(
                "💾 Periodic flush: {} lines written, {} held",
                written,
                state.pending.len()
            );
        }
        Ok(())
    }

    /// 立即刷新连续前缀
    pub fn flush(&self) -> io::Result<usize> {
        self.lock().flush_contiguous()
    }

    /// 尚未写出的结果数（包括写到一半的行）
    pub fn pending(&self) -> usize {
        let state = self.lock();
        state.pending.len() + state.unwritten_lines()
    }

    pub fn written(&self) -> u64 {
        self.lock().written
    }

    /// 最终刷新全部结果，返回后 writer 被释放
    pub fn finish(self) -> io::Result<LedgerStats> {
        let mut state = self.state.into_inner().unwrap_or_else(PoisonError::into_inner);
        state.flush_all()?;
        Ok(LedgerStats {
            recorded: state.recorded,
            written: state.written,
        })
    }
}
