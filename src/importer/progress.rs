// ==========================================
// 保单数据批量导入 - 进度事件投递
// ==========================================
// 职责: 同步/流式两种模式共用的事件出口
// 实现:
// - NoopSink: 同步模式，丢弃事件
// - ChannelSink: 有界 mpsc 通道（背压节流行处理），可转为 Stream
// - SseWriterSink: 直接写出 `data: <json>\n\n` 帧
// 约束: 单生产者/单消费者，只追加
// ==========================================

use crate::domain::import::ImportEvent;
use crate::importer::error::{ImportError, ImportResult};
use async_trait::async_trait;
use futures::stream::{self, Stream};
use std::io::Write;
use tokio::sync::mpsc;

/// 默认通道容量
pub const DEFAULT_EVENT_BUFFER: usize = 64;

#[async_trait]
pub trait ProgressSink: Send {
    /// 投递事件
    ///
    /// # 返回
    /// - Err(SinkClosed): 消费方已断开，调用方应中止本次导入
    async fn emit(&mut self, event: ImportEvent) -> ImportResult<()>;
}

// ==========================================
// NoopSink
// ==========================================
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl ProgressSink for NoopSink {
    async fn emit(&mut self, _event: ImportEvent) -> ImportResult<()> {
        Ok(())
    }
}

// ==========================================
// CollectingSink
// ==========================================
/// 事件全部留在内存中（CLI 输出与测试用）
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    pub events: Vec<ImportEvent>,
}

#[async_trait]
impl ProgressSink for CollectingSink {
    async fn emit(&mut self, event: ImportEvent) -> ImportResult<()> {
        self.events.push(event);
        Ok(())
    }
}

// ==========================================
// ChannelSink
// ==========================================
pub struct ChannelSink {
    tx: mpsc::Sender<ImportEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<ImportEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl ProgressSink for ChannelSink {
    async fn emit(&mut self, event: ImportEvent) -> ImportResult<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| ImportError::SinkClosed("事件接收端已断开".to_string()))
    }
}

/// 创建有界事件通道
///
/// # 返回
/// - (sink, stream): sink 交给导入器，stream 交给消费方
pub fn event_channel(capacity: usize) -> (ChannelSink, impl Stream<Item = ImportEvent> + Send) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChannelSink::new(tx), event_stream(rx))
}

/// mpsc 接收端 → Stream
pub fn event_stream(rx: mpsc::Receiver<ImportEvent>) -> impl Stream<Item = ImportEvent> + Send {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|event| (event, rx)) })
}

// ==========================================
// SseWriterSink
// ==========================================
pub struct SseWriterSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> SseWriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: Write + Send> ProgressSink for SseWriterSink<W> {
    async fn emit(&mut self, event: ImportEvent) -> ImportResult<()> {
        let frame = event
            .to_sse_frame()
            .map_err(|e| ImportError::SinkClosed(format!("事件序列化失败: {}", e)))?;
        self.writer
            .write_all(frame.as_bytes())
            .and_then(|_| self.writer.flush())
            .map_err(|e| ImportError::SinkClosed(e.to_string()))
    }
}
