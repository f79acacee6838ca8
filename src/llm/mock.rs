//! Mock LLM 客户端（用于测试与离线会话，无需 API）
//!
//! 按入队顺序返回预置回复；队列耗尽后返回错误。每次调用收到的消息都会被记录，便于断言 Prompt 内容。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::{LlmClient, Message};

/// Mock 客户端：脚本化 FIFO 回复
#[derive(Debug, Default)]
pub struct MockLlmClient {
    replies: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以一组文本回复构造
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = Self::new();
        for reply in replies {
            client.push_reply(reply);
        }
        client
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(Ok(reply.into()));
        }
    }

    /// 入队一个 JSON 回复
    pub fn push_json(&self, value: Value) {
        self.push_reply(value.to_string());
    }

    /// 入队一次传输失败
    pub fn push_error(&self, error: impl Into<String>) {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(Err(error.into()));
        }
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// 已发生的调用次数
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// 最近一次调用收到的消息
    pub fn last_call(&self) -> Option<Vec<Message>> {
        self.calls.lock().ok().and_then(|c| c.last().cloned())
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        let next = self
            .replies
            .lock()
            .map_err(|e| e.to_string())?
            .pop_front();
        next.unwrap_or_else(|| Err("mock LLM has no scripted reply left".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replies_in_order_then_exhausted() {
        let client = MockLlmClient::with_replies(["first", "second"]);
        client.push_error("boom");
        let msgs = [Message::user("hi")];

        assert_eq!(client.complete(&msgs).await.unwrap(), "first");
        assert_eq!(client.complete(&msgs).await.unwrap(), "second");
        assert_eq!(client.complete(&msgs).await.unwrap_err(), "boom");
        assert!(client.complete(&msgs).await.is_err());
        assert_eq!(client.call_count(), 4);
        assert_eq!(client.last_call().unwrap()[0].content, "hi");
    }
}
