//! 会话存储
//!
//! 进程内存中的 会话ID → 会话 映射。每个会话只有一个写入方（运行该批次的任务），
//! 读取方（状态轮询）拿到的是快照，最多落后一次修改。
//! 后台清理任务按固定间隔删除创建时间超过 TTL 的会话。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::models::PageEntry;
use crate::session::model::{Session, SessionStatus};

struct Entry {
    session: Arc<RwLock<Session>>,
    cancel: CancellationToken,
}

/// 会话的写入句柄，由运行批次的任务独占
#[derive(Clone)]
pub struct SessionHandle {
    id: String,
    session: Arc<RwLock<Session>>,
    cancel: CancellationToken,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 批次取消信号
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn begin_page(&self, index: usize, url: &str) {
        self.session.write().begin_page(index, url);
    }

    pub fn push(&self, entry: PageEntry) {
        self.session.write().push(entry);
    }

    pub fn complete(&self) {
        self.session.write().complete();
    }

    pub fn fail(&self, message: impl Into<String>) {
        self.session.write().fail(message);
    }

    pub fn mark_cancelled(&self) {
        self.session.write().mark_cancelled();
    }

    pub fn snapshot(&self) -> Session {
        self.session.read().clone()
    }
}

/// 会话存储
pub struct SessionStore {
    ttl: TimeDelta,
    sessions: RwLock<HashMap<String, Entry>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// 创建会话（状态 running，进度 0，结果为空）
    pub fn create(&self, id: &str, total: usize) -> SessionHandle {
        self.create_at(id, total, Utc::now())
    }

    /// 指定创建时间创建会话
    pub fn create_at(&self, id: &str, total: usize, created_at: DateTime<Utc>) -> SessionHandle {
        let session = Arc::new(RwLock::new(Session::new(id, total, created_at)));
        let cancel = CancellationToken::new();
        self.sessions.write().insert(
            id.to_string(),
            Entry {
                session: session.clone(),
                cancel: cancel.clone(),
            },
        );
        debug!("[会话 {}] 已创建，共 {} 个页面", id, total);
        SessionHandle {
            id: id.to_string(),
            session,
            cancel,
        }
    }

    /// 读取会话快照
    pub fn get(&self, id: &str) -> Option<Session> {
        let sessions = self.sessions.read();
        sessions.get(id).map(|e| e.session.read().clone())
    }

    /// 请求取消批次，会话不存在时返回 false
    pub fn cancel(&self, id: &str) -> bool {
        let sessions = self.sessions.read();
        match sessions.get(id) {
            Some(entry) => {
                if entry.session.read().status == SessionStatus::Running {
                    entry.cancel.cancel();
                }
                true
            }
            None => false,
        }
    }

    /// 取消所有仍在运行的批次（进程退出时调用）
    pub fn cancel_all(&self) {
        for entry in self.sessions.read().values() {
            entry.cancel.cancel();
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 删除 `now - createdAt > TTL` 的会话，返回删除数量
    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|id, entry| {
            let expired = now - entry.session.read().created_at > self.ttl;
            if expired {
                // 过期时仍在运行的批次一并停止
                entry.cancel.cancel();
                debug!("[会话 {}] 已过期，删除", id);
            }
            !expired
        });
        before - sessions.len()
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    /// 启动后台清理任务，`shutdown` 触发后退出
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // 第一次 tick 立即返回
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("会话清理任务退出");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = store.sweep();
                        if removed > 0 {
                            info!("🧹 清理过期会话 {} 个，剩余 {} 个", removed, store.len());
                        }
                    }
                }
            }
        })
    }
}
