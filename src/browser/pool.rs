//! 浏览器实例池
//!
//! 限制同时存活的浏览器进程数量。达到上限后不阻塞调用方，
//! 而是返回一个懒加载、长期存活的共享实例：可用性优先于公平性，
//! 拿到共享实例的调用方不能假定独占。
//!
//! 共享实例崩溃后，下一次租用会丢弃它并重新启动。

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::AppResult;
use crate::infrastructure::{Renderer, RendererLauncher};

/// 从池中租出的浏览器实例
pub struct RendererLease {
    renderer: Arc<dyn Renderer>,
    shared: bool,
}

impl RendererLease {
    pub fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.renderer
    }

    /// 是否为超出上限时返回的共享实例
    pub fn is_shared(&self) -> bool {
        self.shared
    }
}

#[derive(Default)]
struct PoolState {
    /// 独占实例的存活数量（不含共享实例）
    live: usize,
    shared: Option<Arc<dyn Renderer>>,
}

/// 浏览器实例池
pub struct RendererPool {
    launcher: Arc<dyn RendererLauncher>,
    cap: usize,
    state: Mutex<PoolState>,
}

impl RendererPool {
    pub fn new(launcher: Arc<dyn RendererLauncher>, cap: usize) -> Self {
        Self {
            launcher,
            cap: cap.max(1),
            state: Mutex::new(PoolState::default()),
        }
    }

    /// 当前存活的独占实例数量
    pub async fn live_count(&self) -> usize {
        self.state.lock().await.live
    }

    /// 租用一个浏览器实例
    ///
    /// 未达上限时启动新实例并独占返回；达到上限时返回共享实例。
    /// 启动失败返回 `BrowserError::StartupFailed`。
    pub async fn acquire(&self) -> AppResult<RendererLease> {
        {
            let mut state = self.state.lock().await;
            if state.live >= self.cap {
                if state.shared.as_ref().is_some_and(|s| !s.is_alive()) {
                    if let Some(dead) = state.shared.take() {
                        warn!("⚠️ 共享浏览器 #{} 已退出，重新启动", dead.id());
                        if let Err(e) = dead.shutdown().await {
                            debug!("清理已退出的共享浏览器失败: {}", e);
                        }
                    }
                }
                let renderer = match &state.shared {
                    Some(shared) => shared.clone(),
                    None => {
                        info!("📎 浏览器实例已达上限 {}，启动共享实例", self.cap);
                        let shared = self.launcher.launch().await?;
                        state.shared = Some(shared.clone());
                        shared
                    }
                };
                debug!("复用共享浏览器 #{}", renderer.id());
                return Ok(RendererLease {
                    renderer,
                    shared: true,
                });
            }
            // 先占位，启动过程不持有锁
            state.live += 1;
        }

        match self.launcher.launch().await {
            Ok(renderer) => {
                debug!("租出独占浏览器 #{}", renderer.id());
                Ok(RendererLease {
                    renderer,
                    shared: false,
                })
            }
            Err(e) => {
                self.state.lock().await.live -= 1;
                Err(e)
            }
        }
    }

    /// 归还浏览器实例
    ///
    /// `close` 为 true 且不是共享实例时关闭进程并释放名额；
    /// 否则保持打开。共享实例永远不会被 release 关闭。
    pub async fn release(&self, lease: RendererLease, close: bool) {
        if lease.shared || !close {
            return;
        }

        if let Err(e) = lease.renderer.shutdown().await {
            warn!("关闭浏览器 #{} 失败: {}", lease.renderer.id(), e);
        }

        let mut state = self.state.lock().await;
        state.live = state.live.saturating_sub(1);
        debug!("浏览器名额释放，当前存活 {}/{}", state.live, self.cap);
    }

    /// 租用实例并包装为 [`LeaseGuard`]
    pub async fn acquire_guarded(self: &Arc<Self>) -> AppResult<LeaseGuard> {
        let lease = self.acquire().await?;
        Ok(LeaseGuard {
            pool: Arc::clone(self),
            renderer: lease.renderer.clone(),
            shared: lease.shared,
            lease: Some(lease),
        })
    }

    /// 关闭共享实例（进程退出时调用）
    pub async fn shutdown(&self) {
        let shared = self.state.lock().await.shared.take();
        if let Some(shared) = shared {
            if let Err(e) = shared.shutdown().await {
                warn!("关闭共享浏览器失败: {}", e);
            }
        }
    }
}

/// 租约守卫
///
/// 正常路径调用 [`LeaseGuard::release`]；若守卫在归还前被丢弃（任务 panic 或被取消），
/// 在后台归还并关闭独占实例。
pub struct LeaseGuard {
    pool: Arc<RendererPool>,
    renderer: Arc<dyn Renderer>,
    shared: bool,
    lease: Option<RendererLease>,
}

impl LeaseGuard {
    pub fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.renderer
    }

    pub fn is_shared(&self) -> bool {
        self.shared
    }

    pub async fn release(mut self, close: bool) {
        if let Some(lease) = self.lease.take() {
            self.pool.release(lease, close).await;
        }
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        let Some(lease) = self.lease.take() else {
            return;
        };
        let id = lease.renderer.id();
        match Handle::try_current() {
            Ok(handle) => {
                warn!("浏览器 #{} 未正常归还，后台回收", id);
                let pool = self.pool.clone();
                handle.spawn(async move {
                    pool.release(lease, true).await;
                });
            }
            Err(_) => warn!("浏览器 #{} 未归还且运行时已停止", id),
        }
    }
}
