use crate::{
    progress,
    types::{JobId, JobResult, JobUpdate, ProgressEvent, UpdateKind},
};
use std::{fmt, sync::Arc};
use tokio::sync::mpsc;
use tracing::trace;

/// 界面唤醒回调，在有新更新时调用
pub type Waker = Arc<dyn Fn() + Send + Sync>;

/// 从后台任务向界面线程投递更新
///
/// 投递不会阻塞也不会失败，实际的界面修改只发生在界面线程消费更新时。
#[derive(Clone)]
pub struct Reporter {
    tx: mpsc::UnboundedSender<JobUpdate>,
    waker: Option<Waker>,
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("closed", &self.tx.is_closed())
            .field("waker", &self.waker.is_some())
            .finish()
    }
}

impl Reporter {
    /// 创建投递端与界面线程使用的接收端
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<JobUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, waker: None }, rx)
    }

    pub fn with_waker(mut self, waker: Waker) -> Self {
        self.waker = Some(waker);
        self
    }

    pub fn report(&self, job_id: JobId, kind: UpdateKind) {
        if self.tx.send(JobUpdate { job_id, kind }).is_err() {
            trace!(%job_id, "status receiver dropped");
            return;
        }
        if let Some(waker) = &self.waker {
            waker();
        }
    }

    pub fn starting(&self, job_id: JobId) {
        self.report(job_id, UpdateKind::Starting);
    }

    /// 转发引擎进度
    pub fn progress(&self, job_id: JobId, event: &ProgressEvent) {
        match progress::translate(event) {
            Some(kind) => self.report(job_id, kind),
            None => trace!(%job_id, ?event, "engine event dropped"),
        }
    }

    pub fn finished(&self, job_id: JobId, result: JobResult) {
        self.report(job_id, UpdateKind::Finished(result));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EngineStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn report_wakes_ui() {
        let wakes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&wakes);
        let (reporter, mut rx) = Reporter::channel();
        let reporter = reporter.with_waker(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let id = JobId::new();
        reporter.starting(id);
        reporter.progress(
            id,
            &ProgressEvent {
                status: EngineStatus::Downloading,
                percent: "12.5%".to_string(),
                speed: "1MiB/s".to_string(),
                eta: "00:10".to_string(),
            },
        );

        assert_eq!(wakes.load(Ordering::SeqCst), 2);
        assert!(matches!(rx.try_recv().unwrap().kind, UpdateKind::Starting));
        let update = rx.try_recv().unwrap();
        assert_eq!(update.job_id, id);
        assert!(matches!(
            update.kind,
            UpdateKind::Progress { percent: Some(p), .. } if p == 12.5
        ));
    }

    #[test]
    fn report_after_receiver_dropped_is_silent() {
        let (reporter, rx) = Reporter::channel();
        drop(rx);
        reporter.finished(JobId::new(), Err(crate::error::EngineError::Cancelled));
    }
}
