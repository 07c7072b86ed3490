use crate::{
    bridge::Reporter,
    destination::DestinationTable,
    engine::Engine,
    error::{EngineError, SubmitError},
    format::{EngineOptions, FormatPreferences},
    types::{JobDescriptor, JobId, JobResult, Mode},
};
use std::sync::Arc;
use tokio::{
    runtime::Handle,
    sync::{Semaphore, mpsc},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 任务提交器
///
/// 校验参数、准备目标目录，并为每个任务启动一个后台任务。
/// 所有状态变化都经由 [`Reporter`] 送往界面线程。
pub struct Submitter<E> {
    engine: Arc<E>,
    destinations: DestinationTable,
    preferences: FormatPreferences,
    permits: Arc<Semaphore>,
    reporter: Reporter,
    runtime: Handle,
}

impl<E: Engine + 'static> Submitter<E> {
    /// 创建提交器
    ///
    /// # 参数
    /// * `engine` - 下载引擎
    /// * `destinations` - 保存位置表
    /// * `preferences` - 引擎选项偏好
    /// * `max_concurrent_jobs` - 同时运行的最大任务数
    /// * `reporter` - 界面更新投递端
    /// * `runtime` - 运行后台任务的 tokio 运行时
    pub fn new(
        engine: E,
        destinations: DestinationTable,
        preferences: FormatPreferences,
        max_concurrent_jobs: usize,
        reporter: Reporter,
        runtime: Handle,
    ) -> Self {
        Self {
            engine: Arc::new(engine),
            destinations,
            preferences,
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            reporter,
            runtime,
        }
    }

    pub fn destinations(&self) -> &DestinationTable {
        &self.destinations
    }

    /// 提交下载任务
    ///
    /// # 参数
    /// * `url` - 视频 URL，去除空白后不能为空
    /// * `mode` - 视频或音频
    /// * `quality` - 画质（视频）或码率（音频）提示
    /// * `destination` - 保存位置名称，未知名称使用私有目录
    ///
    /// # 返回
    /// 成功时返回任务句柄，调用不会等待任务执行
    pub fn submit(
        &self,
        url: &str,
        mode: Mode,
        quality: &str,
        destination: &str,
    ) -> Result<JobHandle, SubmitError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(SubmitError::EmptyUrl);
        }

        let destination = self.destinations.prepare(destination)?;
        let quality = quality.trim().to_string();
        let job = JobDescriptor {
            id: JobId::new(),
            url: url.to_string(),
            mode,
            options: EngineOptions::build(mode, &quality, &destination, &self.preferences),
            quality,
            destination,
        };
        info!(job_id = %job.id, url = %job.url, %mode, dest = %job.destination.display(), "job submitted");

        let id = job.id;
        let cancel = CancellationToken::new();
        let task = self.runtime.spawn(run_job(
            Arc::clone(&self.engine),
            job,
            self.reporter.clone(),
            Arc::clone(&self.permits),
            cancel.clone(),
        ));

        Ok(JobHandle { id, cancel, task })
    }
}

/// 已提交任务的句柄
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    cancel: CancellationToken,
    task: JoinHandle<JobResult>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// 请求取消任务，引擎在下一次进度边界处停止
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// 等待任务结束
    pub async fn join(self) -> JobResult {
        self.task
            .await
            .unwrap_or_else(|e| Err(EngineError::Io(format!("worker stopped: {e}"))))
    }
}

/// 后台执行单个任务
///
/// 依次上报：一次开始、若干进度、一次结束；结束总在所有进度之后。
async fn run_job<E: Engine + 'static>(
    engine: Arc<E>,
    job: JobDescriptor,
    reporter: Reporter,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
) -> JobResult {
    let permit = tokio::select! {
        permit = permits.acquire_owned() => permit.ok(),
        _ = cancel.cancelled() => None,
    };
    reporter.starting(job.id);

    let result = match permit {
        Some(_permit) => {
            let (tx, mut rx) = mpsc::channel(1024);

            // 进度转发
            let forwarder = {
                let reporter = reporter.clone();
                let id = job.id;
                tokio::spawn(async move {
                    while let Some(event) = rx.recv().await {
                        reporter.progress(id, &event);
                    }
                })
            };

            // 引擎在独立任务中运行，panic 也会变成一次结束上报
            let download = {
                let job = job.clone();
                tokio::spawn(async move { engine.download(&job, tx, cancel).await })
            };
            let result = download
                .await
                .unwrap_or_else(|e| Err(EngineError::Crashed(e.to_string())));
            if let Err(e) = forwarder.await {
                warn!(job_id = %job.id, "progress forwarder stopped: {e}");
            }
            result.map(|()| job.destination.clone())
        }
        None => Err(EngineError::Cancelled),
    };

    match &result {
        Ok(dir) => info!(job_id = %job.id, dest = %dir.display(), "job completed"),
        Err(e) => warn!(job_id = %job.id, "job failed: {e}"),
    }
    reporter.finished(job.id, result.clone());
    result
}
