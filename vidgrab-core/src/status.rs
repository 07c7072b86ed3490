use crate::{
    progress::{self, STARTING_TEXT},
    types::{JobId, JobUpdate, UpdateKind},
};
use std::collections::BTreeMap;
use tokio::sync::mpsc::{self, error::TryRecvError};

pub const IDLE_TEXT: &str = "Ready";

/// 任务在界面上的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Succeeded,
    Failed,
}

/// 任务的最新状态
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatus {
    pub text: String,
    /// 0 到 100
    pub percent: f32,
    pub state: JobState,
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        self.state != JobState::Running
    }
}

/// 界面线程持有的任务状态表
///
/// 每个任务独立记录，并发任务不会互相覆盖。
#[derive(Debug, Default)]
pub struct StatusBoard {
    jobs: BTreeMap<JobId, JobStatus>,
    latest: Option<JobId>,
    notice: Option<String>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// 应用一条更新
    pub fn apply(&mut self, update: JobUpdate) {
        let JobUpdate { job_id, kind } = update;
        self.latest = Some(job_id);
        self.notice = None;

        let status = self.jobs.entry(job_id).or_insert_with(|| JobStatus {
            text: STARTING_TEXT.to_string(),
            percent: 0.0,
            state: JobState::Running,
        });

        match kind {
            UpdateKind::Starting => {
                status.text = STARTING_TEXT.to_string();
                status.state = JobState::Running;
            }
            UpdateKind::Progress { percent, text, .. } => {
                status.text = text;
                if let Some(percent) = percent {
                    status.percent = percent;
                }
            }
            UpdateKind::Finished(result) => {
                status.text = progress::terminal_text(&result);
                match result {
                    Ok(_) => {
                        status.percent = 100.0;
                        status.state = JobState::Succeeded;
                    }
                    Err(_) => status.state = JobState::Failed,
                }
            }
        }
    }

    /// 非阻塞地应用所有待处理更新，返回应用数量
    pub fn drain(&mut self, rx: &mut mpsc::UnboundedReceiver<JobUpdate>) -> usize {
        let mut applied = 0;
        loop {
            match rx.try_recv() {
                Ok(update) => {
                    self.apply(update);
                    applied += 1;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        applied
    }

    /// 未启动任务的提示（如 URL 为空），直到下一条任务更新为止
    pub fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
    }

    /// 状态栏内容：最近一次事件的文本与进度
    pub fn headline(&self) -> (&str, f32) {
        if let Some(notice) = &self.notice {
            let percent = self.latest_status().map_or(0.0, |(_, s)| s.percent);
            return (notice.as_str(), percent);
        }
        match self.latest_status() {
            Some((_, status)) => (status.text.as_str(), status.percent),
            None => (IDLE_TEXT, 0.0),
        }
    }

    pub fn latest_status(&self) -> Option<(JobId, &JobStatus)> {
        let id = self.latest?;
        self.jobs.get(&id).map(|status| (id, status))
    }

    pub fn get(&self, job_id: JobId) -> Option<&JobStatus> {
        self.jobs.get(&job_id)
    }

    /// 按创建顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = (JobId, &JobStatus)> {
        self.jobs.iter().map(|(id, status)| (*id, status))
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// 清除已结束的任务
    pub fn clear_finished(&mut self) {
        self.jobs.retain(|_, status| !status.is_finished());
        if self.latest.is_some_and(|id| !self.jobs.contains_key(&id)) {
            self.latest = None;
        }
    }
}
