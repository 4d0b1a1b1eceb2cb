//! 실행 런타임: 테스트 코드의 로그/체크/첨부 호출을 이벤트로 변환
//!
//! [`Runtime`]은 한 번의 실행 동안 공유되는 핸들입니다.
//! 현재 위치와 현재 스텝은 스레드 ID를 키로 하는 맵에 저장되며,
//! 러너가 본문 호출 전에 [`Runtime::set_location`]으로 명시적으로 설정합니다.
//! 실패 위치 집합과 첨부 파일 번호는 여러 스레드가 공유하므로 락으로 보호합니다.
//!
//! # 스레드 전파
//! ```text
//! main: set_location(test) ─ spawn(f) ─► worker: set_location(test) → f() → leave_thread()
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle, ThreadId};

use tracing::{debug, warn};

use crate::bus::EventBus;
use crate::error::{ProgrammingError, ZestError};
use crate::event::{Event, EventKind};
use crate::matching::Matcher;
use crate::metrics as m;
use crate::types::{Location, LogLevel};

/// 리포트 디렉토리 아래 첨부 파일 디렉토리 이름
pub const ATTACHMENT_DIR: &str = "attachments";

#[derive(Debug, Clone, Default)]
struct ThreadContext {
    location: Option<Location>,
    step: Option<String>,
}

#[derive(Debug, Default)]
struct AttachmentState {
    count: u32,
    dir_created: bool,
}

/// 실행 런타임
pub struct Runtime {
    bus: Arc<EventBus>,
    report_dir: PathBuf,
    attachments: Mutex<AttachmentState>,
    failures: Mutex<HashSet<Location>>,
    contexts: RwLock<HashMap<ThreadId, ThreadContext>>,
}

impl Runtime {
    /// 이벤트 버스와 리포트 디렉토리로 런타임을 생성합니다.
    pub fn new(bus: Arc<EventBus>, report_dir: impl Into<PathBuf>) -> Self {
        Self {
            bus,
            report_dir: report_dir.into(),
            attachments: Mutex::new(AttachmentState::default()),
            failures: Mutex::new(HashSet::new()),
            contexts: RwLock::new(HashMap::new()),
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn report_dir(&self) -> &Path {
        &self.report_dir
    }

    /// 이벤트를 생성해 버스로 발행합니다.
    pub fn emit(&self, kind: EventKind) -> Result<(), ZestError> {
        self.bus.fire(&Event::new(kind))?;
        Ok(())
    }

    // ─── 위치 / 스텝 ─────────────────────────────────────────────────

    /// 호출한 스레드의 현재 위치를 바꾸고 현재 스텝을 초기화합니다.
    pub fn set_location(&self, location: Location) {
        let mut contexts = self.contexts.write().unwrap_or_else(PoisonError::into_inner);
        contexts.insert(
            thread::current().id(),
            ThreadContext {
                location: Some(location),
                step: None,
            },
        );
    }

    /// 호출한 스레드의 현재 위치를 반환합니다.
    pub fn location(&self) -> Option<Location> {
        self.context().and_then(|ctx| ctx.location)
    }

    /// 호출한 스레드의 현재 스텝 이름을 반환합니다.
    pub fn current_step(&self) -> Option<String> {
        self.context().and_then(|ctx| ctx.step)
    }

    /// 호출한 스레드의 컨텍스트를 제거합니다.
    pub fn leave_thread(&self) {
        let mut contexts = self.contexts.write().unwrap_or_else(PoisonError::into_inner);
        contexts.remove(&thread::current().id());
    }

    fn context(&self) -> Option<ThreadContext> {
        self.contexts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&thread::current().id())
            .cloned()
    }

    fn current(&self) -> Result<(Location, Option<String>), ProgrammingError> {
        let ctx = self.context().ok_or(ProgrammingError::NoLocation)?;
        let location = ctx.location.ok_or(ProgrammingError::NoLocation)?;
        Ok((location, ctx.step))
    }

    fn set_thread_step(&self, step: Option<String>) {
        let mut contexts = self.contexts.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(ctx) = contexts.get_mut(&thread::current().id()) {
            ctx.step = step;
        }
    }

    /// 새 스텝을 엽니다.
    ///
    /// 분리되지 않은 스텝이면 리포트 라이터가 같은 위치의 열린 일반 스텝을 닫습니다.
    /// 분리된 스텝(`detached`)은 [`Runtime::end_step`]으로만 닫힙니다.
    pub fn set_step(&self, description: &str, detached: bool) -> Result<(), ZestError> {
        let (location, _) = self.current()?;
        self.emit(EventKind::Step {
            location,
            description: description.to_owned(),
            detached,
        })?;
        self.set_thread_step(Some(description.to_owned()));
        Ok(())
    }

    /// 이름으로 스텝을 닫습니다.
    pub fn end_step(&self, step: &str) -> Result<(), ZestError> {
        let (location, current) = self.current()?;
        self.emit(EventKind::StepEnd {
            location,
            step: step.to_owned(),
        })?;
        if current.as_deref() == Some(step) {
            self.set_thread_step(None);
        }
        Ok(())
    }

    /// 분리된 스텝 안에서 본문을 실행합니다.
    ///
    /// 본문이 에러를 반환하거나 패닉하면 에러 로그로 기록하고 위치를 실패로 표시합니다.
    /// 어느 경우든 스텝은 닫힙니다.
    pub fn detached_step<F>(&self, description: &str, body: F) -> Result<(), ZestError>
    where
        F: FnOnce() -> Result<(), ZestError>,
    {
        self.set_step(description, true)?;
        let failure = match catch_unwind(AssertUnwindSafe(body)) {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(payload) => Some(panic_message(payload.as_ref())),
        };
        if let Some(reason) = failure {
            self.log_in_step(
                description,
                LogLevel::Error,
                &format!("Caught unexpected exception while running test: {reason}"),
            )?;
        }
        self.end_step(description)
    }

    // ─── 로그 ────────────────────────────────────────────────────────

    /// 현재 스텝에 로그를 남깁니다. 에러 레벨이면 위치를 실패로 표시합니다.
    pub fn log(&self, level: LogLevel, message: &str) -> Result<(), ZestError> {
        let (location, step) = self.current()?;
        self.log_at(location, step, level, message)
    }

    /// 이름이 지정된 스텝에 로그를 남깁니다.
    pub fn log_in_step(&self, step: &str, level: LogLevel, message: &str) -> Result<(), ZestError> {
        let (location, _) = self.current()?;
        self.log_at(location, Some(step.to_owned()), level, message)
    }

    fn log_at(
        &self,
        location: Location,
        step: Option<String>,
        level: LogLevel,
        message: &str,
    ) -> Result<(), ZestError> {
        metrics::counter!(m::LOGS_TOTAL, m::LABEL_LEVEL => level.to_string()).increment(1);
        if level == LogLevel::Error {
            self.mark_location_as_failed(location.clone());
        }
        self.emit(EventKind::Log {
            location,
            step,
            level,
            message: message.to_owned(),
        })
    }

    pub fn log_debug(&self, message: &str) -> Result<(), ZestError> {
        self.log(LogLevel::Debug, message)
    }

    pub fn log_info(&self, message: &str) -> Result<(), ZestError> {
        self.log(LogLevel::Info, message)
    }

    pub fn log_warn(&self, message: &str) -> Result<(), ZestError> {
        self.log(LogLevel::Warn, message)
    }

    pub fn log_error(&self, message: &str) -> Result<(), ZestError> {
        self.log(LogLevel::Error, message)
    }

    /// URL 항목을 남깁니다.
    pub fn log_url(&self, url: &str, description: Option<&str>) -> Result<(), ZestError> {
        let (location, step) = self.current()?;
        self.emit(EventKind::Url {
            location,
            step,
            url: url.to_owned(),
            description: description.unwrap_or(url).to_owned(),
        })
    }

    /// 리포트 루트에 이름/값 정보를 추가합니다.
    pub fn add_report_info(&self, name: &str, value: &str) -> Result<(), ZestError> {
        self.emit(EventKind::ReportInfo {
            name: name.to_owned(),
            value: value.to_owned(),
        })
    }

    // ─── 체크 ────────────────────────────────────────────────────────

    /// 체크 결과를 남깁니다.
    ///
    /// `Some(false)`이면 위치를 실패로 표시하고, `None`은 정보성 체크로 취급합니다.
    pub fn log_check(
        &self,
        description: &str,
        outcome: Option<bool>,
        details: Option<&str>,
    ) -> Result<(), ZestError> {
        let (location, step) = self.current()?;
        let label = match outcome {
            Some(true) => "passed",
            Some(false) => "failed",
            None => "info",
        };
        metrics::counter!(m::CHECKS_TOTAL, m::LABEL_OUTCOME => label).increment(1);
        if outcome == Some(false) {
            self.mark_location_as_failed(location.clone());
        }
        self.emit(EventKind::Check {
            location,
            step,
            description: description.to_owned(),
            outcome,
            details: details.map(str::to_owned),
        })
    }

    /// `actual`을 매처로 검사하고 결과를 체크로 남깁니다.
    pub fn check_that<T, M>(&self, hint: &str, actual: &T, matcher: M) -> Result<bool, ZestError>
    where
        T: Debug + ?Sized,
        M: Matcher<T>,
    {
        let description = format!("Expect {hint} {}", matcher.description());
        let result = matcher.matches(actual);
        let details = result
            .details
            .unwrap_or_else(|| format!("got {actual:?}"));
        self.log_check(&description, Some(result.outcome), Some(&details))?;
        Ok(result.outcome)
    }

    /// [`Runtime::check_that`]과 같지만 실패하면 [`ZestError::Abort`]를 반환합니다.
    pub fn require_that<T, M>(&self, hint: &str, actual: &T, matcher: M) -> Result<(), ZestError>
    where
        T: Debug + ?Sized,
        M: Matcher<T>,
    {
        let description = format!("Expect {hint} {}", matcher.description());
        if self.check_that(hint, actual, matcher)? {
            Ok(())
        } else {
            Err(ZestError::Abort(description))
        }
    }

    // ─── 첨부 ────────────────────────────────────────────────────────

    /// 첨부 파일 경로를 할당하고 `write`가 성공하면 첨부 이벤트를 발행합니다.
    ///
    /// 번호 할당과 디렉토리 생성은 하나의 락 안에서 수행되므로 동시 호출에서도
    /// `0001_`, `0002_` ... 접두어가 겹치지 않습니다. `write`가 에러를 반환하면
    /// 이벤트는 발행되지 않습니다.
    pub fn prepare_attachment<F, R>(
        &self,
        filename: &str,
        description: &str,
        as_image: bool,
        write: F,
    ) -> Result<R, ZestError>
    where
        F: FnOnce(&Path) -> Result<R, ZestError>,
    {
        let (location, step) = self.current()?;
        let dir = self.report_dir.join(ATTACHMENT_DIR);

        let attachment_name = {
            let mut state = self.attachments.lock().unwrap_or_else(PoisonError::into_inner);
            if !state.dir_created {
                std::fs::create_dir_all(&dir)?;
                state.dir_created = true;
            }
            state.count += 1;
            format!("{:04}_{}", state.count, filename)
        };

        let output = write(&dir.join(&attachment_name)).inspect_err(|e| {
            warn!(attachment = %attachment_name, error = %e, "attachment was not written");
        })?;

        metrics::counter!(m::ATTACHMENTS_TOTAL).increment(1);
        debug!(attachment = %attachment_name, "attachment saved");
        self.emit(EventKind::Attachment {
            location,
            step,
            path: format!("{ATTACHMENT_DIR}/{attachment_name}"),
            description: description.to_owned(),
            as_image,
        })?;
        Ok(output)
    }

    /// 이미지 첨부를 위한 [`Runtime::prepare_attachment`]
    pub fn prepare_image_attachment<F, R>(
        &self,
        filename: &str,
        description: &str,
        write: F,
    ) -> Result<R, ZestError>
    where
        F: FnOnce(&Path) -> Result<R, ZestError>,
    {
        self.prepare_attachment(filename, description, true, write)
    }

    /// 기존 파일을 첨부 디렉토리로 복사합니다.
    pub fn save_attachment_file(
        &self,
        source: &Path,
        description: Option<&str>,
    ) -> Result<(), ZestError> {
        self.save_file(source, description, false)
    }

    pub fn save_image_file(&self, source: &Path, description: Option<&str>) -> Result<(), ZestError> {
        self.save_file(source, description, true)
    }

    fn save_file(
        &self,
        source: &Path,
        description: Option<&str>,
        as_image: bool,
    ) -> Result<(), ZestError> {
        let filename = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_owned());
        let description = description.unwrap_or(&filename).to_owned();
        self.prepare_attachment(&filename, &description, as_image, |dest| {
            std::fs::copy(source, dest)?;
            Ok(())
        })
    }

    /// 메모리 내용을 첨부 파일로 저장합니다.
    pub fn save_attachment_content(
        &self,
        content: impl AsRef<[u8]>,
        filename: &str,
        description: Option<&str>,
    ) -> Result<(), ZestError> {
        let description = description.unwrap_or(filename);
        self.prepare_attachment(filename, description, false, |dest| {
            std::fs::write(dest, content.as_ref())?;
            Ok(())
        })
    }

    pub fn save_image_content(
        &self,
        content: impl AsRef<[u8]>,
        filename: &str,
        description: Option<&str>,
    ) -> Result<(), ZestError> {
        let description = description.unwrap_or(filename);
        self.prepare_image_attachment(filename, description, |dest| {
            std::fs::write(dest, content.as_ref())?;
            Ok(())
        })
    }

    // ─── 실패 추적 ───────────────────────────────────────────────────

    /// 위치를 실패로 표시합니다. 여러 번 호출해도 결과는 같습니다.
    pub fn mark_location_as_failed(&self, location: Location) {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        if failures.insert(location.clone()) {
            debug!(location = %location, "location marked as failed");
        }
    }

    pub fn is_successful(&self, location: &Location) -> bool {
        !self
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(location)
    }

    pub fn is_everything_successful(&self) -> bool {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    // ─── 스레드 ──────────────────────────────────────────────────────

    /// 호출한 스레드의 위치를 물려받는 작업 스레드를 생성합니다.
    pub fn spawn<F, T>(self: &Arc<Self>, f: F) -> JoinHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let runtime = Arc::clone(self);
        let location = self.location();
        thread::spawn(move || {
            if let Some(location) = location {
                runtime.set_location(location);
            }
            let output = f();
            runtime.leave_thread();
            output
        })
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("report_dir", &self.report_dir)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

/// 패닉 페이로드에서 메시지를 꺼냅니다.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_owned()
    }
}
