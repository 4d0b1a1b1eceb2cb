//! JSON 리포트 백엔드
//!
//! 리포트 트리를 버전 필드가 있는 JSON 문서로 저장하고 다시 읽습니다.
//! 저장은 임시 파일에 쓴 뒤 이름을 바꾸므로 중간 저장이 잦아도
//! 리포트 파일이 반쯤 쓰인 상태로 남지 않습니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use zest_core::bus::Listener;
use zest_core::error::{ReportError, ZestError};

use crate::backend::{Capabilities, FileReportSession, ReportingBackend, SaveMode};
use crate::report::{Report, SharedReport};

/// 현재 JSON 리포트 형식 버전
pub const REPORT_VERSION: u32 = 1;

/// 기본 파일 이름
pub const DEFAULT_FILENAME: &str = "report.json";

#[derive(Serialize)]
struct JsonDocumentRef<'a> {
    zest_report_version: u32,
    #[serde(flatten)]
    report: &'a Report,
}

#[derive(Deserialize)]
struct JsonDocument {
    zest_report_version: u32,
    #[serde(flatten)]
    report: Report,
}

/// JSON 백엔드 (세션, 저장, 로드)
#[derive(Debug, Clone)]
pub struct JsonBackend {
    filename: String,
    save_mode: SaveMode,
    pretty: bool,
}

impl JsonBackend {
    pub fn new(save_mode: SaveMode) -> Self {
        Self {
            filename: DEFAULT_FILENAME.to_owned(),
            save_mode,
            pretty: true,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    /// 들여쓰기 없는 한 줄 JSON으로 저장합니다.
    pub fn compact(mut self) -> Self {
        self.pretty = false;
        self
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }
}

impl Default for JsonBackend {
    fn default() -> Self {
        Self::new(SaveMode::default())
    }
}

impl ReportingBackend for JsonBackend {
    fn name(&self) -> &str {
        "json"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::SESSION | Capabilities::SAVE | Capabilities::LOAD
    }

    fn create_reporting_session(
        &self,
        report: SharedReport,
        report_dir: &Path,
    ) -> Result<Arc<dyn Listener>, ZestError> {
        let save_fn = if self.pretty { save } else { save_compact };
        Ok(Arc::new(FileReportSession::new(
            report_dir.join(&self.filename),
            report,
            save_fn,
            self.save_mode,
        )))
    }

    fn save_report(&self, path: &Path, report: &Report) -> Result<(), ZestError> {
        if self.pretty {
            save(path, report)
        } else {
            save_compact(path, report)
        }
    }

    fn load_report(&self, path: &Path) -> Result<Report, ZestError> {
        load(path)
    }
}

/// 리포트를 JSON 문자열로 직렬화합니다.
pub fn to_string(report: &Report, pretty: bool) -> Result<String, ReportError> {
    let document = JsonDocumentRef {
        zest_report_version: REPORT_VERSION,
        report,
    };
    let result = if pretty {
        serde_json::to_string_pretty(&document)
    } else {
        serde_json::to_string(&document)
    };
    result.map_err(|e| ReportError::Serialize(e.to_string()))
}

/// JSON 문자열에서 리포트를 읽습니다.
pub fn from_str(content: &str, path: &Path) -> Result<Report, ReportError> {
    let invalid = |reason: String| ReportError::InvalidReport {
        path: path.display().to_string(),
        reason,
    };
    let document: JsonDocument =
        serde_json::from_str(content).map_err(|e| invalid(e.to_string()))?;
    if document.zest_report_version > REPORT_VERSION {
        return Err(invalid(format!(
            "unsupported report version {}",
            document.zest_report_version
        )));
    }
    Ok(document.report)
}

pub fn save(path: &Path, report: &Report) -> Result<(), ZestError> {
    write_atomically(path, &to_string(report, true)?)
}

pub fn save_compact(path: &Path, report: &Report) -> Result<(), ZestError> {
    write_atomically(path, &to_string(report, false)?)
}

pub fn load(path: &Path) -> Result<Report, ZestError> {
    let content = std::fs::read_to_string(path).map_err(|e| ReportError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(from_str(&content, path)?)
}

/// 임시 파일에 쓴 뒤 `path`로 이름을 바꿉니다.
pub(crate) fn write_atomically(path: &Path, content: &str) -> Result<(), ZestError> {
    let io_error = |e: std::io::Error| ReportError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    };
    let mut tmp = PathBuf::from(path);
    tmp.as_mut_os_string().push(".tmp");
    std::fs::write(&tmp, content).map_err(io_error)?;
    std::fs::rename(&tmp, path).map_err(io_error)?;
    debug!(path = %path.display(), bytes = content.len(), "report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_document_without_version() {
        let err = from_str("{\"suites\": []}", Path::new("r.json")).unwrap_err();
        assert!(matches!(err, ReportError::InvalidReport { .. }));
    }

    #[test]
    fn rejects_newer_versions() {
        let err = from_str(
            "{\"zest_report_version\": 99, \"suites\": []}",
            Path::new("r.json"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("unsupported report version"));
    }

    #[test]
    fn rejects_non_json() {
        assert!(from_str("<testsuites/>", Path::new("r.xml")).is_err());
    }

    #[test]
    fn writes_version_field() {
        let json = to_string(&Report::new(), false).unwrap();
        assert!(json.starts_with("{\"zest_report_version\":1"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load(Path::new("/nonexistent/zest/report.json")).unwrap_err();
        assert!(matches!(err, ZestError::Report(ReportError::Io { .. })));
    }

    #[test]
    fn save_then_load_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = Report {
            info: vec![("env".to_owned(), "ci".to_owned())],
            ..Report::new()
        };
        JsonBackend::default().save_report(&path, &report).unwrap();
        assert!(!dir.path().join("report.json.tmp").exists());
        assert_eq!(JsonBackend::default().load_report(&path).unwrap(), report);
    }
}
