//! XML 리포트 백엔드 (세션, 저장, 로드)
//!
//! JSON 백엔드와 같은 리포트 트리를 요소 트리로 저장하고 다시 읽습니다.
//!
//! ```text
//! <zest-report version="1" start-time="..">
//!   <info name="environment">ci</info>
//!   <test-session-setup start-time=".." outcome="true"><step ..>..</step></test-session-setup>
//!   <suite name="math" description="Math">
//!     <tag>smoke</tag><property name="owner">qa</property><link name="build">https://..</link>
//!     <test name="equality" description="Equality" status="failed" start-time="..">
//!       <step description="Compare values" start-time="..">
//!         <check time=".." description=".." outcome="false"><details>got 1</details></check>
//!         <log time=".." level="info">message</log>
//!         <attachment time=".." description=".." as-image="false">attachments/0001_a.txt</attachment>
//!         <url time=".." description="build">https://..</url>
//!       </step>
//!     </test>
//!   </suite>
//! </zest-report>
//! ```
//!
//! 메시지와 URL 같은 자유 텍스트는 속성이 아닌 요소 내용으로 씁니다.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use zest_core::bus::Listener;
use zest_core::error::{ReportError, ZestError};
use zest_core::types::{Link, LogLevel, TestStatus};

use super::json::write_atomically;
use crate::backend::{Capabilities, FileReportSession, ReportingBackend, SaveMode};
use crate::report::{HookResult, Report, SharedReport, Step, StepEntry, SuiteResult, TestResult};

/// 현재 XML 리포트 형식 버전
pub const REPORT_VERSION: u32 = 1;

/// 기본 파일 이름
pub const DEFAULT_FILENAME: &str = "report.xml";

const ROOT: &str = "zest-report";

/// XML 백엔드 (세션, 저장, 로드)
#[derive(Debug, Clone)]
pub struct XmlBackend {
    filename: String,
    save_mode: SaveMode,
}

impl XmlBackend {
    pub fn new(save_mode: SaveMode) -> Self {
        Self {
            filename: DEFAULT_FILENAME.to_owned(),
            save_mode,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }
}

impl Default for XmlBackend {
    fn default() -> Self {
        Self::new(SaveMode::default())
    }
}

impl ReportingBackend for XmlBackend {
    fn name(&self) -> &str {
        "xml"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::SESSION | Capabilities::SAVE | Capabilities::LOAD
    }

    fn create_reporting_session(
        &self,
        report: SharedReport,
        report_dir: &Path,
    ) -> Result<Arc<dyn Listener>, ZestError> {
        Ok(Arc::new(FileReportSession::new(
            report_dir.join(&self.filename),
            report,
            save,
            self.save_mode,
        )))
    }

    fn save_report(&self, path: &Path, report: &Report) -> Result<(), ZestError> {
        save(path, report)
    }

    fn load_report(&self, path: &Path) -> Result<Report, ZestError> {
        load(path)
    }
}

pub fn save(path: &Path, report: &Report) -> Result<(), ZestError> {
    write_atomically(path, &to_string(report)?)
}

pub fn load(path: &Path) -> Result<Report, ZestError> {
    let content = std::fs::read_to_string(path).map_err(|e| ReportError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(from_str(&content, path)?)
}

// ─── 쓰기 ────────────────────────────────────────────────────────────

type Attrs<'a> = Vec<(&'a str, String)>;

/// 리포트를 XML 문서로 직렬화합니다.
pub fn to_string(report: &Report) -> Result<String, ReportError> {
    let mut out = XmlOut::new();
    out.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut attrs = vec![("version", REPORT_VERSION.to_string())];
    push_time(&mut attrs, "start-time", report.start_time);
    push_time(&mut attrs, "end-time", report.end_time);
    push_time(&mut attrs, "generation-time", report.generation_time);
    out.start(ROOT, &attrs)?;

    for (name, value) in &report.info {
        out.text_element("info", &[("name", name.clone())], value)?;
    }
    if let Some(hook) = &report.test_session_setup {
        write_hook(&mut out, "test-session-setup", hook)?;
    }
    if let Some(hook) = &report.test_session_teardown {
        write_hook(&mut out, "test-session-teardown", hook)?;
    }
    for suite in &report.suites {
        write_suite(&mut out, suite)?;
    }

    out.end(ROOT)?;
    out.finish()
}

struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    fn new() -> Self {
        Self {
            writer: Writer::new(Vec::new()),
        }
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), ReportError> {
        self.writer
            .write_event(event)
            .map_err(|e| ReportError::Serialize(e.to_string()))
    }

    fn start(&mut self, name: &str, attrs: &[(&str, String)]) -> Result<(), ReportError> {
        self.event(Event::Start(element(name, attrs)))
    }

    fn end(&mut self, name: &str) -> Result<(), ReportError> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, String)]) -> Result<(), ReportError> {
        self.event(Event::Empty(element(name, attrs)))
    }

    /// 텍스트 하나만 담는 요소. 텍스트가 비어 있으면 빈 요소로 씁니다.
    fn text_element(
        &mut self,
        name: &str,
        attrs: &[(&str, String)],
        text: &str,
    ) -> Result<(), ReportError> {
        if text.is_empty() {
            return self.empty(name, attrs);
        }
        self.start(name, attrs)?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    fn finish(self) -> Result<String, ReportError> {
        String::from_utf8(self.writer.into_inner()).map_err(|e| ReportError::Serialize(e.to_string()))
    }
}

fn element<'a>(name: &'a str, attrs: &[(&str, String)]) -> BytesStart<'a> {
    let mut start = BytesStart::new(name);
    for (key, value) in attrs {
        start.push_attribute((*key, value.as_str()));
    }
    start
}

fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn push_time<'a>(attrs: &mut Attrs<'a>, key: &'a str, time: Option<DateTime<Utc>>) {
    if let Some(time) = time {
        attrs.push((key, format_time(time)));
    }
}

fn push_bool<'a>(attrs: &mut Attrs<'a>, key: &'a str, value: Option<bool>) {
    if let Some(value) = value {
        attrs.push((key, value.to_string()));
    }
}

fn write_metadata(
    out: &mut XmlOut,
    tags: &[String],
    properties: &BTreeMap<String, String>,
    links: &[Link],
) -> Result<(), ReportError> {
    for tag in tags {
        out.text_element("tag", &[], tag)?;
    }
    for (name, value) in properties {
        out.text_element("property", &[("name", name.clone())], value)?;
    }
    for link in links {
        let attrs: Attrs<'_> = link.name.iter().map(|n| ("name", n.clone())).collect();
        out.text_element("link", &attrs, &link.url)?;
    }
    Ok(())
}

fn write_suite(out: &mut XmlOut, suite: &SuiteResult) -> Result<(), ReportError> {
    let mut attrs = vec![
        ("name", suite.name.clone()),
        ("description", suite.description.clone()),
    ];
    push_time(&mut attrs, "start-time", suite.start_time);
    push_time(&mut attrs, "end-time", suite.end_time);
    out.start("suite", &attrs)?;

    write_metadata(out, &suite.tags, &suite.properties, &suite.links)?;
    if let Some(hook) = &suite.suite_setup {
        write_hook(out, "suite-setup", hook)?;
    }
    if let Some(hook) = &suite.suite_teardown {
        write_hook(out, "suite-teardown", hook)?;
    }
    for test in &suite.tests {
        write_test(out, test)?;
    }
    for sub in &suite.suites {
        write_suite(out, sub)?;
    }

    out.end("suite")
}

fn write_test(out: &mut XmlOut, test: &TestResult) -> Result<(), ReportError> {
    let mut attrs = vec![
        ("name", test.name.clone()),
        ("description", test.description.clone()),
    ];
    if let Some(status) = test.status {
        attrs.push(("status", status.as_str().to_owned()));
    }
    push_time(&mut attrs, "start-time", Some(test.start_time));
    push_time(&mut attrs, "end-time", test.end_time);
    out.start("test", &attrs)?;

    if let Some(details) = &test.status_details {
        out.text_element("status-details", &[], details)?;
    }
    write_metadata(out, &test.tags, &test.properties, &test.links)?;
    for step in &test.steps {
        write_step(out, step)?;
    }

    out.end("test")
}

fn write_hook(out: &mut XmlOut, name: &str, hook: &HookResult) -> Result<(), ReportError> {
    let mut attrs = Vec::new();
    push_time(&mut attrs, "start-time", Some(hook.start_time));
    push_time(&mut attrs, "end-time", hook.end_time);
    push_bool(&mut attrs, "outcome", hook.outcome);
    out.start(name, &attrs)?;
    for step in &hook.steps {
        write_step(out, step)?;
    }
    out.end(name)
}

fn write_step(out: &mut XmlOut, step: &Step) -> Result<(), ReportError> {
    let mut attrs = vec![("description", step.description.clone())];
    push_time(&mut attrs, "start-time", Some(step.start_time));
    push_time(&mut attrs, "end-time", step.end_time);
    out.start("step", &attrs)?;
    for entry in &step.entries {
        write_entry(out, entry)?;
    }
    out.end("step")
}

fn write_entry(out: &mut XmlOut, entry: &StepEntry) -> Result<(), ReportError> {
    let mut attrs = vec![("time", format_time(entry.time()))];
    match entry {
        StepEntry::Log { level, message, .. } => {
            attrs.push(("level", level.to_string()));
            out.text_element("log", &attrs, message)
        }
        StepEntry::Check {
            description,
            outcome,
            details,
            ..
        } => {
            attrs.push(("description", description.clone()));
            push_bool(&mut attrs, "outcome", *outcome);
            match details {
                Some(details) => {
                    out.start("check", &attrs)?;
                    out.text_element("details", &[], details)?;
                    out.end("check")
                }
                None => out.empty("check", &attrs),
            }
        }
        StepEntry::Attachment {
            description,
            path,
            as_image,
            ..
        } => {
            attrs.push(("description", description.clone()));
            attrs.push(("as-image", as_image.to_string()));
            out.text_element("attachment", &attrs, path)
        }
        StepEntry::Url {
            description, url, ..
        } => {
            attrs.push(("description", description.clone()));
            out.text_element("url", &attrs, url)
        }
    }
}

// ─── 읽기 ────────────────────────────────────────────────────────────

/// XML 문자열에서 리포트를 읽습니다.
pub fn from_str(content: &str, path: &Path) -> Result<Report, ReportError> {
    let invalid = |reason: String| ReportError::InvalidReport {
        path: path.display().to_string(),
        reason,
    };
    let root = parse_tree(content).map_err(invalid)?;
    report_from(&root).map_err(invalid)
}

/// 파싱된 요소 하나
#[derive(Debug, Default)]
struct Node {
    name: String,
    attrs: Vec<(String, String)>,
    text: String,
    children: Vec<Node>,
}

impl Node {
    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn required(&self, key: &str) -> Result<&str, String> {
        self.attr(key)
            .ok_or_else(|| format!("<{}> is missing attribute '{}'", self.name, key))
    }

    fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    fn elements<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }
}

fn parse_tree(content: &str) -> Result<Node, String> {
    let mut reader = Reader::from_str(content);
    let mut stack: Vec<Node> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(e) => stack.push(open_node(&e)?),
            Event::Empty(e) => {
                let node = open_node(&e)?;
                close_node(&mut stack, &mut root, node)?;
            }
            Event::End(_) => {
                let node = stack.pop().ok_or("unexpected closing tag")?;
                close_node(&mut stack, &mut root, node)?;
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| e.to_string())?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err("unclosed element".to_owned());
    }
    root.ok_or_else(|| "no root element".to_owned())
}

fn open_node(start: &BytesStart<'_>) -> Result<Node, String> {
    let mut node = Node {
        name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
        ..Node::default()
    };
    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let value = attr.unescape_value().map_err(|e| e.to_string())?;
        node.attrs.push((
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            value.into_owned(),
        ));
    }
    Ok(node)
}

fn close_node(stack: &mut [Node], root: &mut Option<Node>, node: Node) -> Result<(), String> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
        return Ok(());
    }
    if root.is_some() {
        return Err("more than one root element".to_owned());
    }
    *root = Some(node);
    Ok(())
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp '{value}': {e}"))
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(format!("invalid boolean '{other}'")),
    }
}

fn parse_level(value: &str) -> Result<LogLevel, String> {
    match value {
        "debug" => Ok(LogLevel::Debug),
        "info" => Ok(LogLevel::Info),
        "warn" => Ok(LogLevel::Warn),
        "error" => Ok(LogLevel::Error),
        other => Err(format!("invalid log level '{other}'")),
    }
}

fn parse_status(value: &str) -> Result<TestStatus, String> {
    match value {
        "passed" => Ok(TestStatus::Passed),
        "failed" => Ok(TestStatus::Failed),
        "skipped" => Ok(TestStatus::Skipped),
        "disabled" => Ok(TestStatus::Disabled),
        other => Err(format!("invalid test status '{other}'")),
    }
}

fn optional_time(node: &Node, key: &str) -> Result<Option<DateTime<Utc>>, String> {
    node.attr(key).map(parse_time).transpose()
}

fn report_from(root: &Node) -> Result<Report, String> {
    if root.name != ROOT {
        return Err(format!("unexpected root element <{}>", root.name));
    }
    let version: u32 = root
        .required("version")?
        .parse()
        .map_err(|_| "invalid report version".to_owned())?;
    if version > REPORT_VERSION {
        return Err(format!("unsupported report version {version}"));
    }

    Ok(Report {
        start_time: optional_time(root, "start-time")?,
        end_time: optional_time(root, "end-time")?,
        generation_time: optional_time(root, "generation-time")?,
        info: root
            .elements("info")
            .map(named_text)
            .collect::<Result<_, String>>()?,
        test_session_setup: root.child("test-session-setup").map(hook_from).transpose()?,
        test_session_teardown: root
            .child("test-session-teardown")
            .map(hook_from)
            .transpose()?,
        suites: root.elements("suite").map(suite_from).collect::<Result<_, _>>()?,
    })
}

/// `<x name="..">text</x>` 요소를 `(name, text)`로 읽습니다.
fn named_text(node: &Node) -> Result<(String, String), String> {
    Ok((node.required("name")?.to_owned(), node.text.clone()))
}

type Metadata = (Vec<String>, BTreeMap<String, String>, Vec<Link>);

fn metadata_from(node: &Node) -> Result<Metadata, String> {
    let tags = node.elements("tag").map(|n| n.text.clone()).collect();
    let properties = node
        .elements("property")
        .map(named_text)
        .collect::<Result<_, String>>()?;
    let links = node
        .elements("link")
        .map(|n| Link {
            url: n.text.clone(),
            name: n.attr("name").map(str::to_owned),
        })
        .collect();
    Ok((tags, properties, links))
}

fn suite_from(node: &Node) -> Result<SuiteResult, String> {
    let (tags, properties, links) = metadata_from(node)?;
    Ok(SuiteResult {
        name: node.required("name")?.to_owned(),
        description: node.required("description")?.to_owned(),
        tags,
        properties,
        links,
        start_time: optional_time(node, "start-time")?,
        end_time: optional_time(node, "end-time")?,
        suite_setup: node.child("suite-setup").map(hook_from).transpose()?,
        suite_teardown: node.child("suite-teardown").map(hook_from).transpose()?,
        tests: node.elements("test").map(test_from).collect::<Result<_, _>>()?,
        suites: node.elements("suite").map(suite_from).collect::<Result<_, _>>()?,
    })
}

fn test_from(node: &Node) -> Result<TestResult, String> {
    let (tags, properties, links) = metadata_from(node)?;
    Ok(TestResult {
        name: node.required("name")?.to_owned(),
        description: node.required("description")?.to_owned(),
        tags,
        properties,
        links,
        status: node.attr("status").map(parse_status).transpose()?,
        status_details: node.child("status-details").map(|n| n.text.clone()),
        start_time: parse_time(node.required("start-time")?)?,
        end_time: optional_time(node, "end-time")?,
        steps: node.elements("step").map(step_from).collect::<Result<_, _>>()?,
    })
}

fn hook_from(node: &Node) -> Result<HookResult, String> {
    Ok(HookResult {
        start_time: parse_time(node.required("start-time")?)?,
        end_time: optional_time(node, "end-time")?,
        outcome: node.attr("outcome").map(parse_bool).transpose()?,
        steps: node.elements("step").map(step_from).collect::<Result<_, _>>()?,
    })
}

fn step_from(node: &Node) -> Result<Step, String> {
    Ok(Step {
        description: node.required("description")?.to_owned(),
        start_time: parse_time(node.required("start-time")?)?,
        end_time: optional_time(node, "end-time")?,
        entries: node.children.iter().map(entry_from).collect::<Result<_, _>>()?,
    })
}

fn entry_from(node: &Node) -> Result<StepEntry, String> {
    let time = parse_time(node.required("time")?)?;
    match node.name.as_str() {
        "log" => Ok(StepEntry::Log {
            time,
            level: parse_level(node.required("level")?)?,
            message: node.text.clone(),
        }),
        "check" => Ok(StepEntry::Check {
            time,
            description: node.required("description")?.to_owned(),
            outcome: node.attr("outcome").map(parse_bool).transpose()?,
            details: node.child("details").map(|n| n.text.clone()),
        }),
        "attachment" => Ok(StepEntry::Attachment {
            time,
            description: node.required("description")?.to_owned(),
            path: node.text.clone(),
            as_image: parse_bool(node.required("as-image")?)?,
        }),
        "url" => Ok(StepEntry::Url {
            time,
            description: node.required("description")?.to_owned(),
            url: node.text.clone(),
        }),
        other => Err(format!("unknown step entry <{other}>")),
    }
}
