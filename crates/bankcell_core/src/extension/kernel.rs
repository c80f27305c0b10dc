//! Plugin discovery and execution.
//!
//! # Responsibility
//! - Discover plugin manifests under the plugins directory.
//! - Run one plugin against one resolved cell as an external process.
//!
//! # Invariants
//! - Entry lookup happens before any file is written; a missing entry leaves
//!   no output directory behind.
//! - The plugin is spawned without a shell and waited on with no timeout.
//! - A run succeeds only when the plugin leaves `output.json` behind.

use crate::config::Config;
use crate::extension::manifest::PluginManifest;
use crate::model::bank::CellKey;
use crate::model::ids::BankId;
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::value::RawValue;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

const CODE_FILE: &str = "code.txt";
const INPUT_FILE: &str = "input.json";
const OUTPUT_FILE: &str = "output.json";
const STDOUT_FILE: &str = "run.log";
const STDERR_FILE: &str = "run.err";

/// Read access the kernel needs from the bank store.
///
/// Methods take `&mut self` because answering may load banks from disk.
pub trait CellSource {
    fn config(&self) -> &Config;
    /// Root under which `plugins/<bank>/...` output directories are created.
    fn out_dir(&self) -> &Path;
    /// Fully resolved value of `key`; `None` when the cell does not exist.
    fn resolve_cell(&mut self, key: CellKey) -> Option<String>;
    fn bank_title(&mut self, bank: BankId) -> Option<String>;
}

/// One plugin invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginRunRequest {
    pub plugin: String,
    pub cell: CellKey,
    /// Empty, a path to a JSON file, inline JSON, or free text.
    pub stdin: String,
}

impl PluginRunRequest {
    pub fn new(plugin: impl Into<String>, cell: CellKey, stdin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            cell,
            stdin: stdin.into(),
        }
    }
}

/// Result of a successful plugin run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginRunOutput {
    /// Raw contents of `output.json`.
    pub output_json: String,
    pub exit_code: i32,
    /// `exit=<code>` followed by captured stdout/stderr sections.
    pub report: String,
    /// Absolute directory holding the run artifacts.
    pub out_dir: PathBuf,
}

/// Plugin run failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginRunError {
    PluginNotFound(String),
    /// Rendered `<bank> r<reg> a<addr>` of the absent cell.
    NoSuchCell(String),
    EntryNotFound { plugin: String, entry: PathBuf },
    NoPluginOutput { exit_code: i32, stderr: String },
    Io { context: String, message: String },
}

impl Display for PluginRunError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PluginNotFound(name) => write!(f, "Plugin not found: {name}"),
            Self::NoSuchCell(cell) => write!(f, "No such cell: {cell}"),
            Self::EntryNotFound { plugin, entry } => write!(
                f,
                "Plugin entry not found for {plugin}: {}",
                entry.display()
            ),
            Self::NoPluginOutput { exit_code, stderr } => {
                write!(f, "Plugin did not produce output.json. Exit={exit_code}")?;
                if !stderr.is_empty() {
                    write!(f, "\nerr:\n{stderr}")?;
                }
                Ok(())
            }
            Self::Io { context, message } => write!(f, "{context}: {message}"),
        }
    }
}

impl Error for PluginRunError {}

/// `input.json` handed to the plugin entry.
#[derive(Serialize)]
struct PluginInput<'a> {
    bank: String,
    reg: String,
    addr: String,
    title: &'a str,
    code_file: String,
    stdin: &'a RawValue,
}

/// Discovered plugins plus the run pipeline.
#[derive(Debug, Clone)]
pub struct PluginKernel {
    plugins_dir: PathBuf,
    plugins: Vec<PluginManifest>,
}

impl PluginKernel {
    /// Scans `plugins_dir` immediately. A missing directory yields no plugins.
    pub fn discover(plugins_dir: impl Into<PathBuf>) -> Self {
        let mut kernel = Self {
            plugins_dir: plugins_dir.into(),
            plugins: Vec::new(),
        };
        kernel.refresh();
        kernel
    }

    /// Re-scans the plugins directory and returns the plugin count.
    pub fn refresh(&mut self) -> usize {
        self.plugins = scan_plugins(&self.plugins_dir);
        info!(
            "event=plugin_discover module=extension status=ok dir={} count={}",
            self.plugins_dir.display(),
            self.plugins.len()
        );
        self.plugins.len()
    }

    pub fn plugins_dir(&self) -> &Path {
        &self.plugins_dir
    }

    /// Discovered plugins in directory-name order.
    pub fn plugins(&self) -> &[PluginManifest] {
        &self.plugins
    }

    pub fn find(&self, name: &str) -> Option<&PluginManifest> {
        self.plugins.iter().find(|plugin| plugin.name == name)
    }

    /// `<out>/plugins/<bank>/r<reg>a<addr>/<plugin>` with rendered ids.
    pub fn output_dir(out_root: &Path, config: &Config, cell: CellKey, plugin: &str) -> PathBuf {
        out_root
            .join("plugins")
            .join(config.render_bank(cell.bank))
            .join(format!(
                "r{}a{}",
                config.render_register(cell.register),
                config.render_address(cell.address)
            ))
            .join(plugin)
    }

    /// Runs `request.plugin` against the resolved value of `request.cell`.
    pub fn run(
        &self,
        source: &mut impl CellSource,
        request: &PluginRunRequest,
    ) -> Result<PluginRunOutput, PluginRunError> {
        let started_at = Instant::now();
        info!(
            "event=plugin_run module=extension status=start plugin={} cell={}",
            request.plugin, request.cell
        );
        let result = self.run_inner(source, request);
        match &result {
            Ok(output) => info!(
                "event=plugin_run module=extension status=ok plugin={} exit={} duration_ms={}",
                request.plugin,
                output.exit_code,
                started_at.elapsed().as_millis()
            ),
            Err(err) => {
                let message = err.to_string();
                warn!(
                    "event=plugin_run module=extension status=error plugin={} duration_ms={} error={}",
                    request.plugin,
                    started_at.elapsed().as_millis(),
                    message.lines().next().unwrap_or_default()
                );
            }
        }
        result
    }

    fn run_inner(
        &self,
        source: &mut impl CellSource,
        request: &PluginRunRequest,
    ) -> Result<PluginRunOutput, PluginRunError> {
        let plugin = self
            .find(&request.plugin)
            .ok_or_else(|| PluginRunError::PluginNotFound(request.plugin.clone()))?;

        let cell = request.cell;
        let code = source.resolve_cell(cell).ok_or_else(|| {
            let config = source.config();
            PluginRunError::NoSuchCell(format!(
                "{} r{} a{}",
                config.render_bank(cell.bank),
                config.render_register(cell.register),
                config.render_address(cell.address)
            ))
        })?;
        let title = source.bank_title(cell.bank).unwrap_or_default();

        let out_dir = absolute(&Self::output_dir(
            source.out_dir(),
            source.config(),
            cell,
            &plugin.name,
        ))?;
        let entry = entry_path(plugin)?;

        fs::create_dir_all(&out_dir).map_err(|err| io_error("create output dir", &out_dir, err))?;
        let code_file = out_dir.join(CODE_FILE);
        fs::write(&code_file, &code).map_err(|err| io_error("write code", &code_file, err))?;

        let stdin = stdin_payload(&request.stdin)?;
        let config = source.config();
        let input = PluginInput {
            bank: config.render_bank(cell.bank),
            reg: config.render_register(cell.register),
            addr: config.render_address(cell.address),
            title: &title,
            code_file: code_file.to_string_lossy().into_owned(),
            stdin: &stdin,
        };
        let input_file = out_dir.join(INPUT_FILE);
        let input_text = serde_json::to_string_pretty(&input).map_err(|err| PluginRunError::Io {
            context: "encode input.json".to_string(),
            message: err.to_string(),
        })?;
        fs::write(&input_file, input_text)
            .map_err(|err| io_error("write input", &input_file, err))?;

        // A stale result from an earlier run must not count as output.
        let output_file = out_dir.join(OUTPUT_FILE);
        if output_file.exists() {
            fs::remove_file(&output_file)
                .map_err(|err| io_error("remove stale output", &output_file, err))?;
        }

        let stdout_file = out_dir.join(STDOUT_FILE);
        let stderr_file = out_dir.join(STDERR_FILE);
        let stdout = File::create(&stdout_file)
            .map_err(|err| io_error("create run log", &stdout_file, err))?;
        let stderr = File::create(&stderr_file)
            .map_err(|err| io_error("create run err", &stderr_file, err))?;

        debug!(
            "event=plugin_run module=extension status=spawn entry={} out_dir={}",
            entry.display(),
            out_dir.display()
        );
        let status = Command::new(&entry)
            .arg(&input_file)
            .arg(&out_dir)
            .current_dir(&plugin.dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .status()
            .map_err(|err| io_error("spawn plugin", &entry, err))?;
        let exit_code = status.code().unwrap_or(-1);

        let log_text = read_lossy(&stdout_file);
        let err_text = read_lossy(&stderr_file);
        let output_json = match fs::read(&output_file) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(_) => {
                return Err(PluginRunError::NoPluginOutput {
                    exit_code,
                    stderr: err_text,
                })
            }
        };

        let mut report = format!("exit={exit_code}\n");
        if !log_text.is_empty() {
            report.push_str(&format!("log:\n{log_text}\n"));
        }
        if !err_text.is_empty() {
            report.push_str(&format!("stderr:\n{err_text}\n"));
        }

        Ok(PluginRunOutput {
            output_json,
            exit_code,
            report,
            out_dir,
        })
    }
}

/// Loads every valid manifest under `root`, sorted by directory name.
///
/// Unreadable manifests and blank names are skipped; a duplicate name keeps
/// the first directory.
fn scan_plugins(root: &Path) -> Vec<PluginManifest> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(
                "event=plugin_discover module=extension status=skip dir={} error={}",
                root.display(),
                err
            );
            return Vec::new();
        }
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();

    let mut seen = BTreeSet::new();
    let mut plugins = Vec::new();
    for dir in dirs {
        let manifest = match PluginManifest::load(&dir) {
            Ok(manifest) => manifest,
            Err(err) => {
                debug!("event=plugin_discover module=extension status=skip error={err}");
                continue;
            }
        };
        if let Err(err) = manifest.validate() {
            debug!("event=plugin_discover module=extension status=skip error={err}");
            continue;
        }
        if !seen.insert(manifest.name.clone()) {
            warn!(
                "event=plugin_discover module=extension status=duplicate name={} dir={}",
                manifest.name,
                dir.display()
            );
            continue;
        }
        plugins.push(manifest);
    }
    plugins
}

fn entry_path(plugin: &PluginManifest) -> Result<PathBuf, PluginRunError> {
    let not_found = |entry: PathBuf| PluginRunError::EntryNotFound {
        plugin: plugin.name.clone(),
        entry,
    };
    let entry = plugin
        .entry_path()
        .ok_or_else(|| not_found(plugin.dir.clone()))?;
    let entry = absolute(&entry)?;
    if !entry.is_file() {
        return Err(not_found(entry));
    }
    Ok(entry)
}

/// Builds the `stdin` field of `input.json`.
///
/// Empty → `{}`. A path to an existing file → the file contents inlined
/// verbatim when they parse as JSON, otherwise the contents as a JSON string.
/// Inline JSON → as is. Anything else → a JSON string.
fn stdin_payload(raw: &str) -> Result<Box<RawValue>, PluginRunError> {
    let trimmed = raw.trim();
    let encode = |err: serde_json::Error| PluginRunError::Io {
        context: "encode stdin".to_string(),
        message: err.to_string(),
    };
    if trimmed.is_empty() {
        return RawValue::from_string("{}".to_string()).map_err(encode);
    }

    let path = Path::new(trimmed);
    let text = if path.is_file() {
        fs::read_to_string(path).map_err(|err| io_error("read stdin file", path, err))?
    } else {
        trimmed.to_string()
    };
    match serde_json::from_str::<Box<RawValue>>(&text) {
        Ok(value) => Ok(value),
        Err(_) => serde_json::value::to_raw_value(&text).map_err(encode),
    }
}

fn absolute(path: &Path) -> Result<PathBuf, PluginRunError> {
    std::path::absolute(path).map_err(|err| io_error("resolve path", path, err))
}

fn read_lossy(path: &Path) -> String {
    fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

fn io_error(context: &str, path: &Path, err: std::io::Error) -> PluginRunError {
    PluginRunError::Io {
        context: format!("{context} {}", path.display()),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{stdin_payload, PluginKernel, PluginRunError};
    use crate::config::Config;
    use crate::model::bank::CellKey;
    use std::fs;
    use std::path::Path;

    fn write_plugin(root: &Path, dir: &str, manifest: &str) {
        let dir = root.join(dir);
        fs::create_dir_all(&dir).expect("create plugin dir");
        fs::write(dir.join("plugin.json"), manifest).expect("write manifest");
    }

    #[test]
    fn discovers_sorted_and_skips_invalid() {
        let root = tempfile::tempdir().expect("tempdir");
        write_plugin(root.path(), "b", r#"{"name":"beta","entry_lin":"run.sh"}"#);
        write_plugin(root.path(), "a", r#"{"name":"alpha","entry_lin":"run.sh"}"#);
        write_plugin(root.path(), "c", r#"{"name":"  "}"#);
        write_plugin(root.path(), "d", "not json");
        write_plugin(root.path(), "e", r#"{"name":"alpha"}"#);
        fs::create_dir_all(root.path().join("empty")).expect("dir without manifest");

        let kernel = PluginKernel::discover(root.path());
        let names: Vec<&str> = kernel.plugins().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
        assert_eq!(kernel.find("alpha").map(|p| p.dir.clone()), Some(root.path().join("a")));
        assert!(kernel.find("gamma").is_none());
    }

    #[test]
    fn missing_plugins_dir_yields_empty_kernel() {
        let root = tempfile::tempdir().expect("tempdir");
        let kernel = PluginKernel::discover(root.path().join("absent"));
        assert!(kernel.plugins().is_empty());
    }

    #[test]
    fn refresh_picks_up_new_plugins() {
        let root = tempfile::tempdir().expect("tempdir");
        let mut kernel = PluginKernel::discover(root.path());
        assert_eq!(kernel.plugins().len(), 0);
        write_plugin(root.path(), "p", r#"{"name":"python"}"#);
        assert_eq!(kernel.refresh(), 1);
    }

    #[test]
    fn output_dir_uses_rendered_ids() {
        let dir = PluginKernel::output_dir(
            Path::new("/out"),
            &Config::default(),
            CellKey::new(1, 2, 3),
            "python",
        );
        assert_eq!(dir, Path::new("/out/plugins/x00001/r02a0003/python"));
    }

    #[test]
    fn stdin_payload_variants() {
        assert_eq!(stdin_payload("").expect("empty").get(), "{}");
        assert_eq!(
            stdin_payload(r#"{"k": 1}"#).expect("inline json").get(),
            r#"{"k": 1}"#
        );
        assert_eq!(stdin_payload("hello").expect("text").get(), r#""hello""#);

        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("payload.json");
        fs::write(&file, "[1, 2]\n").expect("write payload");
        let from_file = stdin_payload(file.to_str().expect("utf-8 path")).expect("file");
        assert_eq!(from_file.get(), "[1, 2]");
    }

    #[test]
    fn stdin_file_contents_are_kept_as_written() {
        let dir = tempfile::tempdir().expect("tempdir");
        let json_file = dir.path().join("payload.json");
        fs::write(&json_file, "{\n  \"rows\": [1,   2],\n  \"tag\": \" x \"\n}\n")
            .expect("write json payload");
        let inlined = stdin_payload(json_file.to_str().expect("utf-8 path")).expect("json file");
        assert_eq!(inlined.get(), "{\n  \"rows\": [1,   2],\n  \"tag\": \" x \"\n}");

        let text_file = dir.path().join("notes.txt");
        fs::write(&text_file, "  two\nlines\n").expect("write text payload");
        let quoted = stdin_payload(text_file.to_str().expect("utf-8 path")).expect("text file");
        assert_eq!(quoted.get(), r#""  two\nlines\n""#);
    }

    #[test]
    fn no_output_report_matches_format() {
        let err = PluginRunError::NoPluginOutput {
            exit_code: 3,
            stderr: "boom".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Plugin did not produce output.json. Exit=3\nerr:\nboom"
        );

        let silent = PluginRunError::NoPluginOutput {
            exit_code: 1,
            stderr: String::new(),
        };
        assert_eq!(silent.to_string(), "Plugin did not produce output.json. Exit=1");
    }
}
