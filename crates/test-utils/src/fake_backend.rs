use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use extkit::build::{BuildStepOutput, BuilderBackend, OutputFile};
use extkit::entrypoint::{EntrypointGroup, ModuleConfigReader};
use extkit::errors::{ExtkitError, Result};
use extkit::runner::Runner;

/// How an injected build failure should present itself.
#[derive(Debug, Clone)]
pub enum FakeFailure {
    /// Recoverable syntax error in the given file.
    Syntax(PathBuf),
    /// Plain build error.
    Build(String),
}

/// A fake builder that:
/// - records which groups were built, in order
/// - fabricates one chunk per member (entry file + the member's input path
///   as its module id), plus any extra module ids registered per name
/// - optionally emits an `assets/<name>.css` asset per registered name
/// - optionally fails once for a named entrypoint.
#[derive(Default)]
pub struct FakeBuilder {
    built: Mutex<Vec<String>>,
    extra_modules: Mutex<HashMap<String, Vec<PathBuf>>>,
    css_for: Mutex<HashSet<String>>,
    fail_on: Mutex<Option<(String, FakeFailure)>>,
}

impl FakeBuilder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Labels of the groups built so far, in build order.
    pub fn built_labels(&self) -> Vec<String> {
        self.built.lock().unwrap().clone()
    }

    pub fn build_count(&self) -> usize {
        self.built.lock().unwrap().len()
    }

    /// Register extra module ids for the named entrypoint's chunk.
    pub fn add_module(&self, entrypoint: &str, module: impl Into<PathBuf>) {
        self.extra_modules
            .lock()
            .unwrap()
            .entry(entrypoint.to_string())
            .or_default()
            .push(module.into());
    }

    /// Emit an `assets/<name>.css` asset alongside the named entrypoint.
    pub fn emit_css_for(&self, entrypoint: &str) {
        self.css_for.lock().unwrap().insert(entrypoint.to_string());
    }

    /// Fail the next build containing the named entrypoint, once.
    pub fn fail_once(&self, entrypoint: &str, failure: FakeFailure) {
        *self.fail_on.lock().unwrap() = Some((entrypoint.to_string(), failure));
    }
}

impl BuilderBackend for FakeBuilder {
    fn build(
        &self,
        group: &EntrypointGroup,
    ) -> Pin<Box<dyn Future<Output = Result<BuildStepOutput>> + Send + '_>> {
        let group = group.clone();

        Box::pin(async move {
            self.built.lock().unwrap().push(group.label());

            let failure = {
                let mut fail_on = self.fail_on.lock().unwrap();
                match fail_on.take() {
                    Some((name, failure))
                        if group.members().iter().any(|ep| ep.name == name) =>
                    {
                        Some(failure)
                    }
                    other => {
                        *fail_on = other;
                        None
                    }
                }
            };
            if let Some(failure) = failure {
                return Err(match failure {
                    FakeFailure::Syntax(path) => ExtkitError::SyntaxError {
                        path,
                        message: "unexpected token".to_string(),
                    },
                    FakeFailure::Build(message) => ExtkitError::BuildError {
                        group: group.label(),
                        message,
                    },
                });
            }

            let extra = self.extra_modules.lock().unwrap().clone();
            let css_for = self.css_for.lock().unwrap().clone();

            let mut chunks = Vec::new();
            for ep in group.members() {
                let mut module_ids = vec![ep.input_path.clone()];
                if let Some(more) = extra.get(&ep.name) {
                    module_ids.extend(more.iter().cloned());
                }
                chunks.push(OutputFile::Chunk {
                    file_name: ep.entry_file_name(),
                    module_ids,
                });
                if css_for.contains(&ep.name) {
                    chunks.push(OutputFile::Asset {
                        file_name: format!("assets/{}.css", ep.name),
                    });
                }
            }

            Ok(BuildStepOutput {
                entrypoints: group,
                chunks,
            })
        })
    }
}

/// A fake runner that records open/close calls.
#[derive(Default)]
pub struct FakeRunner {
    opens: AtomicUsize,
    closes: AtomicUsize,
}

impl FakeRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Runner for FakeRunner {
    fn open_browser(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }

    fn close_browser(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }
}

/// In-memory module config reader keyed by absolute path.
#[derive(Default)]
pub struct FakeConfigReader {
    options: Mutex<HashMap<PathBuf, serde_json::Map<String, serde_json::Value>>>,
}

impl FakeConfigReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the options object returned for `path`.
    pub fn set(&self, path: impl Into<PathBuf>, value: serde_json::Value) {
        let map = value.as_object().cloned().unwrap_or_default();
        self.options.lock().unwrap().insert(path.into(), map);
    }
}

impl ModuleConfigReader for FakeConfigReader {
    fn read(
        &self,
        path: &std::path::Path,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Map<String, serde_json::Value>>> + Send + '_>>
    {
        let result = self
            .options
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_default();
        Box::pin(async move { Ok(result) })
    }
}
