#![allow(dead_code)]

use std::path::{Path, PathBuf};

use extkit::build::{BuildOutput, BuildStepOutput, OutputFile};
use extkit::config::{
    BuildSection, CommandsSection, ContextOverrides, DevSection, OrchestratorContext,
    ProjectConfig, ProjectSection, RawProjectConfig, RunnerSection,
};
use extkit::entrypoint::{
    BackgroundOptions, ContentScriptOptions, Entrypoint, EntrypointGroup, EntrypointOptions,
    EntrypointType, ModuleFormat, PageOptions, ScriptWorld,
};

/// Build an [`OrchestratorContext`] rooted at `root` without touching disk.
pub fn test_context(root: &Path, serve: bool) -> OrchestratorContext {
    test_context_with(root, serve, |_| {})
}

/// Like [`test_context`], with a hook to tweak the raw config first.
pub fn test_context_with(
    root: &Path,
    serve: bool,
    tweak: impl FnOnce(&mut RawProjectConfig),
) -> OrchestratorContext {
    let overrides = ContextOverrides {
        serve,
        ..Default::default()
    };
    test_context_full(root, overrides, tweak)
}

/// Full control: custom overrides plus a raw-config hook.
pub fn test_context_full(
    root: &Path,
    overrides: ContextOverrides,
    tweak: impl FnOnce(&mut RawProjectConfig),
) -> OrchestratorContext {
    let mut raw = RawProjectConfig {
        project: ProjectSection {
            name: Some("Test Extension".to_string()),
            description: Some("A test extension".to_string()),
            version: Some("1.0.0".to_string()),
            ..Default::default()
        },
        build: BuildSection::default(),
        manifest: toml::Table::new(),
        commands: CommandsSection::default(),
        runner: RunnerSection::default(),
        dev: DevSection::default(),
    };
    tweak(&mut raw);

    let config = ProjectConfig::try_from(raw).expect("test config is valid");
    OrchestratorContext::from_parts(config, root.join("Extkit.toml"), overrides)
        .expect("test context builds")
}

/// Builder for [`Entrypoint`] to simplify test setup.
pub struct EntrypointBuilder {
    ep: Entrypoint,
}

impl EntrypointBuilder {
    pub fn new(name: &str, ty: EntrypointType) -> Self {
        let ext = match ty {
            t if t.is_html() => "html",
            EntrypointType::UnlistedStyle => "css",
            _ => "ts",
        };
        let options = match ty {
            EntrypointType::Background => {
                EntrypointOptions::Background(BackgroundOptions::default())
            }
            EntrypointType::ContentScript => {
                EntrypointOptions::ContentScript(ContentScriptOptions {
                    matches: vec!["*://*/*".to_string()],
                    ..Default::default()
                })
            }
            t if t.is_html() => EntrypointOptions::Page(PageOptions::default()),
            _ => EntrypointOptions::None,
        };

        Self {
            ep: Entrypoint {
                name: name.to_string(),
                ty,
                input_path: PathBuf::from(format!("/project/entrypoints/{name}.{ext}")),
                output_dir: PathBuf::from("/project/.output/chrome-mv3"),
                options,
                include: None,
                exclude: None,
                skipped: false,
                synthetic: false,
            },
        }
    }

    pub fn input_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ep.input_path = path.into();
        self
    }

    pub fn matches(mut self, patterns: &[&str]) -> Self {
        if let EntrypointOptions::ContentScript(opts) = &mut self.ep.options {
            opts.matches = patterns.iter().map(|s| s.to_string()).collect();
        }
        self
    }

    pub fn content_script_options(mut self, opts: ContentScriptOptions) -> Self {
        self.ep.options = EntrypointOptions::ContentScript(opts);
        self
    }

    pub fn esm(mut self) -> Self {
        match &mut self.ep.options {
            EntrypointOptions::Background(o) => o.format = Some(ModuleFormat::Esm),
            EntrypointOptions::ContentScript(o) => o.format = Some(ModuleFormat::Esm),
            _ => {}
        }
        self
    }

    pub fn main_world(mut self) -> Self {
        if let EntrypointOptions::ContentScript(o) = &mut self.ep.options {
            o.world = Some(ScriptWorld::Main);
        }
        self
    }

    pub fn skipped(mut self, val: bool) -> Self {
        self.ep.skipped = val;
        self
    }

    pub fn synthetic(mut self, val: bool) -> Self {
        self.ep.synthetic = val;
        self
    }

    pub fn build(self) -> Entrypoint {
        self.ep
    }
}

/// A compiled chunk with the given dependency set.
pub fn chunk(file_name: &str, module_ids: &[&Path]) -> OutputFile {
    OutputFile::Chunk {
        file_name: file_name.to_string(),
        module_ids: module_ids.iter().map(|p| p.to_path_buf()).collect(),
    }
}

/// An opaque asset.
pub fn asset(file_name: &str) -> OutputFile {
    OutputFile::Asset {
        file_name: file_name.to_string(),
    }
}

/// A build step for a singleton group.
pub fn single_step(ep: Entrypoint, chunks: Vec<OutputFile>) -> BuildStepOutput {
    BuildStepOutput {
        entrypoints: EntrypointGroup::Single(ep),
        chunks,
    }
}

/// A build step for a shared group.
pub fn shared_step(eps: Vec<Entrypoint>, chunks: Vec<OutputFile>) -> BuildStepOutput {
    BuildStepOutput {
        entrypoints: EntrypointGroup::Shared(eps),
        chunks,
    }
}

/// A complete build output.
pub fn output(steps: Vec<BuildStepOutput>, public_assets: Vec<OutputFile>) -> BuildOutput {
    BuildOutput {
        manifest: serde_json::json!({ "manifest_version": 3 }),
        public_assets,
        steps,
    }
}
