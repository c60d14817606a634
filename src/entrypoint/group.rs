// src/entrypoint/group.rs

//! Entrypoint grouping into build steps.
//!
//! Three strategies, keyed by entrypoint type plus the module-format option
//! for background/content-scripts:
//!
//! - **shared ESM bundle**: HTML pages plus any background/content-script
//!   explicitly built as an ES module. One Builder call lets chunks be
//!   shared across all of them.
//! - **shared sandboxed ESM bundle**: sandbox pages plus MAIN-world module
//!   content scripts. Isolated JS execution context; must not share chunks
//!   with the page bundle.
//! - **individual**: IIFE background, IIFE content scripts, unlisted
//!   scripts, and all styles. Each must compile to a single self-contained
//!   file.
//!
//! Group emission order = first-occurrence order of each group's first
//! member in the classified entrypoint list.

use crate::entrypoint::{
    Entrypoint, EntrypointGroup, EntrypointType, ModuleFormat, ScriptWorld,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    SharedPage,
    SharedSandbox,
    Individual,
}

fn strategy_for(ep: &Entrypoint) -> Strategy {
    match ep.ty {
        EntrypointType::Sandbox => Strategy::SharedSandbox,
        t if t.is_html() => Strategy::SharedPage,
        EntrypointType::Background => match ep.module_format() {
            ModuleFormat::Esm => Strategy::SharedPage,
            ModuleFormat::Iife => Strategy::Individual,
        },
        EntrypointType::ContentScript => {
            let opts = ep.options.as_content_script();
            let world = opts.and_then(|o| o.world);
            match ep.module_format() {
                ModuleFormat::Esm if world == Some(ScriptWorld::Main) => Strategy::SharedSandbox,
                ModuleFormat::Esm => Strategy::SharedPage,
                ModuleFormat::Iife => Strategy::Individual,
            }
        }
        _ => Strategy::Individual,
    }
}

/// Batch non-skipped entrypoints into build steps.
pub fn group_entrypoints(entrypoints: &[Entrypoint]) -> Vec<EntrypointGroup> {
    // Group slots in first-occurrence order. Shared strategies reserve a
    // slot when their first member appears and accumulate into it.
    enum Slot {
        Page(Vec<Entrypoint>),
        Sandbox(Vec<Entrypoint>),
        Single(Entrypoint),
    }

    let mut slots: Vec<Slot> = Vec::new();
    let mut page_slot: Option<usize> = None;
    let mut sandbox_slot: Option<usize> = None;

    for ep in entrypoints.iter().filter(|e| !e.skipped) {
        match strategy_for(ep) {
            Strategy::SharedPage => match page_slot {
                Some(i) => {
                    if let Slot::Page(members) = &mut slots[i] {
                        members.push(ep.clone());
                    }
                }
                None => {
                    page_slot = Some(slots.len());
                    slots.push(Slot::Page(vec![ep.clone()]));
                }
            },
            Strategy::SharedSandbox => match sandbox_slot {
                Some(i) => {
                    if let Slot::Sandbox(members) = &mut slots[i] {
                        members.push(ep.clone());
                    }
                }
                None => {
                    sandbox_slot = Some(slots.len());
                    slots.push(Slot::Sandbox(vec![ep.clone()]));
                }
            },
            Strategy::Individual => slots.push(Slot::Single(ep.clone())),
        }
    }

    slots
        .into_iter()
        .map(|slot| match slot {
            Slot::Page(members) | Slot::Sandbox(members) => EntrypointGroup::Shared(members),
            Slot::Single(ep) => EntrypointGroup::Single(ep),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entrypoint::{BackgroundOptions, ContentScriptOptions, EntrypointOptions};
    use std::path::PathBuf;

    fn ep(name: &str, ty: EntrypointType, options: EntrypointOptions) -> Entrypoint {
        Entrypoint {
            name: name.to_string(),
            ty,
            input_path: PathBuf::from(format!("/project/entrypoints/{name}")),
            output_dir: PathBuf::from("/project/.output/chrome-mv3"),
            options,
            include: None,
            exclude: None,
            skipped: false,
            synthetic: false,
        }
    }

    #[test]
    fn html_pages_share_one_group() {
        let eps = vec![
            ep("options", EntrypointType::Options, EntrypointOptions::Page(Default::default())),
            ep("newtab", EntrypointType::Newtab, EntrypointOptions::Page(Default::default())),
            ep("popup", EntrypointType::Popup, EntrypointOptions::Page(Default::default())),
        ];

        let groups = group_entrypoints(&eps);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members().len(), 3);
    }

    #[test]
    fn iife_background_and_content_scripts_are_singletons() {
        let eps = vec![
            ep(
                "background",
                EntrypointType::Background,
                EntrypointOptions::Background(BackgroundOptions::default()),
            ),
            ep(
                "overlay",
                EntrypointType::ContentScript,
                EntrypointOptions::ContentScript(ContentScriptOptions {
                    matches: vec!["*://*/*".into()],
                    ..Default::default()
                }),
            ),
            ep("popup", EntrypointType::Popup, EntrypointOptions::Page(Default::default())),
        ];

        let groups = group_entrypoints(&eps);
        assert_eq!(groups.len(), 3);
        assert!(matches!(groups[0], EntrypointGroup::Single(_)));
        assert!(matches!(groups[1], EntrypointGroup::Single(_)));
        assert!(matches!(groups[2], EntrypointGroup::Shared(_)));
    }

    #[test]
    fn esm_background_joins_the_page_group() {
        let eps = vec![
            ep(
                "background",
                EntrypointType::Background,
                EntrypointOptions::Background(BackgroundOptions {
                    format: Some(ModuleFormat::Esm),
                    ..Default::default()
                }),
            ),
            ep("popup", EntrypointType::Popup, EntrypointOptions::Page(Default::default())),
        ];

        let groups = group_entrypoints(&eps);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members().len(), 2);
    }

    #[test]
    fn main_world_esm_content_scripts_join_the_sandbox_group() {
        let eps = vec![
            ep("sandbox", EntrypointType::Sandbox, EntrypointOptions::Page(Default::default())),
            ep(
                "injector",
                EntrypointType::ContentScript,
                EntrypointOptions::ContentScript(ContentScriptOptions {
                    matches: vec!["*://*/*".into()],
                    world: Some(ScriptWorld::Main),
                    format: Some(ModuleFormat::Esm),
                    ..Default::default()
                }),
            ),
            ep("popup", EntrypointType::Popup, EntrypointOptions::Page(Default::default())),
        ];

        let groups = group_entrypoints(&eps);
        assert_eq!(groups.len(), 2);
        // sandbox group first (first occurrence), page group second
        assert_eq!(groups[0].members().len(), 2);
        assert_eq!(groups[1].members().len(), 1);
    }

    #[test]
    fn skipped_entrypoints_never_join_groups() {
        let mut popup = ep("popup", EntrypointType::Popup, EntrypointOptions::Page(Default::default()));
        popup.skipped = true;
        let groups = group_entrypoints(&[popup]);
        assert!(groups.is_empty());
    }
}
