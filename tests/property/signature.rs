// tests/property/signature.rs

//! Property tests for the content-script grouping signature.

use proptest::prelude::*;

use extkit::entrypoint::{ContentScriptOptions, RunAt, ScriptWorld};
use extkit::manifest::{group_signature, resolve_options};

fn match_pattern() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "*://google.com/*".to_string(),
        "*://duckduckgo.com/*".to_string(),
        "*://example.com/*".to_string(),
        "https://*.wikipedia.org/*".to_string(),
        "<all_urls>".to_string(),
    ])
}

proptest! {
    /// Shuffling array-valued fields never changes the signature.
    #[test]
    fn signature_is_order_independent(
        mut matches in prop::collection::vec(match_pattern(), 1..5),
        seed in any::<u64>(),
    ) {
        let opts_sorted = ContentScriptOptions {
            matches: {
                let mut m = matches.clone();
                m.sort();
                m
            },
            ..Default::default()
        };

        // Cheap deterministic shuffle.
        let len = matches.len();
        for i in 0..len {
            let j = (seed as usize).wrapping_add(i * 7) % len;
            matches.swap(i, j);
        }
        let opts_shuffled = ContentScriptOptions {
            matches,
            ..Default::default()
        };

        prop_assert_eq!(
            group_signature(&resolve_options(&opts_sorted)),
            group_signature(&resolve_options(&opts_shuffled))
        );
    }

    /// Explicitly spelling out a default never changes the signature.
    #[test]
    fn signature_ignores_explicit_defaults(
        matches in prop::collection::vec(match_pattern(), 1..4),
        spell_all_frames in any::<bool>(),
        spell_run_at in any::<bool>(),
        spell_world in any::<bool>(),
        spell_exclude in any::<bool>(),
    ) {
        let implicit = ContentScriptOptions {
            matches: matches.clone(),
            ..Default::default()
        };
        let explicit = ContentScriptOptions {
            matches,
            all_frames: spell_all_frames.then_some(false),
            run_at: spell_run_at.then_some(RunAt::DocumentIdle),
            world: spell_world.then_some(ScriptWorld::Isolated),
            exclude_matches: spell_exclude.then_some(vec![]),
            ..Default::default()
        };

        prop_assert_eq!(
            group_signature(&resolve_options(&implicit)),
            group_signature(&resolve_options(&explicit))
        );
    }

    /// Changing a non-default value always changes the signature.
    #[test]
    fn signature_reflects_real_differences(
        matches in prop::collection::vec(match_pattern(), 1..4),
    ) {
        let base = ContentScriptOptions {
            matches: matches.clone(),
            ..Default::default()
        };
        let different = ContentScriptOptions {
            matches,
            all_frames: Some(true),
            ..Default::default()
        };

        prop_assert_ne!(
            group_signature(&resolve_options(&base)),
            group_signature(&resolve_options(&different))
        );
    }
}
