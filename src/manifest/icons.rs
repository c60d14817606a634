// src/manifest/icons.rs

//! Icon discovery among public assets.
//!
//! The `icons` manifest field is filled by matching public-asset filenames
//! against a fixed regex set and mapping the captured size to the asset
//! path. Users can always override the result via the manifest fragment.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::build::output::OutputFile;

fn icon_regexes() -> &'static [Regex] {
    static SET: OnceLock<Vec<Regex>> = OnceLock::new();
    SET.get_or_init(|| {
        [
            r"^icon-?(\d+)\.png$",
            r"^icon@(\d+)\.png$",
            r"^icons?/(\d+)\.png$",
            r"^icons?/icon-?(\d+)\.png$",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("icon regexes are valid"))
        .collect()
    })
}

/// Map icon size → bundle-relative path for every matching public asset.
pub fn discover_icons(public_assets: &[OutputFile]) -> BTreeMap<u64, String> {
    let mut icons = BTreeMap::new();

    for asset in public_assets {
        let name = asset.file_name();
        for re in icon_regexes() {
            if let Some(caps) = re.captures(name) {
                if let Ok(size) = caps[1].parse::<u64>() {
                    icons.entry(size).or_insert_with(|| name.to_string());
                }
                break;
            }
        }
    }

    icons
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(name: &str) -> OutputFile {
        OutputFile::Asset {
            file_name: name.to_string(),
        }
    }

    #[test]
    fn discovers_common_layouts() {
        let assets = vec![
            asset("icon-16.png"),
            asset("icon/32.png"),
            asset("icons/icon-48.png"),
            asset("icon128.png"),
            asset("logo.svg"),
        ];

        let icons = discover_icons(&assets);
        assert_eq!(icons.get(&16).map(String::as_str), Some("icon-16.png"));
        assert_eq!(icons.get(&32).map(String::as_str), Some("icon/32.png"));
        assert_eq!(icons.get(&48).map(String::as_str), Some("icons/icon-48.png"));
        assert_eq!(icons.get(&128).map(String::as_str), Some("icon128.png"));
        assert_eq!(icons.len(), 4);
    }

    #[test]
    fn first_match_per_size_wins() {
        let assets = vec![asset("icon-16.png"), asset("icon/16.png")];
        let icons = discover_icons(&assets);
        assert_eq!(icons.get(&16).map(String::as_str), Some("icon-16.png"));
    }
}
