use std::path::Path;
use std::sync::Arc;
use stowage_base::location::normalize_separators;
use stowage_base::HashMap;

/// Languages with their own resource folder
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Language {
    English,
    Japanese,
    ChineseSimplified,
    ChineseTraditional,
    Korean,
    French,
    German,
    Spanish,
    Italian,
    Portuguese,
    Russian,
}

impl Language {
    /// Name of the folder that holds this language's resources
    pub fn folder_name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Japanese => "Japanese",
            Language::ChineseSimplified => "ChineseSimplified",
            Language::ChineseTraditional => "ChineseTraditional",
            Language::Korean => "Korean",
            Language::French => "French",
            Language::German => "German",
            Language::Spanish => "Spanish",
            Language::Italian => "Italian",
            Language::Portuguese => "Portuguese",
            Language::Russian => "Russian",
        }
    }

    /// Accepts POSIX and BCP 47 style tags: `ja`, `ja_JP.UTF-8`, `zh-Hant-TW`, `pt_BR`
    pub fn from_locale_tag(tag: &str) -> Option<Language> {
        let tag = tag
            .split(|c: char| c == '.' || c == '@')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        let mut parts = tag.split(|c: char| c == '_' || c == '-');
        let primary = parts.next().unwrap_or_default();
        let rest: Vec<&str> = parts.collect();

        let language = match primary {
            "en" => Language::English,
            "ja" => Language::Japanese,
            "zh" => {
                let traditional = rest
                    .iter()
                    .any(|p| matches!(*p, "hant" | "tw" | "hk" | "mo"));
                if traditional {
                    Language::ChineseTraditional
                } else {
                    Language::ChineseSimplified
                }
            }
            "ko" => Language::Korean,
            "fr" => Language::French,
            "de" => Language::German,
            "es" => Language::Spanish,
            "it" => Language::Italian,
            "pt" => Language::Portuguese,
            "ru" => Language::Russian,
            _ => return None,
        };

        Some(language)
    }
}

/// Which language folder a localized resource is read from
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LanguageSelection {
    /// Follow the current system locale
    System,
    Explicit(Language),
}

impl LanguageSelection {
    pub fn resolve(&self) -> Option<Language> {
        match self {
            LanguageSelection::System => system_language(),
            LanguageSelection::Explicit(language) => Some(*language),
        }
    }
}

/// Language of the current process locale, checked in POSIX order (`LC_ALL`, `LC_MESSAGES`,
/// `LANG`)
pub fn system_language() -> Option<Language> {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.is_empty())
        .and_then(|value| Language::from_locale_tag(&value))
}

/// Builds the registry key for a resource, prefixing the language folder when one applies
pub fn localized_key(
    path: &str,
    language: Option<Language>,
) -> String {
    let path = normalize_key(path);
    match language {
        Some(language) => format!("{}/{}", language.folder_name(), path),
        None => path,
    }
}

fn normalize_key(path: &str) -> String {
    normalize_separators(path).trim_start_matches('/').to_string()
}

/// In-process resources addressed by path. Localized copies live under a language folder, for
/// example `Japanese/ui/title.txt`.
#[derive(Default)]
pub struct ResourceRegistry {
    entries: HashMap<String, Arc<[u8]>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn insert(
        &mut self,
        path: &str,
        data: impl Into<Arc<[u8]>>,
    ) -> Option<Arc<[u8]>> {
        self.entries.insert(normalize_key(path), data.into())
    }

    pub fn remove(
        &mut self,
        path: &str,
    ) -> Option<Arc<[u8]>> {
        self.entries.remove(&normalize_key(path))
    }

    pub fn contains(
        &self,
        path: &str,
    ) -> bool {
        self.entries.contains_key(&normalize_key(path))
    }

    pub fn get(
        &self,
        path: &str,
    ) -> Option<Arc<[u8]>> {
        self.entries.get(&normalize_key(path)).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registers every file below `root`, keyed by its path relative to `root`. Returns how many
    /// files were added.
    #[profiling::function]
    pub fn insert_directory(
        &mut self,
        root: &Path,
    ) -> std::io::Result<usize> {
        let mut added = 0;
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in std::fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.is_dir() {
                    pending.push(path);
                    continue;
                }

                let relative = match path.strip_prefix(root) {
                    Ok(relative) => relative.to_string_lossy().to_string(),
                    Err(_) => continue,
                };
                let data = std::fs::read(&path)?;
                log::trace!("register resource {}", relative);
                self.insert(&relative, data);
                added += 1;
            }
        }

        log::debug!("registered {} resources from {:?}", added, root);
        Ok(added)
    }
}
