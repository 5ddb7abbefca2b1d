// Language profile table
// Built-in compile/run recipes, optionally overridden from a languages.json file.

use coderunner_common::config::RunnerConfig;
use coderunner_common::types::Language;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RunnerError, RunnerResult};

/// How to build and run one language inside a sandbox
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageProfile {
    pub image: String,
    /// `None` for interpreted languages: the compile stage is skipped.
    pub compile_command: Option<String>,
    pub run_command: String,
    pub source_filename: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse languages file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unknown language '{0}' in languages file")]
    UnknownLanguage(String),

    #[error("Language '{0}' is configured more than once")]
    Duplicate(String),

    #[error("Invalid profile for '{language}': {reason}")]
    Invalid { language: Language, reason: String },
}

#[derive(Debug, Deserialize)]
struct LanguagesFile {
    languages: Vec<ProfileOverride>,
}

#[derive(Debug, Deserialize)]
struct ProfileOverride {
    name: String,
    image: Option<String>,
    compile_command: Option<String>,
    run_command: Option<String>,
    source_filename: Option<String>,
}

/// One profile per `Language` variant. Lookups are an exhaustive match, so a
/// new variant cannot ship without a profile.
#[derive(Debug, Clone)]
pub struct ProfileTable {
    python: LanguageProfile,
    java: LanguageProfile,
    cpp: LanguageProfile,
}

impl ProfileTable {
    /// Built-in profiles, all pointing at `default_image`
    pub fn builtin(default_image: &str) -> Self {
        let image = default_image.to_string();
        Self {
            python: LanguageProfile {
                image: image.clone(),
                compile_command: None,
                run_command: "python3 main.py".to_string(),
                source_filename: "main.py".to_string(),
            },
            java: LanguageProfile {
                image: image.clone(),
                compile_command: Some("javac Main.java".to_string()),
                run_command: "java Main".to_string(),
                source_filename: "Main.java".to_string(),
            },
            cpp: LanguageProfile {
                image,
                compile_command: Some("g++ -O2 -std=gnu++17 main.cpp -o main.out".to_string()),
                run_command: "./main.out".to_string(),
                source_filename: "main.cpp".to_string(),
            },
        }
    }

    /// Built-ins plus the overrides file named in the config, validated
    pub fn load(config: &RunnerConfig) -> Result<Self, ProfileError> {
        let mut table = Self::builtin(&config.default_image);
        if let Some(path) = &config.languages_file {
            table.apply_overrides_file(path)?;
        }
        table.validate()?;
        Ok(table)
    }

    pub fn apply_overrides_file(&mut self, path: &Path) -> Result<(), ProfileError> {
        let content = fs::read_to_string(path).map_err(|source| ProfileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.apply_overrides(&content)
    }

    pub fn apply_overrides(&mut self, json: &str) -> Result<(), ProfileError> {
        let file: LanguagesFile = serde_json::from_str(json)?;
        let mut seen = HashSet::new();

        for entry in file.languages {
            let language: Language = entry
                .name
                .parse()
                .map_err(ProfileError::UnknownLanguage)?;
            if !seen.insert(language) {
                return Err(ProfileError::Duplicate(language.to_string()));
            }

            let profile = self.get_mut(language);
            if let Some(image) = entry.image {
                profile.image = image;
            }
            if let Some(compile) = entry.compile_command {
                // An explicit empty string disables compilation
                profile.compile_command = Some(compile).filter(|c| !c.trim().is_empty());
            }
            if let Some(run) = entry.run_command {
                profile.run_command = run;
            }
            if let Some(source) = entry.source_filename {
                profile.source_filename = source;
            }
        }

        self.validate()
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        for (language, profile) in self.iter() {
            let invalid = |reason: &str| ProfileError::Invalid {
                language,
                reason: reason.to_string(),
            };

            if profile.image.trim().is_empty() {
                return Err(invalid("image is empty"));
            }
            if profile.run_command.trim().is_empty() {
                return Err(invalid("run_command is empty"));
            }
            let name = profile.source_filename.as_str();
            if name.is_empty() || name.contains('/') || name == "." || name == ".." {
                return Err(invalid("source_filename must be a plain file name"));
            }
            if name.starts_with("input_") {
                return Err(invalid("source_filename collides with staged test inputs"));
            }
        }
        Ok(())
    }

    pub fn get(&self, language: Language) -> &LanguageProfile {
        match language {
            Language::Python => &self.python,
            Language::Java => &self.java,
            Language::Cpp => &self.cpp,
        }
    }

    fn get_mut(&mut self, language: Language) -> &mut LanguageProfile {
        match language {
            Language::Python => &mut self.python,
            Language::Java => &mut self.java,
            Language::Cpp => &mut self.cpp,
        }
    }

    /// Resolve a request's language identifier
    pub fn resolve(&self, language: &str) -> RunnerResult<(Language, &LanguageProfile)> {
        let language: Language = language
            .parse()
            .map_err(|_| RunnerError::UnsupportedLanguage(language.to_string()))?;
        Ok((language, self.get(language)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Language, &LanguageProfile)> {
        Language::ALL.into_iter().map(move |lang| (lang, self.get(lang)))
    }
}
