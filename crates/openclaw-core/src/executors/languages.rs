//! Language registry: which toolchain runs which snippet.
//!
//! Every supported language is one [`LanguageStrategy`], looked up by its
//! canonical id or any alias after trimming and lowercasing. Aliases point at
//! the same entry, so `py`, `python3` and `python` resolve to one object.

use serde::Serialize;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::{OpenClawError, SandboxError};

/// Turns the scratch file path into a shell command fragment.
pub type CommandTemplate = fn(&str) -> String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionKind {
    Interpreted,
    Compiled,
}

pub enum Toolchain {
    Interpreted {
        run: CommandTemplate,
    },
    /// `build` is `None` for runtimes that compile and clean up on their own
    /// (`go run`, `java` in source-file mode).
    Compiled {
        build: Option<CommandTemplate>,
        run: CommandTemplate,
        artifact_suffixes: &'static [&'static str],
    },
}

pub struct LanguageStrategy {
    pub id: &'static str,
    pub aliases: &'static [&'static str],
    pub extension: &'static str,
    /// Executables the commands need, used for availability reporting.
    pub binaries: &'static [&'static str],
    pub toolchain: Toolchain,
}

impl LanguageStrategy {
    pub fn kind(&self) -> ExecutionKind {
        match self.toolchain {
            Toolchain::Interpreted { .. } => ExecutionKind::Interpreted,
            Toolchain::Compiled { .. } => ExecutionKind::Compiled,
        }
    }

    /// Full shell command for `path`. Compiled strategies chain
    /// `build && run` so a failed build never reaches the run step.
    pub fn run_command(&self, path: &Path) -> String {
        let file = path.to_string_lossy();
        match &self.toolchain {
            Toolchain::Interpreted { run } => run(&file),
            Toolchain::Compiled {
                build: Some(build),
                run,
                ..
            } => format!("{} && {}", build(&file), run(&file)),
            Toolchain::Compiled {
                build: None, run, ..
            } => run(&file),
        }
    }

    /// Files besides the source that a run may leave behind.
    pub fn artifact_paths(&self, path: &Path) -> Vec<PathBuf> {
        match &self.toolchain {
            Toolchain::Interpreted { .. } => Vec::new(),
            Toolchain::Compiled {
                artifact_suffixes, ..
            } => artifact_suffixes
                .iter()
                .map(|suffix| {
                    let mut artifact = path.as_os_str().to_os_string();
                    artifact.push(suffix);
                    PathBuf::from(artifact)
                })
                .collect(),
        }
    }

    /// Whether every toolchain binary is reachable through `search_path`.
    pub fn is_available(&self, search_path: &OsStr, cwd: &Path) -> bool {
        self.binaries
            .iter()
            .all(|binary| which::which_in(binary, Some(search_path), cwd).is_ok())
    }
}

impl fmt::Debug for LanguageStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LanguageStrategy")
            .field("id", &self.id)
            .field("aliases", &self.aliases)
            .field("extension", &self.extension)
            .field("kind", &self.kind())
            .finish()
    }
}

fn builtin_strategies() -> Vec<LanguageStrategy> {
    vec![
        LanguageStrategy {
            id: "python",
            aliases: &["python3", "py"],
            extension: "py",
            binaries: &["python3"],
            toolchain: Toolchain::Interpreted {
                run: |f| format!("python3 {}", f),
            },
        },
        LanguageStrategy {
            id: "javascript",
            aliases: &["js", "node"],
            extension: "js",
            binaries: &["node"],
            toolchain: Toolchain::Interpreted {
                run: |f| format!("node {}", f),
            },
        },
        LanguageStrategy {
            id: "typescript",
            aliases: &["ts"],
            extension: "ts",
            binaries: &["npx"],
            toolchain: Toolchain::Interpreted {
                run: |f| format!("npx --yes tsx {}", f),
            },
        },
        LanguageStrategy {
            id: "bash",
            aliases: &["sh", "shell"],
            extension: "sh",
            binaries: &["bash"],
            toolchain: Toolchain::Interpreted {
                run: |f| format!("bash {}", f),
            },
        },
        LanguageStrategy {
            id: "zsh",
            aliases: &[],
            extension: "zsh",
            binaries: &["zsh"],
            toolchain: Toolchain::Interpreted {
                run: |f| format!("zsh {}", f),
            },
        },
        LanguageStrategy {
            id: "ruby",
            aliases: &["rb"],
            extension: "rb",
            binaries: &["ruby"],
            toolchain: Toolchain::Interpreted {
                run: |f| format!("ruby {}", f),
            },
        },
        LanguageStrategy {
            id: "php",
            aliases: &[],
            extension: "php",
            binaries: &["php"],
            toolchain: Toolchain::Interpreted {
                run: |f| format!("php {}", f),
            },
        },
        LanguageStrategy {
            id: "perl",
            aliases: &["pl"],
            extension: "pl",
            binaries: &["perl"],
            toolchain: Toolchain::Interpreted {
                run: |f| format!("perl {}", f),
            },
        },
        LanguageStrategy {
            id: "lua",
            aliases: &[],
            extension: "lua",
            binaries: &["lua"],
            toolchain: Toolchain::Interpreted {
                run: |f| format!("lua {}", f),
            },
        },
        LanguageStrategy {
            id: "r",
            aliases: &[],
            extension: "r",
            binaries: &["Rscript"],
            toolchain: Toolchain::Interpreted {
                run: |f| format!("Rscript {}", f),
            },
        },
        LanguageStrategy {
            id: "c",
            aliases: &[],
            extension: "c",
            binaries: &["gcc"],
            toolchain: Toolchain::Compiled {
                build: Some(|f| format!("gcc {} -o {}.out -lm", f, f)),
                run: |f| format!("{}.out", f),
                artifact_suffixes: &[".out"],
            },
        },
        LanguageStrategy {
            id: "cpp",
            aliases: &["c++"],
            extension: "cpp",
            binaries: &["g++"],
            toolchain: Toolchain::Compiled {
                build: Some(|f| format!("g++ -std=c++17 {} -o {}.out", f, f)),
                run: |f| format!("{}.out", f),
                artifact_suffixes: &[".out"],
            },
        },
        LanguageStrategy {
            id: "go",
            aliases: &["golang"],
            extension: "go",
            binaries: &["go"],
            toolchain: Toolchain::Compiled {
                build: None,
                run: |f| format!("go run {}", f),
                artifact_suffixes: &[],
            },
        },
        LanguageStrategy {
            id: "rust",
            aliases: &["rs"],
            extension: "rs",
            binaries: &["rustc"],
            toolchain: Toolchain::Compiled {
                build: Some(|f| format!("rustc {} -o {}.out", f, f)),
                run: |f| format!("{}.out", f),
                artifact_suffixes: &[".out"],
            },
        },
        LanguageStrategy {
            id: "swift",
            aliases: &[],
            extension: "swift",
            binaries: &["swiftc"],
            toolchain: Toolchain::Compiled {
                build: Some(|f| format!("swiftc {} -o {}.out", f, f)),
                run: |f| format!("{}.out", f),
                artifact_suffixes: &[".out"],
            },
        },
        LanguageStrategy {
            id: "java",
            aliases: &[],
            extension: "java",
            binaries: &["java"],
            toolchain: Toolchain::Compiled {
                build: None,
                run: |f| format!("java {}", f),
                artifact_suffixes: &[],
            },
        },
        LanguageStrategy {
            id: "kotlin",
            aliases: &["kt", "kts"],
            extension: "kt",
            binaries: &["kotlinc", "java"],
            toolchain: Toolchain::Compiled {
                build: Some(|f| format!("kotlinc {} -include-runtime -d {}.jar", f, f)),
                run: |f| format!("java -jar {}.jar", f),
                artifact_suffixes: &[".jar"],
            },
        },
    ]
}

/// Lookup table from normalized language id to strategy, built once.
#[derive(Debug)]
pub struct LanguageRegistry {
    strategies: Vec<LanguageStrategy>,
    index: HashMap<&'static str, usize>,
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageRegistry {
    /// Registry with every built-in language.
    pub fn new() -> Self {
        Self::from_strategies(builtin_strategies())
    }

    /// Registry restricted to the given canonical ids. An empty list keeps
    /// every language; an id that is not built in is a configuration error.
    pub fn with_allowed(allowed: &[String]) -> Result<Self, OpenClawError> {
        if allowed.is_empty() {
            return Ok(Self::new());
        }

        let wanted: Vec<String> = allowed.iter().map(|id| normalize(id)).collect();
        let builtin = builtin_strategies();
        for id in &wanted {
            if !builtin.iter().any(|s| s.id == id) {
                return Err(OpenClawError::ConfigError(format!(
                    "allowed_languages contains unknown language '{}'",
                    id
                )));
            }
        }

        Ok(Self::from_strategies(
            builtin
                .into_iter()
                .filter(|s| wanted.iter().any(|id| id == s.id))
                .collect(),
        ))
    }

    fn from_strategies(strategies: Vec<LanguageStrategy>) -> Self {
        let mut index = HashMap::new();
        for (position, strategy) in strategies.iter().enumerate() {
            index.insert(strategy.id, position);
            for alias in strategy.aliases {
                index.insert(*alias, position);
            }
        }
        Self { strategies, index }
    }

    pub fn resolve(&self, language: &str) -> Result<&LanguageStrategy, SandboxError> {
        let normalized = normalize(language);
        self.index
            .get(normalized.as_str())
            .map(|&position| &self.strategies[position])
            .ok_or_else(|| SandboxError::UnsupportedLanguage {
                language: language.trim().to_string(),
                supported: self.supported_ids(),
            })
    }

    /// Canonical ids in registry order.
    pub fn supported_ids(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.id.to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LanguageStrategy> {
        self.strategies.iter()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

pub fn normalize(language: &str) -> String {
    language.trim().to_lowercase()
}
