use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Snapshot of the codebase surrounding a batch of errors. Built once per
/// analysis call and read-only during analysis. A missing context degrades
/// to `empty()` rather than failing the analysis.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CodebaseContext {
    pub files: Vec<String>,
    pub dependencies: HashMap<String, Vec<String>>,
    pub dependents: HashMap<String, Vec<String>>,
    pub relevance: HashMap<String, f64>,
}

impl CodebaseContext {
    pub fn empty() -> Self {
        Self::default()
    }
}

const SOURCE_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "py", "rs"];
const IGNORE_PATTERNS: &[&str] = &[
    "**/node_modules/**",
    "**/target/**",
    "**/.git/**",
    "**/dist/**",
    "**/build/**",
    "**/vendor/**",
    "**/__pycache__/**",
];

/// Walks a project root, extracts per-file import edges, and derives the
/// dependency graph plus a relevance score per file.
pub struct ContextBuilder {
    root: PathBuf,
    js_import: Regex,
    py_import: Regex,
    rs_mod: Regex,
}

impl ContextBuilder {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        Ok(Self {
            root: root.as_ref().to_path_buf(),
            js_import: Regex::new(
                r#"(?m)^\s*(?:import\s+[^'"]*?from\s*|import\s*|export\s+[^'"]*?from\s*|require\()\s*['"]([^'"]+)['"]"#,
            )?,
            py_import: Regex::new(r"(?m)^\s*(?:from\s+([\w.]+)\s+import|import\s+([\w.]+))")?,
            rs_mod: Regex::new(r"(?m)^\s*(?:pub\s+)?mod\s+(\w+)\s*;")?,
        })
    }

    pub fn build(&self) -> Result<CodebaseContext> {
        let ignores: Vec<glob::Pattern> = IGNORE_PATTERNS
            .iter()
            .filter_map(|p| glob::Pattern::new(p).ok())
            .collect();

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if ignores.iter().any(|p| p.matches_path(path)) {
                continue;
            }
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if !SOURCE_EXTENSIONS.contains(&ext) {
                continue;
            }
            if let Some(relative) = self.relative(path) {
                files.push(relative);
            }
        }
        files.sort();

        let mut dependencies: HashMap<String, Vec<String>> = HashMap::new();
        for file in &files {
            let content = match std::fs::read_to_string(self.root.join(file)) {
                Ok(content) => content,
                Err(_) => continue,
            };
            let targets = self.resolve_imports(file, &content, &files);
            if !targets.is_empty() {
                dependencies.insert(file.clone(), targets);
            }
        }

        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        for (file, targets) in &dependencies {
            for target in targets {
                dependents.entry(target.clone()).or_default().push(file.clone());
            }
        }
        for list in dependents.values_mut() {
            list.sort();
            list.dedup();
        }

        let mut relevance = HashMap::new();
        for file in &files {
            let fan_in = dependents.get(file).map(|d| d.len()).unwrap_or(0);
            let fan_out = dependencies.get(file).map(|d| d.len()).unwrap_or(0);
            let stem = Path::new(file)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("");
            let entry_bonus = if matches!(stem, "main" | "index" | "app" | "lib" | "mod") {
                15.0
            } else {
                0.0
            };
            let score = (fan_in as f64 * 10.0 + fan_out as f64 * 2.0 + entry_bonus).min(100.0);
            relevance.insert(file.clone(), score);
        }

        Ok(CodebaseContext {
            files,
            dependencies,
            dependents,
            relevance,
        })
    }

    fn relative(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        Some(relative.to_string_lossy().replace('\\', "/"))
    }

    fn resolve_imports(&self, file: &str, content: &str, files: &[String]) -> Vec<String> {
        let ext = Path::new(file)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        let dir = Path::new(file)
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut targets = Vec::new();
        match ext {
            "js" | "jsx" | "ts" | "tsx" => {
                for caps in self.js_import.captures_iter(content) {
                    let spec = &caps[1];
                    // Only relative specifiers can point at in-repo files.
                    if !spec.starts_with('.') {
                        continue;
                    }
                    if let Some(target) = resolve_relative(&dir, spec, files) {
                        targets.push(target);
                    }
                }
            }
            "py" => {
                for caps in self.py_import.captures_iter(content) {
                    let module = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str());
                    let Some(module) = module else { continue };
                    let candidate = module.trim_start_matches('.').replace('.', "/") + ".py";
                    if files.contains(&candidate) {
                        targets.push(candidate);
                    } else {
                        let local = join_paths(&dir, &candidate);
                        if files.contains(&local) {
                            targets.push(local);
                        }
                    }
                }
            }
            "rs" => {
                for caps in self.rs_mod.captures_iter(content) {
                    let name = &caps[1];
                    for candidate in [
                        join_paths(&dir, &format!("{}.rs", name)),
                        join_paths(&dir, &format!("{}/mod.rs", name)),
                    ] {
                        if files.contains(&candidate) {
                            targets.push(candidate);
                            break;
                        }
                    }
                }
            }
            _ => {}
        }

        targets.sort();
        targets.dedup();
        targets.retain(|t| t != file);
        targets
    }
}

fn resolve_relative(dir: &str, spec: &str, files: &[String]) -> Option<String> {
    let joined = join_paths(dir, spec);
    let candidates = [
        joined.clone(),
        format!("{}.js", joined),
        format!("{}.jsx", joined),
        format!("{}.ts", joined),
        format!("{}.tsx", joined),
        format!("{}/index.js", joined),
        format!("{}/index.ts", joined),
    ];
    candidates.into_iter().find(|c| files.contains(c))
}

/// Lexically join and normalize `dir` + `spec`, resolving `.` and `..`
/// components without touching the filesystem.
fn join_paths(dir: &str, spec: &str) -> String {
    let mut parts: Vec<&str> = if dir.is_empty() {
        Vec::new()
    } else {
        dir.split('/').collect()
    };

    for component in spec.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    parts.join("/")
}
