//! Mixin discovery on disk
//!
//! Mixin directories and file globs are scanned before a document is
//! expanded. Stylesheet libraries (`.css`, `.pcss`, `.sss`) contribute their
//! `@define-mixin` rules; any other file is a module and is handed to a
//! [`ModuleLoader`], named after its file stem.
//!
//! Every file read is reported as a [`Message::Dependency`] and every
//! directory as a [`Message::DirDependency`], so a build tool can watch them.

use crate::config::{Keywords, Options};
use crate::expand::{definitions_in, Mixin};
use crate::parser::{parse_file, ParseError};
use crate::sugarss::parse_indented_file;
use dashmap::DashMap;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

/// Files picked up from each mixin directory
pub const DIR_GLOB: &str = "*.{js,cjs,mjs,json,css,sss,pcss}";

/// A file or directory the result depends on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A file that was read. Its parent is the configured parent for files
    /// found by discovery, or the module that required it.
    Dependency {
        file: PathBuf,
        parent: Option<PathBuf>,
    },
    /// A scanned directory and the glob it was scanned with
    DirDependency {
        dir: PathBuf,
        glob: String,
        parent: Option<PathBuf>,
    },
}

/// Discovery errors. A failing source is logged and skipped.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to scan {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("invalid glob pattern '{pattern}': {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no loader for module {path}")]
    UnsupportedModule { path: PathBuf },
}

impl DiscoveryError {
    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| DiscoveryError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

// ============ Module loading ============

/// A mixin module and the files it pulled in
#[derive(Debug, Clone)]
pub struct LoadedModule {
    pub mixin: Mixin,
    pub dependencies: Vec<PathBuf>,
}

impl LoadedModule {
    pub fn new(mixin: Mixin) -> Self {
        Self {
            mixin,
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, path: impl Into<PathBuf>) -> Self {
        self.dependencies.push(path.into());
        self
    }
}

/// Loads mixin modules: every discovered file that is not a stylesheet
pub trait ModuleLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<LoadedModule, DiscoveryError>;

    /// Forget anything cached for `path` before its module is loaded again
    fn invalidate(&self, _path: &Path) {}
}

/// Reads `.json` modules as data objects
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonModuleLoader;

impl ModuleLoader for JsonModuleLoader {
    fn load(&self, path: &Path) -> Result<LoadedModule, DiscoveryError> {
        if extension(path) != "json" {
            return Err(DiscoveryError::UnsupportedModule {
                path: path.to_path_buf(),
            });
        }
        let text = fs::read_to_string(path).map_err(DiscoveryError::io(path))?;
        let value = serde_json::from_str(&text).map_err(|source| DiscoveryError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(LoadedModule::new(Mixin::from_value(value)))
    }
}

/// Serves modules registered up front, falling back to JSON files
#[derive(Debug, Default)]
pub struct StaticModuleLoader {
    modules: DashMap<PathBuf, LoadedModule>,
    fallback: JsonModuleLoader,
}

impl StaticModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, path: impl Into<PathBuf>, module: LoadedModule) {
        self.modules.insert(path.into(), module);
    }

    pub fn with_module(self, path: impl Into<PathBuf>, module: LoadedModule) -> Self {
        self.register(path, module);
        self
    }
}

impl ModuleLoader for StaticModuleLoader {
    fn load(&self, path: &Path) -> Result<LoadedModule, DiscoveryError> {
        match self.modules.get(path) {
            Some(module) => Ok(module.clone()),
            None => self.fallback.load(path),
        }
    }
}

// ============ Discovery ============

/// Mixins found on disk, in the order they should be merged
#[derive(Debug, Default)]
pub struct Discovered {
    pub mixins: Vec<(String, Mixin)>,
    pub messages: Vec<Message>,
}

/// What one file contributed, as of its modification time
#[derive(Debug)]
struct CachedFile {
    modified: SystemTime,
    mixins: Vec<(String, Mixin)>,
    dependencies: Vec<PathBuf>,
}

/// Scans the configured mixin sources. Parsed files are cached until their
/// modification time changes.
pub struct Discovery {
    dirs: Vec<PathBuf>,
    files: Vec<String>,
    parent: Option<PathBuf>,
    keywords: Keywords,
    loader: Arc<dyn ModuleLoader>,
    cache: DashMap<PathBuf, Arc<CachedFile>>,
}

impl Discovery {
    /// Discovery with the default JSON loader
    pub fn new(options: &Options) -> Self {
        Self::with_loader(options, Arc::new(JsonModuleLoader))
    }

    pub fn with_loader(options: &Options, loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            dirs: options.mixins_dir.clone(),
            files: options.mixins_files.clone(),
            parent: options.parent.clone(),
            keywords: options.rules.clone(),
            loader,
            cache: DashMap::new(),
        }
    }

    /// Whether no source is configured
    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty() && self.files.is_empty()
    }

    /// Number of files currently cached
    pub fn cached_files(&self) -> usize {
        self.cache.len()
    }

    /// Scan directories, then file globs. Later files override earlier ones
    /// when merged in order. Reported paths are absolute.
    pub fn discover(&self) -> Discovered {
        let mut found = Discovered::default();
        let mut seen = HashSet::new();

        for dir in &self.dirs {
            found.messages.push(Message::DirDependency {
                dir: absolute(dir),
                glob: DIR_GLOB.to_string(),
                parent: None,
            });
            match dir_files(dir) {
                Ok(files) => {
                    for file in files {
                        let file = absolute(&file);
                        self.load_file(&file, &mut found);
                        seen.insert(file);
                    }
                }
                Err(error) => warn!(dir = %dir.display(), %error, "skipping mixin directory"),
            }
        }

        for pattern in &self.files {
            match glob_files(pattern) {
                Ok(files) => {
                    for file in files {
                        let file = absolute(&file);
                        self.load_file(&file, &mut found);
                        seen.insert(file);
                    }
                }
                Err(error) => warn!(%pattern, %error, "skipping mixin files"),
            }
        }

        // Files gone from every source
        self.cache.retain(|path, _| seen.contains(path));

        found
    }

    fn load_file(&self, path: &Path, found: &mut Discovered) {
        found.messages.push(Message::Dependency {
            file: path.to_path_buf(),
            parent: self.parent.clone(),
        });

        match self.load_cached(path) {
            Ok(entry) => {
                for dependency in &entry.dependencies {
                    found.messages.push(Message::Dependency {
                        file: dependency.clone(),
                        parent: Some(path.to_path_buf()),
                    });
                }
                found.mixins.extend(entry.mixins.iter().cloned());
            }
            Err(error) => warn!(path = %path.display(), %error, "skipping mixin source"),
        }
    }

    fn load_cached(&self, path: &Path) -> Result<Arc<CachedFile>, DiscoveryError> {
        let modified = fs::metadata(path)
            .and_then(|meta| meta.modified())
            .map_err(DiscoveryError::io(path))?;

        let fresh = self
            .cache
            .get(path)
            .filter(|entry| entry.modified == modified)
            .map(|entry| Arc::clone(&*entry));
        if let Some(entry) = fresh {
            trace!(path = %path.display(), "mixin source unchanged");
            return Ok(entry);
        }

        if let Some((_, stale)) = self.cache.remove(path) {
            for dependency in &stale.dependencies {
                self.loader.invalidate(dependency);
            }
            self.loader.invalidate(path);
        }

        let entry = Arc::new(self.read(path, modified)?);
        self.cache.insert(path.to_path_buf(), Arc::clone(&entry));
        Ok(entry)
    }

    fn read(&self, path: &Path, modified: SystemTime) -> Result<CachedFile, DiscoveryError> {
        let ext = extension(path);
        if matches!(ext.as_str(), "css" | "pcss" | "sss") {
            let text = fs::read_to_string(path).map_err(DiscoveryError::io(path))?;
            let parsed = if ext == "sss" {
                parse_indented_file(&text, path)
            } else {
                parse_file(&text, path)
            };
            let root = parsed.map_err(|source| DiscoveryError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

            let mixins: Vec<(String, Mixin)> = definitions_in(&root, &self.keywords)
                .into_iter()
                .map(|definition| (definition.name.clone(), Mixin::Template(Arc::new(definition))))
                .collect();
            debug!(path = %path.display(), definitions = mixins.len(), "loaded mixin library");

            return Ok(CachedFile {
                modified,
                mixins,
                dependencies: Vec::new(),
            });
        }

        let module = self.loader.load(path)?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!(path = %path.display(), %name, kind = module.mixin.type_name(), "loaded mixin module");

        Ok(CachedFile {
            modified,
            mixins: vec![(name, module.mixin)],
            dependencies: module.dependencies,
        })
    }
}

// ============ File matching ============

/// `path` joined onto the working directory when relative
fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn extension(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn build_globset(pattern: &str) -> Result<GlobSet, DiscoveryError> {
    let to_error = |source| DiscoveryError::Glob {
        pattern: pattern.to_string(),
        source,
    };
    let glob = GlobBuilder::new(pattern)
        .case_insensitive(true)
        .literal_separator(true)
        .build()
        .map_err(to_error)?;
    let mut builder = GlobSetBuilder::new();
    builder.add(glob);
    builder.build().map_err(to_error)
}

/// Files directly inside `dir` matching [`DIR_GLOB`], sorted
fn dir_files(dir: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    let set = build_globset(DIR_GLOB)?;
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|source| DiscoveryError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() && set.is_match(entry.file_name()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Files matching a glob, walked from the glob's literal prefix, sorted
fn glob_files(pattern: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    let pattern = pattern.strip_prefix("./").unwrap_or(pattern);
    let set = build_globset(pattern)?;
    let root = glob_root(pattern);
    let mut files = Vec::new();
    for entry in WalkDir::new(&root).follow_links(true) {
        let entry = entry.map_err(|source| DiscoveryError::Walk {
            path: root.clone(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let candidate = path.strip_prefix(".").unwrap_or(path);
        if set.is_match(candidate) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

/// The directory part of a glob before its first wildcard
fn glob_root(pattern: &str) -> PathBuf {
    let Some(first_meta) = pattern.find(['*', '?', '[', '{']) else {
        let path = Path::new(pattern);
        return match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
    };

    let prefix = &pattern[..first_meta];
    match prefix.rfind(['/', '\\']) {
        Some(idx) => PathBuf::from(&prefix[..=idx]),
        None => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Records every path it is asked to forget
    #[derive(Default)]
    struct RecordingLoader {
        inner: StaticModuleLoader,
        invalidated: Mutex<Vec<PathBuf>>,
    }

    impl ModuleLoader for RecordingLoader {
        fn load(&self, path: &Path) -> Result<LoadedModule, DiscoveryError> {
            self.inner.load(path)
        }

        fn invalidate(&self, path: &Path) {
            self.invalidated.lock().unwrap().push(path.to_path_buf());
        }
    }

    fn touch(path: &Path) {
        let later = SystemTime::now() + Duration::from_secs(60);
        fs::File::options().write(true).open(path).unwrap().set_modified(later).unwrap();
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn names(found: &Discovered) -> Vec<&str> {
        found.mixins.iter().map(|(name, _)| name.as_str()).collect()
    }

    #[test]
    fn test_glob_root() {
        assert_eq!(glob_root("mixins/*.css"), PathBuf::from("mixins/"));
        assert_eq!(glob_root("a/b/**/*.css"), PathBuf::from("a/b/"));
        assert_eq!(glob_root("*.css"), PathBuf::from("."));
        assert_eq!(glob_root("lib/mixins.css"), PathBuf::from("lib"));
        assert_eq!(glob_root("mixins.css"), PathBuf::from("."));
    }

    #[test]
    fn test_dir_routing_and_messages() {
        let dir = TempDir::new().unwrap();
        let a = write(dir.path(), "a.json", r#"{ "a": "1" }"#);
        let c = write(dir.path(), "c.CSS", "@define-mixin c { c: 3 }");
        let d = write(dir.path(), "d.sss", "@define-mixin d\n  d: 4\n");
        write(dir.path(), "notes.txt", "ignored");

        let options = Options::new().with_mixins_dir(dir.path());
        let found = Discovery::new(&options).discover();

        assert_eq!(names(&found), vec!["a", "c", "d"]);
        assert_eq!(
            found.messages,
            vec![
                Message::DirDependency {
                    dir: dir.path().to_path_buf(),
                    glob: DIR_GLOB.to_string(),
                    parent: None,
                },
                Message::Dependency { file: a, parent: None },
                Message::Dependency { file: c, parent: None },
                Message::Dependency { file: d, parent: None },
            ]
        );
    }

    #[test]
    fn test_parent_option() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.json", "{}");
        let options = Options::new()
            .with_mixins_dir(dir.path())
            .with_parent("/src/app.css");
        let found = Discovery::new(&options).discover();
        assert!(matches!(
            &found.messages[1],
            Message::Dependency { parent: Some(p), .. } if p == Path::new("/src/app.css")
        ));
        // directories never carry the parent
        assert!(matches!(&found.messages[0], Message::DirDependency { parent: None, .. }));
    }

    #[test]
    fn test_module_dependencies() {
        let dir = TempDir::new().unwrap();
        let f = write(dir.path(), "f.js", "");
        let g = dir.path().join("g.js");
        let loader = StaticModuleLoader::new().with_module(
            &f,
            LoadedModule::new(Mixin::from_value(json!({ "a": "1" }))).with_dependency(&g),
        );

        let options = Options::new().with_mixins_dir(dir.path());
        let found = Discovery::with_loader(&options, Arc::new(loader)).discover();

        assert_eq!(names(&found), vec!["f"]);
        assert!(found.messages.contains(&Message::Dependency {
            file: g,
            parent: Some(f),
        }));
    }

    #[test]
    fn test_unsupported_module_is_skipped() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.js", "module.exports = {}");
        write(dir.path(), "b.json", "{}");
        let options = Options::new().with_mixins_dir(dir.path());
        let found = Discovery::new(&options).discover();
        assert_eq!(names(&found), vec!["b"]);
        // still reported, so a watcher picks up a fix
        assert_eq!(found.messages.len(), 3);
    }

    #[test]
    fn test_broken_library_is_skipped() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.css", "a { b: 1");
        write(dir.path(), "b.css", "@define-mixin b { b: 1 }");
        let options = Options::new().with_mixins_dir(dir.path());
        assert_eq!(names(&Discovery::new(&options).discover()), vec!["b"]);
    }

    #[test]
    fn test_missing_dir() {
        let options = Options::new().with_mixins_dir("/definitely/not/here");
        let found = Discovery::new(&options).discover();
        assert!(found.mixins.is_empty());
        assert_eq!(found.messages.len(), 1);
    }

    #[test]
    fn test_file_globs_after_dirs() {
        let dir = TempDir::new().unwrap();
        let lib = dir.path().join("lib");
        fs::create_dir(&lib).unwrap();
        write(dir.path(), "a.json", r#"{ "from": "dir" }"#);
        write(&lib, "a.json", r#"{ "from": "glob" }"#);
        write(&lib, "skip.css", "@define-mixin skip {}");

        let pattern = format!("{}/*.json", lib.display());
        let options = Options::new()
            .with_mixins_dir(dir.path())
            .with_mixins_file(pattern);
        let found = Discovery::new(&options).discover();

        assert_eq!(names(&found), vec!["a", "a"]);
        assert!(matches!(&found.mixins[1].1, Mixin::Object(map) if map["from"] == "glob"));
    }

    #[test]
    fn test_cache_reuses_unchanged_files() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.css", "@define-mixin a { a: 1 } @define-mixin b { b: 1 }");
        let options = Options::new().with_mixins_dir(dir.path());
        let discovery = Discovery::new(&options);

        let first = discovery.discover();
        let second = discovery.discover();
        assert_eq!(discovery.cached_files(), 1);
        assert_eq!(names(&first), names(&second));
        assert_eq!(first.messages, second.messages);
    }

    #[test]
    fn test_relative_dir_reports_absolute_paths() {
        let dir = tempfile::Builder::new().prefix("mixins").tempdir_in(".").unwrap();
        let name = dir.path().file_name().unwrap().to_owned();
        write(dir.path(), "c.css", "@define-mixin c { c: 3 }");

        let options = Options::new().with_mixins_dir(Path::new(&name));
        let found = Discovery::new(&options).discover();

        let cwd = std::env::current_dir().unwrap();
        assert_eq!(names(&found), vec!["c"]);
        assert_eq!(
            found.messages,
            vec![
                Message::DirDependency {
                    dir: cwd.join(&name),
                    glob: DIR_GLOB.to_string(),
                    parent: None,
                },
                Message::Dependency {
                    file: cwd.join(&name).join("c.css"),
                    parent: None,
                },
            ]
        );
    }

    #[test]
    fn test_changed_module_invalidates_dependencies() {
        let dir = TempDir::new().unwrap();
        let f = write(dir.path(), "f.js", "");
        let g = dir.path().join("g.js");
        let loader = Arc::new(RecordingLoader::default());
        loader.inner.register(
            &f,
            LoadedModule::new(Mixin::from_value(json!({ "a": "1" }))).with_dependency(&g),
        );

        let options = Options::new().with_mixins_dir(dir.path());
        let discovery = Discovery::with_loader(&options, loader.clone());

        discovery.discover();
        discovery.discover();
        assert!(loader.invalidated.lock().unwrap().is_empty());

        touch(&f);
        discovery.discover();
        assert_eq!(*loader.invalidated.lock().unwrap(), vec![g, f]);
    }

    #[test]
    fn test_cache_drops_removed_files() {
        let dir = TempDir::new().unwrap();
        let a = write(dir.path(), "a.css", "@define-mixin a { a: 1 }");
        write(dir.path(), "b.css", "@define-mixin b { b: 1 }");
        let options = Options::new().with_mixins_dir(dir.path());
        let discovery = Discovery::new(&options);

        discovery.discover();
        assert_eq!(discovery.cached_files(), 2);

        fs::remove_file(&a).unwrap();
        let found = discovery.discover();
        assert_eq!(names(&found), vec!["b"]);
        assert_eq!(discovery.cached_files(), 1);
    }

    #[test]
    fn test_library_with_comments() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.css", "/* shared */\n@define-mixin a { /* body */ a: 1 }");
        let options = Options::new().with_mixins_dir(dir.path());
        assert_eq!(names(&Discovery::new(&options).discover()), vec!["a"]);
    }
}
