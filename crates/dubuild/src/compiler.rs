//! Compilation of a resolved dependency tree into an [`OutputModule`]
//!
//! Handlers are appended strictly in emission order and their keys are taken from the running
//! handler count, so the layout of the finished module is:
//!
//! 1. one `unit`/`start` handler per file in dependency order (or a single merged handler in
//!    minified mode),
//! 2. the proxy tail from [`crate::proxies`],
//! 3. in per-file mode, a `library`/`start` handler registering `_G._ModuleIndex`.

use cow_utils::CowUtils;
use log::{debug, info};

use crate::{
    dependency_tree::DependencyTree,
    environment::Environment,
    error::BuildResult,
    minifier::Minifier,
    output_module::{OutputModule, SlotKey},
    proxies,
    source_file::SourceFile,
};

const MODULE_START: &str = "start";
const MODULE_INDEX_HEADER: &str = "_G._ModuleIndex={}\n";

/// How dependency sources are packed into handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompileMode {
    /// One handler per source file plus a module index
    #[default]
    PerFile,
    /// All sources merged and minified into a single handler
    Minified,
}

/// Escape a value for a single-quoted Lua string
fn lua_quote(value: &str) -> String {
    value
        .cow_replace('\\', "\\\\")
        .cow_replace('\'', "\\'")
        .into_owned()
}

/// Turns resolved sources into the handler table
#[derive(Debug)]
pub struct ModuleCompiler<'a> {
    environment: &'a Environment,
    minifier: &'a dyn Minifier,
}

impl<'a> ModuleCompiler<'a> {
    pub fn new(environment: &'a Environment, minifier: &'a dyn Minifier) -> Self {
        Self {
            environment,
            minifier,
        }
    }

    pub fn compile(
        &self,
        tree: &DependencyTree<'_>,
        main: &SourceFile,
        mode: CompileMode,
    ) -> BuildResult<OutputModule> {
        let module = match mode {
            CompileMode::PerFile => self.compile_per_file(tree, main),
            CompileMode::Minified => self.compile_minified(tree, main)?,
        };
        info!(
            "Compiled {} source file(s) into {} handlers ({mode:?})",
            tree.len(),
            module.len()
        );
        Ok(module)
    }

    fn compile_per_file(&self, tree: &DependencyTree<'_>, main: &SourceFile) -> OutputModule {
        let mut module = OutputModule::new();
        let mut index = String::from(MODULE_INDEX_HEADER);

        for (file, position) in tree.dependency_order() {
            let code = self
                .environment
                .substitute_for_revision(file.contents(), file.revision());
            let key = module.push_handler(SlotKey::Unit, MODULE_START, Vec::new(), code);
            debug!("Handler {key} <- {} (position {position})", file.name());
            index.push_str(&format!(
                "_G._ModuleIndex[{key}]='{}';",
                lua_quote(file.name())
            ));
        }

        proxies::append_proxies(&mut module, main, self.environment);
        module.push_handler(SlotKey::Library, MODULE_START, Vec::new(), index);
        module
    }

    fn compile_minified(
        &self,
        tree: &DependencyTree<'_>,
        main: &SourceFile,
    ) -> BuildResult<OutputModule> {
        let mut merged = String::new();
        for (file, _) in tree.dependency_order() {
            merged.push_str(file.contents());
            merged.push('\n');
        }

        let minified = self.minifier.minify(&merged)?;
        let code = self
            .environment
            .substitute_for_revision(&minified, main.revision());

        let mut module = OutputModule::new();
        module.push_handler(SlotKey::Unit, MODULE_START, Vec::new(), code);
        proxies::append_proxies(&mut module, main, self.environment);
        Ok(module)
    }
}
