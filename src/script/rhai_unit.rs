// src/script/rhai_unit.rs

//! [`ScriptUnit`] backed by a Rhai script.
//!
//! Each unit owns its own `Engine`, so units never share a global symbol
//! space. Dependency symbols from `resolve` are registered as native
//! functions on that engine and forward to the provider unit, which runs the
//! call inside its own namespace.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use rhai::module_resolvers::FileModuleResolver;
use rhai::{
    CallFnOptions, Dynamic, Engine, EvalAltResult, FnAccess, ImmutableString, Map, Module,
    NativeCallContext, Position, Scope, Shared, AST,
};
use tracing::{debug, trace};

use crate::errors::{Result, SequencerError};
use crate::script::host::ScriptHost;
use crate::script::unit::{module_name, Import, RawParam, ScriptLoader, ScriptUnit};

/// Appended to every unit so one evaluation yields both the imported modules
/// and the declarations, which are otherwise dropped with the script scope.
const METADATA_EXPORT: &str = r#"
export const __unit_metadata = #{
    provides: if is_def_var("provides") { provides },
    requires: if is_def_var("requires") { requires },
    defaults: if is_def_var("defaults") { defaults },
};
"#;

/// Error value thrown into a script by `get_context` for an unknown name.
#[derive(Debug, Clone)]
struct ContextMissing(String);

/// Loads `.rhai` files as [`RhaiUnit`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct RhaiLoader;

impl ScriptLoader for RhaiLoader {
    fn extension(&self) -> &str {
        "rhai"
    }

    fn load(&self, path: &Path, host: &Arc<ScriptHost>) -> Result<Arc<dyn ScriptUnit>> {
        Ok(Arc::new(RhaiUnit::load(path, host)?))
    }
}

#[derive(Debug, Clone)]
struct ScriptFn {
    name: String,
    params: Vec<String>,
}

pub struct RhaiUnit {
    name: String,
    path: PathBuf,
    dir: PathBuf,
    ast: AST,
    provides: Option<Vec<String>>,
    requires: Vec<String>,
    functions: Vec<ScriptFn>,
    defaults: HashMap<String, Map>,
    /// `import "x" as y;` modules, registered on the engine under `y`.
    modules: Vec<(String, Shared<Module>)>,
    host: Arc<ScriptHost>,
    engine: RwLock<Arc<Engine>>,
}

impl fmt::Debug for RhaiUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RhaiUnit")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("provides", &self.provides)
            .field("requires", &self.requires)
            .field("functions", &self.functions)
            .finish()
    }
}

impl RhaiUnit {
    /// Compile `path` and run its top-level statements in a fresh scope.
    pub fn load(path: &Path, host: &Arc<ScriptHost>) -> Result<Self> {
        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(SequencerError::FileNotFound {
                    path: path.to_path_buf(),
                });
            }
            Err(err) => return Err(err.into()),
        };
        let path = path.canonicalize()?;
        let name = module_name(&path);
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        debug!(module = %name, path = %path.display(), "compiling script unit");

        let mut engine = build_engine(&name, &dir, host, &[], &[]);
        let mut ast = engine.compile(&source).map_err(|err| SequencerError::Syntax {
            path: path.clone(),
            message: err.to_string(),
        })?;
        ast.set_source(path.display().to_string());

        let metadata = engine
            .compile(METADATA_EXPORT)
            .map_err(|err| SequencerError::Syntax {
                path: path.clone(),
                message: err.to_string(),
            })?;
        let evaluated = Module::eval_ast_as_new(Scope::new(), &ast.merge(&metadata), &engine)
            .map_err(|err| classify_load_error(&path, &err))?;

        let modules: Vec<(String, Shared<Module>)> = evaluated
            .iter_sub_modules()
            .map(|(alias, module)| (alias.to_string(), Shared::clone(module)))
            .collect();
        for (alias, module) in &modules {
            engine.register_static_module(alias, Shared::clone(module));
        }

        let scope = metadata_scope(&evaluated);
        let provides = read_name_list(&scope, "provides", &name)?;
        let requires = read_name_list(&scope, "requires", &name)?.unwrap_or_default();
        let defaults = read_defaults(&scope, &name)?;
        let functions = public_functions(&ast, &name)?;

        trace!(module = %name, ?provides, ?requires, "script unit metadata");

        Ok(Self {
            name,
            path,
            dir,
            ast,
            provides,
            requires,
            functions,
            defaults,
            modules,
            host: Arc::clone(host),
            engine: RwLock::new(Arc::new(engine)),
        })
    }
}

impl ScriptUnit for RhaiUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn declared_provides(&self) -> Option<&[String]> {
        self.provides.as_deref()
    }

    fn declared_requires(&self) -> &[String] {
        &self.requires
    }

    fn callables(&self) -> Vec<String> {
        self.functions.iter().map(|f| f.name.clone()).collect()
    }

    fn has_callable(&self, name: &str) -> bool {
        self.functions.iter().any(|f| f.name == name)
    }

    fn parameters(&self, sequence: &str) -> Vec<RawParam> {
        let Some(function) = self.functions.iter().find(|f| f.name == sequence) else {
            return Vec::new();
        };
        let defaults = self.defaults.get(sequence);

        function
            .params
            .iter()
            .map(|param| RawParam {
                name: param.clone(),
                default: defaults.and_then(|d| d.get(param.as_str()).cloned()),
            })
            .collect()
    }

    fn invoke(&self, sequence: &str, args: Vec<Dynamic>) -> Result<Dynamic> {
        // Clone the engine out so no lock is held while the script runs.
        let engine = Arc::clone(&*self.engine.read());
        let options = CallFnOptions::new().eval_ast(false).rewind_scope(true);
        let mut scope = Scope::new();

        engine
            .call_fn_with_options::<Dynamic>(options, &mut scope, &self.ast, sequence, args)
            .map_err(|err| classify_call_error(sequence, &err))
    }

    fn bind_imports(&self, imports: &[Import]) -> Result<()> {
        let engine = build_engine(&self.name, &self.dir, &self.host, &self.modules, imports);
        *self.engine.write() = Arc::new(engine);
        debug!(module = %self.name, imports = imports.len(), "script unit imports bound");
        Ok(())
    }
}

fn build_engine(
    module: &str,
    dir: &Path,
    host: &Arc<ScriptHost>,
    modules: &[(String, Shared<Module>)],
    imports: &[Import],
) -> Engine {
    let mut engine = Engine::new();
    engine.set_module_resolver(FileModuleResolver::new_with_path(dir));
    for (alias, imported) in modules {
        engine.register_static_module(alias, Shared::clone(imported));
    }

    let print_host = Arc::clone(host);
    let print_module = module.to_string();
    engine.on_print(move |text| print_host.log_line(&print_module, text));

    let debug_module = module.to_string();
    engine.on_debug(move |text, _source, pos| {
        debug!(target: "sequence", module = %debug_module, %pos, "{text}");
    });

    let context = Arc::clone(host.context());
    engine.register_fn(
        "get_context",
        move |name: ImmutableString| -> std::result::Result<Dynamic, Box<EvalAltResult>> {
            context.get(name.as_str()).map_err(|_| context_missing(name.as_str()))
        },
    );

    for import in imports {
        register_import(&mut engine, import);
    }

    host.apply_hooks(&mut engine);
    engine
}

/// Register `import.sequence` once per callable arity.
///
/// Omitted trailing arguments take the provider's declared defaults.
#[allow(deprecated)]
fn register_import(engine: &mut Engine, import: &Import) {
    let defaults: Vec<Option<Dynamic>> = import
        .provider
        .parameters(&import.sequence)
        .into_iter()
        .map(|p| p.default)
        .collect();

    for arity in (0..=defaults.len()).rev() {
        if defaults[arity..].iter().any(Option::is_none) {
            break;
        }

        let provider = Arc::clone(&import.provider);
        let sequence = import.sequence.clone();
        let defaults = defaults.clone();

        engine.register_raw_fn(
            import.sequence.as_str(),
            vec![TypeId::of::<Dynamic>(); arity],
            move |_ctx: NativeCallContext,
                  args: &mut [&mut Dynamic]|
                  -> std::result::Result<Dynamic, Box<EvalAltResult>> {
                let mut values: Vec<Dynamic> =
                    args.iter_mut().map(|arg| std::mem::take(&mut **arg)).collect();
                values.extend(defaults[values.len()..].iter().flatten().cloned());
                provider
                    .invoke(&sequence, values)
                    .map_err(into_script_error)
            },
        );
    }
}

fn context_missing(name: &str) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorRuntime(
        Dynamic::from(ContextMissing(name.to_string())),
        Position::NONE,
    ))
}

fn into_script_error(err: SequencerError) -> Box<EvalAltResult> {
    match err {
        SequencerError::MissingContext(name) => context_missing(&name),
        other => other.to_string().into(),
    }
}

/// Name of the missing context object, if `err` was thrown by `get_context`.
fn context_failure(err: &EvalAltResult) -> Option<String> {
    match err {
        EvalAltResult::ErrorRuntime(value, _) => {
            value.clone().try_cast::<ContextMissing>().map(|m| m.0)
        }
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _)
        | EvalAltResult::ErrorInModule(_, inner, _) => context_failure(inner),
        _ => None,
    }
}

fn classify_load_error(path: &Path, err: &EvalAltResult) -> SequencerError {
    match err {
        EvalAltResult::ErrorModuleNotFound(..) | EvalAltResult::ErrorInModule(..) => {
            SequencerError::Import {
                path: path.to_path_buf(),
                message: err.to_string(),
            }
        }
        EvalAltResult::ErrorParsing(..) => SequencerError::Syntax {
            path: path.to_path_buf(),
            message: err.to_string(),
        },
        _ => SequencerError::ModuleExecution {
            path: path.to_path_buf(),
            message: err.to_string(),
        },
    }
}

fn classify_call_error(sequence: &str, err: &EvalAltResult) -> SequencerError {
    match context_failure(err) {
        Some(name) => SequencerError::MissingContext(name),
        None => SequencerError::Execution {
            sequence: sequence.to_string(),
            message: err.to_string(),
        },
    }
}

/// The declarations a unit actually made, as scope variables.
fn metadata_scope(evaluated: &Module) -> Scope<'static> {
    let mut scope = Scope::new();
    if let Some(declared) = evaluated
        .get_var("__unit_metadata")
        .and_then(|value| value.try_cast::<Map>())
    {
        for (field, value) in declared {
            if !value.is_unit() {
                scope.push_dynamic(field.to_string(), value);
            }
        }
    }
    scope
}

fn read_name_list(scope: &Scope, field: &'static str, module: &str) -> Result<Option<Vec<String>>> {
    let Some(value) = scope.get_value::<Dynamic>(field) else {
        return Ok(None);
    };
    let invalid = |reason: String| SequencerError::InvalidDeclaration {
        module: module.to_string(),
        field,
        reason,
    };

    let items = value
        .into_array()
        .map_err(|found| invalid(format!("expected an array of strings, found {found}")))?;

    items
        .into_iter()
        .map(|item| {
            item.into_string()
                .map_err(|found| invalid(format!("expected a string, found {found}")))
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn read_defaults(scope: &Scope, module: &str) -> Result<HashMap<String, Map>> {
    let Some(value) = scope.get_value::<Dynamic>("defaults") else {
        return Ok(HashMap::new());
    };
    let invalid = |reason: String| SequencerError::InvalidDeclaration {
        module: module.to_string(),
        field: "defaults",
        reason,
    };

    let type_name = value.type_name();
    let sequences = value
        .try_cast::<Map>()
        .ok_or_else(|| invalid(format!("expected an object map, found {type_name}")))?;

    let mut defaults = HashMap::with_capacity(sequences.len());
    for (sequence, params) in sequences {
        let type_name = params.type_name();
        let params = params.try_cast::<Map>().ok_or_else(|| {
            invalid(format!(
                "defaults for {sequence} must be an object map, found {type_name}"
            ))
        })?;
        defaults.insert(sequence.to_string(), params);
    }
    Ok(defaults)
}

fn public_functions(ast: &AST, module: &str) -> Result<Vec<ScriptFn>> {
    let mut functions: Vec<ScriptFn> = Vec::new();
    for meta in ast.iter_functions() {
        if matches!(meta.access, FnAccess::Private) || meta.name.starts_with("anon$") {
            continue;
        }
        if functions.iter().any(|f| f.name == meta.name) {
            return Err(SequencerError::AmbiguousSequence {
                module: module.to_string(),
                sequence: meta.name.to_string(),
            });
        }
        functions.push(ScriptFn {
            name: meta.name.to_string(),
            params: meta.params.iter().map(|p| p.to_string()).collect(),
        });
    }
    functions.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(functions)
}
