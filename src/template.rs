//! The public surface: the options builder, `parse`, and `Template`.

use crate::compiler;
use crate::error::{Error, RuntimeError};
use crate::executor::Vm;
use crate::bytecode::Instr;
use crate::funcs::FuncDef;
use crate::strtpl::HelperMap;
use crate::value::Value;
use indexmap::IndexMap;
use std::sync::Arc;

/// Names with a fixed meaning inside template source.
const RESERVED: [&str; 7] = ["result", "args", "if", "else", "end", "for", "in"];

/// Build-time configuration for a template: an initial `result` value,
/// named constants, user functions, and string sub-templates.
#[derive(Default)]
pub struct Options {
    pub(crate) prototype: Option<Value>,
    pub(crate) constants: IndexMap<String, Value>,
    pub(crate) functions: IndexMap<String, Arc<FuncDef>>,
    pub(crate) templates: IndexMap<String, String>,
    pub(crate) str_funcs: HelperMap,
}

impl Options {
    pub fn new() -> Options {
        Options::default()
    }

    /// Assign an initial value for `result`, cloned in at the start of
    /// every execution.
    pub fn prototype(mut self, value: Value) -> Options {
        self.prototype = Some(value);
        self
    }

    /// Register an immutable named constant.
    pub fn constant(mut self, name: &str, value: Value) -> Result<Options, Error> {
        check_name(name)?;
        self.constants.insert(name.to_string(), value);
        Ok(self)
    }

    /// Register a user function under the name it declares.
    pub fn func(mut self, def: FuncDef) -> Result<Options, Error> {
        check_name(def.name())?;
        self.functions
            .insert(def.name().to_string(), Arc::new(def));
        Ok(self)
    }

    /// Register a named string sub-template, compiled during `parse`
    /// and invoked from source as `.name(arg)`.
    pub fn string_template(mut self, name: &str, source: &str) -> Result<Options, Error> {
        check_name(name)?;
        self.templates.insert(name.to_string(), source.to_string());
        Ok(self)
    }

    /// Supply helper functions to the sub-template renderer.
    pub fn string_functions(mut self, map: HelperMap) -> Options {
        self.str_funcs = map;
        self
    }
}

fn check_name(name: &str) -> Result<(), Error> {
    let mut chars = name.chars();
    let head_ok = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let tail_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !head_ok || !tail_ok || RESERVED.contains(&name) {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}

/// A compiled template, immutable and reusable across executions.
#[derive(Debug)]
pub struct Template {
    functions: Vec<Arc<FuncDef>>,
    const_data: Vec<Value>,
    var_data_size: usize,
    code: Vec<Instr>,
}

/// Compile template source against the given options.
pub fn parse(options: Options, source: &str) -> Result<Template, Error> {
    let compiled = compiler::compile(&options, source)?;
    Ok(Template {
        functions: compiled.functions,
        const_data: compiled.const_data,
        var_data_size: compiled.var_data_size,
        code: compiled.code,
    })
}

impl Template {
    /// Run the template with a parameter value bound to `args`.
    ///
    /// Every call owns a fresh variable region; the constants and
    /// function table are shared read-only, so one `Template` may be
    /// executed concurrently.
    pub fn execute(&self, params: impl Into<Value>) -> Result<Value, RuntimeError> {
        let mut vars = vec![Value::Null; self.var_data_size];
        vars[0] = Value::raw("null");
        vars[1] = params.into();
        Vm {
            consts: &self.const_data,
            vars,
            functions: &self.functions,
            code: &self.code,
        }
        .run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_must_be_identifiers() {
        for bad in ["", "1x", "x-y", "привет", "_x", "x y"] {
            assert!(
                Options::new().constant(bad, Value::Null).is_err(),
                "{bad:?} should be rejected"
            );
        }
        for good in ["x", "x1", "camelCase", "with_underscore", "X"] {
            assert!(
                Options::new().constant(good, Value::Null).is_ok(),
                "{good:?} should be accepted"
            );
        }
    }

    #[test]
    fn reserved_names_are_rejected() {
        for name in RESERVED {
            assert!(Options::new().constant(name, Value::Null).is_err());
            assert!(Options::new().string_template(name, "x").is_err());
        }
    }
}
