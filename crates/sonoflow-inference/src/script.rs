//! Rhai-backed expression programs.
//!
//! Expressions are compiled once per configuration change and evaluated per
//! element, with the input bound to the variable `a`. Integer frames are fed
//! to the script as `i64` and keep their kind as long as every result is an
//! integer; one float result promotes the whole frame to `float`. Float
//! frames evaluate through `f64` and keep their own width.

use crate::expr::{ExprCompiler, ExprError, ExprProgram};
use half::f16;
use rhai::{Dynamic, Engine, Scope, AST};
use sonoflow_core::{Tensor, TensorData};
use std::sync::Arc;

/// Compiler producing [`RhaiProgram`]s from a shared engine.
pub struct RhaiExprCompiler {
    engine: Arc<Engine>,
}

impl RhaiExprCompiler {
    pub fn new() -> Self {
        let mut engine = Engine::new();
        // Abort runaway scripts instead of stalling the processing thread.
        engine.set_max_expr_depths(64, 64);
        engine.set_max_call_levels(32);
        engine.set_max_operations(10_000);
        engine.set_max_string_size(10_000);
        engine.set_max_array_size(1_000);
        engine.set_max_map_size(1_000);
        Self {
            engine: Arc::new(engine),
        }
    }
}

impl Default for RhaiExprCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl ExprCompiler for RhaiExprCompiler {
    fn compile(&self, expression: &str) -> Result<Box<dyn ExprProgram>, ExprError> {
        let ast = self
            .engine
            .compile_expression(expression)
            .map_err(|err| ExprError::Compile {
                expression: expression.to_string(),
                message: err.to_string(),
            })?;
        Ok(Box::new(RhaiProgram {
            engine: Arc::clone(&self.engine),
            ast,
        }))
    }
}

/// Shared compiler handle in the shape the session layer expects.
pub fn rhai_compiler() -> Arc<dyn ExprCompiler> {
    Arc::new(RhaiExprCompiler::new())
}

/// One compiled expression bound to the engine that built it.
pub struct RhaiProgram {
    engine: Arc<Engine>,
    ast: AST,
}

enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn to_f64(&self) -> f64 {
        match *self {
            Num::Int(x) => x as f64,
            Num::Float(x) => x,
        }
    }

    fn to_i64(&self) -> i64 {
        match *self {
            Num::Int(x) => x,
            Num::Float(x) => x as i64,
        }
    }
}

impl RhaiProgram {
    fn eval(&self, a: Dynamic) -> Result<Dynamic, ExprError> {
        let mut scope = Scope::new();
        scope.push("a", a);
        self.engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, &self.ast)
            .map_err(|err| ExprError::Eval(err.to_string()))
    }

    fn eval_int(&self, a: i64) -> Result<Num, ExprError> {
        let value = self.eval(Dynamic::from_int(a))?;
        if let Ok(x) = value.as_int() {
            return Ok(Num::Int(x));
        }
        match value.as_float() {
            Ok(x) => Ok(Num::Float(x)),
            Err(_) => Err(ExprError::NonNumeric(value.type_name())),
        }
    }

    fn eval_float(&self, a: f64) -> Result<f64, ExprError> {
        let value = self.eval(Dynamic::from_float(a))?;
        if let Ok(x) = value.as_float() {
            return Ok(x);
        }
        match value.as_int() {
            Ok(x) => Ok(x as f64),
            Err(_) => Err(ExprError::NonNumeric(value.type_name())),
        }
    }

    /// Evaluate an integer frame, rebuilding the source kind through
    /// `rebuild` unless any element came back as a float.
    fn int_frame<F>(&self, values: Vec<i64>, rebuild: F) -> Result<TensorData, ExprError>
    where
        F: FnOnce(Vec<i64>) -> TensorData,
    {
        let mut results = Vec::with_capacity(values.len());
        let mut promote = false;
        for v in values {
            let n = self.eval_int(v)?;
            promote |= matches!(n, Num::Float(_));
            results.push(n);
        }
        if promote {
            Ok(TensorData::F32(
                results.iter().map(|n| n.to_f64() as f32).collect(),
            ))
        } else {
            Ok(rebuild(results.iter().map(Num::to_i64).collect()))
        }
    }
}

impl ExprProgram for RhaiProgram {
    fn apply(&self, input: &Tensor) -> Result<Tensor, ExprError> {
        if input.is_empty() {
            return Ok(input.clone());
        }
        let data = match input.data() {
            TensorData::I8(v) => self.int_frame(v.iter().map(|&x| x as i64).collect(), |out| {
                TensorData::I8(out.into_iter().map(|x| x as i8).collect())
            })?,
            TensorData::U8(v) => self.int_frame(v.iter().map(|&x| x as i64).collect(), |out| {
                TensorData::U8(out.into_iter().map(|x| x as u8).collect())
            })?,
            TensorData::I16(v) => self.int_frame(v.iter().map(|&x| x as i64).collect(), |out| {
                TensorData::I16(out.into_iter().map(|x| x as i16).collect())
            })?,
            TensorData::U16(v) => self.int_frame(v.iter().map(|&x| x as i64).collect(), |out| {
                TensorData::U16(out.into_iter().map(|x| x as u16).collect())
            })?,
            TensorData::I32(v) => self.int_frame(v.iter().map(|&x| x as i64).collect(), |out| {
                TensorData::I32(out.into_iter().map(|x| x as i32).collect())
            })?,
            TensorData::U32(v) => self.int_frame(v.iter().map(|&x| x as i64).collect(), |out| {
                TensorData::U32(out.into_iter().map(|x| x as u32).collect())
            })?,
            TensorData::I64(v) => self.int_frame(v.clone(), TensorData::I64)?,
            TensorData::U64(v) => self.int_frame(v.iter().map(|&x| x as i64).collect(), |out| {
                TensorData::U64(out.into_iter().map(|x| x as u64).collect())
            })?,
            TensorData::F16(v) => {
                let mut out = Vec::with_capacity(v.len());
                for x in v {
                    out.push(f16::from_f64(self.eval_float(x.to_f64())?));
                }
                TensorData::F16(out)
            }
            TensorData::F32(v) => {
                let mut out = Vec::with_capacity(v.len());
                for &x in v {
                    out.push(self.eval_float(x as f64)? as f32);
                }
                TensorData::F32(out)
            }
            TensorData::F64(v) => {
                let mut out = Vec::with_capacity(v.len());
                for &x in v {
                    out.push(self.eval_float(x)?);
                }
                TensorData::F64(out)
            }
        };
        Ok(Tensor::new(input.shape().to_vec(), data)?)
    }
}
