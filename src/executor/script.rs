// SPDX-License-Identifier: MIT OR Apache-2.0

//! C7 — Script Executor: a restricted tree-walking interpreter over
//! `rustpython_ast` nodes. The validator (C3) already guarantees the
//! top-level contains only imports and class definitions; this module
//! evaluates exactly that shape, locates the single class descending from
//! the built-in `Tool` base, instantiates it, and invokes `run(arguments)`.
//!
//! This is deliberately not a general Python VM: it covers the practical
//! subset of the language a plugin tool body needs (literals, containers,
//! arithmetic, comparisons, control flow, attribute access on `self`, and a
//! small set of capability calls). Anything outside that subset surfaces as
//! `ScriptRuntimeError` rather than panicking.

use crate::database::DataSession;
use crate::errors::EngineError;
use rustpython_ast::{self as ast_mod, Constant, Expr, Stmt, Suite};
use rustpython_parser::{ast, Parse};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// Re-enters the Dispatcher for `tool_name`/`persona` with `arguments`; the
/// sole mechanism by which one tool may invoke another (`spec.md §4.5`).
pub type SubExecutorFn = Arc<
    dyn Fn(String, String, serde_json::Value) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, EngineError>> + Send>>
        + Send
        + Sync,
>;

/// Capability set injected into a script's execution namespace.
pub struct ExecContext {
    pub persona: String,
    pub tool_name: String,
    pub data_session: Option<DataSession>,
    pub sub_executor: SubExecutorFn,
}

#[derive(Debug, Clone)]
enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Dict(Vec<(String, Value)>),
    Instance(Arc<Mutex<HashMap<String, Value>>>, String),
}

impl Value {
    fn truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::List(v) => !v.is_empty(),
            Self::Dict(v) => !v.is_empty(),
            Self::Instance(..) => true,
        }
    }

    fn display(&self) -> String {
        match self {
            Self::None => "None".to_owned(),
            Self::Bool(b) => if *b { "True" } else { "False" }.to_owned(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Str(s) => s.clone(),
            Self::List(v) => format!("[{}]", v.iter().map(Value::display).collect::<Vec<_>>().join(", ")),
            Self::Dict(v) => format!(
                "{{{}}}",
                v.iter().map(|(k, val)| format!("'{k}': {}", val.display())).collect::<Vec<_>>().join(", ")
            ),
            Self::Instance(_, name) => format!("<{name} instance>"),
        }
    }

    fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::None,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .unwrap_or_else(|| Self::Float(n.as_f64().unwrap_or_default())),
            serde_json::Value::String(s) => Self::Str(s.clone()),
            serde_json::Value::Array(items) => Self::List(items.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(map) => {
                Self::Dict(map.iter().map(|(k, v)| (k.clone(), Value::from_json(v))).collect())
            }
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            Self::None => serde_json::Value::Null,
            Self::Bool(b) => serde_json::json!(*b),
            Self::Int(i) => serde_json::json!(*i),
            Self::Float(f) => serde_json::json!(*f),
            Self::Str(s) => serde_json::json!(s),
            Self::List(v) => serde_json::Value::Array(v.iter().map(Value::to_json).collect()),
            Self::Dict(v) => {
                let mut map = serde_json::Map::new();
                for (k, val) in v {
                    map.insert(k.clone(), val.to_json());
                }
                serde_json::Value::Object(map)
            }
            Self::Instance(_, name) => serde_json::json!(format!("<{name} instance>")),
        }
    }
}

#[derive(Debug, Clone)]
struct MethodDef {
    params: Vec<String>,
    body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
struct ClassDef {
    name: String,
    base: Option<String>,
    methods: HashMap<String, MethodDef>,
}

enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

type Env = Vec<HashMap<String, Value>>;

fn env_get(env: &Env, name: &str) -> Option<Value> {
    env.iter().rev().find_map(|scope| scope.get(name).cloned())
}

fn env_set(env: &mut Env, name: &str, value: Value) {
    for scope in env.iter_mut().rev() {
        if scope.contains_key(name) {
            scope.insert(name.to_owned(), value);
            return;
        }
    }
    if let Some(top) = env.last_mut() {
        top.insert(name.to_owned(), value);
    }
}

fn extract_params(args: &ast_mod::Arguments) -> Vec<String> {
    args.args.iter().map(|a| a.def.arg.to_string()).skip(1).collect()
}

fn collect_classes(suite: &Suite) -> HashMap<String, ClassDef> {
    let mut classes = HashMap::new();
    for stmt in suite {
        if let Stmt::ClassDef(node) = stmt {
            let base = node.bases.first().and_then(|e| match e {
                Expr::Name(n) => Some(n.id.to_string()),
                _ => None,
            });
            let mut methods = HashMap::new();
            for inner in &node.body {
                if let Stmt::FunctionDef(f) = inner {
                    methods.insert(
                        f.name.to_string(),
                        MethodDef {
                            params: extract_params(&f.args),
                            body: f.body.clone(),
                        },
                    );
                }
            }
            classes.insert(
                node.name.to_string(),
                ClassDef { name: node.name.to_string(), base, methods },
            );
        }
    }
    classes
}

/// Runtime error text mimicking the Python traceback the error-handling
/// design notes reference (`spec.md §8` scenario 4: `ZeroDivisionError`).
fn runtime_err(ctx: &ExecContext, kind: &str, detail: impl Into<String>) -> EngineError {
    EngineError::ScriptRuntimeError {
        tool_name: ctx.tool_name.clone(),
        traceback: format!("{kind}: {}", detail.into()),
    }
}

pub async fn execute_script_tool(
    artifact_body: &str,
    arguments: &serde_json::Value,
    ctx: ExecContext,
) -> Result<serde_json::Value, EngineError> {
    let suite: Suite = ast::Suite::parse(artifact_body, "<artifact>")
        .map_err(|e| EngineError::InvalidStructure { reason: e.to_string() })?;

    let classes = collect_classes(&suite);
    let tool_classes: Vec<&ClassDef> = classes
        .values()
        .filter(|c| c.base.as_deref() == Some("Tool"))
        .collect();

    let class = match tool_classes.len() {
        0 => return Err(EngineError::NoToolClass),
        1 => tool_classes[0].clone(),
        n => return Err(EngineError::AmbiguousToolClass { count: n }),
    };

    let run_method = class.methods.get("run").cloned().ok_or_else(|| {
        EngineError::InvalidStructure {
            reason: format!("Tool subclass '{}' has no run method", class.name),
        }
    })?;

    let instance = Value::Instance(Arc::new(Mutex::new(HashMap::new())), class.name.clone());
    let arg_param = run_method.params.first().cloned().unwrap_or_else(|| "arguments".to_owned());

    let mut env: Env = vec![HashMap::new()];
    env[0].insert("self".to_owned(), instance);
    env[0].insert(arg_param, Value::from_json(arguments));

    let flow = exec_block(&classes, &ctx, &mut env, &run_method.body).await?;
    match flow {
        Flow::Return(v) => Ok(v.to_json()),
        _ => Ok(serde_json::Value::Null),
    }
}

fn exec_block<'a>(
    classes: &'a HashMap<String, ClassDef>,
    ctx: &'a ExecContext,
    env: &'a mut Env,
    body: &'a [Stmt],
) -> Pin<Box<dyn Future<Output = Result<Flow, EngineError>> + Send + 'a>> {
    Box::pin(async move {
        for stmt in body {
            match exec_stmt(classes, ctx, env, stmt).await? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    })
}

fn exec_stmt<'a>(
    classes: &'a HashMap<String, ClassDef>,
    ctx: &'a ExecContext,
    env: &'a mut Env,
    stmt: &'a Stmt,
) -> Pin<Box<dyn Future<Output = Result<Flow, EngineError>> + Send + 'a>> {
    Box::pin(async move {
        match stmt {
            Stmt::Pass(_) => Ok(Flow::Normal),
            Stmt::Expr(node) => {
                eval_expr(classes, ctx, env, &node.value).await?;
                Ok(Flow::Normal)
            }
            Stmt::Return(node) => {
                let value = match &node.value {
                    Some(expr) => eval_expr(classes, ctx, env, expr).await?,
                    None => Value::None,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Assign(node) => {
                let value = eval_expr(classes, ctx, env, &node.value).await?;
                for target in &node.targets {
                    assign_target(classes, ctx, env, target, value.clone()).await?;
                }
                Ok(Flow::Normal)
            }
            Stmt::AugAssign(node) => {
                let current = eval_expr(classes, ctx, env, &node.target).await?;
                let rhs = eval_expr(classes, ctx, env, &node.value).await?;
                let result = apply_binop(ctx, &node.op, &current, &rhs)?;
                assign_target(classes, ctx, env, &node.target, result).await?;
                Ok(Flow::Normal)
            }
            Stmt::If(node) => {
                let test = eval_expr(classes, ctx, env, &node.test).await?;
                if test.truthy() {
                    exec_block(classes, ctx, env, &node.body).await
                } else {
                    exec_block(classes, ctx, env, &node.orelse).await
                }
            }
            Stmt::While(node) => {
                loop {
                    let test = eval_expr(classes, ctx, env, &node.test).await?;
                    if !test.truthy() {
                        break;
                    }
                    match exec_block(classes, ctx, env, &node.body).await? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For(node) => {
                let iterable = eval_expr(classes, ctx, env, &node.iter).await?;
                let items = match iterable {
                    Value::List(v) => v,
                    Value::Dict(v) => v.into_iter().map(|(k, _)| Value::Str(k)).collect(),
                    Value::Str(s) => s.chars().map(|c| Value::Str(c.to_string())).collect(),
                    other => return Err(runtime_err(ctx, "TypeError", format!("'{}' is not iterable", other.display()))),
                };
                for item in items {
                    assign_target(classes, ctx, env, &node.target, item).await?;
                    match exec_block(classes, ctx, env, &node.body).await? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::Raise(node) => {
                let detail = match &node.exc {
                    Some(expr) => eval_expr(classes, ctx, env, expr).await?.display(),
                    None => "raised".to_owned(),
                };
                Err(runtime_err(ctx, "RuntimeError", detail))
            }
            Stmt::Break(_) => Ok(Flow::Break),
            Stmt::Continue(_) => Ok(Flow::Continue),
            // Imports/nested defs inside a method body are inert at this layer;
            // the validator (C3) already constrains what can appear here.
            _ => Ok(Flow::Normal),
        }
    })
}

fn assign_target<'a>(
    classes: &'a HashMap<String, ClassDef>,
    ctx: &'a ExecContext,
    env: &'a mut Env,
    target: &'a Expr,
    value: Value,
) -> Pin<Box<dyn Future<Output = Result<(), EngineError>> + Send + 'a>> {
    Box::pin(async move {
        match target {
            Expr::Name(n) => {
                env_set(env, n.id.as_str(), value);
                Ok(())
            }
            Expr::Attribute(a) => {
                if let Expr::Name(base) = a.value.as_ref() {
                    if base.id.as_str() == "self" {
                        if let Some(Value::Instance(fields, _)) = env_get(env, "self") {
                            if let Ok(mut guard) = fields.lock() {
                                guard.insert(a.attr.to_string(), value);
                            }
                            return Ok(());
                        }
                    }
                }
                Err(runtime_err(ctx, "AttributeError", "unsupported assignment target"))
            }
            Expr::Subscript(s) => {
                let key = eval_expr(classes, ctx, env, &s.slice).await?;
                if let Expr::Name(base) = s.value.as_ref() {
                    let mut current = env_get(env, base.id.as_str())
                        .ok_or_else(|| runtime_err(ctx, "NameError", base.id.to_string()))?;
                    match &mut current {
                        Value::Dict(map) => {
                            let key_str = key.display();
                            if let Some(existing) = map.iter_mut().find(|(k, _)| *k == key_str) {
                                existing.1 = value;
                            } else {
                                map.push((key_str, value));
                            }
                        }
                        Value::List(list) => {
                            if let Value::Int(idx) = key {
                                if let Some(slot) = usize::try_from(idx).ok().and_then(|i| list.get_mut(i)) {
                                    *slot = value;
                                }
                            }
                        }
                        _ => return Err(runtime_err(ctx, "TypeError", "item assignment on non-container")),
                    }
                    env_set(env, base.id.as_str(), current);
                    return Ok(());
                }
                Err(runtime_err(ctx, "TypeError", "unsupported subscript assignment target"))
            }
            _ => Err(runtime_err(ctx, "SyntaxError", "unsupported assignment target")),
        }
    })
}

fn eval_expr<'a>(
    classes: &'a HashMap<String, ClassDef>,
    ctx: &'a ExecContext,
    env: &'a mut Env,
    expr: &'a Expr,
) -> Pin<Box<dyn Future<Output = Result<Value, EngineError>> + Send + 'a>> {
    Box::pin(async move {
        match expr {
            Expr::Constant(c) => Ok(constant_to_value(&c.value)),
            Expr::Name(n) => env_get(env, n.id.as_str()).ok_or_else(|| runtime_err(ctx, "NameError", format!("name '{}' is not defined", n.id))),
            Expr::List(l) => {
                let mut items = Vec::with_capacity(l.elts.len());
                for e in &l.elts {
                    items.push(eval_expr(classes, ctx, env, e).await?);
                }
                Ok(Value::List(items))
            }
            Expr::Tuple(t) => {
                let mut items = Vec::with_capacity(t.elts.len());
                for e in &t.elts {
                    items.push(eval_expr(classes, ctx, env, e).await?);
                }
                Ok(Value::List(items))
            }
            Expr::Dict(d) => {
                let mut map = Vec::with_capacity(d.values.len());
                for (key_expr, value_expr) in d.keys.iter().zip(d.values.iter()) {
                    let Some(key_expr) = key_expr.as_ref() else {
                        return Err(runtime_err(ctx, "SyntaxError", "dict unpacking is not supported"));
                    };
                    let key = eval_expr(classes, ctx, env, key_expr).await?.display();
                    let value = eval_expr(classes, ctx, env, value_expr).await?;
                    map.push((key, value));
                }
                Ok(Value::Dict(map))
            }
            Expr::JoinedStr(j) => {
                let mut out = String::new();
                for part in &j.values {
                    match part {
                        Expr::Constant(c) => out.push_str(&constant_to_value(&c.value).display()),
                        Expr::FormattedValue(fv) => {
                            out.push_str(&eval_expr(classes, ctx, env, &fv.value).await?.display());
                        }
                        other => out.push_str(&eval_expr(classes, ctx, env, other).await?.display()),
                    }
                }
                Ok(Value::Str(out))
            }
            Expr::BinOp(b) => {
                let left = eval_expr(classes, ctx, env, &b.left).await?;
                let right = eval_expr(classes, ctx, env, &b.right).await?;
                apply_binop(ctx, &b.op, &left, &right)
            }
            Expr::UnaryOp(u) => {
                let operand = eval_expr(classes, ctx, env, &u.operand).await?;
                apply_unaryop(&u.op, &operand)
            }
            Expr::BoolOp(b) => {
                let is_and = matches!(b.op, ast_mod::BoolOp::And);
                let mut result = Value::Bool(is_and);
                for value_expr in &b.values {
                    result = eval_expr(classes, ctx, env, value_expr).await?;
                    if is_and && !result.truthy() {
                        break;
                    }
                    if !is_and && result.truthy() {
                        break;
                    }
                }
                Ok(result)
            }
            Expr::Compare(c) => {
                let mut left = eval_expr(classes, ctx, env, &c.left).await?;
                for (op, comparator) in c.ops.iter().zip(c.comparators.iter()) {
                    let right = eval_expr(classes, ctx, env, comparator).await?;
                    if !apply_cmpop(op, &left, &right) {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::Attribute(a) => eval_attribute(classes, ctx, env, a).await,
            Expr::Subscript(s) => {
                let value = eval_expr(classes, ctx, env, &s.value).await?;
                let key = eval_expr(classes, ctx, env, &s.slice).await?;
                index_value(ctx, &value, &key)
            }
            Expr::Call(call) => eval_call(classes, ctx, env, call).await,
            other => Err(runtime_err(ctx, "SyntaxError", format!("unsupported expression kind {other:?}"))),
        }
    })
}

fn constant_to_value(c: &Constant) -> Value {
    match c {
        Constant::None => Value::None,
        Constant::Bool(b) => Value::Bool(*b),
        Constant::Str(s) => Value::Str(s.clone()),
        Constant::Int(n) => n.to_string().parse::<i64>().map(Value::Int).unwrap_or(Value::Int(0)),
        Constant::Float(f) => Value::Float(*f),
        _ => Value::None,
    }
}

fn apply_binop(ctx: &ExecContext, op: &ast_mod::Operator, left: &Value, right: &Value) -> Result<Value, EngineError> {
    use ast_mod::Operator;
    if let (Value::Str(a), Value::Str(b)) = (left, right) {
        if matches!(op, Operator::Add) {
            return Ok(Value::Str(format!("{a}{b}")));
        }
    }
    let (lf, rf) = (as_f64(left), as_f64(right));
    if let (Some(lf), Some(rf)) = (lf, rf) {
        let both_int = matches!((left, right), (Value::Int(_), Value::Int(_)) | (Value::Int(_), Value::Bool(_)) | (Value::Bool(_), Value::Int(_)));
        let result = match op {
            Operator::Add => lf + rf,
            Operator::Sub => lf - rf,
            Operator::Mult => lf * rf,
            Operator::Div => {
                if rf == 0.0 {
                    return Err(runtime_err(ctx, "ZeroDivisionError", "division by zero"));
                }
                lf / rf
            }
            Operator::FloorDiv => {
                if rf == 0.0 {
                    return Err(runtime_err(ctx, "ZeroDivisionError", "division by zero"));
                }
                (lf / rf).floor()
            }
            Operator::Mod => {
                if rf == 0.0 {
                    return Err(runtime_err(ctx, "ZeroDivisionError", "modulo by zero"));
                }
                lf % rf
            }
            Operator::Pow => lf.powf(rf),
            _ => return Err(runtime_err(ctx, "TypeError", "unsupported binary operator")),
        };
        return Ok(if both_int && matches!(op, Operator::Add | Operator::Sub | Operator::Mult | Operator::FloorDiv) {
            Value::Int(result as i64)
        } else {
            Value::Float(result)
        });
    }
    if let (Value::List(a), Value::List(b)) = (left, right) {
        if matches!(op, Operator::Add) {
            let mut out = a.clone();
            out.extend(b.clone());
            return Ok(Value::List(out));
        }
    }
    Err(runtime_err(ctx, "TypeError", "unsupported operand types for binary operator"))
}

fn apply_unaryop(op: &ast_mod::UnaryOp, operand: &Value) -> Result<Value, EngineError> {
    use ast_mod::UnaryOp;
    Ok(match op {
        UnaryOp::Not => Value::Bool(!operand.truthy()),
        UnaryOp::USub => match operand {
            Value::Int(i) => Value::Int(-i),
            Value::Float(f) => Value::Float(-f),
            other => other.clone(),
        },
        _ => operand.clone(),
    })
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn apply_cmpop(op: &ast_mod::CmpOp, left: &Value, right: &Value) -> bool {
    use ast_mod::CmpOp;
    match op {
        CmpOp::Eq => values_equal(left, right),
        CmpOp::NotEq => !values_equal(left, right),
        CmpOp::Lt | CmpOp::LtE | CmpOp::Gt | CmpOp::GtE => {
            if let (Some(l), Some(r)) = (as_f64(left), as_f64(right)) {
                match op {
                    CmpOp::Lt => l < r,
                    CmpOp::LtE => l <= r,
                    CmpOp::Gt => l > r,
                    CmpOp::GtE => l >= r,
                    _ => false,
                }
            } else if let (Value::Str(l), Value::Str(r)) = (left, right) {
                match op {
                    CmpOp::Lt => l < r,
                    CmpOp::LtE => l <= r,
                    CmpOp::Gt => l > r,
                    CmpOp::GtE => l >= r,
                    _ => false,
                }
            } else {
                false
            }
        }
        CmpOp::In => match right {
            Value::List(items) => items.iter().any(|i| values_equal(i, left)),
            Value::Dict(map) => matches!(left, Value::Str(s) if map.iter().any(|(k, _)| k == s)),
            Value::Str(s) => matches!(left, Value::Str(sub) if s.contains(sub.as_str())),
            _ => false,
        },
        CmpOp::NotIn => !apply_cmpop(&CmpOp::In, left, right),
        CmpOp::Is => values_equal(left, right),
        CmpOp::IsNot => !values_equal(left, right),
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::None, Value::None) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => a == b,
        _ => match (as_f64(left), as_f64(right)) {
            (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
            _ => false,
        },
    }
}

fn index_value(ctx: &ExecContext, value: &Value, key: &Value) -> Result<Value, EngineError> {
    match value {
        Value::Dict(map) => {
            let key_str = key.display();
            map.iter()
                .find(|(k, _)| *k == key_str)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| runtime_err(ctx, "KeyError", key_str))
        }
        Value::List(items) => {
            let Value::Int(idx) = key else {
                return Err(runtime_err(ctx, "TypeError", "list indices must be integers"));
            };
            let resolved = if *idx < 0 { items.len() as i64 + idx } else { *idx };
            usize::try_from(resolved)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .ok_or_else(|| runtime_err(ctx, "IndexError", "list index out of range"))
        }
        Value::Str(s) => {
            let Value::Int(idx) = key else {
                return Err(runtime_err(ctx, "TypeError", "string indices must be integers"));
            };
            usize::try_from(*idx)
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::Str(c.to_string()))
                .ok_or_else(|| runtime_err(ctx, "IndexError", "string index out of range"))
        }
        other => Err(runtime_err(ctx, "TypeError", format!("'{}' is not subscriptable", other.display()))),
    }
}

async fn eval_attribute<'a>(
    classes: &'a HashMap<String, ClassDef>,
    ctx: &'a ExecContext,
    env: &'a mut Env,
    attr: &'a ast_mod::ExprAttribute,
) -> Result<Value, EngineError> {
    if let Expr::Name(base) = attr.value.as_ref() {
        if base.id.as_str() == "self" {
            if let Some(Value::Instance(fields, _)) = env_get(env, "self") {
                if let Ok(guard) = fields.lock() {
                    if let Some(v) = guard.get(attr.attr.as_str()) {
                        return Ok(v.clone());
                    }
                }
            }
            return Ok(Value::None);
        }
        if base.id.as_str() == "context" {
            return Ok(match attr.attr.as_str() {
                "persona" => Value::Str(ctx.persona.clone()),
                "tool_name" => Value::Str(ctx.tool_name.clone()),
                _ => Value::None,
            });
        }
    }
    let base_value = eval_expr(classes, ctx, env, &attr.value).await?;
    Ok(match (&base_value, attr.attr.as_str()) {
        (Value::Dict(_), "get") | (Value::List(_), "append") => base_value,
        _ => Value::None,
    })
}

async fn eval_call<'a>(
    classes: &'a HashMap<String, ClassDef>,
    ctx: &'a ExecContext,
    env: &'a mut Env,
    call: &'a ast_mod::ExprCall,
) -> Result<Value, EngineError> {
    if let Expr::Attribute(attr) = call.func.as_ref() {
        if let Expr::Name(base) = attr.value.as_ref() {
            if base.id.as_str() == "self" && attr.attr.as_str() == "log" {
                let mut parts = Vec::new();
                for a in &call.args {
                    parts.push(eval_expr(classes, ctx, env, a).await?.display());
                }
                tracing::info!(tool = %ctx.tool_name, "{}", parts.join(" "));
                return Ok(Value::None);
            }
            if (base.id.as_str() == "self" || base.id.as_str() == "context") && attr.attr.as_str() == "sub_executor" {
                let mut args_iter = call.args.iter();
                let tool = match args_iter.next() {
                    Some(e) => eval_expr(classes, ctx, env, e).await?.display(),
                    None => return Err(runtime_err(ctx, "TypeError", "sub_executor() missing tool name")),
                };
                let sub_args = match args_iter.next() {
                    Some(e) => eval_expr(classes, ctx, env, e).await?.to_json(),
                    None => serde_json::json!({}),
                };
                let result = (ctx.sub_executor)(tool, ctx.persona.clone(), sub_args).await?;
                return Ok(Value::from_json(&result));
            }
        }
    }

    // Built-in free functions.
    if let Expr::Name(name) = call.func.as_ref() {
        let mut args = Vec::with_capacity(call.args.len());
        for a in &call.args {
            args.push(eval_expr(classes, ctx, env, a).await?);
        }
        if let Some(class) = classes.get(name.id.as_str()) {
            return instantiate(classes, ctx, class, &args).await;
        }
        return apply_builtin(ctx, name.id.as_str(), &args);
    }

    Err(runtime_err(ctx, "TypeError", "unsupported call target"))
}

async fn instantiate<'a>(
    classes: &'a HashMap<String, ClassDef>,
    ctx: &'a ExecContext,
    class: &'a ClassDef,
    args: &[Value],
) -> Result<Value, EngineError> {
    let instance = Value::Instance(Arc::new(Mutex::new(HashMap::new())), class.name.clone());
    if let Some(init) = class.methods.get("__init__") {
        let mut env: Env = vec![HashMap::new()];
        env[0].insert("self".to_owned(), instance.clone());
        for (param, value) in init.params.iter().zip(args.iter()) {
            env[0].insert(param.clone(), value.clone());
        }
        exec_block(classes, ctx, &mut env, &init.body).await?;
    }
    Ok(instance)
}

fn apply_builtin(ctx: &ExecContext, name: &str, args: &[Value]) -> Result<Value, EngineError> {
    match (name, args) {
        ("str", [v]) => Ok(Value::Str(v.display())),
        ("len", [Value::Str(s)]) => Ok(Value::Int(s.chars().count() as i64)),
        ("len", [Value::List(v)]) => Ok(Value::Int(v.len() as i64)),
        ("len", [Value::Dict(v)]) => Ok(Value::Int(v.len() as i64)),
        ("int", [v]) => as_f64(v)
            .map(|f| Value::Int(f as i64))
            .or_else(|| if let Value::Str(s) = v { s.trim().parse::<i64>().ok().map(Value::Int) } else { None })
            .ok_or_else(|| runtime_err(ctx, "ValueError", "invalid literal for int()")),
        ("float", [v]) => as_f64(v)
            .map(Value::Float)
            .or_else(|| if let Value::Str(s) = v { s.trim().parse::<f64>().ok().map(Value::Float) } else { None })
            .ok_or_else(|| runtime_err(ctx, "ValueError", "could not convert to float")),
        ("bool", [v]) => Ok(Value::Bool(v.truthy())),
        ("abs", [v]) => Ok(match v {
            Value::Int(i) => Value::Int(i.abs()),
            Value::Float(f) => Value::Float(f.abs()),
            other => other.clone(),
        }),
        ("list", [Value::List(v)]) => Ok(Value::List(v.clone())),
        ("list", []) => Ok(Value::List(Vec::new())),
        ("dict", []) => Ok(Value::Dict(Vec::new())),
        _ => Err(runtime_err(ctx, "NameError", format!("name '{name}' is not defined"))),
    }
}
