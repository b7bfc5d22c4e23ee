use std::rc::Rc;

use log::debug;
use regex::Regex;

use crate::ast::*;
use crate::error::{Error, Result, SourceLocation};
use crate::value::{Value, compare_values};

use super::scope::{ArrayRef, Slot};
use super::stmt::StmtResult;
use super::{Exec, Interpreter};

/// Stack left before a user function call switches to a new segment
const STACK_RED_ZONE: usize = 256 * 1024;
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// A resolved assignment target
pub(super) enum LValue<'e> {
    Var(&'e VarRef),
    Element(ArrayRef, String),
    Field(usize),
}

/// Apply an arithmetic operator
pub(super) fn arithmetic(op: BinaryOp, left: f64, right: f64, location: SourceLocation) -> Result<f64> {
    Ok(match op {
        BinaryOp::Add => left + right,
        BinaryOp::Sub => left - right,
        BinaryOp::Mul => left * right,
        BinaryOp::Div => {
            if right == 0.0 {
                return Err(Error::runtime_at("division by zero", location));
            }
            left / right
        }
        BinaryOp::Mod => {
            if right == 0.0 {
                return Err(Error::runtime_at("division by zero in %", location));
            }
            left % right
        }
        BinaryOp::Pow => left.powf(right),
        other => {
            return Err(Error::runtime_at(
                format!("{other:?} is not an arithmetic operator"),
                location,
            ));
        }
    })
}

impl<'a> Interpreter<'a> {
    pub(super) fn eval(&mut self, expr: &Expr) -> Exec<Value> {
        match expr {
            Expr::Number(n, _) => Ok(Value::Number(*n)),

            Expr::String(s, _) => Ok(Value::str(s.as_str())),

            Expr::Regex(source, _) => {
                // A bare regex matches against $0
                let regex = self.regex(source)?;
                Ok(Value::bool(regex.is_match(self.record.text(&self.ofs))))
            }

            Expr::Var(var, _) => Ok(self.var_value(var)?),

            Expr::Field(index, location) => {
                let index = self.field_index(index, *location)?;
                Ok(Value::from_input(self.record.field(index, &self.ofs)))
            }

            Expr::Index { array, indices, .. } => {
                let key = self.subscript(indices)?;
                let array = self.scopes.array(array)?;
                // Referencing an element creates it
                let value = array.borrow_mut().entry(key).or_default().clone();
                Ok(value)
            }

            Expr::Binary {
                left,
                op,
                right,
                location,
            } => self.eval_binary(left, *op, right, *location),

            Expr::Unary { op, operand, .. } => {
                let value = self.eval(operand)?;
                Ok(match op {
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Pos => Value::Number(value.to_number()),
                    UnaryOp::Not => Value::bool(!value.is_truthy()),
                })
            }

            Expr::Assign {
                target,
                op,
                value,
                location,
            } => {
                let lvalue = self.lvalue(target)?;
                let rhs = self.eval(value)?;
                let result = match op.binary_op() {
                    None => rhs,
                    Some(op) => {
                        let current = self.load(&lvalue)?.to_number();
                        Value::Number(arithmetic(op, current, rhs.to_number(), *location)?)
                    }
                };
                self.store(&lvalue, result.clone())?;
                Ok(result)
            }

            Expr::IncDec {
                target,
                delta,
                prefix,
                ..
            } => {
                let lvalue = self.lvalue(target)?;
                let old = self.load(&lvalue)?.to_number();
                let new = old + delta;
                self.store(&lvalue, Value::Number(new))?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }

            Expr::Ternary {
                condition,
                then_expr,
                else_expr,
                ..
            } => {
                if self.eval(condition)?.is_truthy() {
                    self.eval(then_expr)
                } else {
                    self.eval(else_expr)
                }
            }

            Expr::BuiltinCall {
                func,
                args,
                location,
            } => self.call_builtin(*func, args, *location),

            Expr::UserCall {
                name,
                index,
                args,
                location,
            } => self.call_user(name, *index, args, *location),

            Expr::InArray { key, array, .. } => {
                let key = self.subscript(key)?;
                let array = self.scopes.array(array)?;
                let found = array.borrow().contains_key(&key);
                Ok(Value::bool(found))
            }

            Expr::Match {
                expr,
                pattern,
                negated,
                ..
            } => {
                let text = self.eval(expr)?.into_string(&self.convfmt);
                let regex = self.regex_operand(pattern)?;
                Ok(Value::bool(regex.is_match(&text) != *negated))
            }

            Expr::Getline { target, input, .. } => self.eval_getline(target.as_deref(), input),

            Expr::Group(inner, _) => self.eval(inner),
        }
    }

    fn eval_binary(
        &mut self,
        left: &Expr,
        op: BinaryOp,
        right: &Expr,
        location: SourceLocation,
    ) -> Exec<Value> {
        // Short-circuit evaluation for logical operators
        match op {
            BinaryOp::And => {
                let result = self.eval(left)?.is_truthy() && self.eval(right)?.is_truthy();
                return Ok(Value::bool(result));
            }
            BinaryOp::Or => {
                let result = self.eval(left)?.is_truthy() || self.eval(right)?.is_truthy();
                return Ok(Value::bool(result));
            }
            _ => {}
        }

        let l = self.eval(left)?;
        let r = self.eval(right)?;

        let ordering = || compare_values(&l, &r, &self.convfmt);
        Ok(match op {
            BinaryOp::Lt => Value::bool(ordering().is_lt()),
            BinaryOp::Le => Value::bool(ordering().is_le()),
            BinaryOp::Gt => Value::bool(ordering().is_gt()),
            BinaryOp::Ge => Value::bool(ordering().is_ge()),
            BinaryOp::Eq => Value::bool(ordering().is_eq()),
            BinaryOp::Ne => Value::bool(ordering().is_ne()),
            BinaryOp::Concat => {
                let mut s = l.to_str(&self.convfmt).into_owned();
                s.push_str(&r.to_str(&self.convfmt));
                Value::Str(s)
            }
            _ => Value::Number(arithmetic(op, l.to_number(), r.to_number(), location)?),
        })
    }

    fn var_value(&mut self, var: &VarRef) -> Result<Value> {
        match var.scope {
            Scope::Special(special) => Ok(self.special(special)),
            _ => self.scopes.get(var),
        }
    }

    fn field_index(&mut self, index: &Expr, location: SourceLocation) -> Exec<usize> {
        let n = self.eval(index)?.to_number();
        if n < 0.0 || n.is_nan() {
            return Err(Error::runtime_at(format!("field index {n} is negative"), location).into());
        }
        Ok(n as usize)
    }

    /// Array key: subscripts joined with SUBSEP
    pub(super) fn subscript(&mut self, indices: &[Expr]) -> Exec<String> {
        let mut key = String::new();
        for (i, index) in indices.iter().enumerate() {
            if i > 0 {
                key.push_str(&self.subsep);
            }
            let value = self.eval(index)?;
            key.push_str(&value.to_str(&self.convfmt));
        }
        Ok(key)
    }

    /// Regex from a literal, or from the string value of any other expression
    pub(super) fn regex_operand(&mut self, expr: &Expr) -> Exec<Regex> {
        match expr {
            Expr::Regex(source, _) => Ok(self.regex(source)?),
            other => {
                let source = self.eval(other)?.into_string(&self.convfmt);
                Ok(self.regex(&source)?)
            }
        }
    }

    pub(super) fn lvalue<'e>(&mut self, expr: &'e Expr) -> Exec<LValue<'e>> {
        match expr {
            Expr::Var(var, _) => Ok(LValue::Var(var)),
            Expr::Index { array, indices, .. } => {
                let key = self.subscript(indices)?;
                Ok(LValue::Element(self.scopes.array(array)?, key))
            }
            Expr::Field(index, location) => Ok(LValue::Field(self.field_index(index, *location)?)),
            Expr::Group(inner, _) => self.lvalue(inner),
            other => Err(Error::runtime_at("assignment to a non-variable", other.location()).into()),
        }
    }

    pub(super) fn load(&mut self, lvalue: &LValue<'_>) -> Exec<Value> {
        Ok(match lvalue {
            LValue::Var(var) => self.var_value(var)?,
            LValue::Element(array, key) => array.borrow().get(key).cloned().unwrap_or_default(),
            LValue::Field(index) => Value::from_input(self.record.field(*index, &self.ofs)),
        })
    }

    pub(super) fn store(&mut self, lvalue: &LValue<'_>, value: Value) -> Exec<()> {
        match lvalue {
            LValue::Var(var) => self.assign_var(var, value)?,
            LValue::Element(array, key) => {
                array.borrow_mut().insert(key.clone(), value);
            }
            LValue::Field(index) => {
                let text = value.into_string(&self.convfmt);
                self.record.set_field(*index, text);
            }
        }
        Ok(())
    }

    /// `getline` in all its forms: 1 on success, 0 at end of input, -1 on error
    fn eval_getline(&mut self, target: Option<&Expr>, input: &GetlineInput) -> Exec<Value> {
        let read = match input {
            GetlineInput::Main => {
                // No main input in BEGIN and END
                let Some(reader) = self.main_input.as_mut() else {
                    return Ok(Value::Number(0.0));
                };
                let read = reader.read_record(&self.record_separator);
                if let Ok(Some(_)) = read {
                    self.nr += 1.0;
                    self.fnr += 1.0;
                }
                read
            }
            GetlineInput::File(name) => {
                let name = self.eval(name)?.into_string(&self.convfmt);
                self.streams.read_record(&name, false, &self.record_separator)
            }
            GetlineInput::Pipe(command) => {
                let command = self.eval(command)?.into_string(&self.convfmt);
                self.flush_all()?;
                let read = self.streams.read_record(&command, true, &self.record_separator);
                if let Ok(Some(_)) = read {
                    self.nr += 1.0;
                }
                read
            }
        };

        match read {
            Err(err) => {
                debug!("getline failed: {err}");
                Ok(Value::Number(-1.0))
            }
            Ok(None) => Ok(Value::Number(0.0)),
            Ok(Some(text)) => {
                match target {
                    Some(target) => {
                        let lvalue = self.lvalue(target)?;
                        self.store(&lvalue, Value::from_input(text))?;
                    }
                    None => self.record.set_record(text),
                }
                Ok(Value::Number(1.0))
            }
        }
    }

    /// Call a user-defined function. Arrays are passed by reference,
    /// scalars by value; an untyped variable that the callee uses as an
    /// array becomes that array in the caller too.
    fn call_user(
        &mut self,
        name: &str,
        index: usize,
        args: &[Expr],
        location: SourceLocation,
    ) -> Exec<Value> {
        let functions = Rc::clone(&self.functions);
        let Some(func) = functions.get(index) else {
            return Err(Error::runtime_at(format!("calling undefined function {name}"), location).into());
        };
        if args.len() > func.params.len() {
            return Err(Error::runtime_at(
                format!(
                    "function {name} called with {} args, accepts only {}",
                    args.len(),
                    func.params.len()
                ),
                location,
            )
            .into());
        }

        let mut frame = Vec::with_capacity(func.params.len());
        let mut deferred = Vec::new();
        for (i, arg) in args.iter().enumerate() {
            let slot = match arg {
                Expr::Var(var, _) if !matches!(var.scope, Scope::Special(_)) => {
                    let slot = self.scopes.argument(var);
                    if let Slot::Untyped = slot {
                        deferred.push((i, var));
                    }
                    slot
                }
                other => Slot::Scalar(self.eval(other)?),
            };
            frame.push(slot);
        }
        // Extra parameters are locals
        frame.resize_with(func.params.len(), Slot::default);

        self.scopes.push_frame(frame);
        // Recursion depth is bounded only by memory: move to a fresh stack
        // segment when this one runs low
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.exec_block(&func.body)
        });
        let frame = self.scopes.pop_frame();

        for (i, var) in deferred {
            if let Some(Slot::Array(array)) = frame.get(i) {
                self.scopes.adopt_array(var, Rc::clone(array))?;
            }
        }

        match result? {
            StmtResult::Return(value) => Ok(value),
            _ => Ok(Value::Uninitialized),
        }
    }
}
