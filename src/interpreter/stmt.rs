use crate::ast::*;
use crate::format;
use crate::value::Value;

use super::{Exec, Interpreter, Unwind};

/// Result of executing a statement
pub(super) enum StmtResult {
    Normal,
    Break,
    Continue,
    Return(Value),
}

impl<'a> Interpreter<'a> {
    pub(super) fn exec_block(&mut self, block: &Block) -> Exec<StmtResult> {
        for stmt in &block.statements {
            match self.exec_stmt(stmt)? {
                StmtResult::Normal => continue,
                other => return Ok(other),
            }
        }
        Ok(StmtResult::Normal)
    }

    /// Run a loop body; `None` means the loop should stop and propagate
    /// the returned result
    fn exec_loop_body(&mut self, body: &Stmt) -> Exec<Option<StmtResult>> {
        match self.exec_stmt(body)? {
            StmtResult::Normal | StmtResult::Continue => Ok(None),
            StmtResult::Break => Ok(Some(StmtResult::Normal)),
            StmtResult::Return(value) => Ok(Some(StmtResult::Return(value))),
        }
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Exec<StmtResult> {
        match stmt {
            Stmt::Empty => Ok(StmtResult::Normal),

            Stmt::Expr(expr) => {
                self.eval(expr)?;
                Ok(StmtResult::Normal)
            }

            Stmt::Print { args, output, .. } => {
                self.exec_print(args, output.as_ref())?;
                Ok(StmtResult::Normal)
            }

            Stmt::Printf {
                format, args, output, ..
            } => {
                self.exec_printf(format, args, output.as_ref())?;
                Ok(StmtResult::Normal)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                if self.eval(condition)?.is_truthy() {
                    self.exec_stmt(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.exec_stmt(else_stmt)
                } else {
                    Ok(StmtResult::Normal)
                }
            }

            Stmt::While {
                condition, body, ..
            } => {
                while self.eval(condition)?.is_truthy() {
                    if let Some(result) = self.exec_loop_body(body)? {
                        return Ok(result);
                    }
                }
                Ok(StmtResult::Normal)
            }

            Stmt::DoWhile {
                body, condition, ..
            } => {
                loop {
                    if let Some(result) = self.exec_loop_body(body)? {
                        return Ok(result);
                    }
                    if !self.eval(condition)?.is_truthy() {
                        break;
                    }
                }
                Ok(StmtResult::Normal)
            }

            Stmt::For {
                init,
                condition,
                update,
                body,
                ..
            } => {
                if let Some(init_stmt) = init {
                    self.exec_stmt(init_stmt)?;
                }

                loop {
                    if let Some(cond_expr) = condition
                        && !self.eval(cond_expr)?.is_truthy()
                    {
                        break;
                    }

                    if let Some(result) = self.exec_loop_body(body)? {
                        return Ok(result);
                    }

                    if let Some(update_stmt) = update {
                        self.exec_stmt(update_stmt)?;
                    }
                }
                Ok(StmtResult::Normal)
            }

            Stmt::ForIn {
                var, array, body, ..
            } => {
                let array = self.scopes.array(array)?;
                let keys: Vec<String> = array.borrow().keys().cloned().collect();

                for key in keys {
                    // Skip elements deleted by the loop body
                    if !array.borrow().contains_key(&key) {
                        continue;
                    }
                    self.assign_var(var, Value::from_input(key))?;
                    if let Some(result) = self.exec_loop_body(body)? {
                        return Ok(result);
                    }
                }
                Ok(StmtResult::Normal)
            }

            Stmt::Block(block) => self.exec_block(block),

            Stmt::Break { .. } => Ok(StmtResult::Break),

            Stmt::Continue { .. } => Ok(StmtResult::Continue),

            Stmt::Next { .. } => Err(Unwind::Next),

            Stmt::Nextfile { .. } => Err(Unwind::NextFile),

            Stmt::Exit { code, .. } => {
                // A bare exit keeps the status of an earlier `exit expr`
                if let Some(code) = code {
                    self.exit_status = self.eval(code)?.to_number() as i32;
                }
                Err(Unwind::Exit)
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Uninitialized,
                };
                Ok(StmtResult::Return(value))
            }

            Stmt::Delete { array, index, .. } => {
                let array = self.scopes.array(array)?;
                if index.is_empty() {
                    array.borrow_mut().clear();
                } else {
                    let key = self.subscript(index)?;
                    array.borrow_mut().remove(&key);
                }
                Ok(StmtResult::Normal)
            }
        }
    }

    fn exec_print(&mut self, args: &[Expr], redirect: Option<&OutputRedirect>) -> Exec<()> {
        let mut line = String::new();
        if args.is_empty() {
            line.push_str(self.record.text(&self.ofs));
        } else {
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    line.push_str(&self.ofs);
                }
                let value = self.eval(arg)?;
                // Numbers print with OFMT, not CONVFMT
                line.push_str(&value.to_str(&self.ofmt));
            }
        }
        line.push_str(&self.ors);
        self.write_output(redirect, &line)
    }

    fn exec_printf(
        &mut self,
        format_expr: &Expr,
        args: &[Expr],
        redirect: Option<&OutputRedirect>,
    ) -> Exec<()> {
        let format = self.eval(format_expr)?.into_string(&self.convfmt);
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg)?);
        }
        let formatted = format::sprintf(&format, &values, &self.convfmt)?;
        self.write_output(redirect, &formatted)
    }
}
