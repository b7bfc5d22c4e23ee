use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::ast::*;
use crate::error::{Error, Result, SourceLocation};
use crate::lexer::{Token, TokenKind};

/// AWK parser using recursive descent
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    functions: Vec<FunctionDef>,
    function_index: HashMap<String, usize>,
    /// Parameter names of the function being parsed
    params: Option<Vec<String>>,
    loop_depth: usize,
    /// Inside a BEGIN or END action
    in_begin_end: bool,
    /// Parsing unparenthesised print arguments, where `>` is a redirection
    in_print: bool,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            current: 0,
            functions: Vec::new(),
            function_index: HashMap::new(),
            params: None,
            loop_depth: 0,
            in_begin_end: false,
            in_print: false,
        }
    }

    /// Parse a complete AWK program
    pub fn parse(&mut self) -> Result<Program> {
        self.declare_functions()?;

        let mut rules = Vec::new();
        self.skip_terminators();

        while !self.is_at_end() {
            if self.check(&TokenKind::Function) {
                let function = self.parse_function()?;
                self.functions.push(function);
            } else {
                rules.push(self.parse_rule()?);
            }
            self.skip_terminators();
        }

        debug!(
            "parsed {} rules and {} functions",
            rules.len(),
            self.functions.len()
        );

        Ok(Program {
            rules,
            functions: Rc::new(std::mem::take(&mut self.functions)),
            function_index: std::mem::take(&mut self.function_index),
        })
    }

    /// Register every function name up front so calls may precede definitions
    fn declare_functions(&mut self) -> Result<()> {
        for pair in self.tokens.windows(2) {
            if pair[0].kind != TokenKind::Function {
                continue;
            }
            let name = match &pair[1].kind {
                TokenKind::Identifier(name) | TokenKind::FuncName(name) => name,
                _ => continue,
            };
            if Builtin::from_name(name).is_some() {
                return Err(Error::syntax(
                    format!("can't use built-in function {name} as a function name"),
                    pair[1].location,
                ));
            }
            if self.function_index.contains_key(name) {
                return Err(Error::syntax(
                    format!("function {name} redefined"),
                    pair[1].location,
                ));
            }
            let index = self.function_index.len();
            self.function_index.insert(name.clone(), index);
        }
        Ok(())
    }

    /// Parse a function definition
    fn parse_function(&mut self) -> Result<FunctionDef> {
        let location = self.current_location();
        self.expect(&TokenKind::Function)?;

        let name = match self.peek_kind() {
            Some(TokenKind::Identifier(name)) | Some(TokenKind::FuncName(name)) => name.clone(),
            _ => return Err(self.unexpected()),
        };
        self.advance();
        self.expect(&TokenKind::LeftParen)?;

        let mut params: Vec<String> = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                let param_location = self.current_location();
                let param = self.expect_identifier()?;
                if SpecialVar::from_name(&param).is_some() || Builtin::from_name(&param).is_some() {
                    return Err(Error::syntax(
                        format!("can't use {param} as a parameter name"),
                        param_location,
                    ));
                }
                if param == name || params.contains(&param) {
                    return Err(Error::syntax(
                        format!("duplicate parameter {param} in function {name}"),
                        param_location,
                    ));
                }
                params.push(param);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RightParen)?;
        self.skip_newlines();

        self.params = Some(params.clone());
        let body = self.parse_block();
        self.params = None;

        Ok(FunctionDef {
            name,
            params,
            body: body?,
            location,
        })
    }

    /// Parse a pattern-action rule
    fn parse_rule(&mut self) -> Result<Rule> {
        let location = self.current_location();

        if self.check(&TokenKind::Begin) || self.check(&TokenKind::End) {
            let pattern = if self.match_token(&TokenKind::Begin) {
                Pattern::Begin
            } else {
                self.advance();
                Pattern::End
            };
            self.skip_newlines();
            self.in_begin_end = true;
            let action = self.parse_block();
            self.in_begin_end = false;
            return Ok(Rule {
                pattern,
                action: Some(action?),
                location,
            });
        }

        // Action-only rule
        if self.check(&TokenKind::LeftBrace) {
            return Ok(Rule {
                pattern: Pattern::Always,
                action: Some(self.parse_block()?),
                location,
            });
        }

        let start = self.parse_expression()?;
        let pattern = if self.match_token(&TokenKind::Comma) {
            let end = self.parse_expression()?;
            Pattern::Range(start, end)
        } else {
            Pattern::Expr(start)
        };

        // The action must start on the pattern's line
        let action = if self.check(&TokenKind::LeftBrace) {
            Some(self.parse_block()?)
        } else {
            None
        };

        Ok(Rule {
            pattern,
            action,
            location,
        })
    }

    /// Parse a block { ... }
    fn parse_block(&mut self) -> Result<Block> {
        let location = self.current_location();
        self.expect(&TokenKind::LeftBrace)?;
        self.skip_terminators();

        let mut statements = Vec::new();
        while !self.check(&TokenKind::RightBrace) {
            if self.is_at_end() {
                return Err(Error::syntax(
                    "unexpected end of input, missing '}'",
                    self.current_location(),
                ));
            }
            statements.push(self.parse_statement()?);
            self.skip_terminators();
        }
        self.expect(&TokenKind::RightBrace)?;

        Ok(Block::new(statements, location))
    }

    /// Parse a single statement
    fn parse_statement(&mut self) -> Result<Stmt> {
        self.skip_newlines();
        let location = self.current_location();

        if self.match_token(&TokenKind::Semicolon) {
            return Ok(Stmt::Empty);
        }
        if self.check(&TokenKind::LeftBrace) {
            return Ok(Stmt::Block(self.parse_block()?));
        }
        if self.match_token(&TokenKind::If) {
            return self.parse_if_statement(location);
        }
        if self.match_token(&TokenKind::While) {
            return self.parse_while_statement(location);
        }
        if self.match_token(&TokenKind::For) {
            return self.parse_for_statement(location);
        }
        if self.match_token(&TokenKind::Do) {
            return self.parse_do_while_statement(location);
        }

        let stmt = self.parse_simple_statement(location)?;
        self.end_simple_statement()?;
        Ok(stmt)
    }

    /// Statements that must be followed by a terminator
    fn parse_simple_statement(&mut self, location: SourceLocation) -> Result<Stmt> {
        if self.match_token(&TokenKind::Break) {
            if self.loop_depth == 0 {
                return Err(Error::syntax("break is not allowed outside a loop", location));
            }
            return Ok(Stmt::Break { location });
        }

        if self.match_token(&TokenKind::Continue) {
            if self.loop_depth == 0 {
                return Err(Error::syntax("continue is not allowed outside a loop", location));
            }
            return Ok(Stmt::Continue { location });
        }

        if self.check(&TokenKind::Next) || self.check(&TokenKind::Nextfile) {
            let is_next = self.check(&TokenKind::Next);
            let word = if is_next { "next" } else { "nextfile" };
            if self.in_begin_end {
                return Err(Error::syntax(format!("{word} used in BEGIN or END action"), location));
            }
            self.advance();
            return Ok(if is_next {
                Stmt::Next { location }
            } else {
                Stmt::Nextfile { location }
            });
        }

        if self.match_token(&TokenKind::Exit) {
            let code = if self.can_start_expression() {
                Some(self.parse_expression()?)
            } else {
                None
            };
            return Ok(Stmt::Exit { code, location });
        }

        if self.match_token(&TokenKind::Return) {
            if self.params.is_none() {
                return Err(Error::syntax("return used outside a function", location));
            }
            let value = if self.can_start_expression() {
                Some(self.parse_expression()?)
            } else {
                None
            };
            return Ok(Stmt::Return { value, location });
        }

        if self.match_token(&TokenKind::Delete) {
            let array = self.parse_array_name()?;
            let index = if self.match_token(&TokenKind::LeftBracket) {
                let index = self.nested(|p| p.parse_expression_list())?;
                self.expect(&TokenKind::RightBracket)?;
                index
            } else {
                Vec::new()
            };
            return Ok(Stmt::Delete {
                array,
                index,
                location,
            });
        }

        if self.match_token(&TokenKind::Print) {
            return self.parse_print_statement(location, false);
        }

        if self.match_token(&TokenKind::Printf) {
            return self.parse_print_statement(location, true);
        }

        Ok(Stmt::Expr(self.parse_expression()?))
    }

    fn end_simple_statement(&mut self) -> Result<()> {
        if self.match_token(&TokenKind::Semicolon) || self.match_token(&TokenKind::Newline) {
            return Ok(());
        }
        if self.check(&TokenKind::RightBrace) || self.check(&TokenKind::Else) || self.is_at_end() {
            return Ok(());
        }
        Err(self.unexpected())
    }

    fn parse_if_statement(&mut self, location: SourceLocation) -> Result<Stmt> {
        self.expect(&TokenKind::LeftParen)?;
        let condition = self.nested(|p| p.parse_expression())?;
        self.expect(&TokenKind::RightParen)?;

        let then_branch = Box::new(self.parse_statement()?);

        let saved = self.current;
        self.skip_terminators();
        let else_branch = if self.match_token(&TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            self.current = saved;
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
            location,
        })
    }

    fn parse_while_statement(&mut self, location: SourceLocation) -> Result<Stmt> {
        self.expect(&TokenKind::LeftParen)?;
        let condition = self.nested(|p| p.parse_expression())?;
        self.expect(&TokenKind::RightParen)?;

        let body = Box::new(self.parse_loop_body()?);

        Ok(Stmt::While {
            condition,
            body,
            location,
        })
    }

    fn parse_for_statement(&mut self, location: SourceLocation) -> Result<Stmt> {
        self.expect(&TokenKind::LeftParen)?;

        // for (var in array)
        if self.is_for_in_header() {
            let var_location = self.current_location();
            let name = self.expect_identifier()?;
            let var = self.resolve(&name);
            if self.function_index.contains_key(&name) {
                return Err(Error::syntax(
                    format!("function name {name} used as a variable"),
                    var_location,
                ));
            }
            self.expect(&TokenKind::In)?;
            let array = self.parse_array_name()?;
            self.expect(&TokenKind::RightParen)?;
            let body = Box::new(self.parse_loop_body()?);
            return Ok(Stmt::ForIn {
                var,
                array,
                body,
                location,
            });
        }

        let init = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(Box::new(Stmt::Expr(self.nested(|p| p.parse_expression())?)))
        };
        self.expect(&TokenKind::Semicolon)?;
        self.skip_newlines();

        let condition = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.nested(|p| p.parse_expression())?)
        };
        self.expect(&TokenKind::Semicolon)?;
        self.skip_newlines();

        let update = if self.check(&TokenKind::RightParen) {
            None
        } else {
            Some(Box::new(Stmt::Expr(self.nested(|p| p.parse_expression())?)))
        };
        self.expect(&TokenKind::RightParen)?;

        let body = Box::new(self.parse_loop_body()?);

        Ok(Stmt::For {
            init,
            condition,
            update,
            body,
            location,
        })
    }

    fn parse_do_while_statement(&mut self, location: SourceLocation) -> Result<Stmt> {
        let body = Box::new(self.parse_loop_body()?);
        self.skip_terminators();
        self.expect(&TokenKind::While)?;
        self.expect(&TokenKind::LeftParen)?;
        let condition = self.nested(|p| p.parse_expression())?;
        self.expect(&TokenKind::RightParen)?;

        Ok(Stmt::DoWhile {
            body,
            condition,
            location,
        })
    }

    fn parse_loop_body(&mut self) -> Result<Stmt> {
        self.loop_depth += 1;
        let body = self.parse_statement();
        self.loop_depth -= 1;
        body
    }

    fn is_for_in_header(&self) -> bool {
        matches!(
            (
                self.peek_kind_at(0),
                self.peek_kind_at(1),
                self.peek_kind_at(2),
                self.peek_kind_at(3)
            ),
            (
                Some(TokenKind::Identifier(_)),
                Some(TokenKind::In),
                Some(TokenKind::Identifier(_)),
                Some(TokenKind::RightParen)
            )
        )
    }

    fn parse_print_statement(&mut self, location: SourceLocation, is_printf: bool) -> Result<Stmt> {
        let mut args = if self.check(&TokenKind::LeftParen) && self.is_grouped_print_list() {
            // print (a, b) > "file"
            self.advance();
            let args = self.nested(|p| p.parse_expression_list())?;
            self.expect(&TokenKind::RightParen)?;
            args
        } else if self.can_start_expression() {
            let saved = std::mem::replace(&mut self.in_print, true);
            let args = self.parse_expression_list();
            self.in_print = saved;
            args?
        } else {
            Vec::new()
        };

        let output = self.parse_output_redirect()?;

        if !is_printf {
            return Ok(Stmt::Print {
                args,
                output,
                location,
            });
        }

        if args.is_empty() {
            return Err(Error::syntax("printf: no format", location));
        }
        let format = args.remove(0);
        Ok(Stmt::Printf {
            format,
            args,
            output,
            location,
        })
    }

    /// A parenthesised list directly followed by the end of the statement or a
    /// redirection is the whole argument list, not a grouped expression
    fn is_grouped_print_list(&self) -> bool {
        let mut depth = 0usize;
        let mut pos = self.current;
        while let Some(token) = self.tokens.get(pos) {
            match token.kind {
                TokenKind::LeftParen => depth += 1,
                TokenKind::RightParen => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                TokenKind::Eof => return false,
                _ => {}
            }
            pos += 1;
        }
        matches!(
            self.tokens.get(pos + 1).map(|t| &t.kind),
            Some(
                TokenKind::Semicolon
                    | TokenKind::Newline
                    | TokenKind::RightBrace
                    | TokenKind::Eof
                    | TokenKind::Greater
                    | TokenKind::Append
                    | TokenKind::Pipe
            )
        )
    }

    fn parse_output_redirect(&mut self) -> Result<Option<OutputRedirect>> {
        let make: fn(Expr) -> OutputRedirect = if self.match_token(&TokenKind::Greater) {
            OutputRedirect::Truncate
        } else if self.match_token(&TokenKind::Append) {
            OutputRedirect::Append
        } else if self.match_token(&TokenKind::Pipe) {
            OutputRedirect::Pipe
        } else {
            return Ok(None);
        };

        let saved = std::mem::replace(&mut self.in_print, true);
        let target = self.parse_concat();
        self.in_print = saved;
        Ok(Some(make(target?)))
    }

    /// Comma-separated expressions, at least one
    fn parse_expression_list(&mut self) -> Result<Vec<Expr>> {
        let mut exprs = vec![self.parse_expression()?];
        while self.match_token(&TokenKind::Comma) {
            exprs.push(self.parse_expression()?);
        }
        Ok(exprs)
    }

    /// Run `f` with `>` meaning comparison again, as inside parentheses
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = std::mem::replace(&mut self.in_print, false);
        let result = f(self);
        self.in_print = saved;
        result
    }

    /// Parse an expression
    fn parse_expression(&mut self) -> Result<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr> {
        let expr = self.parse_ternary()?;

        let location = self.current_location();
        let Some(op) = self.peek_kind().and_then(TokenKind::assign_op) else {
            return Ok(expr);
        };
        if !expr.is_lvalue() {
            return Err(Error::syntax(
                "assignment target must be a variable, array element or field",
                location,
            ));
        }
        self.advance();

        let value = self.parse_assignment()?;
        Ok(Expr::Assign {
            target: Box::new(expr),
            op,
            value: Box::new(value),
            location,
        })
    }

    fn parse_ternary(&mut self) -> Result<Expr> {
        let condition = self.parse_or()?;

        let location = self.current_location();
        if !self.match_token(&TokenKind::Question) {
            return Ok(condition);
        }
        self.skip_newlines();
        let then_expr = self.parse_expression()?;
        self.skip_newlines();
        self.expect(&TokenKind::Colon)?;
        self.skip_newlines();
        let else_expr = self.parse_expression()?;

        Ok(Expr::Ternary {
            condition: Box::new(condition),
            then_expr: Box::new(then_expr),
            else_expr: Box::new(else_expr),
            location,
        })
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut expr = self.parse_and()?;

        while self.check(&TokenKind::Or) {
            let location = self.current_location();
            self.advance();
            let right = self.parse_and()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op: BinaryOp::Or,
                right: Box::new(right),
                location,
            };
        }

        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut expr = self.parse_in()?;

        while self.check(&TokenKind::And) {
            let location = self.current_location();
            self.advance();
            let right = self.parse_in()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op: BinaryOp::And,
                right: Box::new(right),
                location,
            };
        }

        Ok(expr)
    }

    fn parse_in(&mut self) -> Result<Expr> {
        let mut expr = self.parse_match()?;

        while self.check(&TokenKind::In) {
            let location = self.current_location();
            self.advance();
            let array = self.parse_array_name()?;
            expr = Expr::InArray {
                key: vec![expr],
                array,
                location,
            };
        }

        Ok(expr)
    }

    fn parse_match(&mut self) -> Result<Expr> {
        let mut expr = self.parse_comparison()?;

        loop {
            let location = self.current_location();
            let negated = if self.match_token(&TokenKind::Match) {
                false
            } else if self.match_token(&TokenKind::NotMatch) {
                true
            } else {
                break;
            };
            let pattern = self.parse_comparison()?;
            expr = Expr::Match {
                expr: Box::new(expr),
                pattern: Box::new(pattern),
                negated,
                location,
            };
        }

        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let mut expr = self.parse_pipe_getline()?;

        loop {
            let location = self.current_location();
            let op = match self.peek_kind() {
                Some(TokenKind::Less) => BinaryOp::Lt,
                Some(TokenKind::LessEqual) => BinaryOp::Le,
                // Unparenthesised `>` inside print is a redirection
                Some(TokenKind::Greater) if !self.in_print => BinaryOp::Gt,
                Some(TokenKind::GreaterEqual) => BinaryOp::Ge,
                Some(TokenKind::Equal) => BinaryOp::Eq,
                Some(TokenKind::NotEqual) => BinaryOp::Ne,
                _ => break,
            };
            self.advance();

            let right = self.parse_pipe_getline()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
                location,
            };
        }

        Ok(expr)
    }

    /// cmd | getline [lvalue]
    fn parse_pipe_getline(&mut self) -> Result<Expr> {
        let mut expr = self.parse_concat()?;

        while !self.in_print
            && self.check(&TokenKind::Pipe)
            && matches!(self.peek_kind_at(1), Some(TokenKind::Getline))
        {
            let location = self.current_location();
            self.advance();
            self.advance();
            let target = self.parse_getline_target()?;
            expr = Expr::Getline {
                target,
                input: GetlineInput::Pipe(Box::new(expr)),
                location,
            };
        }

        Ok(expr)
    }

    fn parse_concat(&mut self) -> Result<Expr> {
        let mut expr = self.parse_additive()?;

        // Concatenation is implicit between adjacent expressions
        while self.can_start_concat_operand() {
            let location = self.current_location();
            let right = self.parse_additive()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op: BinaryOp::Concat,
                right: Box::new(right),
                location,
            };
        }

        Ok(expr)
    }

    /// `-`, `+` and `!` are left out: `a -1` is a subtraction
    fn can_start_concat_operand(&self) -> bool {
        matches!(
            self.peek_kind(),
            Some(
                TokenKind::Number(_)
                    | TokenKind::String(_)
                    | TokenKind::Identifier(_)
                    | TokenKind::FuncName(_)
                    | TokenKind::Dollar
                    | TokenKind::LeftParen
                    | TokenKind::Increment
                    | TokenKind::Decrement
            )
        )
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut expr = self.parse_multiplicative()?;

        loop {
            let location = self.current_location();
            let op = if self.match_token(&TokenKind::Plus) {
                BinaryOp::Add
            } else if self.match_token(&TokenKind::Minus) {
                BinaryOp::Sub
            } else {
                break;
            };

            let right = self.parse_multiplicative()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
                location,
            };
        }

        Ok(expr)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut expr = self.parse_unary()?;

        loop {
            let location = self.current_location();
            let op = if self.match_token(&TokenKind::Star) {
                BinaryOp::Mul
            } else if self.match_token(&TokenKind::Slash) {
                BinaryOp::Div
            } else if self.match_token(&TokenKind::Percent) {
                BinaryOp::Mod
            } else {
                break;
            };

            let right = self.parse_unary()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
                location,
            };
        }

        Ok(expr)
    }

    /// Unary operators bind looser than `^`, so `-2^2` is `-(2^2)`
    fn parse_unary(&mut self) -> Result<Expr> {
        let location = self.current_location();

        let op = if self.match_token(&TokenKind::Not) {
            UnaryOp::Not
        } else if self.match_token(&TokenKind::Minus) {
            UnaryOp::Neg
        } else if self.match_token(&TokenKind::Plus) {
            UnaryOp::Pos
        } else {
            return self.parse_power();
        };

        let operand = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
            location,
        })
    }

    fn parse_power(&mut self) -> Result<Expr> {
        let base = self.parse_postfix()?;

        if !self.check(&TokenKind::Caret) {
            return Ok(base);
        }
        let location = self.current_location();
        self.advance();

        // Right-associative; the exponent may carry its own sign
        let exponent = if matches!(
            self.peek_kind(),
            Some(TokenKind::Minus | TokenKind::Plus | TokenKind::Not)
        ) {
            self.parse_unary()?
        } else {
            self.parse_power()?
        };

        Ok(Expr::Binary {
            left: Box::new(base),
            op: BinaryOp::Pow,
            right: Box::new(exponent),
            location,
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let location = self.current_location();

        let prefix = if self.match_token(&TokenKind::Increment) {
            Some(1.0)
        } else if self.match_token(&TokenKind::Decrement) {
            Some(-1.0)
        } else {
            None
        };
        if let Some(delta) = prefix {
            let target = self.parse_field()?;
            if !target.is_lvalue() {
                return Err(Error::syntax("++ or -- applied to a non-variable", location));
            }
            return Ok(Expr::IncDec {
                target: Box::new(target),
                delta,
                prefix: true,
                location,
            });
        }

        let expr = self.parse_field()?;
        if !expr.is_lvalue() {
            return Ok(expr);
        }

        let location = self.current_location();
        let delta = if self.match_token(&TokenKind::Increment) {
            1.0
        } else if self.match_token(&TokenKind::Decrement) {
            -1.0
        } else {
            return Ok(expr);
        };

        Ok(Expr::IncDec {
            target: Box::new(expr),
            delta,
            prefix: false,
            location,
        })
    }

    fn parse_field(&mut self) -> Result<Expr> {
        let location = self.current_location();
        if !self.match_token(&TokenKind::Dollar) {
            return self.parse_primary();
        }

        let index = match self.peek_kind() {
            // $++i
            Some(TokenKind::Increment | TokenKind::Decrement) => self.parse_postfix()?,
            // $-1, $!x
            Some(TokenKind::Minus | TokenKind::Plus | TokenKind::Not) => {
                let op_location = self.current_location();
                let op = if self.match_token(&TokenKind::Minus) {
                    UnaryOp::Neg
                } else if self.match_token(&TokenKind::Plus) {
                    UnaryOp::Pos
                } else {
                    self.advance();
                    UnaryOp::Not
                };
                Expr::Unary {
                    op,
                    operand: Box::new(self.parse_field()?),
                    location: op_location,
                }
            }
            _ => self.parse_field()?,
        };

        Ok(Expr::Field(Box::new(index), location))
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let location = self.current_location();
        let Some(kind) = self.peek_kind().cloned() else {
            return Err(self.unexpected());
        };

        match kind {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Number(n, location))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expr::String(s, location))
            }
            TokenKind::Regex(r) => {
                self.advance();
                Ok(Expr::Regex(r, location))
            }
            TokenKind::FuncName(name) => {
                self.advance();
                self.parse_name(name, true, location)
            }
            TokenKind::Identifier(name) => {
                self.advance();
                self.parse_name(name, false, location)
            }
            TokenKind::Getline => {
                self.advance();
                self.parse_simple_getline(location)
            }
            TokenKind::LeftParen => {
                self.advance();
                self.parse_grouping(location)
            }
            _ => Err(self.unexpected()),
        }
    }

    /// A name: built-in call, user function call, array element or variable
    fn parse_name(&mut self, name: String, is_call: bool, location: SourceLocation) -> Result<Expr> {
        if let Some(func) = Builtin::from_name(&name) {
            let args = if self.match_token(&TokenKind::LeftParen) {
                self.parse_call_args()?
            } else if func == Builtin::Length {
                Vec::new()
            } else {
                return Err(Error::syntax(
                    format!("built-in function {name} requires an argument list"),
                    location,
                ));
            };
            return Ok(Expr::BuiltinCall { func, args, location });
        }

        if let Some(&index) = self.function_index.get(&name) {
            if !self.match_token(&TokenKind::LeftParen) {
                return Err(Error::syntax(
                    format!("function name {name} used as a variable"),
                    location,
                ));
            }
            let args = self.parse_call_args()?;
            return Ok(Expr::UserCall {
                name,
                index,
                args,
                location,
            });
        }

        if is_call {
            return Err(Error::syntax(
                format!("calling undefined function {name}"),
                location,
            ));
        }

        self.parse_variable(&name, location)
    }

    /// Arguments after the opening parenthesis of a call
    fn parse_call_args(&mut self) -> Result<Vec<Expr>> {
        if self.match_token(&TokenKind::RightParen) {
            return Ok(Vec::new());
        }
        let args = self.nested(|p| p.parse_expression_list())?;
        self.expect(&TokenKind::RightParen)?;
        Ok(args)
    }

    fn parse_variable(&mut self, name: &str, location: SourceLocation) -> Result<Expr> {
        let var = self.resolve(name);

        if self.match_token(&TokenKind::LeftBracket) {
            let array = self.array_ref(var, location)?;
            let indices = self.nested(|p| p.parse_expression_list())?;
            self.expect(&TokenKind::RightBracket)?;
            return Ok(Expr::Index {
                array,
                indices,
                location,
            });
        }

        Ok(Expr::Var(var, location))
    }

    /// getline [lvalue] [< file]
    fn parse_simple_getline(&mut self, location: SourceLocation) -> Result<Expr> {
        let target = self.parse_getline_target()?;

        let input = if self.match_token(&TokenKind::Less) {
            GetlineInput::File(Box::new(self.parse_postfix()?))
        } else {
            GetlineInput::Main
        };

        Ok(Expr::Getline {
            target,
            input,
            location,
        })
    }

    fn parse_getline_target(&mut self) -> Result<Option<Box<Expr>>> {
        let location = self.current_location();
        match self.peek_kind().cloned() {
            Some(TokenKind::Dollar) => Ok(Some(Box::new(self.parse_field()?))),
            Some(TokenKind::Identifier(name)) => {
                if Builtin::from_name(&name).is_some() || self.function_index.contains_key(&name) {
                    return Err(Error::syntax(
                        format!("getline target {name} is not a variable"),
                        location,
                    ));
                }
                self.advance();
                Ok(Some(Box::new(self.parse_variable(&name, location)?)))
            }
            Some(TokenKind::FuncName(name)) => Err(Error::syntax(
                format!("getline target {name} is not a variable"),
                location,
            )),
            _ => Ok(None),
        }
    }

    /// ( expr ) or the subscript list of `(i, j) in arr`
    fn parse_grouping(&mut self, location: SourceLocation) -> Result<Expr> {
        let mut exprs = self.nested(|p| p.parse_expression_list())?;
        self.expect(&TokenKind::RightParen)?;

        if exprs.len() == 1
            && let Some(expr) = exprs.pop()
        {
            return Ok(Expr::Group(Box::new(expr), location));
        }

        if !self.match_token(&TokenKind::In) {
            return Err(Error::syntax("expected 'in' after subscript list", location));
        }
        let array = self.parse_array_name()?;
        Ok(Expr::InArray {
            key: exprs,
            array,
            location,
        })
    }

    fn parse_array_name(&mut self) -> Result<VarRef> {
        let location = self.current_location();
        let name = self.expect_identifier()?;
        if self.function_index.contains_key(&name) || Builtin::from_name(&name).is_some() {
            return Err(Error::syntax(format!("can't use {name} as an array"), location));
        }
        let var = self.resolve(&name);
        self.array_ref(var, location)
    }

    fn array_ref(&self, var: VarRef, location: SourceLocation) -> Result<VarRef> {
        if let Scope::Special(_) = var.scope {
            return Err(Error::syntax(
                format!("can't use {} as an array", var.name),
                location,
            ));
        }
        Ok(var)
    }

    /// Resolve a name to a parameter slot, special variable or global
    fn resolve(&self, name: &str) -> VarRef {
        let local = self
            .params
            .as_ref()
            .and_then(|params| params.iter().position(|p| p == name));
        let scope = if let Some(index) = local {
            Scope::Local(index)
        } else if let Some(special) = SpecialVar::from_name(name) {
            Scope::Special(special)
        } else {
            Scope::Global
        };
        VarRef {
            name: name.to_string(),
            scope,
        }
    }

    // ===== Helper methods =====

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek_kind_at(0)
    }

    fn peek_kind_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.current + offset).map(|t| &t.kind)
    }

    fn current_location(&self) -> SourceLocation {
        self.tokens
            .get(self.current)
            .or_else(|| self.tokens.last())
            .map(|t| t.location)
            .unwrap_or_default()
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek_kind(), None | Some(TokenKind::Eof))
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind()
            .map(|k| std::mem::discriminant(k) == std::mem::discriminant(kind))
            .unwrap_or(false)
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.current += 1;
        }
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<()> {
        if self.match_token(kind) {
            return Ok(());
        }
        let found = self.describe_current();
        Err(Error::syntax(
            format!("expected {:?}, found {}", kind, found),
            self.current_location(),
        ))
    }

    fn expect_identifier(&mut self) -> Result<String> {
        if let Some(TokenKind::Identifier(name)) = self.peek_kind() {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            let found = self.describe_current();
            Err(Error::syntax(
                format!("expected identifier, found {}", found),
                self.current_location(),
            ))
        }
    }

    fn unexpected(&self) -> Error {
        Error::syntax(
            format!("unexpected {}", self.describe_current()),
            self.current_location(),
        )
    }

    fn describe_current(&self) -> String {
        match self.tokens.get(self.current) {
            Some(Token {
                kind: TokenKind::Newline,
                ..
            }) => "newline".to_string(),
            Some(Token {
                kind: TokenKind::Eof, ..
            })
            | None => "end of input".to_string(),
            Some(token) => format!("'{}'", token.text),
        }
    }

    fn skip_newlines(&mut self) {
        while self.match_token(&TokenKind::Newline) {}
    }

    fn skip_terminators(&mut self) {
        while self.match_token(&TokenKind::Newline) || self.match_token(&TokenKind::Semicolon) {}
    }

    fn can_start_expression(&self) -> bool {
        self.peek_kind()
            .map(|k| k.can_start_expression())
            .unwrap_or(false)
    }
}
