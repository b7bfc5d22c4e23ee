use std::collections::HashMap;
use std::rc::Rc;

use crate::error::SourceLocation;

/// Parsed program: rules in source order plus the function table
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub rules: Vec<Rule>,
    /// Function definitions, indexed by `Expr::UserCall::index`
    pub functions: Rc<Vec<FunctionDef>>,
    /// Function name to position in `functions`
    pub function_index: HashMap<String, usize>,
}

impl Program {
    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.function_index.get(name).map(|&i| &self.functions[i])
    }

    pub fn begin_rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(|r| matches!(r.pattern, Pattern::Begin))
    }

    pub fn end_rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(|r| matches!(r.pattern, Pattern::End))
    }

    /// True if any rule runs per input record
    pub fn has_main_rules(&self) -> bool {
        self.rules.iter().any(|r| r.pattern.is_main())
    }

    pub fn has_end_rules(&self) -> bool {
        self.end_rules().next().is_some()
    }
}

/// `pattern { action }`; either half may be missing
#[derive(Debug, Clone)]
pub struct Rule {
    pub pattern: Pattern,
    /// `None` means the default action, printing the record
    pub action: Option<Block>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone)]
pub enum Pattern {
    Begin,
    End,
    /// No pattern, matches every record
    Always,
    /// Expression that evaluates to true/false (a bare regex matches `$0`)
    Expr(Expr),
    /// Range pattern: start,stop
    Range(Expr, Expr),
}

impl Pattern {
    pub fn is_main(&self) -> bool {
        !matches!(self, Pattern::Begin | Pattern::End)
    }
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Block,
    pub location: SourceLocation,
}

/// Brace-delimited statement list
#[derive(Debug, Clone)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub location: SourceLocation,
}

impl Block {
    pub fn new(statements: Vec<Stmt>, location: SourceLocation) -> Self {
        Self { statements, location }
    }
}

/// Where a named variable lives, resolved by the parser
#[derive(Debug, Clone, PartialEq)]
pub enum Scope {
    Global,
    /// Function parameter, by position in the parameter list
    Local(usize),
    Special(SpecialVar),
}

/// A resolved reference to a scalar or array variable
#[derive(Debug, Clone, PartialEq)]
pub struct VarRef {
    pub name: String,
    pub scope: Scope,
}

/// Built-in scalar variables kept directly by the interpreter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialVar {
    Nr,
    Nf,
    Fnr,
    Fs,
    Ofs,
    Ors,
    Rs,
    Filename,
    Subsep,
    Rstart,
    Rlength,
    Convfmt,
    Ofmt,
}

impl SpecialVar {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "NR" => SpecialVar::Nr,
            "NF" => SpecialVar::Nf,
            "FNR" => SpecialVar::Fnr,
            "FS" => SpecialVar::Fs,
            "OFS" => SpecialVar::Ofs,
            "ORS" => SpecialVar::Ors,
            "RS" => SpecialVar::Rs,
            "FILENAME" => SpecialVar::Filename,
            "SUBSEP" => SpecialVar::Subsep,
            "RSTART" => SpecialVar::Rstart,
            "RLENGTH" => SpecialVar::Rlength,
            "CONVFMT" => SpecialVar::Convfmt,
            "OFMT" => SpecialVar::Ofmt,
            _ => return None,
        })
    }
}

/// Built-in functions, dispatched by name at parse time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Length,
    Substr,
    Index,
    Split,
    Sub,
    Gsub,
    Match,
    Sprintf,
    Tolower,
    Toupper,
    Sin,
    Cos,
    Atan2,
    Exp,
    Log,
    Sqrt,
    Int,
    Rand,
    Srand,
    System,
    Close,
    Fflush,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "length" => Builtin::Length,
            "substr" => Builtin::Substr,
            "index" => Builtin::Index,
            "split" => Builtin::Split,
            "sub" => Builtin::Sub,
            "gsub" => Builtin::Gsub,
            "match" => Builtin::Match,
            "sprintf" => Builtin::Sprintf,
            "tolower" => Builtin::Tolower,
            "toupper" => Builtin::Toupper,
            "sin" => Builtin::Sin,
            "cos" => Builtin::Cos,
            "atan2" => Builtin::Atan2,
            "exp" => Builtin::Exp,
            "log" => Builtin::Log,
            "sqrt" => Builtin::Sqrt,
            "int" => Builtin::Int,
            "rand" => Builtin::Rand,
            "srand" => Builtin::Srand,
            "system" => Builtin::System,
            "close" => Builtin::Close,
            "fflush" => Builtin::Fflush,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Length => "length",
            Builtin::Substr => "substr",
            Builtin::Index => "index",
            Builtin::Split => "split",
            Builtin::Sub => "sub",
            Builtin::Gsub => "gsub",
            Builtin::Match => "match",
            Builtin::Sprintf => "sprintf",
            Builtin::Tolower => "tolower",
            Builtin::Toupper => "toupper",
            Builtin::Sin => "sin",
            Builtin::Cos => "cos",
            Builtin::Atan2 => "atan2",
            Builtin::Exp => "exp",
            Builtin::Log => "log",
            Builtin::Sqrt => "sqrt",
            Builtin::Int => "int",
            Builtin::Rand => "rand",
            Builtin::Srand => "srand",
            Builtin::System => "system",
            Builtin::Close => "close",
            Builtin::Fflush => "fflush",
        }
    }

    /// Allowed number of arguments, inclusive
    pub fn arity(self) -> (usize, usize) {
        match self {
            Builtin::Length => (0, 1),
            Builtin::Substr => (2, 3),
            Builtin::Index => (2, 2),
            Builtin::Split => (2, 3),
            Builtin::Sub | Builtin::Gsub => (2, 3),
            Builtin::Match => (2, 2),
            Builtin::Sprintf => (1, usize::MAX),
            Builtin::Tolower | Builtin::Toupper => (1, 1),
            Builtin::Sin | Builtin::Cos | Builtin::Exp | Builtin::Log | Builtin::Sqrt | Builtin::Int => {
                (1, 1)
            }
            Builtin::Atan2 => (2, 2),
            Builtin::Rand => (0, 0),
            Builtin::Srand => (0, 1),
            Builtin::System => (1, 1),
            Builtin::Close => (1, 1),
            Builtin::Fflush => (0, 1),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Expr(Expr),

    /// `print` with no arguments prints `$0`
    Print {
        args: Vec<Expr>,
        output: Option<OutputRedirect>,
        location: SourceLocation,
    },

    Printf {
        format: Expr,
        args: Vec<Expr>,
        output: Option<OutputRedirect>,
        location: SourceLocation,
    },

    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        location: SourceLocation,
    },

    While {
        condition: Expr,
        body: Box<Stmt>,
        location: SourceLocation,
    },

    DoWhile {
        body: Box<Stmt>,
        condition: Expr,
        location: SourceLocation,
    },

    For {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        update: Option<Box<Stmt>>,
        body: Box<Stmt>,
        location: SourceLocation,
    },

    /// `for (key in array)`, iterating over a snapshot of the keys
    ForIn {
        var: VarRef,
        array: VarRef,
        body: Box<Stmt>,
        location: SourceLocation,
    },

    Block(Block),

    Break { location: SourceLocation },

    Continue { location: SourceLocation },

    Next { location: SourceLocation },

    Nextfile { location: SourceLocation },

    Exit {
        code: Option<Expr>,
        location: SourceLocation,
    },

    Return {
        value: Option<Expr>,
        location: SourceLocation,
    },

    /// `delete array[index]`, or `delete array` when `index` is empty
    Delete {
        array: VarRef,
        index: Vec<Expr>,
        location: SourceLocation,
    },

    Empty,
}

/// Destination after `>`, `>>` or `|` in print and printf
#[derive(Debug, Clone)]
pub enum OutputRedirect {
    /// > file
    Truncate(Expr),
    /// >> file
    Append(Expr),
    /// | command
    Pipe(Expr),
}

#[derive(Debug, Clone)]
pub enum GetlineInput {
    /// Current main input
    Main,
    /// < file
    File(Box<Expr>),
    /// command |
    Pipe(Box<Expr>),
}

#[derive(Debug, Clone)]
pub enum Expr {
    Number(f64, SourceLocation),

    String(String, SourceLocation),

    /// Regex literal; evaluates to `$0 ~ /re/` outside match contexts
    Regex(String, SourceLocation),

    Var(VarRef, SourceLocation),

    /// `$expr`
    Field(Box<Expr>, SourceLocation),

    /// `arr[i]`; several indices are joined with SUBSEP
    Index {
        array: VarRef,
        indices: Vec<Expr>,
        location: SourceLocation,
    },

    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
        location: SourceLocation,
    },

    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        location: SourceLocation,
    },

    /// Assignment; `target` is always an lvalue
    Assign {
        target: Box<Expr>,
        op: AssignOp,
        value: Box<Expr>,
        location: SourceLocation,
    },

    /// ++x / --x / x++ / x--
    IncDec {
        target: Box<Expr>,
        delta: f64,
        prefix: bool,
        location: SourceLocation,
    },

    Ternary {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
        location: SourceLocation,
    },

    /// Built-in function call
    BuiltinCall {
        func: Builtin,
        args: Vec<Expr>,
        location: SourceLocation,
    },

    /// User-defined function call, `index` into `Program::functions`
    UserCall {
        name: String,
        index: usize,
        args: Vec<Expr>,
        location: SourceLocation,
    },

    /// `(key) in array`, never creates the element
    InArray {
        key: Vec<Expr>,
        array: VarRef,
        location: SourceLocation,
    },

    /// Regex match: expr ~ pattern or expr !~ pattern
    Match {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
        location: SourceLocation,
    },

    /// Evaluates to 1, 0 at end of input, or -1 on error
    Getline {
        target: Option<Box<Expr>>,
        input: GetlineInput,
        location: SourceLocation,
    },

    /// Grouping parentheses
    Group(Box<Expr>, SourceLocation),
}

impl Expr {
    pub fn location(&self) -> SourceLocation {
        match self {
            Expr::Number(_, loc)
            | Expr::String(_, loc)
            | Expr::Regex(_, loc)
            | Expr::Var(_, loc)
            | Expr::Field(_, loc)
            | Expr::Index { location: loc, .. }
            | Expr::Binary { location: loc, .. }
            | Expr::Unary { location: loc, .. }
            | Expr::Assign { location: loc, .. }
            | Expr::IncDec { location: loc, .. }
            | Expr::Ternary { location: loc, .. }
            | Expr::BuiltinCall { location: loc, .. }
            | Expr::UserCall { location: loc, .. }
            | Expr::InArray { location: loc, .. }
            | Expr::Match { location: loc, .. }
            | Expr::Getline { location: loc, .. }
            | Expr::Group(_, loc) => *loc,
        }
    }

    /// Variable, array element or field
    pub fn is_lvalue(&self) -> bool {
        matches!(self, Expr::Var(..) | Expr::Index { .. } | Expr::Field(..))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,

    // Comparison
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,

    // Logical
    And,
    Or,

    // String
    Concat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg, // -x
    Pos, // +x
    Not, // !x
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,    // =
    AddAssign, // +=
    SubAssign, // -=
    MulAssign, // *=
    DivAssign, // /=
    ModAssign, // %=
    PowAssign, // ^=
}

impl AssignOp {
    /// Arithmetic operator behind a compound assignment
    pub fn binary_op(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::AddAssign => Some(BinaryOp::Add),
            AssignOp::SubAssign => Some(BinaryOp::Sub),
            AssignOp::MulAssign => Some(BinaryOp::Mul),
            AssignOp::DivAssign => Some(BinaryOp::Div),
            AssignOp::ModAssign => Some(BinaryOp::Mod),
            AssignOp::PowAssign => Some(BinaryOp::Pow),
        }
    }
}
