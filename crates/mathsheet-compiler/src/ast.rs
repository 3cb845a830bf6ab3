//! Expression trees.
//!
//! `Display` renders each node as compact code text (`a + b`, `sqrt(x)`, `x^(n + 1)`),
//! adding parentheses only where precedence requires them.

use mathsheet_core::LimitSide;
use std::fmt;

/// Binary operators, by precedence from loosest to tightest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    Less,
    /// `>`
    Greater,
    /// `<=`
    LessEqual,
    /// `>=`
    GreaterEqual,
    /// `&&`
    BitAnd,
    /// `||`
    BitOr,
    /// `^^`
    BitXor,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*` (matrix product on matrices)
    Mul,
    /// Fraction bar.
    Div,
    /// Superscript.
    Pow,
}

impl BinaryOp {
    /// Source spelling.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::Greater => ">",
            BinaryOp::LessEqual => "<=",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::BitAnd => "&&",
            BinaryOp::BitOr => "||",
            BinaryOp::BitXor => "^^",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 2,
            BinaryOp::Mul | BinaryOp::Div => 3,
            BinaryOp::Pow => 4,
            _ => 1,
        }
    }
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `!!x`
    BitNot,
}

/// Operations a construct stands for. Each renders as a call to the builtin of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    /// Square root.
    Sqrt,
    /// `root(x, n)`: n-th root.
    Root,
    /// Absolute value.
    Abs,
    /// Determinant.
    Det,
    /// Euclidean / Frobenius norm.
    Norm,
    /// Floor.
    Floor,
    /// Ceiling.
    Ceil,
    /// Mean of all elements.
    Mean,
    /// Sum of all elements.
    Total,
    /// `Aᵀ`
    Transpose,
    /// `a*`
    Conjugate,
    /// `A†`
    Hermitian,
    /// `n!`
    Factorial,
    /// `a • b`
    Dot,
    /// `a ∗ b`
    Convolve,
}

impl Intrinsic {
    /// Name of the builtin function implementing it.
    pub fn name(self) -> &'static str {
        match self {
            Intrinsic::Sqrt => "sqrt",
            Intrinsic::Root => "root",
            Intrinsic::Abs => "abs",
            Intrinsic::Det => "det",
            Intrinsic::Norm => "norm",
            Intrinsic::Floor => "floor",
            Intrinsic::Ceil => "ceil",
            Intrinsic::Mean => "mean",
            Intrinsic::Total => "sum",
            Intrinsic::Transpose => "transpose",
            Intrinsic::Conjugate => "conj",
            Intrinsic::Hermitian => "hermitian",
            Intrinsic::Factorial => "factorial",
            Intrinsic::Dot => "dot",
            Intrinsic::Convolve => "convolve",
        }
    }
}

/// Sum or product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeriesKind {
    /// `∑`
    Sum,
    /// `∏`
    Product,
}

impl SeriesKind {
    fn name(self) -> &'static str {
        match self {
            SeriesKind::Sum => "sum",
            SeriesKind::Product => "prod",
        }
    }
}

/// One position of an index list.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexItem {
    /// `x[i]`
    At(Expr),
    /// `x[a:b]` or `x[a:b:step]`, both ends inclusive.
    Slice {
        /// First index.
        start: Expr,
        /// Last index.
        end: Expr,
        /// Stride.
        step: Option<Expr>,
    },
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Decimal literal.
    Number(f64),
    /// Hexadecimal or binary literal.
    Integer(i64),
    /// Imaginary literal.
    Imaginary(f64),
    /// Quoted string.
    Text(String),
    /// Variable read.
    Variable(String),
    /// Explicit parentheses.
    Group(Box<Expr>),
    /// Prefix operation.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },
    /// Infix operation.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// A construct applied to its slots.
    Apply {
        /// Operation.
        func: Intrinsic,
        /// Slot values.
        args: Vec<Expr>,
    },
    /// `f(a, b)`: a builtin or a worksheet-defined function.
    Call {
        /// Function name.
        name: String,
        /// Arguments.
        args: Vec<Expr>,
    },
    /// `x[i, j]`
    Index {
        /// Indexed value.
        target: Box<Expr>,
        /// One item per dimension.
        indices: Vec<IndexItem>,
    },
    /// `a;b` or `a;b,step`: an inclusive range.
    Range {
        /// First value.
        start: Box<Expr>,
        /// Last value.
        end: Box<Expr>,
        /// Increment, 1 when absent.
        step: Option<Box<Expr>>,
    },
    /// Matrix or array literal.
    Grid {
        /// Cells, row by row.
        rows: Vec<Vec<Expr>>,
        /// `true` for a matrix, `false` for an elementwise array.
        matrix: bool,
    },
    /// `(a, b, c)`: a one-row array.
    List(Vec<Expr>),
    /// `∑_{var=from}^{to} body`
    Series {
        /// Sum or product.
        kind: SeriesKind,
        /// Loop variable, bound in `body`.
        var: String,
        /// First value.
        from: Box<Expr>,
        /// Last value.
        to: Box<Expr>,
        /// Summand.
        body: Box<Expr>,
    },
    /// `∑_{var} body`: `var` names an array and is rebound to each element in turn.
    RangeSeries {
        /// Sum or product.
        kind: SeriesKind,
        /// Array variable.
        var: String,
        /// Summand.
        body: Box<Expr>,
    },
    /// `∫_from^to body d var`
    Integral {
        /// Integration variable, bound in `body`.
        var: String,
        /// Lower bound.
        from: Box<Expr>,
        /// Upper bound.
        to: Box<Expr>,
        /// Integrand.
        body: Box<Expr>,
    },
    /// `∫ body d var`
    IndefiniteIntegral {
        /// Integration variable.
        var: String,
        /// Integrand.
        body: Box<Expr>,
    },
    /// `d body / d var`, evaluated at the current value of `var`.
    Derivative {
        /// Differentiation variable.
        var: String,
        /// Differentiated expression.
        body: Box<Expr>,
    },
    /// `lim_{var → approach±} body`
    Limit {
        /// Limit variable, bound in `approach` and `body`.
        var: String,
        /// Approached value.
        approach: Box<Expr>,
        /// One-sided direction.
        side: LimitSide,
        /// Expression under the limit.
        body: Box<Expr>,
    },
    /// `[body]_{x=1, y=2}`
    Substitute {
        /// Expression to evaluate.
        body: Box<Expr>,
        /// Names bound while evaluating `body`.
        bindings: Vec<(String, Expr)>,
    },
    /// Elementwise evaluation over array-valued variables.
    Vectorize(Box<Expr>),
}

impl Expr {
    /// Build a binary node.
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Build a prefix node.
    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    /// Build an intrinsic application.
    pub fn apply(func: Intrinsic, args: Vec<Expr>) -> Self {
        Expr::Apply { func, args }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Range { .. } => 0,
            Expr::Binary { op, .. } => op.precedence(),
            Expr::Unary { .. } => 5,
            _ => 6,
        }
    }
}

fn operand(f: &mut fmt::Formatter<'_>, expr: &Expr, min: u8) -> fmt::Result {
    if expr.precedence() < min {
        write!(f, "({expr})")
    } else {
        write!(f, "{expr}")
    }
}

fn list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for IndexItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexItem::At(expr) => write!(f, "{expr}"),
            IndexItem::Slice { start, end, step } => {
                write!(f, "{start}:{end}")?;
                if let Some(step) = step {
                    write!(f, ":{step}")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(value) => write!(f, "{value}"),
            Expr::Integer(value) => write!(f, "{value}"),
            Expr::Imaginary(value) => write!(f, "{value}j"),
            Expr::Text(text) => write!(f, "'{text}'"),
            Expr::Variable(name) => f.write_str(name),
            Expr::Group(inner) => write!(f, "({inner})"),
            Expr::Unary { op, operand: inner } => {
                f.write_str(match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::BitNot => "!!",
                })?;
                operand(f, inner, 5)
            }
            Expr::Binary { op, lhs, rhs } => {
                let p = op.precedence();
                if *op == BinaryOp::Pow {
                    operand(f, lhs, p + 1)?;
                    f.write_str("^")?;
                    return operand(f, rhs, 5);
                }
                operand(f, lhs, p)?;
                write!(f, " {} ", op.symbol())?;
                operand(f, rhs, p + 1)
            }
            Expr::Apply { func, args } => {
                write!(f, "{}(", func.name())?;
                list(f, args)?;
                f.write_str(")")
            }
            Expr::Call { name, args } => {
                write!(f, "{name}(")?;
                list(f, args)?;
                f.write_str(")")
            }
            Expr::Index { target, indices } => {
                operand(f, target, 6)?;
                f.write_str("[")?;
                list(f, indices)?;
                f.write_str("]")
            }
            Expr::Range { start, end, step } => {
                write!(f, "{start};{end}")?;
                if let Some(step) = step {
                    write!(f, ",{step}")?;
                }
                Ok(())
            }
            Expr::Grid { rows, matrix } => {
                f.write_str(if *matrix { "matrix[" } else { "array[" })?;
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    list(f, row)?;
                }
                f.write_str("]")
            }
            Expr::List(items) => {
                f.write_str("[")?;
                list(f, items)?;
                f.write_str("]")
            }
            Expr::Series {
                kind,
                var,
                from,
                to,
                body,
            } => write!(f, "{}({var} = {from}..{to}, {body})", kind.name()),
            Expr::RangeSeries { kind, var, body } => {
                write!(f, "{}({var} in {var}, {body})", kind.name())
            }
            Expr::Integral {
                var,
                from,
                to,
                body,
            } => write!(f, "integral({body}, {var}, {from}, {to})"),
            Expr::IndefiniteIntegral { var, body } => write!(f, "integral({body}, {var})"),
            Expr::Derivative { var, body } => write!(f, "derivative({body}, {var})"),
            Expr::Limit {
                var,
                approach,
                side,
                body,
            } => {
                let sign = match side {
                    LimitSide::Plus => '+',
                    LimitSide::Minus => '-',
                };
                write!(f, "limit({body}, {var} -> {approach}{sign})")
            }
            Expr::Substitute { body, bindings } => {
                write!(f, "({body} where ")?;
                for (i, (name, value)) in bindings.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name} = {value}")?;
                }
                f.write_str(")")
            }
            Expr::Vectorize(body) => write!(f, "vectorize({body})"),
        }
    }
}

/// Body of a program line or block statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgramStatement {
    /// `if` with its `elif` branches and optional `else`.
    If {
        /// Condition/body pairs, the `if` first.
        branches: Vec<(Expr, Block)>,
        /// The `else` block.
        otherwise: Option<Block>,
    },
    /// `for var in iter`
    For {
        /// Loop variable.
        var: String,
        /// Iterated value.
        iter: Expr,
        /// Loop body.
        body: Block,
    },
    /// `while cond`
    While {
        /// Condition.
        cond: Expr,
        /// Loop body.
        body: Block,
    },
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `return value`
    Return(Expr),
    /// `x := value` or `x[i] := value`; also becomes the program's running value.
    Assign {
        /// Assigned name.
        target: String,
        /// Index list, empty for a plain assignment.
        indices: Vec<IndexItem>,
        /// Assigned value.
        value: Expr,
    },
    /// A bare expression: becomes the program's running value.
    Expr(Expr),
}

/// A sequence of program statements at one indentation level.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block(pub Vec<ProgramStatement>);

impl Block {
    fn write(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        for statement in &self.0 {
            statement.write(f, depth)?;
        }
        Ok(())
    }
}

fn indent(f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        f.write_str("    ")?;
    }
    Ok(())
}

fn target(f: &mut fmt::Formatter<'_>, name: &str, indices: &[IndexItem]) -> fmt::Result {
    f.write_str(name)?;
    if !indices.is_empty() {
        f.write_str("[")?;
        list(f, indices)?;
        f.write_str("]")?;
    }
    Ok(())
}

impl ProgramStatement {
    fn write(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        indent(f, depth)?;
        match self {
            ProgramStatement::If {
                branches,
                otherwise,
            } => {
                for (i, (cond, body)) in branches.iter().enumerate() {
                    if i > 0 {
                        indent(f, depth)?;
                    }
                    writeln!(f, "{} {cond}:", if i == 0 { "if" } else { "elif" })?;
                    body.write(f, depth + 1)?;
                }
                if let Some(body) = otherwise {
                    indent(f, depth)?;
                    writeln!(f, "else:")?;
                    body.write(f, depth + 1)?;
                }
                Ok(())
            }
            ProgramStatement::For { var, iter, body } => {
                writeln!(f, "for {var} in {iter}:")?;
                body.write(f, depth + 1)
            }
            ProgramStatement::While { cond, body } => {
                writeln!(f, "while {cond}:")?;
                body.write(f, depth + 1)
            }
            ProgramStatement::Break => writeln!(f, "break"),
            ProgramStatement::Continue => writeln!(f, "continue"),
            ProgramStatement::Return(value) => writeln!(f, "return {value}"),
            ProgramStatement::Assign {
                target: name,
                indices,
                value,
            } => {
                target(f, name, indices)?;
                writeln!(f, " := {value}")
            }
            ProgramStatement::Expr(value) => writeln!(f, "{value}"),
        }
    }
}

/// Right-hand side of a function definition.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    /// `f(x) := expr`
    Expr(Expr),
    /// `f(x) := program`
    Program(Block),
}

/// A whole equation.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// A value to show as the result.
    Expr(Expr),
    /// `x := value`
    Assign {
        /// Assigned name.
        target: String,
        /// Assigned value.
        value: Expr,
    },
    /// `x[i, …] := value`, looped over the hanging index variables.
    AssignIndexed {
        /// Assigned array.
        target: String,
        /// Index list.
        indices: Vec<IndexItem>,
        /// Element value.
        value: Expr,
    },
    /// `x := program` or `x[i] := program`
    AssignProgram {
        /// Assigned name.
        target: String,
        /// Index list, empty for a plain assignment.
        indices: Vec<IndexItem>,
        /// The program whose value is assigned.
        program: Block,
    },
    /// A program whose value is the result.
    Program(Block),
    /// `f(a, …) := body`
    Define {
        /// Function name.
        name: String,
        /// Parameter names.
        params: Vec<String>,
        /// Function body.
        body: FunctionBody,
    },
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Expr(expr) => write!(f, "{expr}"),
            Statement::Assign { target, value } => write!(f, "{target} := {value}"),
            Statement::AssignIndexed {
                target: name,
                indices,
                value,
            } => {
                target(f, name, indices)?;
                write!(f, " := {value}")
            }
            Statement::AssignProgram {
                target: name,
                indices,
                program,
            } => {
                target(f, name, indices)?;
                writeln!(f, " := program:")?;
                program.write(f, 1)
            }
            Statement::Program(program) => {
                writeln!(f, "program:")?;
                program.write(f, 1)
            }
            Statement::Define { name, params, body } => {
                write!(f, "{name}(")?;
                list(f, params)?;
                match body {
                    FunctionBody::Expr(expr) => write!(f, ") := {expr}"),
                    FunctionBody::Program(program) => {
                        writeln!(f, ") := program:")?;
                        program.write(f, 1)
                    }
                }
            }
        }
    }
}
