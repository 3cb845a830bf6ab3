//! Recursive-descent parser over lexemes.
//!
//! Precedence, loosest first: `;` ranges, comparisons and bit operators, `+ -`, `*` with
//! dot/convolution and implicit multiplication after a numeric literal, postfix constructs
//! (power, factorial, transpose, conjugate, index), prefix `-` and `!!`.
//!
//! Variable reads are classified while parsing: names bound by an enclosing sum, integral,
//! limit, substitution or function parameter list are dropped, names read inside an index
//! become index variables, everything else is a free variable.

use crate::ast::{
    BinaryOp, Block, Expr, FunctionBody, IndexItem, Intrinsic, ProgramStatement, SeriesKind,
    Statement, UnaryOp,
};
use crate::CompiledEquation;
use crate::error::CompileError;
use crate::lexer::{Lexeme, Operator, Spanned};
use mathsheet_core::{KeywordKind as K, LimitSide};
use mathsheet_lang::ProgramWord;
use std::collections::BTreeSet;

type Result<T> = std::result::Result<T, CompileError>;

/// Parse a complete equation.
pub(crate) fn parse(lexemes: &[Spanned]) -> Result<CompiledEquation> {
    if lexemes.is_empty() {
        return Err(CompileError::parse("empty equation"));
    }
    let mut parser = Parser::new(lexemes);
    let statement = parser.statement()?;
    if parser.peek().is_some() {
        return Err(parser.unexpected());
    }
    Ok(parser.finish(statement))
}

/// Classification state that has to be rolled back with the position.
#[derive(Debug, Clone)]
struct Checkpoint {
    pos: usize,
    free: BTreeSet<String>,
    functions: BTreeSet<String>,
    index_vars: Vec<String>,
}

/// A parsed program line before blocks are formed.
#[derive(Debug)]
enum Line {
    Simple(ProgramStatement),
    If(Expr),
    Elif(Expr),
    Else,
    For(String, Expr),
    While(Expr),
}

impl Line {
    fn word(&self) -> &'static str {
        match self {
            Line::Simple(_) => "statement",
            Line::If(_) => "if",
            Line::Elif(_) => "elif",
            Line::Else => "else",
            Line::For(..) => "for",
            Line::While(_) => "while",
        }
    }
}

/// `(line number, indentation level, line)`
type Lines = std::iter::Peekable<std::vec::IntoIter<(usize, usize, Line)>>;

struct Parser<'a> {
    lexemes: &'a [Spanned],
    pos: usize,
    scopes: Vec<Vec<String>>,
    index_depth: usize,
    list_depth: usize,
    free: BTreeSet<String>,
    functions: BTreeSet<String>,
    index_vars: Vec<String>,
    locals: BTreeSet<String>,
}

impl<'a> Parser<'a> {
    fn new(lexemes: &'a [Spanned]) -> Self {
        Self {
            lexemes,
            pos: 0,
            scopes: Vec::new(),
            index_depth: 0,
            list_depth: 0,
            free: BTreeSet::new(),
            functions: BTreeSet::new(),
            index_vars: Vec::new(),
            locals: BTreeSet::new(),
        }
    }

    fn finish(mut self, statement: Statement) -> CompiledEquation {
        let (assignment, defined_function) = match &statement {
            Statement::Assign { target, .. }
            | Statement::AssignIndexed { target, .. }
            | Statement::AssignProgram { target, .. } => (Some(target.clone()), None),
            Statement::Define { name, .. } => (None, Some(name.clone())),
            Statement::Expr(_) | Statement::Program(_) => (None, None),
        };
        let locals = &self.locals;
        self.index_vars.retain(|name| !locals.contains(name));
        let index_vars = &self.index_vars;
        self.free.retain(|name| {
            !locals.contains(name)
                && !index_vars.contains(name)
                && assignment.as_deref() != Some(name.as_str())
        });
        CompiledEquation {
            statement,
            free_variables: self.free,
            called_functions: self.functions,
            assignment,
            defined_function,
            index_variables: self.index_vars,
        }
    }

    // ---- lexeme access -------------------------------------------------------------------

    fn peek(&self) -> Option<&'a Lexeme> {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> Option<&'a Lexeme> {
        self.lexemes.get(self.pos + ahead).map(|s| &s.lexeme)
    }

    fn at_keyword(&self, kind: K) -> bool {
        self.peek() == Some(&Lexeme::Keyword(kind))
    }

    fn eat(&mut self, lexeme: &Lexeme) -> bool {
        if self.peek() == Some(lexeme) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kind: K) -> bool {
        self.eat(&Lexeme::Keyword(kind))
    }

    fn expect_keyword(&mut self, kind: K) -> Result<()> {
        if self.eat_keyword(kind) {
            Ok(())
        } else {
            Err(self.expected(&format!("{kind:?}")))
        }
    }

    fn expect(&mut self, lexeme: Lexeme) -> Result<()> {
        if self.eat(&lexeme) {
            Ok(())
        } else {
            Err(self.expected(&lexeme.to_string()))
        }
    }

    fn describe(&self) -> String {
        match self.lexemes.get(self.pos) {
            Some(spanned) => format!("{} at index {}", spanned.lexeme, spanned.position),
            None => "end of equation".to_string(),
        }
    }

    fn expected(&self, what: &str) -> CompileError {
        CompileError::parse(format!("expected {what}, found {}", self.describe()))
    }

    fn unexpected(&self) -> CompileError {
        CompileError::parse(format!("unexpected {}", self.describe()))
    }

    fn label_name(&mut self) -> Result<String> {
        match self.peek() {
            Some(Lexeme::Label(name)) => {
                self.pos += 1;
                Ok(name.clone())
            }
            _ => Err(self.expected("a name")),
        }
    }

    /// Position of the keyword closing the construct opened at `open`.
    fn closing_position(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (i, spanned) in self.lexemes.iter().enumerate().skip(open) {
            if let Lexeme::Keyword(kind) = spanned.lexeme {
                if kind.is_opening() {
                    depth += 1;
                } else {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(i);
                    }
                }
            }
        }
        None
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            free: self.free.clone(),
            functions: self.functions.clone(),
            index_vars: self.index_vars.clone(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.pos = checkpoint.pos;
        self.free = checkpoint.free;
        self.functions = checkpoint.functions;
        self.index_vars = checkpoint.index_vars;
    }

    // ---- name classification -------------------------------------------------------------

    fn is_bound(&self, name: &str) -> bool {
        self.scopes.iter().flatten().any(|bound| bound == name)
    }

    fn read_variable(&mut self, name: &str) {
        if self.is_bound(name) {
            return;
        }
        if self.index_depth > 0 {
            if !self.index_vars.iter().any(|v| v == name) {
                self.index_vars.push(name.to_string());
            }
        } else {
            self.free.insert(name.to_string());
        }
    }

    fn scoped<T>(
        &mut self,
        names: Vec<String>,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.scopes.push(names);
        let result = f(self);
        self.scopes.pop();
        result
    }

    // ---- statements ----------------------------------------------------------------------

    fn statement(&mut self) -> Result<Statement> {
        if self.at_keyword(K::ProgramStart) {
            return Ok(Statement::Program(self.program()?));
        }
        if let Some(Lexeme::Label(name)) = self.peek() {
            if let Some(definition) = self.definition(name)? {
                return Ok(definition);
            }
            if self.peek_at(1) == Some(&Lexeme::Assign) {
                self.pos += 2;
                if self.at_keyword(K::ProgramStart) {
                    return Ok(Statement::AssignProgram {
                        target: name.clone(),
                        indices: Vec::new(),
                        program: self.program()?,
                    });
                }
                return Ok(Statement::Assign {
                    target: name.clone(),
                    value: self.expression()?,
                });
            }
            if self.peek_at(1) == Some(&Lexeme::Keyword(K::IndexStart)) {
                let checkpoint = self.checkpoint();
                self.pos += 1;
                let indices = self.index_list()?;
                if self.eat(&Lexeme::Assign) {
                    if self.at_keyword(K::ProgramStart) {
                        return Ok(Statement::AssignProgram {
                            target: name.clone(),
                            indices,
                            program: self.program()?,
                        });
                    }
                    return Ok(Statement::AssignIndexed {
                        target: name.clone(),
                        indices,
                        value: self.expression()?,
                    });
                }
                self.restore(checkpoint);
            }
        }
        Ok(Statement::Expr(self.expression()?))
    }

    /// `f(a, b) := body`. Returns `None` without consuming anything when the lexemes do not
    /// have that shape.
    fn definition(&mut self, name: &str) -> Result<Option<Statement>> {
        if self.peek_at(1) != Some(&Lexeme::Keyword(K::LeftParen))
            || self.peek_at(2) != Some(&Lexeme::Keyword(K::BodyStart))
        {
            return Ok(None);
        }
        let mut params = Vec::new();
        let mut ahead = 3;
        loop {
            match self.peek_at(ahead) {
                Some(Lexeme::Label(param)) => params.push(param.clone()),
                _ => return Ok(None),
            }
            ahead += 1;
            if self.peek_at(ahead) == Some(&Lexeme::Comma) {
                ahead += 1;
            } else {
                break;
            }
        }
        if self.peek_at(ahead) != Some(&Lexeme::Keyword(K::BodyEnd))
            || self.peek_at(ahead + 1) != Some(&Lexeme::Keyword(K::RightParen))
            || self.peek_at(ahead + 2) != Some(&Lexeme::Assign)
        {
            return Ok(None);
        }
        self.pos += ahead + 3;

        let body = self.scoped(params.clone(), |p| {
            if p.at_keyword(K::ProgramStart) {
                Ok(FunctionBody::Program(p.program()?))
            } else {
                Ok(FunctionBody::Expr(p.expression()?))
            }
        })?;
        Ok(Some(Statement::Define {
            name: name.to_string(),
            params,
            body,
        }))
    }

    // ---- programs ------------------------------------------------------------------------

    fn program(&mut self) -> Result<Block> {
        self.expect_keyword(K::ProgramStart)?;
        self.expect_keyword(K::ProgramBodyStart)?;
        let mut lines = Vec::new();
        while self.eat_keyword(K::LineStart) {
            let mut level = 0;
            while self.eat(&Lexeme::Indent) {
                level += 1;
            }
            let line = self.program_line()?;
            self.expect_keyword(K::LineEnd)?;
            lines.push((lines.len() + 1, level, line));
        }
        self.expect_keyword(K::ProgramBodyEnd)?;
        self.expect_keyword(K::ProgramEnd)?;

        let mut lines: Lines = lines.into_iter().peekable();
        let block = build_block(&mut lines, 0)?;
        if let Some((number, ..)) = lines.next() {
            return Err(CompileError::parse(format!(
                "unexpected indentation on program line {number}"
            )));
        }
        Ok(block)
    }

    fn program_line(&mut self) -> Result<Line> {
        let Some(lexeme) = self.peek() else {
            return Err(self.expected("a program line"));
        };
        let line = match lexeme {
            Lexeme::Word(word) => {
                self.pos += 1;
                match word {
                    ProgramWord::If => Line::If(self.expression()?),
                    ProgramWord::Elif => Line::Elif(self.expression()?),
                    ProgramWord::Else => Line::Else,
                    ProgramWord::While => Line::While(self.expression()?),
                    ProgramWord::For => {
                        let var = self.label_name()?;
                        self.expect(Lexeme::Word(ProgramWord::In))?;
                        let iter = self.expression()?;
                        self.locals.insert(var.clone());
                        Line::For(var, iter)
                    }
                    ProgramWord::Return => {
                        Line::Simple(ProgramStatement::Return(self.expression()?))
                    }
                    ProgramWord::Break => Line::Simple(ProgramStatement::Break),
                    ProgramWord::Continue => Line::Simple(ProgramStatement::Continue),
                    ProgramWord::In => {
                        self.pos -= 1;
                        return Err(self.unexpected());
                    }
                }
            }
            Lexeme::Label(name) => {
                let checkpoint = self.checkpoint();
                self.pos += 1;
                let indices = if self.at_keyword(K::IndexStart) {
                    self.index_list()?
                } else {
                    Vec::new()
                };
                if self.eat(&Lexeme::Assign) {
                    self.locals.insert(name.clone());
                    Line::Simple(ProgramStatement::Assign {
                        target: name.clone(),
                        indices,
                        value: self.expression()?,
                    })
                } else {
                    self.restore(checkpoint);
                    Line::Simple(ProgramStatement::Expr(self.expression()?))
                }
            }
            _ => Line::Simple(ProgramStatement::Expr(self.expression()?)),
        };
        Ok(line)
    }

    // ---- expressions ---------------------------------------------------------------------

    /// Loosest level: `a;b` and, outside comma lists, `a;b,step`.
    fn expression(&mut self) -> Result<Expr> {
        let start = self.comparison()?;
        if !self.eat(&Lexeme::Semicolon) {
            return Ok(start);
        }
        let end = self.comparison()?;
        let step = if self.list_depth == 0 && self.eat(&Lexeme::Comma) {
            Some(Box::new(self.comparison()?))
        } else {
            None
        };
        Ok(Expr::Range {
            start: Box::new(start),
            end: Box::new(end),
            step,
        })
    }

    fn comparison(&mut self) -> Result<Expr> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Lexeme::Operator(op)) => match op {
                    Operator::Equal => BinaryOp::Equal,
                    Operator::NotEqual => BinaryOp::NotEqual,
                    Operator::Less => BinaryOp::Less,
                    Operator::Greater => BinaryOp::Greater,
                    Operator::LessEqual => BinaryOp::LessEqual,
                    Operator::GreaterEqual => BinaryOp::GreaterEqual,
                    Operator::BitAnd => BinaryOp::BitAnd,
                    Operator::BitOr => BinaryOp::BitOr,
                    Operator::BitXor => BinaryOp::BitXor,
                    _ => break,
                },
                _ => break,
            };
            self.pos += 1;
            let rhs = self.additive()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn additive(&mut self) -> Result<Expr> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Lexeme::Operator(Operator::Add)) => BinaryOp::Add,
                Some(Lexeme::Operator(Operator::Sub)) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.multiplicative()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        let mut lhs = self.term()?;
        loop {
            match self.peek() {
                Some(Lexeme::Operator(Operator::Mul)) => {
                    self.pos += 1;
                    let rhs = self.term()?;
                    lhs = Expr::binary(BinaryOp::Mul, lhs, rhs);
                }
                Some(Lexeme::Keyword(kind @ (K::DotProductStart | K::ConvolveStart))) => {
                    let func = if *kind == K::DotProductStart {
                        Intrinsic::Dot
                    } else {
                        Intrinsic::Convolve
                    };
                    self.pos += 1;
                    self.expect_keyword(kind.closer().unwrap_or(*kind))?;
                    let rhs = self.term()?;
                    lhs = Expr::apply(func, vec![lhs, rhs]);
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    /// A postfix expression, multiplied by a following label when it is a bare number
    /// (`2x`, `3 f(y)`).
    fn term(&mut self) -> Result<Expr> {
        let value = self.postfix()?;
        if matches!(value, Expr::Number(_) | Expr::Integer(_))
            && matches!(self.peek(), Some(Lexeme::Label(_)))
        {
            let rhs = self.postfix()?;
            return Ok(Expr::binary(BinaryOp::Mul, value, rhs));
        }
        Ok(value)
    }

    fn postfix(&mut self) -> Result<Expr> {
        let mut expr = self.prefix()?;
        loop {
            match self.peek() {
                Some(Lexeme::Factorial) => {
                    self.pos += 1;
                    expr = Expr::apply(Intrinsic::Factorial, vec![expr]);
                }
                Some(Lexeme::Keyword(K::PowerStart)) => {
                    self.pos += 1;
                    let exponent = self.expression()?;
                    self.expect_keyword(K::PowerEnd)?;
                    expr = Expr::binary(BinaryOp::Pow, expr, exponent);
                }
                Some(Lexeme::Keyword(
                    kind @ (K::TransposeStart | K::ConjugateStart | K::HermitianStart),
                )) => {
                    let func = match kind {
                        K::TransposeStart => Intrinsic::Transpose,
                        K::ConjugateStart => Intrinsic::Conjugate,
                        _ => Intrinsic::Hermitian,
                    };
                    self.pos += 1;
                    self.expect_keyword(kind.closer().unwrap_or(*kind))?;
                    expr = Expr::apply(func, vec![expr]);
                }
                Some(Lexeme::Keyword(K::IndexStart)) => {
                    let indices = self.index_list()?;
                    expr = Expr::Index {
                        target: Box::new(expr),
                        indices,
                    };
                }
                // The sub/superscript pair only groups an index with a power.
                Some(Lexeme::Keyword(K::SubSupStart | K::SubSupEnd)) => self.pos += 1,
                _ => break,
            }
        }
        Ok(expr)
    }

    fn prefix(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Lexeme::Operator(Operator::Sub)) => {
                self.pos += 1;
                Ok(Expr::unary(UnaryOp::Neg, self.prefix()?))
            }
            Some(Lexeme::Operator(Operator::BitNot)) => {
                self.pos += 1;
                Ok(Expr::unary(UnaryOp::BitNot, self.prefix()?))
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        let Some(lexeme) = self.peek() else {
            return Err(self.expected("an operand"));
        };
        let expr = match lexeme {
            Lexeme::Number(value) => Expr::Number(*value),
            Lexeme::Integer(value) => Expr::Integer(*value),
            Lexeme::Imaginary(value) => Expr::Imaginary(*value),
            Lexeme::Text(text) => Expr::Text(text.clone()),
            Lexeme::Label(name) => return self.label(name),
            Lexeme::Keyword(kind) => return self.construct(*kind),
            _ => return Err(self.expected("an operand")),
        };
        self.pos += 1;
        Ok(expr)
    }

    fn label(&mut self, name: &str) -> Result<Expr> {
        self.pos += 1;
        let mut name = name.to_string();
        if self.eat_keyword(K::SubscriptStart) {
            name = format!("{name}_{}", self.label_name()?);
            self.expect_keyword(K::SubscriptEnd)?;
        } else if self.eat_keyword(K::SuperscriptStart) {
            name = format!("{name}__{}", self.label_name()?);
            self.expect_keyword(K::SuperscriptEnd)?;
        }

        if self.at_keyword(K::LeftParen) {
            let args = self.call_args()?;
            self.functions.insert(name.clone());
            return Ok(Expr::Call { name, args });
        }
        // `f^2(x)`: the power applies to the call.
        if self.at_keyword(K::PowerStart)
            && let Some(close) = self.closing_position(self.pos)
            && self.lexemes.get(close + 1).map(|s| &s.lexeme)
                == Some(&Lexeme::Keyword(K::LeftParen))
        {
            self.pos += 1;
            let exponent = self.expression()?;
            self.expect_keyword(K::PowerEnd)?;
            let args = self.call_args()?;
            self.functions.insert(name.clone());
            return Ok(Expr::binary(
                BinaryOp::Pow,
                Expr::Call { name, args },
                exponent,
            ));
        }
        self.read_variable(&name);
        Ok(Expr::Variable(name))
    }

    fn comma_list(&mut self) -> Result<Vec<Expr>> {
        self.list_depth += 1;
        let mut items = Vec::new();
        let result = loop {
            match self.expression() {
                Ok(item) => items.push(item),
                Err(err) => break Err(err),
            }
            if !self.eat(&Lexeme::Comma) {
                break Ok(());
            }
        };
        self.list_depth -= 1;
        result.map(|()| items)
    }

    fn call_args(&mut self) -> Result<Vec<Expr>> {
        self.expect_keyword(K::LeftParen)?;
        self.expect_keyword(K::BodyStart)?;
        let args = self.comma_list()?;
        self.expect_keyword(K::BodyEnd)?;
        self.expect_keyword(K::RightParen)?;
        Ok(args)
    }

    fn index_list(&mut self) -> Result<Vec<IndexItem>> {
        self.expect_keyword(K::IndexStart)?;
        self.index_depth += 1;
        self.list_depth += 1;
        let result = self.index_items();
        self.index_depth -= 1;
        self.list_depth -= 1;
        let items = result?;
        self.expect_keyword(K::IndexEnd)?;
        Ok(items)
    }

    fn index_items(&mut self) -> Result<Vec<IndexItem>> {
        let mut items = Vec::new();
        loop {
            let start = self.expression()?;
            let item = if self.eat(&Lexeme::Colon) {
                let end = self.expression()?;
                let step = if self.eat(&Lexeme::Colon) {
                    Some(self.expression()?)
                } else {
                    None
                };
                IndexItem::Slice { start, end, step }
            } else {
                IndexItem::At(start)
            };
            items.push(item);
            if !self.eat(&Lexeme::Comma) {
                return Ok(items);
            }
        }
    }

    /// `open, expression, close`
    fn enclosed(&mut self, open: K, close: K) -> Result<Expr> {
        self.expect_keyword(open)?;
        let expr = self.expression()?;
        self.expect_keyword(close)?;
        Ok(expr)
    }

    /// Look past the slot opened at the current position for the bound variable that follows
    /// it (`∫ f dx` names `x` after the integrand).
    fn variable_after_slot(&self, var_open: K) -> Result<String> {
        let close = self
            .closing_position(self.pos)
            .ok_or_else(|| self.expected("a closed slot"))?;
        let after = |n: usize| self.lexemes.get(close + n).map(|s| &s.lexeme);
        match (after(1), after(2)) {
            (Some(Lexeme::Keyword(kind)), Some(Lexeme::Label(name))) if *kind == var_open => {
                Ok(name.clone())
            }
            _ => Err(CompileError::parse(format!(
                "expected a variable name in {var_open:?}"
            ))),
        }
    }

    fn construct(&mut self, kind: K) -> Result<Expr> {
        match kind {
            K::LeftParen => self.parenthesis(),
            K::DivideStart => self.fraction(),
            K::SquareRootStart => {
                self.pos += 1;
                let body = self.enclosed(K::RootBodyStart, K::RootBodyEnd)?;
                self.expect_keyword(K::SquareRootEnd)?;
                Ok(Expr::apply(Intrinsic::Sqrt, vec![body]))
            }
            K::OrderNRootStart => {
                self.pos += 1;
                let order = self.enclosed(K::OrderStart, K::OrderEnd)?;
                let body = self.enclosed(K::RootBodyStart, K::RootBodyEnd)?;
                self.expect_keyword(K::OrderNRootEnd)?;
                Ok(Expr::apply(Intrinsic::Root, vec![body, order]))
            }
            K::AbsoluteStart
            | K::DeterminantStart
            | K::NormStart
            | K::FloorStart
            | K::CeilStart
            | K::AverageStart
            | K::MatrixSumStart
            | K::VectorizeStart => {
                self.pos += 1;
                let body = self.enclosed(K::BodyStart, K::BodyEnd)?;
                self.expect_keyword(kind.closer().unwrap_or(kind))?;
                let func = match kind {
                    K::AbsoluteStart => Intrinsic::Abs,
                    K::DeterminantStart => Intrinsic::Det,
                    K::NormStart => Intrinsic::Norm,
                    K::FloorStart => Intrinsic::Floor,
                    K::CeilStart => Intrinsic::Ceil,
                    K::AverageStart => Intrinsic::Mean,
                    K::MatrixSumStart => Intrinsic::Total,
                    _ => return Ok(Expr::Vectorize(Box::new(body))),
                };
                Ok(Expr::apply(func, vec![body]))
            }
            K::MatrixStart | K::ArrayStart => self.grid(kind),
            K::SumStart | K::ProductStart => self.series(kind),
            K::RangeSumStart | K::RangeProductStart => self.range_series(kind),
            K::IntegralStart => self.integral(),
            K::IndefIntegralStart => {
                self.pos += 1;
                let var = self.variable_after_slot(K::IntVarStart)?;
                let body = self.scoped(vec![var.clone()], |p| {
                    p.enclosed(K::IntBodyStart, K::IntBodyEnd)
                })?;
                self.skip_bound_variable()?;
                self.expect_keyword(K::IndefIntegralEnd)?;
                Ok(Expr::IndefiniteIntegral {
                    var,
                    body: Box::new(body),
                })
            }
            K::LimitStart => self.limit(),
            K::SubstitutionStart => self.substitution(),
            K::ProgramStart => Err(CompileError::parse(
                "a program must be the whole equation or the value of an assignment",
            )),
            _ => Err(self.unexpected()),
        }
    }

    fn skip_bound_variable(&mut self) -> Result<()> {
        self.expect_keyword(K::IntVarStart)?;
        self.label_name()?;
        self.expect_keyword(K::IntVarEnd)
    }

    /// `(a)` groups, `(a, b, c)` is a one-row array.
    fn parenthesis(&mut self) -> Result<Expr> {
        self.pos += 1;
        self.expect_keyword(K::BodyStart)?;
        let mut items = self.comma_list()?;
        self.expect_keyword(K::BodyEnd)?;
        self.expect_keyword(K::RightParen)?;
        if items.len() == 1 {
            Ok(Expr::Group(Box::new(items.remove(0))))
        } else {
            Ok(Expr::List(items))
        }
    }

    /// A fraction, or a derivative when the numerator starts with `d`.
    fn fraction(&mut self) -> Result<Expr> {
        self.pos += 1;
        self.expect_keyword(K::NumStart)?;
        if self.at_keyword(K::DeeStart) {
            let body = self.enclosed(K::DeeStart, K::DeeEnd)?;
            self.expect_keyword(K::NumEnd)?;
            self.expect_keyword(K::DenomStart)?;
            self.expect_keyword(K::DeeStart)?;
            let var = self.label_name()?;
            self.expect_keyword(K::DeeEnd)?;
            self.expect_keyword(K::DenomEnd)?;
            self.expect_keyword(K::DivideEnd)?;
            self.read_variable(&var);
            return Ok(Expr::Derivative {
                var,
                body: Box::new(body),
            });
        }
        let numerator = self.expression()?;
        self.expect_keyword(K::NumEnd)?;
        let denominator = self.enclosed(K::DenomStart, K::DenomEnd)?;
        self.expect_keyword(K::DivideEnd)?;
        Ok(Expr::binary(BinaryOp::Div, numerator, denominator))
    }

    fn grid(&mut self, kind: K) -> Result<Expr> {
        self.pos += 1;
        let mut rows = Vec::new();
        while self.eat_keyword(K::RowStart) {
            let mut cells = Vec::new();
            while self.at_keyword(K::ElementStart) {
                cells.push(self.enclosed(K::ElementStart, K::ElementEnd)?);
            }
            self.expect_keyword(K::RowEnd)?;
            rows.push(cells);
        }
        self.expect_keyword(kind.closer().unwrap_or(kind))?;
        Ok(Expr::Grid {
            rows,
            matrix: kind == K::MatrixStart,
        })
    }

    fn series(&mut self, kind: K) -> Result<Expr> {
        self.pos += 1;
        self.expect_keyword(K::FromStart)?;
        self.expect_keyword(K::SumVarStart)?;
        let var = self.label_name()?;
        self.expect_keyword(K::SumVarEnd)?;
        let from = self.enclosed(K::SumFromValStart, K::SumFromValEnd)?;
        self.expect_keyword(K::FromEnd)?;
        let to = self.enclosed(K::SumToStart, K::SumToEnd)?;
        let body = self.scoped(vec![var.clone()], |p| {
            p.enclosed(K::SumBodyStart, K::SumBodyEnd)
        })?;
        self.expect_keyword(kind.closer().unwrap_or(kind))?;
        Ok(Expr::Series {
            kind: if kind == K::SumStart {
                SeriesKind::Sum
            } else {
                SeriesKind::Product
            },
            var,
            from: Box::new(from),
            to: Box::new(to),
            body: Box::new(body),
        })
    }

    fn range_series(&mut self, kind: K) -> Result<Expr> {
        self.pos += 1;
        self.expect_keyword(K::FromStart)?;
        let var = self.label_name()?;
        self.expect_keyword(K::FromEnd)?;
        self.read_variable(&var);
        let body = self.scoped(vec![var.clone()], |p| p.enclosed(K::BodyStart, K::BodyEnd))?;
        self.expect_keyword(kind.closer().unwrap_or(kind))?;
        Ok(Expr::RangeSeries {
            kind: if kind == K::RangeSumStart {
                SeriesKind::Sum
            } else {
                SeriesKind::Product
            },
            var,
            body: Box::new(body),
        })
    }

    fn integral(&mut self) -> Result<Expr> {
        self.pos += 1;
        let from = self.enclosed(K::IntFromStart, K::IntFromEnd)?;
        let to = self.enclosed(K::IntToStart, K::IntToEnd)?;
        let var = self.variable_after_slot(K::IntVarStart)?;
        let body = self.scoped(vec![var.clone()], |p| {
            p.enclosed(K::IntBodyStart, K::IntBodyEnd)
        })?;
        self.skip_bound_variable()?;
        self.expect_keyword(K::IntegralEnd)?;
        Ok(Expr::Integral {
            var,
            from: Box::new(from),
            to: Box::new(to),
            body: Box::new(body),
        })
    }

    /// `lim` applies to everything after it.
    fn limit(&mut self) -> Result<Expr> {
        self.pos += 1;
        let side = match self.peek() {
            Some(Lexeme::Operator(Operator::Add)) => LimitSide::Plus,
            Some(Lexeme::Operator(Operator::Sub)) => LimitSide::Minus,
            _ => return Err(self.expected("a limit direction")),
        };
        self.pos += 1;
        self.expect_keyword(K::BodyStart)?;
        let var = self.label_name()?;
        self.expect_keyword(K::BodyEnd)?;
        let approach = self.enclosed(K::BodyStart, K::BodyEnd)?;
        self.expect_keyword(K::LimitEnd)?;
        let body = self.scoped(vec![var.clone()], |p| p.expression())?;
        Ok(Expr::Limit {
            var,
            approach: Box::new(approach),
            side,
            body: Box::new(body),
        })
    }

    fn substitution(&mut self) -> Result<Expr> {
        self.pos += 1;
        let free_before = self.free.clone();
        let body = self.enclosed(K::BodyStart, K::BodyEnd)?;
        self.expect_keyword(K::BodyStart)?;
        let mut bindings = Vec::new();
        loop {
            let name = self.label_name()?;
            self.expect(Lexeme::Operator(Operator::Equal))?;
            let value = self.additive()?;
            bindings.push((name, value));
            if !self.eat(&Lexeme::Comma) {
                break;
            }
        }
        self.expect_keyword(K::BodyEnd)?;
        self.expect_keyword(K::SubstitutionEnd)?;
        for (name, _) in &bindings {
            if !free_before.contains(name) {
                self.free.remove(name);
            }
        }
        Ok(Expr::Substitute {
            body: Box::new(body),
            bindings,
        })
    }
}

/// Group program lines into nested blocks by indentation.
fn build_block(lines: &mut Lines, level: usize) -> Result<Block> {
    let mut statements = Vec::new();
    while let Some(&(number, line_level, _)) = lines.peek() {
        if line_level < level {
            break;
        }
        if line_level > level {
            return Err(CompileError::parse(format!(
                "unexpected indentation on program line {number}"
            )));
        }
        let Some((_, _, line)) = lines.next() else {
            break;
        };
        let statement = match line {
            Line::Simple(statement) => statement,
            Line::If(cond) => {
                let mut branches = vec![(cond, nested_block(lines, level, number, "if")?)];
                let mut otherwise = None;
                while let Some((number, next_level, next)) = lines.peek()
                    && *next_level == level
                    && matches!(next, Line::Elif(_) | Line::Else)
                {
                    let number = *number;
                    let Some((_, _, next)) = lines.next() else {
                        break;
                    };
                    match next {
                        Line::Elif(cond) => {
                            branches.push((cond, nested_block(lines, level, number, "elif")?));
                        }
                        _ => {
                            otherwise = Some(nested_block(lines, level, number, "else")?);
                            break;
                        }
                    }
                }
                ProgramStatement::If {
                    branches,
                    otherwise,
                }
            }
            Line::For(var, iter) => ProgramStatement::For {
                var,
                iter,
                body: nested_block(lines, level, number, "for")?,
            },
            Line::While(cond) => ProgramStatement::While {
                cond,
                body: nested_block(lines, level, number, "while")?,
            },
            other @ (Line::Elif(_) | Line::Else) => {
                return Err(CompileError::parse(format!(
                    "'{}' without a matching 'if' on program line {number}",
                    other.word()
                )));
            }
        };
        statements.push(statement);
    }
    Ok(Block(statements))
}

fn nested_block(lines: &mut Lines, level: usize, number: usize, word: &str) -> Result<Block> {
    match lines.peek() {
        Some(&(_, inner, _)) if inner > level => build_block(lines, inner),
        _ => Err(CompileError::parse(format!(
            "expected an indented block after '{word}' on program line {number}"
        ))),
    }
}
