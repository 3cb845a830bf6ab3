//! Tree interpreter.
//!
//! The [`Interpreter`] owns the worksheet namespace: variables assigned by equations and
//! functions they define. Expressions are evaluated against that namespace plus a stack of
//! local scopes for bound names (sum variables, function parameters, program locals).
//! Nothing outside the expression tree is ever executed.

use crate::builtins;
use crate::error::EvalError;
use crate::numeric::{central_difference, one_sided_limit, simpson};
use crate::ops;
use crate::value::{Grid, GridKind, Shape, Value};
use mathsheet_compiler::{
    BinaryOp, Block, CompiledEquation, Expr, FunctionBody, IndexItem, ProgramStatement,
    SeriesKind, Statement,
};
use num_complex::Complex64;
use std::collections::HashMap;

type Result<T> = std::result::Result<T, EvalError>;

/// Nesting limit for user function calls.
pub const MAX_CALL_DEPTH: usize = 200;

/// A worksheet-defined function.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Parameter names.
    pub params: Vec<String>,
    /// Expression or program body.
    pub body: FunctionBody,
}

/// Variables and functions visible to every equation.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    variables: HashMap<String, Value>,
    functions: HashMap<String, Function>,
}

impl Namespace {
    /// A variable's value.
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// A defined function.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    /// Returns `true` if `name` can be read: a variable or a constant.
    pub fn is_readable(&self, name: &str) -> bool {
        self.variables.contains_key(name) || builtins::constant(name).is_some()
    }

    /// Returns `true` if `name` can be called: a defined function or a builtin.
    pub fn is_callable(&self, name: &str) -> bool {
        self.functions.contains_key(name) || builtins::is_builtin(name)
    }

    /// Assign a variable.
    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    /// Remove a variable or function. Returns `true` if something was removed.
    pub fn forget(&mut self, name: &str) -> bool {
        let variable = self.variables.remove(name).is_some();
        let function = self.functions.remove(name).is_some();
        variable || function
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.variables.clear();
        self.functions.clear();
    }
}

/// Runs compiled equations against a namespace.
#[derive(Debug, Default)]
pub struct Interpreter {
    namespace: Namespace,
}

impl Interpreter {
    /// An interpreter with an empty namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// The namespace.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// The namespace, mutably.
    pub fn namespace_mut(&mut self) -> &mut Namespace {
        &mut self.namespace
    }

    /// Evaluate one equation, updating the namespace when it assigns or defines something.
    ///
    /// Returns the value to show after the equation, `None` for a function definition.
    pub fn run(&mut self, compiled: &CompiledEquation) -> Result<Option<Value>> {
        let index_vars = compiled.index_variables.as_slice();
        match &compiled.statement {
            Statement::Expr(expr) => {
                let value = self.eval().index_loop(index_vars, |e| e.expr(expr))?;
                Ok(Some(value))
            }
            Statement::Assign { target, value } => {
                let value = self.eval().index_loop(index_vars, |e| e.expr(value))?;
                self.namespace.set_variable(target.as_str(), value.clone());
                Ok(Some(value))
            }
            Statement::AssignIndexed {
                target,
                indices,
                value,
            } => {
                let grid = self
                    .eval()
                    .indexed_assign(target, indices, index_vars, |e| e.expr(value))?;
                self.namespace.set_variable(target.as_str(), grid.clone());
                Ok(Some(grid))
            }
            Statement::AssignProgram {
                target,
                indices,
                program,
            } => {
                let value = if indices.is_empty() {
                    self.eval().program(program)?
                } else {
                    self.eval()
                        .indexed_assign(target, indices, index_vars, |e| e.program(program))?
                };
                self.namespace.set_variable(target.as_str(), value.clone());
                Ok(Some(value))
            }
            Statement::Program(program) => self.eval().program(program).map(Some),
            Statement::Define { name, params, body } => {
                self.namespace.functions.insert(
                    name.clone(),
                    Function {
                        params: params.clone(),
                        body: body.clone(),
                    },
                );
                Ok(None)
            }
        }
    }

    fn eval(&self) -> Eval<'_> {
        Eval {
            namespace: &self.namespace,
            scopes: Vec::new(),
            depth: 0,
        }
    }
}

/// Control flow out of a program block.
enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Selected positions along one dimension.
enum Positions {
    One(usize),
    Many(Vec<usize>),
}

impl Positions {
    fn to_vec(&self) -> Vec<usize> {
        match self {
            Positions::One(i) => vec![*i],
            Positions::Many(list) => list.clone(),
        }
    }
}

/// One evaluation: a read-only namespace plus local scopes.
struct Eval<'n> {
    namespace: &'n Namespace,
    scopes: Vec<HashMap<String, Value>>,
    depth: usize,
}

impl Eval<'_> {
    fn lookup(&self, name: &str) -> Result<Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .or_else(|| self.namespace.variable(name))
            .cloned()
            .or_else(|| builtins::constant(name))
            .ok_or_else(|| EvalError::UndefinedVariable(name.to_string()))
    }

    fn scoped<T>(
        &mut self,
        scope: HashMap<String, Value>,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.scopes.push(scope);
        let result = f(self);
        self.scopes.pop();
        result
    }

    fn bind<T>(
        &mut self,
        name: &str,
        value: Value,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.scoped(HashMap::from([(name.to_string(), value)]), f)
    }

    fn set_local(&mut self, name: &str, value: Value) {
        match self.scopes.last_mut() {
            Some(scope) => {
                scope.insert(name.to_string(), value);
            }
            None => self.scopes.push(HashMap::from([(name.to_string(), value)])),
        }
    }

    /// `body` evaluated at `name = x`, as a number.
    fn sample(&mut self, name: &str, x: f64, body: &Expr) -> Result<Complex64> {
        self.bind(name, Value::real(x), |e| e.expr(body))?.as_number()
    }

    fn expr(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Number(value) => Ok(Value::real(*value)),
            Expr::Integer(value) => Ok(Value::real(*value as f64)),
            Expr::Imaginary(value) => Ok(Value::complex(0.0, *value)),
            Expr::Text(text) => Ok(Value::Text(text.clone())),
            Expr::Variable(name) => self.lookup(name),
            Expr::Group(inner) | Expr::Vectorize(inner) => self.expr(inner),
            Expr::Unary { op, operand } => ops::unary(*op, self.expr(operand)?),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.expr(lhs)?;
                let rhs = self.expr(rhs)?;
                match (op, &lhs) {
                    (BinaryOp::Pow, Value::Grid(grid)) => ops::grid_power(grid, &rhs),
                    _ => ops::binary(*op, lhs, rhs),
                }
            }
            Expr::Apply { func, args } => {
                let args = self.exprs(args)?;
                builtins::call(func.name(), args)
                    .unwrap_or_else(|| Err(EvalError::UnknownFunction(func.name().to_string())))
            }
            Expr::Call { name, args } => {
                let args = self.exprs(args)?;
                self.call(name, args)
            }
            Expr::Index { target, indices } => {
                let target = self.expr(target)?;
                self.index(&target, indices)
            }
            Expr::Range { start, end, step } => {
                let start = self.expr(start)?.as_real()?;
                let end = self.expr(end)?.as_real()?;
                let step = match step {
                    Some(step) => self.expr(step)?.as_real()?,
                    None => 1.0,
                };
                Ok(Value::Grid(Grid::reals(builtins::arange(
                    start, end, step, true,
                )?)))
            }
            Expr::Grid { rows, matrix } => self.grid(rows, *matrix),
            Expr::List(items) => {
                let cells = items
                    .iter()
                    .map(|item| self.expr(item)?.as_number())
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Grid(Grid::vector(GridKind::Array, cells)))
            }
            Expr::Series {
                kind,
                var,
                from,
                to,
                body,
            } => {
                let from = self.expr(from)?.as_integer()?;
                let to = self.expr(to)?.as_integer()?;
                let values = (from..=to).map(|k| Value::real(k as f64)).collect();
                self.series(*kind, var, values, body)
            }
            Expr::RangeSeries { kind, var, body } => {
                let values = self.lookup(var)?.elements()?;
                self.series(*kind, var, values, body)
            }
            Expr::Integral {
                var,
                from,
                to,
                body,
            } => {
                let a = self.expr(from)?.as_real()?;
                let b = self.expr(to)?.as_real()?;
                simpson(|x| self.sample(var, x, body), a, b).map(Value::Number)
            }
            Expr::IndefiniteIntegral { .. } => Err(EvalError::SymbolicUnavailable(
                "indefinite integral".to_string(),
            )),
            Expr::Derivative { var, body } => {
                let x = self.lookup(var)?.as_real()?;
                central_difference(|x| self.sample(var, x, body), x).map(Value::Number)
            }
            Expr::Limit {
                var,
                approach,
                side,
                body,
            } => {
                let a = self.expr(approach)?.as_real()?;
                one_sided_limit(|x| self.sample(var, x, body), a, *side).map(Value::Number)
            }
            Expr::Substitute { body, bindings } => {
                let mut scope = HashMap::new();
                for (name, value) in bindings {
                    scope.insert(name.clone(), self.expr(value)?);
                }
                self.scoped(scope, |e| e.expr(body)).map_err(|err| match err {
                    EvalError::UndefinedVariable(name) => EvalError::SymbolicUnavailable(format!(
                        "substitution leaves '{name}' unbound"
                    )),
                    other => other,
                })
            }
        }
    }

    fn exprs(&mut self, exprs: &[Expr]) -> Result<Vec<Value>> {
        exprs.iter().map(|e| self.expr(e)).collect()
    }

    fn grid(&mut self, rows: &[Vec<Expr>], matrix: bool) -> Result<Value> {
        let kind = if matrix {
            GridKind::Matrix
        } else {
            GridKind::Array
        };
        let cols = rows.first().map_or(0, Vec::len);
        let mut cells = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            if row.len() != cols {
                return Err(EvalError::DimensionMismatch {
                    expected: cols,
                    found: row.len(),
                });
            }
            for cell in row {
                cells.push(self.expr(cell)?.as_number()?);
            }
        }
        if rows.len() == 1 && !matrix {
            return Ok(Value::Grid(Grid::vector(kind, cells)));
        }
        Grid::table(kind, rows.len(), cols, cells).map(Value::Grid)
    }

    fn series(
        &mut self,
        kind: SeriesKind,
        var: &str,
        values: Vec<Value>,
        body: &Expr,
    ) -> Result<Value> {
        let (mut total, op) = match kind {
            SeriesKind::Sum => (Value::real(0.0), BinaryOp::Add),
            SeriesKind::Product => (Value::real(1.0), BinaryOp::Mul),
        };
        for value in values {
            let term = self.bind(var, value, |e| e.expr(body))?;
            total = ops::binary(op, total, term)?;
        }
        Ok(total)
    }

    fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
        if let Some(function) = self.namespace.function(name) {
            if function.params.len() != args.len() {
                return Err(EvalError::Arity {
                    function: name.to_string(),
                    expected: function.params.len().to_string(),
                    found: args.len(),
                });
            }
            if self.depth >= MAX_CALL_DEPTH {
                return Err(EvalError::domain("maximum call depth exceeded"));
            }
            let scope = function.params.iter().cloned().zip(args).collect();
            let mut inner = Eval {
                namespace: self.namespace,
                scopes: vec![scope],
                depth: self.depth + 1,
            };
            return match &function.body {
                FunctionBody::Expr(body) => inner.expr(body),
                FunctionBody::Program(body) => inner.program(body),
            };
        }
        builtins::call(name, args).unwrap_or_else(|| Err(EvalError::UnknownFunction(name.into())))
    }

    // ---- indexing ------------------------------------------------------------------------

    fn positions(&mut self, item: &IndexItem, len: usize) -> Result<Positions> {
        let resolve = |i: i64| -> Result<usize> {
            let resolved = if i < 0 { i + len as i64 } else { i };
            usize::try_from(resolved)
                .ok()
                .filter(|&p| p < len)
                .ok_or_else(|| EvalError::index(format!("index {i} out of range for length {len}")))
        };
        match item {
            IndexItem::At(expr) => match self.expr(expr)? {
                Value::Grid(grid) => grid
                    .cells()
                    .iter()
                    .map(|c| resolve(Value::Number(*c).as_integer()?))
                    .collect::<Result<Vec<_>>>()
                    .map(Positions::Many),
                other => resolve(other.as_integer()?).map(Positions::One),
            },
            IndexItem::Slice { start, end, step } => {
                let start = resolve(self.expr(start)?.as_integer()?)? as i64;
                let end = resolve(self.expr(end)?.as_integer()?)? as i64;
                let step = match step {
                    Some(step) => self.expr(step)?.as_integer()?,
                    None => 1,
                };
                if step == 0 {
                    return Err(EvalError::index("slice step cannot be zero"));
                }
                let mut out = Vec::new();
                let mut i = start;
                while (step > 0 && i <= end) || (step < 0 && i >= end) {
                    out.push(i as usize);
                    i += step;
                }
                Ok(Positions::Many(out))
            }
        }
    }

    fn index(&mut self, target: &Value, items: &[IndexItem]) -> Result<Value> {
        match target {
            Value::Text(text) => {
                let chars: Vec<char> = text.chars().collect();
                let [item] = items else {
                    return Err(EvalError::index("a string takes one index"));
                };
                let picked: String = self
                    .positions(item, chars.len())?
                    .to_vec()
                    .into_iter()
                    .map(|p| chars[p])
                    .collect();
                Ok(Value::Text(picked))
            }
            Value::Number(_) => Err(EvalError::type_error("a number cannot be indexed")),
            Value::Grid(grid) => match (grid.shape(), items) {
                (Shape::Vector(n), [item]) => match self.positions(item, n)? {
                    Positions::One(p) => Ok(Value::Number(grid.cells()[p])),
                    Positions::Many(list) => Ok(Value::Grid(Grid::vector(
                        grid.kind,
                        list.into_iter().map(|p| grid.cells()[p]).collect(),
                    ))),
                },
                (Shape::Table { rows, .. }, [item]) => match self.positions(item, rows)? {
                    Positions::One(r) => grid
                        .row(r)
                        .map(Value::Grid)
                        .ok_or_else(|| EvalError::index(format!("row {r} out of range"))),
                    Positions::Many(list) => {
                        let (_, cols) = grid.dims();
                        self.pick(grid, &list, &(0..cols).collect::<Vec<_>>(), true)
                    }
                },
                (Shape::Table { rows, cols }, [row, col]) => {
                    let r = self.positions(row, rows)?;
                    let c = self.positions(col, cols)?;
                    match (r, c) {
                        (Positions::One(r), Positions::One(c)) => grid
                            .get(r, c)
                            .map(Value::Number)
                            .ok_or_else(|| EvalError::index("cell out of range")),
                        (r, c) => {
                            let keep_table = matches!(
                                (&r, &c),
                                (Positions::Many(_), Positions::Many(_))
                            );
                            self.pick(grid, &r.to_vec(), &c.to_vec(), keep_table)
                        }
                    }
                }
                (shape, items) => Err(EvalError::index(format!(
                    "{} indices given for a grid of shape {shape}",
                    items.len()
                ))),
            },
        }
    }

    fn pick(&self, grid: &Grid, rows: &[usize], cols: &[usize], table: bool) -> Result<Value> {
        let size = Shape::Table {
            rows: rows.len(),
            cols: cols.len(),
        }
        .checked_size()?;
        let mut cells = Vec::with_capacity(size);
        for &r in rows {
            for &c in cols {
                cells.push(
                    grid.get(r, c)
                        .ok_or_else(|| EvalError::index("cell out of range"))?,
                );
            }
        }
        if table {
            Grid::table(grid.kind, rows.len(), cols.len(), cells).map(Value::Grid)
        } else {
            Ok(Value::Grid(Grid::vector(grid.kind, cells)))
        }
    }

    /// Cell coordinates for an assignment target; each index must be a single whole number.
    fn target_cell(&mut self, indices: &[IndexItem]) -> Result<(usize, usize)> {
        let mut coords = Vec::with_capacity(indices.len());
        for item in indices {
            let IndexItem::At(expr) = item else {
                return Err(EvalError::index("a slice cannot be assigned to"));
            };
            let i = self.expr(expr)?.as_integer()?;
            coords.push(
                usize::try_from(i)
                    .map_err(|_| EvalError::index(format!("negative index {i} on assignment")))?,
            );
        }
        match coords.as_slice() {
            [i] => Ok((0, *i)),
            [r, c] => Ok((*r, *c)),
            _ => Err(EvalError::index("assignment targets take one or two indices")),
        }
    }

    // ---- index loops ---------------------------------------------------------------------

    /// The array-valued index variables and their elements; scalar ones are left alone.
    fn loop_dimensions(&self, vars: &[String]) -> Result<Vec<(String, Vec<Value>)>> {
        let mut dims = Vec::new();
        for var in vars {
            let value = self
                .lookup(var)
                .map_err(|_| EvalError::UndefinedIndexVariable(var.clone()))?;
            if let Value::Grid(grid) = value {
                dims.push((var.clone(), grid.elements()));
            }
        }
        if dims.len() > 2 {
            return Err(EvalError::index("at most two index variables can be looped over"));
        }
        if let [(_, rows), (_, cols)] = dims.as_slice() {
            Shape::Table {
                rows: rows.len(),
                cols: cols.len(),
            }
            .checked_size()?;
        }
        Ok(dims)
    }

    /// Every combination of loop values as a scope, first variable slowest.
    fn combinations(dims: &[(String, Vec<Value>)]) -> Vec<HashMap<String, Value>> {
        let mut combos = vec![HashMap::new()];
        for (name, values) in dims {
            combos = combos
                .into_iter()
                .flat_map(|scope| {
                    values.iter().map(move |value| {
                        let mut scope = scope.clone();
                        scope.insert(name.clone(), value.clone());
                        scope
                    })
                })
                .collect();
        }
        combos
    }

    /// Evaluate `body` once per combination of the array index variables, collecting the
    /// results into a grid with one dimension per variable.
    fn index_loop(
        &mut self,
        vars: &[String],
        mut body: impl FnMut(&mut Self) -> Result<Value>,
    ) -> Result<Value> {
        let dims = self.loop_dimensions(vars)?;
        if dims.is_empty() {
            return body(self);
        }
        let mut cells = Vec::new();
        for scope in Self::combinations(&dims) {
            let value = self.scoped(scope, &mut body)?;
            cells.push(value.as_number().map_err(|_| {
                EvalError::type_error("an index loop must produce one number per element")
            })?);
        }
        match dims.as_slice() {
            [_] => Ok(Value::Grid(Grid::vector(GridKind::Array, cells))),
            [(_, rows), (_, cols), ..] => {
                Grid::table(GridKind::Array, rows.len(), cols.len(), cells).map(Value::Grid)
            }
            [] => body(self),
        }
    }

    /// `x[i, j] := body` over every combination of the array index variables.
    ///
    /// The target is sized from the largest index reached and grows an existing grid of the
    /// same dimensionality, keeping its cells. Later cells see earlier writes.
    fn indexed_assign(
        &mut self,
        target: &str,
        indices: &[IndexItem],
        vars: &[String],
        mut body: impl FnMut(&mut Self) -> Result<Value>,
    ) -> Result<Value> {
        let dims = self.loop_dimensions(vars)?;
        let combos = Self::combinations(&dims);
        let mut cells = Vec::with_capacity(combos.len());
        for scope in &combos {
            cells.push(self.scoped(scope.clone(), |e| e.target_cell(indices))?);
        }
        let rows = cells.iter().map(|(r, _)| r + 1).max().unwrap_or(1);
        let cols = cells.iter().map(|(_, c)| c + 1).max().unwrap_or(1);
        let shape = if indices.len() == 1 {
            Shape::Vector(cols)
        } else {
            Shape::Table { rows, cols }
        };
        let grid = match self.lookup(target) {
            Ok(Value::Grid(existing)) => existing.grown(shape)?,
            _ => Grid::zeros(GridKind::Array, shape)?,
        };

        self.scopes.push(HashMap::from([(target.to_string(), Value::Grid(grid))]));
        let base = self.scopes.len() - 1;
        let result = (|| -> Result<()> {
            for (scope, (r, c)) in combos.into_iter().zip(cells) {
                let value = self.scoped(scope, &mut body)?.as_number()?;
                if let Some(Value::Grid(grid)) = self.scopes[base].get_mut(target) {
                    grid.set(r, c, value);
                }
            }
            Ok(())
        })();
        let assigned = self.scopes.pop().and_then(|mut s| s.remove(target));
        result?;
        assigned.ok_or_else(|| EvalError::UndefinedVariable(target.to_string()))
    }

    // ---- programs ------------------------------------------------------------------------

    /// Run a program block in a fresh local scope.
    ///
    /// The running value starts at 0 and follows every expression line and assignment; the
    /// program yields it unless a `return` comes first.
    fn program(&mut self, program: &Block) -> Result<Value> {
        self.scopes.push(HashMap::new());
        let mut retval = Value::real(0.0);
        let flow = self.block(program, &mut retval);
        self.scopes.pop();
        match flow? {
            Flow::Return(value) => Ok(value),
            Flow::Normal | Flow::Break | Flow::Continue => Ok(retval),
        }
    }

    fn block(&mut self, block: &Block, retval: &mut Value) -> Result<Flow> {
        for statement in &block.0 {
            let flow = match statement {
                ProgramStatement::Expr(expr) => {
                    *retval = self.expr(expr)?;
                    Flow::Normal
                }
                ProgramStatement::Assign {
                    target,
                    indices,
                    value,
                } => {
                    let value = self.expr(value)?;
                    if indices.is_empty() {
                        self.set_local(target, value.clone());
                    } else {
                        self.assign_element(target, indices, &value)?;
                    }
                    *retval = value;
                    Flow::Normal
                }
                ProgramStatement::Return(expr) => Flow::Return(self.expr(expr)?),
                ProgramStatement::Break => Flow::Break,
                ProgramStatement::Continue => Flow::Continue,
                ProgramStatement::If {
                    branches,
                    otherwise,
                } => {
                    let mut chosen = otherwise.as_ref();
                    for (cond, body) in branches {
                        if self.expr(cond)?.truthy()? {
                            chosen = Some(body);
                            break;
                        }
                    }
                    match chosen {
                        Some(body) => self.block(body, retval)?,
                        None => Flow::Normal,
                    }
                }
                ProgramStatement::For { var, iter, body } => {
                    let mut flow = Flow::Normal;
                    for value in self.expr(iter)?.elements()? {
                        self.set_local(var, value);
                        match self.block(body, retval)? {
                            Flow::Break => break,
                            Flow::Return(value) => {
                                flow = Flow::Return(value);
                                break;
                            }
                            Flow::Normal | Flow::Continue => {}
                        }
                    }
                    flow
                }
                ProgramStatement::While { cond, body } => {
                    let mut flow = Flow::Normal;
                    while self.expr(cond)?.truthy()? {
                        match self.block(body, retval)? {
                            Flow::Break => break,
                            Flow::Return(value) => {
                                flow = Flow::Return(value);
                                break;
                            }
                            Flow::Normal | Flow::Continue => {}
                        }
                    }
                    flow
                }
            };
            if !matches!(flow, Flow::Normal) {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    /// `x[i] := value` inside a program, growing `x` as needed.
    fn assign_element(
        &mut self,
        target: &str,
        indices: &[IndexItem],
        value: &Value,
    ) -> Result<()> {
        let (r, c) = self.target_cell(indices)?;
        let shape = if indices.len() == 1 {
            Shape::Vector(c + 1)
        } else {
            Shape::Table {
                rows: r + 1,
                cols: c + 1,
            }
        };
        let mut grid = match self.lookup(target) {
            Ok(Value::Grid(existing)) => existing.grown(shape)?,
            _ => Grid::zeros(GridKind::Array, shape)?,
        };
        grid.set(r, c, value.as_number()?);
        self.set_local(target, Value::Grid(grid));
        Ok(())
    }
}
