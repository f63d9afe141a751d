//! Tree-walking evaluator for voting expressions.
//!
//! Evaluation happens against one global context plus an ordered list of
//! voter contexts. Aggregator calls (`sum`, `max`, ...) re-evaluate their
//! argument once per active voter; everything else is plain expression
//! evaluation in whichever scope it appears.

use crate::error::{Error, Result, Span};
use crate::variables::{Context, keys};
use crate::voting::VotingRegistry;
use crate::voting::ast::{BinaryOp, Expr, ExprKind, UnaryOp, Value};

pub(crate) struct EvalCtx<'a> {
    pub global: &'a mut Context,
    pub voters: &'a mut [Context],
    pub registry: Option<&'a VotingRegistry>,
    /// Voters still visible to aggregation (limit decorators clear slots).
    active: Vec<bool>,
    /// Voters whose context contributed non-vacuously.
    used: Vec<bool>,
    /// Registry names currently being expanded, for cycle detection.
    stack: Vec<String>,
}

impl<'a> EvalCtx<'a> {
    pub fn new(
        global: &'a mut Context,
        voters: &'a mut [Context],
        registry: Option<&'a VotingRegistry>,
        active: Option<Vec<bool>>,
    ) -> Self {
        let count = voters.len();
        Self {
            global,
            voters,
            registry,
            active: active.unwrap_or_else(|| vec![true; count]),
            used: vec![false; count],
            stack: Vec::new(),
        }
    }

    pub fn used_voters(&self) -> Vec<usize> {
        self.used
            .iter()
            .enumerate()
            .filter_map(|(i, &used)| used.then_some(i))
            .collect()
    }

    fn active_indices(&self) -> Vec<usize> {
        self.active
            .iter()
            .enumerate()
            .filter_map(|(i, &a)| a.then_some(i))
            .collect()
    }

    fn epsilon(&self) -> f64 {
        self.global
            .get_num(keys::EPSILON)
            .unwrap_or(f64::EPSILON)
    }

    fn lookup(&mut self, name: &str, voter: Option<usize>, span: Span) -> Result<Value> {
        if let Some(i) = voter
            && let Some(value) = self.voters[i].get(name)
        {
            return Ok(value.clone());
        }
        if let Some(value) = self.global.get(name) {
            return Ok(value.clone());
        }
        if let Some(registry) = self.registry
            && let Some(voting) = registry.get_registered(name)
        {
            if self.stack.iter().any(|n| n == name) {
                return Err(Error::eval(
                    format!("recursive reference to voting '{name}'"),
                    Some(span),
                ));
            }
            self.stack.push(name.to_string());
            let result = self.eval(voting.body(), voter);
            self.stack.pop();
            return result;
        }
        Err(Error::eval(format!("unbound identifier '{name}'"), Some(span)))
    }

    fn num(&mut self, expr: &Expr, voter: Option<usize>) -> Result<f64> {
        let value = self.eval(expr, voter)?;
        value.as_num().ok_or_else(|| {
            Error::eval(
                format!("expected a number, found {}", value.type_name()),
                Some(expr.span),
            )
        })
    }

    pub fn eval(&mut self, expr: &Expr, voter: Option<usize>) -> Result<Value> {
        match &expr.kind {
            ExprKind::Literal(value) => Ok(value.clone()),
            ExprKind::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, voter)?);
                }
                Ok(Value::List(values))
            }
            ExprKind::Var(name) => self.lookup(name, voter, expr.span),
            ExprKind::Unary(op, operand) => match op {
                UnaryOp::Neg => Ok(Value::Num(-self.num(operand, voter)?)),
                UnaryOp::Not => Ok(Value::Bool(!self.eval(operand, voter)?.is_truthy())),
            },
            ExprKind::Binary(op, left, right) => self.binary(*op, left, right, voter, expr.span),
            ExprKind::Cond(cond, then, otherwise) => {
                if self.eval(cond, voter)?.is_truthy() {
                    self.eval(then, voter)
                } else {
                    self.eval(otherwise, voter)
                }
            }
            ExprKind::Call(name, args) => self.call(name, args, voter, expr.span),
        }
    }

    fn binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        voter: Option<usize>,
        span: Span,
    ) -> Result<Value> {
        match op {
            BinaryOp::And => {
                let lhs = self.eval(left, voter)?;
                if !lhs.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.eval(right, voter)?.is_truthy()))
            }
            BinaryOp::Or => {
                let lhs = self.eval(left, voter)?;
                if lhs.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.eval(right, voter)?.is_truthy()))
            }
            BinaryOp::Eq | BinaryOp::Ne => {
                let lhs = self.eval(left, voter)?;
                let rhs = self.eval(right, voter)?;
                let equal = match (&lhs, &rhs) {
                    // booleans and numbers compare through the numeric view
                    (Value::Num(_) | Value::Bool(_), Value::Num(_) | Value::Bool(_)) => {
                        lhs.as_num() == rhs.as_num()
                    }
                    _ => lhs == rhs,
                };
                Ok(Value::Bool(if op == BinaryOp::Eq { equal } else { !equal }))
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let lhs = self.eval(left, voter)?;
                let rhs = self.eval(right, voter)?;
                let ordering = match (&lhs, &rhs) {
                    (Value::Str(a), Value::Str(b)) => a.cmp(b),
                    _ => {
                        let a = lhs.as_num().ok_or_else(|| {
                            Error::eval(
                                format!("cannot compare {}", lhs.type_name()),
                                Some(left.span),
                            )
                        })?;
                        let b = rhs.as_num().ok_or_else(|| {
                            Error::eval(
                                format!("cannot compare {}", rhs.type_name()),
                                Some(right.span),
                            )
                        })?;
                        a.total_cmp(&b)
                    }
                };
                let result = match op {
                    BinaryOp::Lt => ordering.is_lt(),
                    BinaryOp::Le => ordering.is_le(),
                    BinaryOp::Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                };
                Ok(Value::Bool(result))
            }
            BinaryOp::Add => {
                let lhs = self.eval(left, voter)?;
                if let Value::Str(a) = &lhs {
                    let rhs = self.eval(right, voter)?;
                    if let Value::Str(b) = &rhs {
                        return Ok(Value::Str(format!("{a}{b}")));
                    }
                    return Err(Error::eval(
                        format!("cannot add string and {}", rhs.type_name()),
                        Some(span),
                    ));
                }
                let a = lhs.as_num().ok_or_else(|| {
                    Error::eval(format!("cannot add {}", lhs.type_name()), Some(left.span))
                })?;
                Ok(Value::Num(a + self.num(right, voter)?))
            }
            BinaryOp::Sub => Ok(Value::Num(self.num(left, voter)? - self.num(right, voter)?)),
            BinaryOp::Mul => Ok(Value::Num(self.num(left, voter)? * self.num(right, voter)?)),
            BinaryOp::Div | BinaryOp::Rem => {
                let a = self.num(left, voter)?;
                let b = self.num(right, voter)?;
                if b == 0.0 {
                    // zero guard: neither ±inf nor NaN escapes a voting
                    return Ok(Value::Num(self.epsilon()));
                }
                Ok(Value::Num(if op == BinaryOp::Div { a / b } else { a % b }))
            }
            BinaryOp::Pow => Ok(Value::Num(
                self.num(left, voter)?.powf(self.num(right, voter)?),
            )),
        }
    }

    fn call(
        &mut self,
        name: &str,
        args: &[Expr],
        voter: Option<usize>,
        span: Span,
    ) -> Result<Value> {
        match name {
            "sum" | "max" | "min" | "avg" | "product" | "count" => {
                self.fold(name, args, voter, span)
            }
            "top" => {
                self.require_global(name, voter, span)?;
                self.arity(name, args, 2, span)?;
                let n = self.index_arg(&args[0], voter)?;
                let ranked = self.voters_by_score();
                let mut total = 0.0;
                for &i in ranked.iter().take(n) {
                    total += self.num(&args[1], Some(i))?;
                    self.used[i] = true;
                }
                Ok(Value::Num(total))
            }
            "nth" => {
                self.arity(name, args, 2, span)?;
                let i = self.index_arg(&args[0], voter)?;
                let target = *self.active_indices().get(i).ok_or_else(|| {
                    Error::eval(format!("voter index {i} out of range"), Some(span))
                })?;
                self.used[target] = true;
                self.eval(&args[1], Some(target))
            }
            "rank_of" | "reciprocal_rank" | "real_reciprocal_rank" => {
                self.arity(name, args, 1, span)?;
                let i = self.index_arg(&args[0], voter)?;
                let target = *self.active_indices().get(i).ok_or_else(|| {
                    Error::eval(format!("voter index {i} out of range"), Some(span))
                })?;
                self.used[target] = true;
                let key = match name {
                    "rank_of" => keys::RANK,
                    "reciprocal_rank" => keys::RECIPROCAL_RANK,
                    _ => keys::REAL_RECIPROCAL_RANK,
                };
                self.voters[target]
                    .get(key)
                    .cloned()
                    .ok_or_else(|| Error::eval(format!("voter has no {key}"), Some(span)))
            }
            "filter_sum" => {
                self.require_global(name, voter, span)?;
                self.arity(name, args, 2, span)?;
                let mut total = 0.0;
                for i in self.active_indices() {
                    if self.eval(&args[0], Some(i))?.is_truthy() {
                        total += self.num(&args[1], Some(i))?;
                        self.used[i] = true;
                    }
                }
                Ok(Value::Num(total))
            }
            "exp" | "ln" | "sqrt" | "abs" => {
                self.arity(name, args, 1, span)?;
                let x = self.num(&args[0], voter)?;
                let result = match name {
                    "exp" => x.exp(),
                    "sqrt" => x.sqrt(),
                    "abs" => x.abs(),
                    _ => {
                        if x <= 0.0 {
                            return Err(Error::eval(
                                format!("ln of non-positive value {x}"),
                                Some(span),
                            ));
                        }
                        x.ln()
                    }
                };
                Ok(Value::Num(result))
            }
            "pow" => {
                self.arity(name, args, 2, span)?;
                let base = self.num(&args[0], voter)?;
                let exponent = self.num(&args[1], voter)?;
                Ok(Value::Num(base.powf(exponent)))
            }
            "len" => {
                self.arity(name, args, 1, span)?;
                let value = self.eval(&args[0], voter)?;
                match value {
                    Value::List(items) => Ok(Value::Num(items.len() as f64)),
                    Value::Str(s) => Ok(Value::Num(s.chars().count() as f64)),
                    other => Err(Error::eval(
                        format!("len of {}", other.type_name()),
                        Some(span),
                    )),
                }
            }
            other => Err(Error::eval(format!("unknown function '{other}'"), Some(span))),
        }
    }

    /// The simple one-argument folds over every active voter.
    fn fold(&mut self, name: &str, args: &[Expr], voter: Option<usize>, span: Span) -> Result<Value> {
        self.require_global(name, voter, span)?;
        self.arity(name, args, 1, span)?;

        let indices = self.active_indices();
        if name == "count" {
            let mut count = 0usize;
            for i in indices {
                if self.eval(&args[0], Some(i))?.is_truthy() {
                    count += 1;
                    self.used[i] = true;
                }
            }
            return Ok(Value::Num(count as f64));
        }

        let mut acc: Option<f64> = None;
        let mut n = 0usize;
        for i in indices {
            let x = self.num(&args[0], Some(i))?;
            self.used[i] = true;
            n += 1;
            acc = Some(match (name, acc) {
                (_, None) => x,
                ("sum" | "avg", Some(a)) => a + x,
                ("max", Some(a)) => a.max(x),
                ("min", Some(a)) => a.min(x),
                ("product", Some(a)) => a * x,
                _ => unreachable!(),
            });
        }
        let result = match (name, acc) {
            ("product", None) => 1.0,
            (_, None) => 0.0,
            ("avg", Some(a)) => a / n as f64,
            (_, Some(a)) => a,
        };
        Ok(Value::Num(result))
    }

    fn require_global(&self, name: &str, voter: Option<usize>, span: Span) -> Result<()> {
        if voter.is_some() {
            return Err(Error::eval(
                format!("'{name}' cannot aggregate inside another aggregation"),
                Some(span),
            ));
        }
        Ok(())
    }

    fn arity(&self, name: &str, args: &[Expr], expected: usize, span: Span) -> Result<()> {
        if args.len() != expected {
            return Err(Error::eval(
                format!("'{name}' takes {expected} argument(s), got {}", args.len()),
                Some(span),
            ));
        }
        Ok(())
    }

    fn index_arg(&mut self, expr: &Expr, voter: Option<usize>) -> Result<usize> {
        let n = self.num(expr, voter)?;
        if n < 0.0 || n.fract() != 0.0 {
            return Err(Error::eval(
                format!("expected a non-negative integer, got {n}"),
                Some(expr.span),
            ));
        }
        Ok(n as usize)
    }

    /// Active voter indices ordered by `SCORE_CANDIDATE` descending, ties by
    /// ascending voter id.
    fn voters_by_score(&self) -> Vec<usize> {
        let mut ranked = self.active_indices();
        ranked.sort_by(|&a, &b| {
            let score_a = self.voters[a].get_num(keys::SCORE_CANDIDATE).unwrap_or(0.0);
            let score_b = self.voters[b].get_num(keys::SCORE_CANDIDATE).unwrap_or(0.0);
            score_b.total_cmp(&score_a).then_with(|| {
                let id_a = self.voters[a].get_num(keys::VOTER_ID).unwrap_or(a as f64);
                let id_b = self.voters[b].get_num(keys::VOTER_ID).unwrap_or(b as f64);
                id_a.total_cmp(&id_b)
            })
        });
        ranked
    }
}
