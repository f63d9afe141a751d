//! The voting language: how the scores of several source-language voters
//! collapse into one candidate score.

mod ast;
mod eval;
mod parser;

use std::fmt;
use std::sync::{Arc, OnceLock};

use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

pub use ast::{BinaryOp, Expr, ExprKind, UnaryOp, Value};

use crate::Map;
use crate::error::{Error, Result};
use crate::variables::{Context, keys};
use eval::EvalCtx;

/// A parsed voting expression, optionally carrying the name declared in its
/// `name = expr` header.
#[derive(Debug, Clone, PartialEq)]
pub struct VotingExpr {
    name: Option<String>,
    body: Expr,
}

impl VotingExpr {
    pub fn parse(source: &str) -> Result<Self> {
        let parsed = parser::parse(source)?;
        Ok(Self {
            name: parsed.name,
            body: parsed.body,
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn body(&self) -> &Expr {
        &self.body
    }
}

/// The closed library of named votings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter,
)]
pub enum BuiltInVoting {
    OriginalScore,
    Voters,
    CombSum,
    GCombSum,
    CombSumTop,
    CombSumPow2,
    CombMax,
    RR,
    RRPow2,
    CombSumRR,
    CombSumRRPow2,
    CombSumPow2RR,
    CombSumPow2RRPow2,
    ExpCombMnz,
    WCombSum,
    WCombSumG,
    WGCombSum,
    PCombSum,
}

impl BuiltInVoting {
    /// The defining expression over the standard context variables.
    pub fn expression(self) -> &'static str {
        match self {
            Self::OriginalScore => "max(IS_ORIGIN_WORD ? SCORE_CANDIDATE : 0.0)",
            Self::Voters => "COUNT_OF_VOTERS",
            Self::CombSum => "sum(SCORE_CANDIDATE)",
            Self::GCombSum => "sum(REAL_RECIPROCAL_RANK * SCORE_CANDIDATE)",
            Self::CombSumTop => "top(10, SCORE_CANDIDATE)",
            Self::CombSumPow2 => "sum(SCORE_CANDIDATE ** 2)",
            Self::CombMax => "max(SCORE_CANDIDATE)",
            Self::RR => "sum(RECIPROCAL_RANK)",
            Self::RRPow2 => "sum(RECIPROCAL_RANK ** 2)",
            Self::CombSumRR => "sum(SCORE_CANDIDATE) * sum(RECIPROCAL_RANK)",
            Self::CombSumRRPow2 => "sum(SCORE_CANDIDATE) * sum(RECIPROCAL_RANK ** 2)",
            Self::CombSumPow2RR => "sum(SCORE_CANDIDATE ** 2) * sum(RECIPROCAL_RANK)",
            Self::CombSumPow2RRPow2 => "sum(SCORE_CANDIDATE ** 2) * sum(RECIPROCAL_RANK ** 2)",
            Self::ExpCombMnz => "sum(exp(SCORE_CANDIDATE)) * count(HAS_TRANSLATION)",
            Self::WCombSum => "sum(IMPORTANCE * SCORE_CANDIDATE)",
            Self::WCombSumG => "sum(IMPORTANCE * REAL_RECIPROCAL_RANK * SCORE_CANDIDATE)",
            Self::WGCombSum => "sum(IMPORTANCE * REAL_RECIPROCAL_RANK) * sum(SCORE_CANDIDATE)",
            Self::PCombSum => "sum(SCORE_CANDIDATE) / TOPIC_SUM_PROBABILITY",
        }
    }

    fn parsed(self) -> &'static VotingExpr {
        static CACHE: OnceLock<Map<BuiltInVoting, VotingExpr>> = OnceLock::new();
        let cache = CACHE.get_or_init(|| {
            BuiltInVoting::iter()
                .map(|voting| {
                    let expr = VotingExpr::parse(voting.expression())
                        .expect("built-in voting expressions parse");
                    (voting, expr)
                })
                .collect()
        });
        &cache[&self]
    }
}

/// A host-supplied voting. Runs synchronously on the thread translating the
/// topic; contexts are scoped to the call and must not be stored.
pub trait VotingCallback: Send + Sync {
    fn invoke(&self, global: &mut Context, voters: &mut [Context]) -> Result<f64>;
}

impl<F> VotingCallback for F
where
    F: Fn(&mut Context, &mut [Context]) -> Result<f64> + Send + Sync,
{
    fn invoke(&self, global: &mut Context, voters: &mut [Context]) -> Result<f64> {
        self(global, voters)
    }
}

#[derive(Clone)]
enum VotingKind {
    BuiltIn(BuiltInVoting),
    Parsed(Arc<VotingExpr>),
    /// Resolved against the registry at call time.
    Registered(String),
    Callback(Arc<dyn VotingCallback>),
}

impl fmt::Debug for VotingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BuiltIn(voting) => write!(f, "BuiltIn({voting})"),
            Self::Parsed(expr) => write!(f, "Parsed({:?})", expr.name()),
            Self::Registered(name) => write!(f, "Registered({name:?})"),
            Self::Callback(_) => write!(f, "Callback"),
        }
    }
}

/// A voting plus an optional voter limit.
#[derive(Debug, Clone)]
pub struct Voting {
    kind: VotingKind,
    limit: Option<usize>,
}

impl Voting {
    pub fn parse(source: &str) -> Result<Self> {
        Ok(Self {
            kind: VotingKind::Parsed(Arc::new(VotingExpr::parse(source)?)),
            limit: None,
        })
    }

    /// A voting resolved by name against the registry on every call.
    pub fn registered(name: impl Into<String>) -> Self {
        Self {
            kind: VotingKind::Registered(name.into()),
            limit: None,
        }
    }

    pub fn from_callback(callback: impl VotingCallback + 'static) -> Self {
        Self {
            kind: VotingKind::Callback(Arc::new(callback)),
            limit: None,
        }
    }

    /// Caps the voters to the top `n` by `SCORE_CANDIDATE` (descending, ties
    /// by ascending voter id) before evaluation.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Runs the voting, returning the aggregated score plus the indices of
    /// the voters that contributed.
    pub fn call(
        &self,
        global: &mut Context,
        voters: &mut [Context],
        registry: Option<&VotingRegistry>,
    ) -> Result<(f64, Vec<usize>)> {
        let active = self.limit.map(|n| top_n_mask(voters, n));
        if let Some(mask) = &active {
            let count = mask.iter().filter(|&&keep| keep).count();
            global.set(keys::COUNT_OF_VOTERS, count);
            global.set(keys::NUMBER_OF_VOTERS, count);
        }

        match &self.kind {
            VotingKind::BuiltIn(voting) => {
                Self::eval_expr(voting.parsed(), global, voters, registry, active)
            }
            VotingKind::Parsed(expr) => Self::eval_expr(expr, global, voters, registry, active),
            VotingKind::Registered(name) => {
                let expr = registry
                    .and_then(|r| r.get_registered(name))
                    .ok_or_else(|| Error::not_found(format!("registered voting '{name}'")))?;
                Self::eval_expr(&expr, global, voters, registry, active)
            }
            VotingKind::Callback(callback) => match active {
                Some(mask) => {
                    let retained: Vec<usize> = mask
                        .iter()
                        .enumerate()
                        .filter_map(|(i, &keep)| keep.then_some(i))
                        .collect();
                    let mut truncated: Vec<Context> =
                        retained.iter().map(|&i| voters[i].clone()).collect();
                    let score = callback.invoke(global, &mut truncated)?;
                    Ok((score, retained))
                }
                None => {
                    let score = callback.invoke(global, voters)?;
                    Ok((score, (0..voters.len()).collect()))
                }
            },
        }
    }

    fn eval_expr(
        expr: &VotingExpr,
        global: &mut Context,
        voters: &mut [Context],
        registry: Option<&VotingRegistry>,
        active: Option<Vec<bool>>,
    ) -> Result<(f64, Vec<usize>)> {
        let mut ctx = EvalCtx::new(global, voters, registry, active);
        let value = ctx.eval(expr.body(), None)?;
        let used = ctx.used_voters();
        let score = value.as_num().ok_or_else(|| {
            Error::eval(
                format!("voting produced a {}, not a number", value.type_name()),
                None,
            )
        })?;
        Ok((score, used))
    }
}

impl From<BuiltInVoting> for Voting {
    fn from(voting: BuiltInVoting) -> Self {
        Self {
            kind: VotingKind::BuiltIn(voting),
            limit: None,
        }
    }
}

impl From<VotingExpr> for Voting {
    fn from(expr: VotingExpr) -> Self {
        Self {
            kind: VotingKind::Parsed(Arc::new(expr)),
            limit: None,
        }
    }
}

fn top_n_mask(voters: &[Context], n: usize) -> Vec<bool> {
    let mut indices: Vec<usize> = (0..voters.len()).collect();
    indices.sort_by(|&a, &b| {
        let score_a = voters[a].get_num(keys::SCORE_CANDIDATE).unwrap_or(0.0);
        let score_b = voters[b].get_num(keys::SCORE_CANDIDATE).unwrap_or(0.0);
        score_b.total_cmp(&score_a).then_with(|| {
            let id_a = voters[a].get_num(keys::VOTER_ID).unwrap_or(a as f64);
            let id_b = voters[b].get_num(keys::VOTER_ID).unwrap_or(b as f64);
            id_a.total_cmp(&id_b)
        })
    });
    let mut mask = vec![false; voters.len()];
    for &i in indices.iter().take(n) {
        mask[i] = true;
    }
    mask
}

/// Named votings, resolvable from expressions and [`Voting::registered`].
#[derive(Debug, Clone, Default)]
pub struct VotingRegistry {
    inner: Map<String, Arc<VotingExpr>>,
}

impl VotingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `source` and registers it under its declared name.
    pub fn register(&mut self, source: &str) -> Result<String> {
        let expr = VotingExpr::parse(source)?;
        let Some(name) = expr.name().map(str::to_string) else {
            return Err(Error::invalid_input(
                "voting source declares no name; use register_at",
            ));
        };
        self.inner.insert(name.clone(), Arc::new(expr));
        Ok(name)
    }

    /// Registers `source` under `name`, overriding any declared name.
    pub fn register_at(&mut self, name: impl Into<String>, source: &str) -> Result<()> {
        let expr = VotingExpr::parse(source)?;
        self.inner.insert(name.into(), Arc::new(expr));
        Ok(())
    }

    pub fn get_registered(&self, name: &str) -> Option<Arc<VotingExpr>> {
        self.inner.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
