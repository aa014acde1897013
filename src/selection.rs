//! Evaluation points and their enumeration.
//!
//! A coefficient of order `k` is identified by a non-decreasing tuple of `k`
//! feature indices. Mixed partials are symmetric, so `(1, 0)` names the same
//! coefficient as `(0, 1)` and is rejected rather than evaluated twice.

use std::collections::BTreeSet;
use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{InvalidOrder, InvalidSelectionError, LabelMismatchError};

/// Derivative order of a Taylor coefficient.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum DerivativeOrder {
    First = 1,
    Second = 2,
    Third = 3,
}

impl DerivativeOrder {
    pub const ALL: [DerivativeOrder; 3] = [
        DerivativeOrder::First,
        DerivativeOrder::Second,
        DerivativeOrder::Third,
    ];

    #[inline]
    pub fn get(self) -> usize {
        self as usize
    }

    /// All orders from first up to and including `self`.
    pub fn up_to(self) -> impl Iterator<Item = DerivativeOrder> {
        Self::ALL.into_iter().take(self.get())
    }
}

impl TryFrom<usize> for DerivativeOrder {
    type Error = InvalidOrder;

    fn try_from(order: usize) -> Result<Self, Self::Error> {
        match order {
            1 => Ok(DerivativeOrder::First),
            2 => Ok(DerivativeOrder::Second),
            3 => Ok(DerivativeOrder::Third),
            other => Err(InvalidOrder(other)),
        }
    }
}

impl From<DerivativeOrder> for usize {
    fn from(order: DerivativeOrder) -> Self {
        order.get()
    }
}

impl fmt::Display for DerivativeOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// One coefficient: an order and a non-decreasing index tuple of that length.
///
/// Ordered by order first, then lexicographically by indices.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EvaluationPoint {
    order: DerivativeOrder,
    indices: Vec<usize>,
}

impl EvaluationPoint {
    /// Build a point from an index tuple, deriving the order from its length.
    ///
    /// # Errors
    ///
    /// Fails if the tuple is empty, longer than three, or not non-decreasing.
    pub fn new(indices: Vec<usize>) -> Result<Self, InvalidSelectionError> {
        let order = match DerivativeOrder::try_from(indices.len()) {
            Ok(order) => order,
            Err(_) if indices.is_empty() => return Err(InvalidSelectionError::EmptyTuple),
            Err(_) => {
                return Err(InvalidSelectionError::ArityMismatch {
                    order: DerivativeOrder::Third.get(),
                    indices,
                })
            }
        };
        if !indices.iter().tuple_windows().all(|(a, b)| a <= b) {
            return Err(InvalidSelectionError::NotAscending { indices });
        }
        Ok(EvaluationPoint { order, indices })
    }

    #[inline]
    pub fn order(&self) -> DerivativeOrder {
        self.order
    }

    #[inline]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Indices held fixed by the engine call that produces this point.
    #[inline]
    pub fn prefix(&self) -> &[usize] {
        &self.indices[..self.indices.len() - 1]
    }

    /// Index of the coefficient vector component this point reads.
    #[inline]
    pub fn last(&self) -> usize {
        self.indices[self.indices.len() - 1]
    }
}

/// An explicit evaluation request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRequest", into = "RawRequest")]
pub enum EvalRequest {
    /// A single feature index (an order-1 tuple).
    Index(usize),
    /// An index tuple; its length is its order.
    Tuple(Vec<usize>),
    /// Every non-decreasing tuple over the considered variables.
    All,
}

impl EvalRequest {
    /// Order implied by the request; `None` for [`EvalRequest::All`].
    fn arity(&self) -> Option<usize> {
        match self {
            EvalRequest::Index(_) => Some(1),
            EvalRequest::Tuple(indices) => Some(indices.len()),
            EvalRequest::All => None,
        }
    }

    fn indices(&self) -> &[usize] {
        match self {
            EvalRequest::Index(index) => std::slice::from_ref(index),
            EvalRequest::Tuple(indices) => indices,
            EvalRequest::All => &[],
        }
    }
}

impl From<usize> for EvalRequest {
    fn from(index: usize) -> Self {
        EvalRequest::Index(index)
    }
}

impl From<Vec<usize>> for EvalRequest {
    fn from(indices: Vec<usize>) -> Self {
        EvalRequest::Tuple(indices)
    }
}

/// Wire form: an integer, an integer array, or the string `"all"`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawRequest {
    Index(usize),
    Tuple(Vec<usize>),
    Keyword(String),
}

impl TryFrom<RawRequest> for EvalRequest {
    type Error = String;

    fn try_from(raw: RawRequest) -> Result<Self, Self::Error> {
        match raw {
            RawRequest::Index(index) => Ok(EvalRequest::Index(index)),
            RawRequest::Tuple(indices) => Ok(EvalRequest::Tuple(indices)),
            RawRequest::Keyword(word) if word.eq_ignore_ascii_case("all") => Ok(EvalRequest::All),
            RawRequest::Keyword(word) => Err(format!("unknown evaluation request {word:?}")),
        }
    }
}

impl From<EvalRequest> for RawRequest {
    fn from(request: EvalRequest) -> Self {
        match request {
            EvalRequest::Index(index) => RawRequest::Index(index),
            EvalRequest::Tuple(indices) => RawRequest::Tuple(indices),
            EvalRequest::All => RawRequest::Keyword("all".to_owned()),
        }
    }
}

/// The considered feature indices and their display names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariableSet {
    num_features: usize,
    indices: Vec<usize>,
    names: Vec<String>,
}

impl VariableSet {
    /// Considered `indices` into `num_features` features, named by `names`
    /// (one name per considered index, in the same order).
    ///
    /// # Errors
    ///
    /// [`LabelMismatchError`] when the name count differs from the index
    /// count, [`InvalidSelectionError`] for out-of-range or repeated indices.
    pub fn new(
        num_features: usize,
        indices: Vec<usize>,
        names: Vec<String>,
    ) -> crate::Result<Self> {
        if names.len() != indices.len() {
            return Err(LabelMismatchError {
                names: names.len(),
                considered: indices.len(),
            }
            .into());
        }
        let mut seen = BTreeSet::new();
        for &index in &indices {
            if index >= num_features {
                return Err(InvalidSelectionError::IndexOutOfRange {
                    index,
                    num_features,
                }
                .into());
            }
            if !seen.insert(index) {
                return Err(InvalidSelectionError::DuplicateVariable { index }.into());
            }
        }
        Ok(VariableSet {
            num_features,
            indices,
            names,
        })
    }

    /// Every feature considered, named `x_0`, `x_1`, ...
    pub fn all(num_features: usize) -> Self {
        VariableSet {
            num_features,
            indices: (0..num_features).collect(),
            names: (0..num_features).map(|i| format!("x_{i}")).collect(),
        }
    }

    #[inline]
    pub fn num_features(&self) -> usize {
        self.num_features
    }

    #[inline]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        self.indices.contains(&index)
    }

    /// Display name of feature `index`, if it is considered.
    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.indices
            .iter()
            .position(|&i| i == index)
            .map(|pos| self.names[pos].as_str())
    }

    /// Considered indices in ascending order.
    fn sorted_indices(&self) -> Vec<usize> {
        let mut sorted = self.indices.clone();
        sorted.sort_unstable();
        sorted
    }
}

/// Produces the ordered evaluation points for a [`VariableSet`].
#[derive(Clone, Debug)]
pub struct SelectionEnumerator<'a> {
    variables: &'a VariableSet,
}

impl<'a> SelectionEnumerator<'a> {
    pub fn new(variables: &'a VariableSet) -> Self {
        SelectionEnumerator { variables }
    }

    /// Every non-decreasing tuple of length `order` over the considered set,
    /// in lexicographic order.
    pub fn all_at(&self, order: DerivativeOrder) -> Vec<EvaluationPoint> {
        self.variables
            .sorted_indices()
            .into_iter()
            .combinations_with_replacement(order.get())
            .map(|indices| EvaluationPoint { order, indices })
            .collect()
    }

    /// Points of exactly `order`.
    ///
    /// An empty `requests` slice means "all". Every explicit tuple must
    /// have length `order`.
    ///
    /// # Errors
    ///
    /// [`InvalidSelectionError`] for any malformed request; nothing is
    /// returned partially.
    pub fn enumerate(
        &self,
        order: DerivativeOrder,
        requests: &[EvalRequest],
    ) -> Result<Vec<EvaluationPoint>, InvalidSelectionError> {
        if requests.is_empty() {
            return Ok(self.all_at(order));
        }
        let mut points = BTreeSet::new();
        for request in requests {
            match request.arity() {
                None => points.extend(self.all_at(order)),
                Some(arity) if arity == order.get() => {
                    points.insert(self.validate(request.indices())?);
                }
                Some(_) => {
                    return Err(InvalidSelectionError::ArityMismatch {
                        order: order.get(),
                        indices: request.indices().to_vec(),
                    })
                }
            }
        }
        Ok(points.into_iter().collect())
    }

    /// Points of every order `1..=max_order`.
    ///
    /// Each explicit request is routed to the order given by its length;
    /// `All` expands at every order. An empty `requests` slice means "all".
    /// Output is order-major, lexicographic within an order, without
    /// duplicates.
    ///
    /// # Errors
    ///
    /// [`InvalidSelectionError`] for any malformed request or a tuple longer
    /// than `max_order`.
    pub fn enumerate_up_to(
        &self,
        max_order: DerivativeOrder,
        requests: &[EvalRequest],
    ) -> Result<Vec<EvaluationPoint>, InvalidSelectionError> {
        if requests.is_empty() {
            return Ok(max_order.up_to().flat_map(|o| self.all_at(o)).collect());
        }
        let mut points = BTreeSet::new();
        for request in requests {
            match request.arity() {
                None => points.extend(max_order.up_to().flat_map(|o| self.all_at(o))),
                Some(arity) if arity > max_order.get() => {
                    return Err(InvalidSelectionError::ArityMismatch {
                        order: max_order.get(),
                        indices: request.indices().to_vec(),
                    })
                }
                Some(_) => {
                    points.insert(self.validate(request.indices())?);
                }
            }
        }
        Ok(points.into_iter().collect())
    }

    /// Validate one explicit tuple against the considered set.
    fn validate(&self, indices: &[usize]) -> Result<EvaluationPoint, InvalidSelectionError> {
        let num_features = self.variables.num_features();
        for &index in indices {
            if index >= num_features {
                return Err(InvalidSelectionError::IndexOutOfRange {
                    index,
                    num_features,
                });
            }
            if !self.variables.contains(index) {
                return Err(InvalidSelectionError::NotConsidered { index });
            }
        }
        EvaluationPoint::new(indices.to_vec())
    }
}
