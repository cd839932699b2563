//! Result-shape classification
//!
//! The provider never inspects element types at runtime. It dispatches on the
//! closed set of shapes below, derived from the operators along the data-source
//! spine of the tree.

use super::ast::{Expr, Method};

/// What evaluating a tree produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    /// A sequence of the source element type
    Sequence,
    /// A sequence whose element type was changed by a projection
    Projected,
    /// A single value (count, element, aggregate)
    Scalar,
}

impl ResultShape {
    /// Returns true if the shape is a sequence of any element type
    pub fn is_sequence(&self) -> bool {
        !matches!(self, ResultShape::Scalar)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResultShape::Sequence => "sequence",
            ResultShape::Projected => "projected",
            ResultShape::Scalar => "scalar",
        }
    }
}

impl Method {
    /// Returns true if the method terminates a query with a single value
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Method::Count
                | Method::LongCount
                | Method::Any
                | Method::All
                | Method::Contains
                | Method::First
                | Method::FirstOrDefault
                | Method::Single
                | Method::SingleOrDefault
                | Method::Last
                | Method::LastOrDefault
                | Method::ElementAt
                | Method::Sum
                | Method::Min
                | Method::Max
                | Method::Average
        )
    }
}

impl Expr {
    /// Classifies the tree by what it evaluates to.
    ///
    /// A terminal outermost operator makes the tree scalar. Otherwise the tree
    /// is projected when any operator on the data-source spine is `Select`.
    pub fn result_shape(&self) -> ResultShape {
        let mut node = self;
        let mut outermost = true;
        loop {
            match node {
                Expr::Call(call) => {
                    if call.method.is_terminal() {
                        if outermost {
                            return ResultShape::Scalar;
                        }
                        // A terminal below the outermost call is malformed;
                        // the engine reports it during validation.
                        return ResultShape::Sequence;
                    }
                    if call.method == Method::Select {
                        return ResultShape::Projected;
                    }
                    match call.source() {
                        Some(source) => node = source,
                        None => return ResultShape::Sequence,
                    }
                }
                Expr::Root(_) | Expr::Source(_) => return ResultShape::Sequence,
                _ if outermost => return ResultShape::Scalar,
                _ => return ResultShape::Sequence,
            }
            outermost = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::lambda;

    fn root() -> Expr {
        Expr::entity_root("users")
    }

    #[test]
    fn test_filter_is_same_sequence() {
        let tree = Expr::call(
            Method::Where,
            vec![root(), lambda("x", |x| x.field("id").equals(2))],
        );
        assert_eq!(tree.result_shape(), ResultShape::Sequence);
    }

    #[test]
    fn test_projection_anywhere_on_spine() {
        let select = Expr::call(Method::Select, vec![root(), lambda("x", |x| x.field("name"))]);
        assert_eq!(select.result_shape(), ResultShape::Projected);

        let take = Expr::call(Method::Take, vec![select, Expr::constant(1)]);
        assert_eq!(take.result_shape(), ResultShape::Projected);
    }

    #[test]
    fn test_terminal_is_scalar() {
        let count = Expr::call(Method::Count, vec![root()]);
        assert_eq!(count.result_shape(), ResultShape::Scalar);
        assert!(!count.result_shape().is_sequence());
    }

    #[test]
    fn test_bare_roots_are_sequences() {
        assert_eq!(root().result_shape(), ResultShape::Sequence);
        assert_eq!(Expr::constant(1).result_shape(), ResultShape::Scalar);
    }
}
