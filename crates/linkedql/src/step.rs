//! The LinkedQL step AST.
//!
//! A query is a tree of [`Step`]s. Every step has one origin: its `from`
//! sub-step, or the environment's placeholder when `from` is `None`.
//! Steps are plain immutable data; the same step may be compiled many times.
//!
//! Queries are usually built with the chaining helpers:
//!
//! ```
//! use linkedql::{Step, Value};
//!
//! let q = Step::vertex(vec![Value::iri("alice")])
//!     .visit(Step::vertex(vec![Value::iri("likes")]))
//!     .tag("liked")
//!     .select();
//! # let _ = q;
//! ```

use crate::value::{EntityIdentifier, Value};

type Origin = Option<Box<Step>>;

/// Textual predicate used by [`Step::Filter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueFilter {
    /// Regular expression over string literals (and IRIs when `include_iris`).
    RegExp { pattern: String, include_iris: bool },
    /// SQL LIKE pattern over strings and IRIs: `%` is any run of characters,
    /// `_` is exactly one character.
    Like { pattern: String },
}

impl ValueFilter {
    pub fn regexp(pattern: impl Into<String>) -> Self {
        ValueFilter::RegExp {
            pattern: pattern.into(),
            include_iris: false,
        }
    }

    pub fn like(pattern: impl Into<String>) -> Self {
        ValueFilter::Like {
            pattern: pattern.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Select exactly the given identifiers.
    Entities { identifiers: Vec<EntityIdentifier> },
    /// Select the given values, or every node when `values` is empty.
    Vertex { values: Vec<Value> },
    /// Resume from the enclosing branch's origin.
    Placeholder,
    Visit { from: Origin, properties: Box<Step> },
    VisitReverse { from: Origin, properties: Box<Step> },
    Both { from: Origin, properties: Box<Step> },
    /// Undo the preceding traversal hop, or jump back to `tag` when given.
    Back { from: Origin, tag: Option<String> },
    Properties { from: Origin, names: Vec<String> },
    ReverseProperties { from: Origin, names: Vec<String> },
    PropertyNames { from: Origin },
    ReversePropertyNames { from: Origin },
    PropertyNamesAs { from: Origin, tag: String },
    ReversePropertyNamesAs { from: Origin, tag: String },
    Has {
        from: Origin,
        property: Box<Step>,
        values: Vec<Value>,
    },
    HasReverse {
        from: Origin,
        property: Box<Step>,
        values: Vec<Value>,
    },
    Is { from: Origin, values: Vec<Value> },
    Union { from: Origin, steps: Vec<Step> },
    Intersect { from: Origin, steps: Vec<Step> },
    Difference { from: Origin, steps: Vec<Step> },
    Filter { from: Origin, filter: ValueFilter },
    LessThan { from: Origin, value: Value },
    GreaterThan { from: Origin, value: Value },
    LessThanEquals { from: Origin, value: Value },
    GreaterThanEquals { from: Origin, value: Value },
    Count { from: Origin },
    Limit { from: Origin, limit: usize },
    Skip { from: Origin, offset: usize },
    Unique { from: Origin },
    Order { from: Origin },
    /// Bind the current position to `name`.
    As { from: Origin, name: String },
    /// Inner join: keep rows of `from` that every branch matches.
    Where { from: Origin, steps: Vec<Step> },
    /// Left outer join with a single branch.
    Optional { from: Origin, step: Box<Step> },
    /// Apply `step` with its placeholder bound to `from`.
    Follow { from: Origin, step: Box<Step> },
    Select { from: Origin, tags: Option<Vec<String>> },
    SelectFirst { from: Origin },
    Documents { from: Origin },
}

impl Step {
    pub fn vertex(values: Vec<Value>) -> Self {
        Step::Vertex { values }
    }

    pub fn all() -> Self {
        Step::Vertex { values: Vec::new() }
    }

    pub fn entities<I, E>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<EntityIdentifier>,
    {
        Step::Entities {
            identifiers: identifiers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn placeholder() -> Self {
        Step::Placeholder
    }

    /// Shorthand for `Vertex` over IRIs, the usual way to name predicates.
    pub fn iris<'a>(iris: impl IntoIterator<Item = &'a str>) -> Self {
        Step::Vertex {
            values: iris.into_iter().map(Value::iri).collect(),
        }
    }

    fn origin(self) -> Origin {
        Some(Box::new(self))
    }

    pub fn visit(self, properties: Step) -> Self {
        Step::Visit {
            from: self.origin(),
            properties: Box::new(properties),
        }
    }

    pub fn visit_reverse(self, properties: Step) -> Self {
        Step::VisitReverse {
            from: self.origin(),
            properties: Box::new(properties),
        }
    }

    pub fn both(self, properties: Step) -> Self {
        Step::Both {
            from: self.origin(),
            properties: Box::new(properties),
        }
    }

    pub fn back(self) -> Self {
        Step::Back {
            from: self.origin(),
            tag: None,
        }
    }

    pub fn back_to(self, tag: impl Into<String>) -> Self {
        Step::Back {
            from: self.origin(),
            tag: Some(tag.into()),
        }
    }

    pub fn properties<'a>(self, names: impl IntoIterator<Item = &'a str>) -> Self {
        Step::Properties {
            from: self.origin(),
            names: names.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn reverse_properties<'a>(self, names: impl IntoIterator<Item = &'a str>) -> Self {
        Step::ReverseProperties {
            from: self.origin(),
            names: names.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn property_names(self) -> Self {
        Step::PropertyNames {
            from: self.origin(),
        }
    }

    pub fn reverse_property_names(self) -> Self {
        Step::ReversePropertyNames {
            from: self.origin(),
        }
    }

    pub fn property_names_as(self, tag: impl Into<String>) -> Self {
        Step::PropertyNamesAs {
            from: self.origin(),
            tag: tag.into(),
        }
    }

    pub fn reverse_property_names_as(self, tag: impl Into<String>) -> Self {
        Step::ReversePropertyNamesAs {
            from: self.origin(),
            tag: tag.into(),
        }
    }

    pub fn has(self, property: Step, values: Vec<Value>) -> Self {
        Step::Has {
            from: self.origin(),
            property: Box::new(property),
            values,
        }
    }

    pub fn has_reverse(self, property: Step, values: Vec<Value>) -> Self {
        Step::HasReverse {
            from: self.origin(),
            property: Box::new(property),
            values,
        }
    }

    pub fn is(self, values: Vec<Value>) -> Self {
        Step::Is {
            from: self.origin(),
            values,
        }
    }

    pub fn union(self, steps: Vec<Step>) -> Self {
        Step::Union {
            from: self.origin(),
            steps,
        }
    }

    pub fn intersect(self, steps: Vec<Step>) -> Self {
        Step::Intersect {
            from: self.origin(),
            steps,
        }
    }

    pub fn difference(self, steps: Vec<Step>) -> Self {
        Step::Difference {
            from: self.origin(),
            steps,
        }
    }

    pub fn filter(self, filter: ValueFilter) -> Self {
        Step::Filter {
            from: self.origin(),
            filter,
        }
    }

    pub fn less_than(self, value: Value) -> Self {
        Step::LessThan {
            from: self.origin(),
            value,
        }
    }

    pub fn greater_than(self, value: Value) -> Self {
        Step::GreaterThan {
            from: self.origin(),
            value,
        }
    }

    pub fn less_than_equals(self, value: Value) -> Self {
        Step::LessThanEquals {
            from: self.origin(),
            value,
        }
    }

    pub fn greater_than_equals(self, value: Value) -> Self {
        Step::GreaterThanEquals {
            from: self.origin(),
            value,
        }
    }

    pub fn count(self) -> Self {
        Step::Count {
            from: self.origin(),
        }
    }

    pub fn limit(self, limit: usize) -> Self {
        Step::Limit {
            from: self.origin(),
            limit,
        }
    }

    pub fn skip(self, offset: usize) -> Self {
        Step::Skip {
            from: self.origin(),
            offset,
        }
    }

    pub fn unique(self) -> Self {
        Step::Unique {
            from: self.origin(),
        }
    }

    pub fn order(self) -> Self {
        Step::Order {
            from: self.origin(),
        }
    }

    /// `As`: bind the current position to `name`.
    pub fn tag(self, name: impl Into<String>) -> Self {
        Step::As {
            from: self.origin(),
            name: name.into(),
        }
    }

    pub fn where_(self, steps: Vec<Step>) -> Self {
        Step::Where {
            from: self.origin(),
            steps,
        }
    }

    pub fn optional(self, step: Step) -> Self {
        Step::Optional {
            from: self.origin(),
            step: Box::new(step),
        }
    }

    pub fn follow(self, step: Step) -> Self {
        Step::Follow {
            from: self.origin(),
            step: Box::new(step),
        }
    }

    pub fn select(self) -> Self {
        Step::Select {
            from: self.origin(),
            tags: None,
        }
    }

    pub fn select_tags<'a>(self, tags: impl IntoIterator<Item = &'a str>) -> Self {
        Step::Select {
            from: self.origin(),
            tags: Some(tags.into_iter().map(str::to_string).collect()),
        }
    }

    pub fn select_first(self) -> Self {
        Step::SelectFirst {
            from: self.origin(),
        }
    }

    pub fn documents(self) -> Self {
        Step::Documents {
            from: self.origin(),
        }
    }

    /// Step kind name, as used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Step::Entities { .. } => "Entities",
            Step::Vertex { .. } => "Vertex",
            Step::Placeholder => "Placeholder",
            Step::Visit { .. } => "Visit",
            Step::VisitReverse { .. } => "VisitReverse",
            Step::Both { .. } => "Both",
            Step::Back { .. } => "Back",
            Step::Properties { .. } => "Properties",
            Step::ReverseProperties { .. } => "ReverseProperties",
            Step::PropertyNames { .. } => "PropertyNames",
            Step::ReversePropertyNames { .. } => "ReversePropertyNames",
            Step::PropertyNamesAs { .. } => "PropertyNamesAs",
            Step::ReversePropertyNamesAs { .. } => "ReversePropertyNamesAs",
            Step::Has { .. } => "Has",
            Step::HasReverse { .. } => "HasReverse",
            Step::Is { .. } => "Is",
            Step::Union { .. } => "Union",
            Step::Intersect { .. } => "Intersect",
            Step::Difference { .. } => "Difference",
            Step::Filter { .. } => "Filter",
            Step::LessThan { .. } => "LessThan",
            Step::GreaterThan { .. } => "GreaterThan",
            Step::LessThanEquals { .. } => "LessThanEquals",
            Step::GreaterThanEquals { .. } => "GreaterThanEquals",
            Step::Count { .. } => "Count",
            Step::Limit { .. } => "Limit",
            Step::Skip { .. } => "Skip",
            Step::Unique { .. } => "Unique",
            Step::Order { .. } => "Order",
            Step::As { .. } => "As",
            Step::Where { .. } => "Where",
            Step::Optional { .. } => "Optional",
            Step::Follow { .. } => "Follow",
            Step::Select { .. } => "Select",
            Step::SelectFirst { .. } => "SelectFirst",
            Step::Documents { .. } => "Documents",
        }
    }
}
